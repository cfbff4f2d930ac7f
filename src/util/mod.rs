//! A set of utility structs and functions used when operating the bank.

pub(crate) mod time;

#[cfg(test)]
pub(crate) mod test;
