//! Transactions are the operations that change the bank's state. Each one
//! checks the caller's permissions, takes owned copies of the models involved,
//! and returns the [Modifications] that the caller should apply. Nothing here
//! touches shared state directly.
//!
//! [Modifications]: ../models/struct.Modifications.html

pub mod bank;
