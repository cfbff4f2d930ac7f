//! Welcome to the bank box core. This library holds the logic for a shared
//! bank: characters ("holders") on the same account can opt into pooling
//! their bank balances, and a withdrawal by one of them draws on their own
//! box first and then on everyone else who shares.
//!
//! The layout goes roughly:
//!
//! - [models] are the persisted objects: account groups, holders, and the
//!   currency in their storage.
//! - [transactions] are the operations on those models. They never write
//!   anything; they return a list of modifications for the caller to apply.
//! - [pool] and [withdrawal] hold the pooling policy and the withdrawal
//!   allocator the transactions are built on.
//! - [system] holds the [Bank] service (which owns every account group and
//!   applies the modifications), its parameters, and the regression harness.
//! - [speech] turns what a holder says to the banker into bank operations.
//!
//! [models]: models/index.html
//! [transactions]: transactions/index.html
//! [pool]: pool/index.html
//! [withdrawal]: withdrawal/index.html
//! [system]: system/index.html
//! [Bank]: system/bank/struct.Bank.html
//! [speech]: speech/index.html

pub mod error;
mod util;
pub mod access;
pub mod models;
pub mod pool;
pub mod withdrawal;
pub mod transactions;
pub mod speech;
pub mod system;
