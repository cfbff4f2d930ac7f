//! The main error enum for the project lives here, and documents the various
//! conditions that can arise while interacting with the bank.

use thiserror::Error;

/// This is our error enum. It contains an entry for any part of the system in
/// which an expectation is not met or a problem occurs.
#[derive(Error, Debug, PartialEq)]
pub enum Error {
    /// An account group has no free holder slots left
    #[error("the account is full ({0} holders max)")]
    AccountFull(usize),
    /// Error building a model
    #[error("error building object {0}")]
    BuilderFailed(String),
    /// Bad configuration document
    #[error("configuration error: {0}")]
    Config(String),
    /// The planned debits of a withdrawal do not add up to what was asked for.
    /// Nothing has been applied when this is returned.
    #[error("withdrawal debited {debited} but {requested} was requested")]
    ConservationViolation {
        requested: u64,
        debited: u64,
    },
    /// Two live items in one storage can't share an ID
    #[error("an item with ID {0} is already stored")]
    DuplicateItem(String),
    /// This holder is already sitting in an account slot
    #[error("holder {0} is already enrolled")]
    HolderAlreadyEnrolled(String),
    /// The pooled (or own) balance cannot cover the request
    #[error("insufficient funds: {requested} requested, {available} available")]
    InsufficientFunds {
        requested: u64,
        available: u64,
    },
    /// When you try to do something you're not allowed to
    #[error("insufficient privileges")]
    InsufficientPrivileges,
    /// Instruments must be written for an amount within the given range
    #[error("instrument amount {amount} must be between {min} and {max}")]
    InvalidInstrumentAmount {
        amount: u64,
        min: u64,
        max: u64,
    },
    /// A bank lock was poisoned by a panicking thread
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
    /// Tried to cash something that isn't an instrument
    #[error("that item is not an instrument")]
    NotAnInstrument,
    /// Trying to operate on an object that has been deleted
    #[error("the {0} is deleted")]
    ObjectIsDeleted(String),
    /// Trying to operate on an object that is inactive
    #[error("the {0} is inactive")]
    ObjectIsInactive(String),
    /// Couldn't find the thing we were looking for
    #[error("the {0} was not found")]
    ObjectNotFound(String),
    /// The regression harness caught the bank misbehaving
    #[error("regression check failed: {0}")]
    RegressionFailed(String),
    /// There's no room left in a holder's storage
    #[error("storage is full")]
    StorageFull,
    /// A holder was serialized by a newer version of this library
    #[error("unsupported holder version {0}")]
    UnsupportedVersion(u32),
    /// Tried to pull a model out of a modification as the wrong type
    #[error("wrong model type")]
    WrongModelType,
}

/// Wraps `std::result::Result` around our `Error` enum
pub type Result<T> = std::result::Result<T, Error>;
