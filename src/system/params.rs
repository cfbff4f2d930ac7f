//! Defines the bank's tunable parameters: how small an instrument may get
//! before it is cashed, how big a stack of coin can be, how many holders share
//! an account, and how many items fit in a bank box.

use crate::error::{Error, Result};
use getset::{CopyGetters, Setters};
use serde::{Serialize, Deserialize};

/// Holds the bank's parameters. Missing fields fall back to their defaults
/// when deserializing.
#[derive(Clone, Debug, PartialEq, CopyGetters, Setters, Serialize, Deserialize)]
#[getset(get_copy = "pub", set = "pub")]
#[serde(default)]
pub struct BankParameters {
    /// Instruments worth less than this are cashed into coin. Also the
    /// smallest check the banker will write.
    instrument_threshold: u64,
    /// The largest check the banker will write
    instrument_maximum: u64,
    /// The largest stack of coin a single item can hold
    max_stack: u64,
    /// How many holders fit in one account group
    group_capacity: usize,
    /// How many items fit in one holder's storage
    storage_capacity: usize,
}

impl Default for BankParameters {
    fn default() -> Self {
        Self {
            instrument_threshold: 5000,
            instrument_maximum: 1_000_000,
            max_stack: 60000,
            group_capacity: 5,
            storage_capacity: 125,
        }
    }
}

impl BankParameters {
    /// Create a params object with the default values
    pub fn new() -> Self {
        Default::default()
    }

    /// Load parameters from a JSON document. Anything not given keeps its
    /// default value.
    pub fn from_json(json: &str) -> Result<Self> {
        let params: Self = serde_json::from_str(json)
            .map_err(|e| Error::Config(e.to_string()))?;
        params.validate()?;
        Ok(params)
    }

    /// Make sure the parameters make sense together.
    pub fn validate(&self) -> Result<()> {
        if self.max_stack == 0 {
            Err(Error::Config("max_stack must be positive".into()))?;
        }
        if self.group_capacity == 0 {
            Err(Error::Config("group_capacity must be positive".into()))?;
        }
        if self.storage_capacity == 0 {
            Err(Error::Config("storage_capacity must be positive".into()))?;
        }
        if self.instrument_maximum < self.instrument_threshold {
            Err(Error::Config("instrument_maximum is below instrument_threshold".into()))?;
        }
        // cashing a sub-threshold check has to fit in a single stack
        if self.max_stack < self.instrument_threshold {
            Err(Error::Config("max_stack is below instrument_threshold".into()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let params = BankParameters::new();
        assert_eq!(params.instrument_threshold(), 5000);
        assert_eq!(params.instrument_maximum(), 1_000_000);
        assert_eq!(params.max_stack(), 60000);
        assert_eq!(params.group_capacity(), 5);
        assert_eq!(params.storage_capacity(), 125);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn loads_partial_json() {
        let params = BankParameters::from_json(r#"{"max_stack": 8000, "group_capacity": 7}"#).unwrap();
        assert_eq!(params.max_stack(), 8000);
        assert_eq!(params.group_capacity(), 7);
        assert_eq!(params.instrument_threshold(), 5000);

        let res = BankParameters::from_json(r#"{"max_stack": 0}"#);
        assert_eq!(res, Err(Error::Config("max_stack must be positive".into())));

        let res = BankParameters::from_json(r#"{"max_stack": 1000, "storage_capacity": 2}"#);
        assert_eq!(res, Err(Error::Config("max_stack is below instrument_threshold".into())));

        let res = BankParameters::from_json("not json");
        assert!(matches!(res, Err(Error::Config(_))));
    }
}
