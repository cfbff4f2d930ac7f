//! Currency items are the units of stored value sitting in a holder's
//! [storage]. There are two kinds: stacked currency (coin, valued by its
//! quantity) and instruments (checks, valued by the face value written on
//! them).
//!
//! [storage]: ../storage/struct.Storage.html

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use std::cmp;

/// Which flavor of currency an item is. Useful for grouping items without
/// caring about their value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CurrencyKind {
    #[serde(rename = "stacked")]
    Stacked,
    #[serde(rename = "instrument")]
    Instrument,
}

/// The value carried by a currency item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Currency {
    /// Fungible coin. The value is the quantity in the stack.
    #[serde(rename = "stacked")]
    Stacked(u64),
    /// A single non-stacking note with a face value ("worth").
    #[serde(rename = "instrument")]
    Instrument(u64),
}

impl Currency {
    /// The amount of value this currency represents.
    pub fn value(&self) -> u64 {
        match *self {
            Currency::Stacked(qty) => qty,
            Currency::Instrument(worth) => worth,
        }
    }

    /// Which kind of currency this is.
    pub fn kind(&self) -> CurrencyKind {
        match *self {
            Currency::Stacked(_) => CurrencyKind::Stacked,
            Currency::Instrument(_) => CurrencyKind::Instrument,
        }
    }

    /// Same kind of currency, different value.
    fn revalue(&self, value: u64) -> Self {
        match *self {
            Currency::Stacked(_) => Currency::Stacked(value),
            Currency::Instrument(_) => Currency::Instrument(value),
        }
    }
}

bank_model! {
    /// A currency item owned by exactly one holder's storage.
    pub struct CurrencyItem {
        /// What this item is worth, and in what form
        currency: Currency,
    }
    CurrencyItemID
    CurrencyItemBuilder
}

impl CurrencyItemID {
    /// Derive a new ID from this one. Used when an item spawns other items
    /// (cashing an instrument, splitting a deposit into stacks).
    pub fn child(&self, tag: &str, n: usize) -> Self {
        Self::new(format!("{}-{}{}", self.as_str(), tag, n))
    }
}

impl CurrencyItem {
    /// Create a live currency item.
    pub(crate) fn new(id: CurrencyItemID, currency: Currency, now: &DateTime<Utc>) -> Self {
        Self {
            id,
            currency,
            active: true,
            created: now.clone(),
            updated: now.clone(),
            deleted: None,
        }
    }

    /// The current worth of this item: quantity for stacked currency, face
    /// value for instruments.
    pub fn value(&self) -> u64 {
        self.currency().value()
    }

    /// What kind of currency this item holds.
    pub fn kind(&self) -> CurrencyKind {
        self.currency().kind()
    }

    /// Whether this is an instrument worth less than `threshold`. These are
    /// not allowed to linger in storage and get cashed.
    pub fn is_sub_threshold(&self, threshold: u64) -> bool {
        self.kind() == CurrencyKind::Instrument && self.value() < threshold
    }

    /// Take up to `amount` of value from this item, returning how much was
    /// actually taken. An item that hits zero is destroyed (marked deleted)
    /// rather than left sitting around worthless.
    pub(crate) fn reduce(&mut self, amount: u64, now: &DateTime<Utc>) -> u64 {
        let taken = cmp::min(amount, self.value());
        let remaining = self.value() - taken;
        let currency = self.currency().revalue(remaining);
        self.set_currency(currency);
        self.set_updated(now.clone());
        if remaining == 0 {
            self.set_deleted(Some(now.clone()));
        }
        taken
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        util::{self, test::*},
    };

    #[test]
    fn values_and_kinds() {
        let now = util::time::now();
        let gold = make_stacked(&CurrencyItemID::create(), 1200, &now);
        let check = make_instrument(&CurrencyItemID::create(), 7000, &now);
        assert_eq!(gold.value(), 1200);
        assert_eq!(gold.kind(), CurrencyKind::Stacked);
        assert_eq!(check.value(), 7000);
        assert_eq!(check.kind(), CurrencyKind::Instrument);
        assert!(!check.is_sub_threshold(5000));
        assert!(make_instrument(&CurrencyItemID::create(), 4999, &now).is_sub_threshold(5000));
        // coin is never "sub threshold", no matter how little of it there is
        assert!(!make_stacked(&CurrencyItemID::create(), 1, &now).is_sub_threshold(5000));
    }

    #[test]
    fn reduce_destroys_at_zero() {
        let now = util::time::now();
        let mut gold = make_stacked(&CurrencyItemID::create(), 500, &now);
        assert_eq!(gold.reduce(200, &now), 200);
        assert_eq!(gold.value(), 300);
        assert!(!gold.is_deleted());

        assert_eq!(gold.reduce(1000, &now), 300);
        assert_eq!(gold.value(), 0);
        assert!(gold.is_deleted());

        let mut check = make_instrument(&CurrencyItemID::create(), 7000, &now);
        assert_eq!(check.reduce(3000, &now), 3000);
        assert_eq!(check.currency(), &Currency::Instrument(4000));
        assert!(check.is_sub_threshold(5000));
    }

    #[test]
    fn child_ids() {
        let id = CurrencyItemID::new("check-1");
        assert_eq!(id.child("cash", 0).as_str(), "check-1-cash0");
        assert_eq!(id.child("cash", 12).as_str(), "check-1-cash12");
    }
}
