//! Models are the persisted objects of the bank: the account groups, the
//! holders inside them, and the currency items in each holder's storage.
//!
//! Models are never written by this library. Instead, [transactions] return a
//! set of [Modifications] describing what changed, and whoever owns the
//! storage (see the [Bank] service) applies them.
//!
//! [transactions]: ../transactions/index.html
//! [Modifications]: struct.Modifications.html
//! [Bank]: ../system/bank/struct.Bank.html

use crate::error::{Error, Result};
use getset::Getters;
use serde::{Serialize, Deserialize};
use std::convert::TryFrom;

#[macro_use]
pub(crate) mod lib;

/// A macro that standardizes including, exporting, and creating wrapper type(s)
/// for our heroic models.
macro_rules! load_models {
    (
        @pub mod
        $( ($path:ident, $model:ident), )*
    ) => {
        $(
            pub mod $path;
        )*
    };

    // create an enum that wraps our models in CUD
    (
        @pub enum $enumname:ident
        $( ($path:ident, $model:ident), )*
    ) => {
        /// An enum that allows returning *any* model type. This is mainly used
        /// along with [Op](enum.Op.html) to specify modifications (ie
        /// `[Op::Update, Holder]`).
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        pub enum $enumname {
            $(
                $model(crate::models::$path::$model),
            )*
        }

        $(
            impl From<crate::models::$path::$model> for $enumname {
                fn from(model: crate::models::$path::$model) -> Self {
                    $enumname::$model(model)
                }
            }

            impl TryFrom<$enumname> for crate::models::$path::$model {
                type Error = Error;

                fn try_from(val: $enumname) -> Result<Self> {
                    match val {
                        $enumname::$model(model) => Ok(model),
                        #[allow(unreachable_patterns)]
                        _ => Err(Error::WrongModelType),
                    }
                }
            }
        )*
    };

    // entry point
    ($($load_type:tt)*) => {
        load_models! {
            @$($load_type)*
            // dependency order, leaves first
            (currency, CurrencyItem),
            (holder, Holder),
            (account, Account),
        }
    };
}

load_models!{ pub mod }
pub mod storage;

load_models!{ pub enum Model }

/// The kinds of things a transaction can do to a model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    #[serde(rename = "create")]
    Create,
    #[serde(rename = "update")]
    Update,
    #[serde(rename = "delete")]
    Delete,
}

/// A single change to a single model.
#[derive(Clone, Debug, PartialEq, Getters, Serialize, Deserialize)]
#[getset(get = "pub")]
pub struct Modification {
    /// What we're doing
    op: Op,
    /// What we're doing it to
    model: Model,
}

impl Modification {
    /// Create a new modification
    pub fn new(op: Op, model: Model) -> Self {
        Self {
            op,
            model,
        }
    }

    /// Split this modification into its op and model.
    pub fn into_pair(self) -> (Op, Model) {
        (self.op, self.model)
    }

    /// Pull the model out of this modification, making sure both the op and
    /// the model type are what we expect.
    pub fn expect_op<T: TryFrom<Model, Error = Error>>(self, verify_op: Op) -> Result<T> {
        if self.op != verify_op {
            Err(Error::WrongModelType)?;
        }
        T::try_from(self.model)
    }
}

/// An ordered list of modifications, returned by every transaction.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Modifications {
    modifications: Vec<Modification>,
}

impl Modifications {
    /// Create an empty modification set
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a modification set holding one modification
    pub fn new_single<T: Into<Model>>(op: Op, model: T) -> Self {
        let mut mods = Self::new();
        mods.push(op, model);
        mods
    }

    /// Add a modification
    pub fn push<T: Into<Model>>(&mut self, op: Op, model: T) {
        self.modifications.push(Modification::new(op, model.into()));
    }

    /// Iterate over the modifications in order
    pub fn iter(&self) -> impl Iterator<Item = &Modification> {
        self.modifications.iter()
    }

    /// How many modifications we hold
    pub fn len(&self) -> usize {
        self.modifications.len()
    }

    /// Whether this set is a no-op
    pub fn is_empty(&self) -> bool {
        self.modifications.is_empty()
    }

    /// Consume the set, returning the modifications
    pub fn into_vec(self) -> Vec<Modification> {
        self.modifications
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{
            account::AccountID,
            currency::{CurrencyItem, CurrencyItemID},
            holder::{Holder, HolderID},
        },
        util::{self, test::*},
    };

    #[test]
    fn expect_op_checks_op_and_type() {
        let now = util::time::now();
        let holder = make_holder(&HolderID::create(), &AccountID::create(), false, vec![], &now);
        let item = make_stacked(&CurrencyItemID::create(), 100, &now);
        let mut mods = Modifications::new_single(Op::Update, holder.clone());
        mods.push(Op::Delete, item.clone());
        assert_eq!(mods.len(), 2);

        let mods = mods.into_vec();
        assert_eq!(mods[0].clone().expect_op::<Holder>(Op::Update).unwrap(), holder);
        assert_eq!(mods[0].clone().expect_op::<Holder>(Op::Create), Err(Error::WrongModelType));
        assert_eq!(mods[1].clone().expect_op::<Holder>(Op::Delete), Err(Error::WrongModelType));
        assert_eq!(mods[1].clone().expect_op::<CurrencyItem>(Op::Delete).unwrap(), item);
    }
}
