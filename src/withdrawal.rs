//! Plans a combined withdrawal across an account group.
//!
//! Planning never touches a holder. It walks a snapshot of the roster and
//! produces a [WithdrawalPlan]: a list of per-item debits that add up to
//! exactly the requested amount. The plan is checked for conservation before
//! anyone applies it, so a bad plan changes nothing.
//!
//! The draw order is:
//!
//! 1. The requester's own storage, coin first and then instruments, until
//!    either the request is covered or the requester is empty.
//! 2. The other pool members, in slot order, in passes. Each pass visits
//!    every member for coin, then every member for instruments, taking at
//!    most the *suggested* share (`remaining / members`, or the whole
//!    remainder if that rounds to zero) from each member per kind. Passes
//!    repeat until the request is covered.
//!
//! Items that were deleted out from under us are skipped.
//!
//! [WithdrawalPlan]: struct.WithdrawalPlan.html

use crate::{
    error::{Error, Result},
    models::{
        currency::{CurrencyItem, CurrencyItemID, CurrencyKind},
        holder::{Holder, HolderID},
    },
    pool,
};
use getset::{CopyGetters, Getters};
use std::cmp;

/// Value taken from one currency item.
#[derive(Clone, Debug, PartialEq, Getters, CopyGetters)]
pub struct Debit {
    /// Whose storage the item is in
    #[getset(get = "pub")]
    holder_id: HolderID,
    /// The item being drawn down
    #[getset(get = "pub")]
    item_id: CurrencyItemID,
    /// The kind of currency the item holds
    #[getset(get_copy = "pub")]
    kind: CurrencyKind,
    /// How much is taken
    #[getset(get_copy = "pub")]
    amount: u64,
}

/// Every debit needed to cover one withdrawal, in the order they were drawn.
#[derive(Clone, Debug, Default, PartialEq, Getters, CopyGetters)]
pub struct WithdrawalPlan {
    /// The amount the requester asked for
    #[getset(get_copy = "pub")]
    requested: u64,
    /// The planned debits
    #[getset(get = "pub")]
    debits: Vec<Debit>,
}

impl WithdrawalPlan {
    /// Total value the plan takes.
    pub fn total(&self) -> u64 {
        self.debits.iter().map(|d| d.amount).sum()
    }

    /// Total value the plan takes from one holder.
    pub fn debited_from(&self, holder_id: &HolderID) -> u64 {
        self.debits.iter()
            .filter(|d| &d.holder_id == holder_id)
            .map(|d| d.amount)
            .sum()
    }

    /// The holders this plan touches, in the order they're first debited.
    pub fn touched_holders(&self) -> Vec<&HolderID> {
        let mut touched: Vec<&HolderID> = Vec::new();
        for debit in &self.debits {
            if !touched.contains(&&debit.holder_id) {
                touched.push(&debit.holder_id);
            }
        }
        touched
    }

    /// Whether this plan does nothing at all.
    pub fn is_empty(&self) -> bool {
        self.debits.is_empty()
    }

    /// Make sure the debits add up to exactly what was asked for.
    pub fn validate(&self) -> Result<()> {
        let debited = self.total();
        if debited != self.requested {
            log::error!("withdrawal: conservation violated -- requested {} but planned {}", self.requested, debited);
            Err(Error::ConservationViolation { requested: self.requested, debited })?;
        }
        Ok(())
    }
}

/// A running tally of what's left in one holder's items while we plan.
struct Tally<'a> {
    holder: &'a Holder,
    stacked: Vec<(&'a CurrencyItem, u64)>,
    instruments: Vec<(&'a CurrencyItem, u64)>,
}

impl<'a> Tally<'a> {
    fn new(holder: &'a Holder) -> Self {
        let (stacked, instruments) = holder.storage().items_by_kind();
        Self {
            holder,
            stacked: stacked.into_iter().map(|item| (item, item.value())).collect(),
            instruments: instruments.into_iter().map(|item| (item, item.value())).collect(),
        }
    }

    fn items_mut(&mut self, kind: CurrencyKind) -> &mut Vec<(&'a CurrencyItem, u64)> {
        match kind {
            CurrencyKind::Stacked => &mut self.stacked,
            CurrencyKind::Instrument => &mut self.instruments,
        }
    }

    fn balance(&self, kind: CurrencyKind) -> u64 {
        let items = match kind {
            CurrencyKind::Stacked => &self.stacked,
            CurrencyKind::Instrument => &self.instruments,
        };
        items.iter().map(|(_, left)| left).sum()
    }

    /// Take up to `cap` of one kind of currency, item by item, recording a
    /// debit for each item touched. Returns how much was taken.
    fn draw(&mut self, kind: CurrencyKind, cap: u64, debits: &mut Vec<Debit>) -> u64 {
        let holder_id = self.holder.id().clone();
        let mut taken = 0;
        for (item, left) in self.items_mut(kind).iter_mut() {
            if taken >= cap {
                break;
            }
            let grab = cmp::min(cap - taken, *left);
            if grab == 0 {
                continue;
            }
            *left -= grab;
            taken += grab;
            debits.push(Debit {
                holder_id: holder_id.clone(),
                item_id: item.id().clone(),
                kind,
                amount: grab,
            });
        }
        taken
    }
}

/// Plan a withdrawal of `amount` for `requester` against `roster` (the
/// requester's whole account group, in slot order).
///
/// Fails with `InsufficientFunds` if the requester's accessible balance can't
/// cover it. A zero amount plans nothing.
pub fn plan(requester: &Holder, roster: &[Holder], amount: u64) -> Result<WithdrawalPlan> {
    let mut plan = WithdrawalPlan {
        requested: amount,
        debits: Vec::new(),
    };
    if amount == 0 {
        return Ok(plan);
    }
    let available = pool::accessible_balance(requester, roster);
    if available < amount {
        Err(Error::InsufficientFunds { requested: amount, available })?;
    }

    let mut remaining = amount;
    let mut own = Tally::new(pool::own(requester, roster));
    for kind in [CurrencyKind::Stacked, CurrencyKind::Instrument] {
        remaining -= own.draw(kind, remaining, &mut plan.debits);
    }

    if remaining > 0 {
        let mut others = pool::pool_others(requester, roster)
            .into_iter()
            .map(Tally::new)
            .collect::<Vec<_>>();
        if !others.is_empty() {
            let suggested = match remaining / others.len() as u64 {
                0 => remaining,
                share => share,
            };
            while remaining > 0 {
                let before = remaining;
                for kind in [CurrencyKind::Stacked, CurrencyKind::Instrument] {
                    for tally in others.iter_mut() {
                        if remaining == 0 {
                            break;
                        }
                        if tally.balance(kind) == 0 {
                            continue;
                        }
                        remaining -= tally.draw(kind, cmp::min(suggested, remaining), &mut plan.debits);
                    }
                }
                if remaining == before {
                    // everyone's tapped out. validate() below reports it.
                    break;
                }
            }
        }
    }

    plan.validate()?;
    Ok(plan)
}
