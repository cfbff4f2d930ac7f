//! Banking transactions: moving value into, out of, and around a holder's
//! storage.
//!
//! Withdrawals are planned first (see the [withdrawal module][withdrawal]) and
//! only applied once the plan checks out. They operate on an owned copy of the
//! caller's whole account group and hand back the resulting modifications, so
//! an error at any point leaves the caller's real data untouched.
//!
//! [withdrawal]: ../../withdrawal/index.html

use chrono::{DateTime, Utc};
use crate::{
    access::Permission,
    error::{Error, Result},
    models::{
        Op,
        Modifications,
        currency::{Currency, CurrencyItem, CurrencyItemID, CurrencyKind},
        holder::{Holder, HolderID},
    },
    system::params::BankParameters,
    withdrawal::{self, WithdrawalPlan},
};

/// An applied withdrawal plan: the updated roster plus the item-level
/// modifications made so far.
struct Settlement {
    roster: Vec<Holder>,
    touched: Vec<HolderID>,
    mods: Modifications,
}

impl Settlement {
    fn holder_mut(&mut self, holder_id: &HolderID) -> Result<&mut Holder> {
        holder_mut(&mut self.roster, holder_id)
    }

    /// Purge destroyed items from every touched holder and finish off the
    /// modification list with an update for each of them.
    fn into_modifications(self, now: &DateTime<Utc>) -> Modifications {
        let Settlement { mut roster, touched, mut mods } = self;
        for holder in roster.iter_mut().filter(|h| touched.contains(h.id())) {
            holder.storage_mut().purge();
            holder.set_updated(now.clone());
            mods.push(Op::Update, holder.clone());
        }
        mods
    }
}

fn holder_mut<'a>(roster: &'a mut [Holder], holder_id: &HolderID) -> Result<&'a mut Holder> {
    roster.iter_mut()
        .find(|h| h.id() == holder_id)
        .ok_or(Error::ObjectNotFound("holder".into()))
}

/// Make sure a holder-scoped transaction is being run by the holder it
/// applies to.
fn self_check(caller: &Holder, subject: &Holder) -> Result<()> {
    if caller.id() != subject.id() {
        Err(Error::InsufficientPrivileges)?;
    }
    if subject.is_deleted() {
        Err(Error::ObjectIsDeleted("holder".into()))?;
    }
    Ok(())
}

/// Apply a validated plan to the roster. Items that end up below the
/// instrument threshold are cashed so no sub-threshold instrument survives.
fn settle(plan: &WithdrawalPlan, mut roster: Vec<Holder>, params: &BankParameters, now: &DateTime<Utc>) -> Result<Settlement> {
    plan.validate()?;
    let mut touched_items: Vec<(HolderID, CurrencyItemID)> = Vec::new();
    for debit in plan.debits() {
        let holder = holder_mut(&mut roster, debit.holder_id())?;
        let item = holder.storage_mut()
            .item_mut(debit.item_id())
            .ok_or(Error::ObjectNotFound("currency item".into()))?;
        let taken = item.reduce(debit.amount(), now);
        if taken != debit.amount() {
            Err(Error::ConservationViolation { requested: plan.requested(), debited: plan.total() - debit.amount() + taken })?;
        }
        let key = (debit.holder_id().clone(), debit.item_id().clone());
        if !touched_items.contains(&key) {
            touched_items.push(key);
        }
    }

    let mut mods = Modifications::new();
    let mut to_cash = Vec::new();
    for (holder_id, item_id) in &touched_items {
        let holder = holder_mut(&mut roster, holder_id)?;
        // look at every item carrying this ID, so a stale twin can't hide a
        // live one from the threshold check
        let matching = holder.storage().items().iter()
            .filter(|i| i.id() == item_id)
            .collect::<Vec<_>>();
        if matching.is_empty() {
            Err(Error::ObjectNotFound("currency item".into()))?;
        }
        for item in matching {
            if item.is_deleted() {
                mods.push(Op::Delete, item.clone());
            } else {
                mods.push(Op::Update, item.clone());
                if item.is_sub_threshold(params.instrument_threshold()) {
                    to_cash.push((holder_id.clone(), item_id.clone()));
                }
            }
        }
    }

    for (holder_id, item_id) in to_cash {
        let holder = holder_mut(&mut roster, &holder_id)?;
        let cashed = holder.storage_mut().cash(&item_id, params.max_stack(), now)?;
        mods.push(Op::Delete, cashed.instrument().clone());
        for stack in cashed.stacks() {
            mods.push(Op::Create, stack.clone());
        }
        if let Some(replacement) = cashed.replacement() {
            mods.push(Op::Create, replacement.clone());
        }
    }

    let touched = plan.touched_holders().into_iter().cloned().collect();
    Ok(Settlement {
        roster,
        touched,
        mods,
    })
}

/// Withdraw `amount` for `caller`. `roster` is the caller's whole account
/// group in slot order (including the caller).
///
/// The caller's own storage is drawn down first. If that isn't enough and the
/// caller shares, the rest comes from the other sharing holders in the group.
/// Fails with `InsufficientFunds` (and changes nothing) if even that isn't
/// enough. Withdrawing zero is a no-op.
pub fn withdraw(caller: &Holder, roster: Vec<Holder>, amount: u64, params: &BankParameters, now: &DateTime<Utc>) -> Result<Modifications> {
    caller.access_check(Permission::BankWithdraw)?;
    let plan = withdrawal::plan(caller, &roster, amount)?;
    if plan.is_empty() {
        return Ok(Modifications::new());
    }
    let settlement = settle(&plan, roster, params, now)?;
    Ok(settlement.into_modifications(now))
}

/// Write a check: withdraw `amount` (exactly like `withdraw`) and put an
/// instrument of that worth into the caller's storage.
pub fn issue_instrument(caller: &Holder, roster: Vec<Holder>, id: CurrencyItemID, amount: u64, params: &BankParameters, now: &DateTime<Utc>) -> Result<Modifications> {
    caller.access_check(Permission::BankIssueInstrument)?;
    if amount < params.instrument_threshold() || amount > params.instrument_maximum() {
        Err(Error::InvalidInstrumentAmount {
            amount,
            min: params.instrument_threshold(),
            max: params.instrument_maximum(),
        })?;
    }
    let plan = withdrawal::plan(caller, &roster, amount)?;
    let mut settlement = settle(&plan, roster, params, now)?;
    let instrument = CurrencyItem::new(id, Currency::Instrument(amount), now);
    let holder = settlement.holder_mut(caller.id())?;
    holder.storage_mut().purge();
    holder.storage_mut().insert(instrument.clone())?;
    settlement.mods.push(Op::Create, instrument);
    if !settlement.touched.contains(caller.id()) {
        settlement.touched.push(caller.id().clone());
    }
    Ok(settlement.into_modifications(now))
}

/// Deposit coin into a holder's storage. Existing stacks are topped up first,
/// then new stacks (with IDs derived from `id`) are created. Fails with
/// `StorageFull` if it can't all fit.
pub fn deposit(caller: &Holder, mut subject: Holder, id: CurrencyItemID, amount: u64, params: &BankParameters, now: &DateTime<Utc>) -> Result<Modifications> {
    caller.access_check(Permission::BankDeposit)?;
    self_check(caller, &subject)?;
    if amount == 0 {
        return Ok(Modifications::new());
    }
    let (updated, created) = subject.storage_mut().place_stacked(&id, amount, params.max_stack(), now)?;
    let mut mods = Modifications::new();
    for item in updated {
        mods.push(Op::Update, item);
    }
    for item in created {
        mods.push(Op::Create, item);
    }
    subject.set_updated(now.clone());
    mods.push(Op::Update, subject);
    Ok(mods)
}

/// Put an existing check into a holder's storage.
pub fn deposit_instrument(caller: &Holder, mut subject: Holder, id: CurrencyItemID, worth: u64, params: &BankParameters, now: &DateTime<Utc>) -> Result<Modifications> {
    caller.access_check(Permission::BankDeposit)?;
    self_check(caller, &subject)?;
    if worth < params.instrument_threshold() || worth > params.instrument_maximum() {
        Err(Error::InvalidInstrumentAmount {
            amount: worth,
            min: params.instrument_threshold(),
            max: params.instrument_maximum(),
        })?;
    }
    let instrument = CurrencyItem::new(id, Currency::Instrument(worth), now);
    subject.storage_mut().insert(instrument.clone())?;
    subject.set_updated(now.clone());
    let mut mods = Modifications::new_single(Op::Create, instrument);
    mods.push(Op::Update, subject);
    Ok(mods)
}

/// Cash one of the holder's instruments into coin. Whatever doesn't fit in
/// their storage comes back as a smaller instrument.
pub fn cash_instrument(caller: &Holder, mut subject: Holder, item_id: &CurrencyItemID, params: &BankParameters, now: &DateTime<Utc>) -> Result<Modifications> {
    caller.access_check(Permission::BankCashInstrument)?;
    self_check(caller, &subject)?;
    let item = subject.storage().item(item_id).ok_or(Error::ObjectNotFound("currency item".into()))?;
    if item.kind() != CurrencyKind::Instrument {
        Err(Error::NotAnInstrument)?;
    }
    let cashed = subject.storage_mut().cash(item_id, params.max_stack(), now)?;
    let mut mods = Modifications::new_single(Op::Delete, cashed.instrument().clone());
    for stack in cashed.stacks() {
        mods.push(Op::Create, stack.clone());
    }
    if let Some(replacement) = cashed.replacement() {
        mods.push(Op::Create, replacement.clone());
    }
    subject.storage_mut().purge();
    subject.set_updated(now.clone());
    mods.push(Op::Update, subject);
    Ok(mods)
}

/// Opt a holder in or out of pooled withdrawals.
pub fn set_sharing(caller: &Holder, mut subject: Holder, sharing: bool, now: &DateTime<Utc>) -> Result<Modifications> {
    caller.access_check(Permission::BankSetSharing)?;
    self_check(caller, &subject)?;
    subject.set_sharing(sharing);
    subject.set_updated(now.clone());
    Ok(Modifications::new_single(Op::Update, subject))
}
