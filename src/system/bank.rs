//! The `Bank` is the service that owns every account group and runs banking
//! transactions against them.
//!
//! Each account group lives behind its own mutex. Anything that touches a
//! holder locks that holder's group for the whole operation: the transaction
//! runs on cloned holders, and the modifications it returns are applied to
//! the group before the lock is released. Two withdrawals against the same
//! group never interleave, while withdrawals against different groups run in
//! parallel.
//!
//! ```
//! use bankbox_core::{
//!     access::Role,
//!     models::{account::AccountID, holder::HolderID},
//!     system::{bank::Bank, params::BankParameters},
//! };
//!
//! # fn main() -> bankbox_core::error::Result<()> {
//! let bank = Bank::new(BankParameters::default())?;
//! let account_id = bank.open_account(AccountID::new("leslie"), "leslie")?;
//! let me = HolderID::new("leslie-1");
//! let alt = HolderID::new("leslie-2");
//! bank.create_holder(me.clone(), account_id.clone(), "Leslie", vec![Role::Player], true)?;
//! bank.create_holder(alt.clone(), account_id.clone(), "Knope", vec![Role::Player], true)?;
//! bank.deposit(&me, 3000)?;
//! bank.deposit(&alt, 10000)?;
//!
//! assert_eq!(bank.request_pooled_balance(&me)?, 13000);
//! assert!(bank.request_withdrawal(&me, 8000)?);
//! assert_eq!(bank.request_balance(&me)?, 0);
//! assert_eq!(bank.request_balance(&alt)?, 5000);
//! assert!(!bank.request_withdrawal(&me, 6000)?);
//! # Ok(())
//! # }
//! ```

use crate::{
    access::{Permission, Role},
    error::{Error, Result},
    models::{
        Op,
        Model,
        Modifications,
        account::{Account, AccountID},
        currency::{CurrencyItem, CurrencyItemID},
        holder::{Holder, HolderID},
        storage::Storage,
    },
    pool,
    system::params::BankParameters,
    transactions,
    util,
};
use getset::Getters;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

/// One account group: the account and its holders, in slot order.
#[derive(Clone, Debug, PartialEq, Getters)]
#[getset(get = "pub")]
pub struct Roster {
    /// The account group
    account: Account,
    /// The group's holders, in slot order
    holders: Vec<Holder>,
}

impl Roster {
    fn new(account: Account) -> Self {
        Self {
            account,
            holders: Vec::new(),
        }
    }

    /// Find a holder in this group.
    pub fn holder(&self, holder_id: &HolderID) -> Result<&Holder> {
        self.holders.iter()
            .find(|h| h.id() == holder_id)
            .ok_or(Error::ObjectNotFound("holder".into()))
    }

    fn holder_mut(&mut self, holder_id: &HolderID) -> Result<&mut Holder> {
        self.holders.iter_mut()
            .find(|h| h.id() == holder_id)
            .ok_or(Error::ObjectNotFound("holder".into()))
    }

    /// Apply a transaction's modifications. Either all of them land or none
    /// do.
    fn apply(&mut self, mods: Modifications) -> Result<()> {
        let mut account = self.account.clone();
        let mut holders = self.holders.clone();
        for modification in mods.into_vec() {
            match modification.into_pair() {
                (Op::Update, Model::Holder(holder)) => {
                    let slot = holders.iter_mut()
                        .find(|h| h.id() == holder.id())
                        .ok_or(Error::ObjectNotFound("holder".into()))?;
                    *slot = holder;
                }
                (Op::Create, Model::Holder(holder)) => {
                    holders.push(holder);
                }
                (Op::Update, Model::Account(updated)) => {
                    account = updated;
                }
                // items live inside their holder's storage, so the holder
                // update that follows carries the change
                (op, Model::CurrencyItem(item)) => {
                    log::trace!("Roster::apply() -- {:?} item {} ({})", op, item.id(), item.value());
                }
                _ => Err(Error::WrongModelType)?,
            }
        }
        self.account = account;
        self.holders = holders;
        Ok(())
    }
}

/// The bank service. Safe to share between threads.
#[derive(Debug)]
pub struct Bank {
    params: BankParameters,
    groups: RwLock<HashMap<AccountID, Arc<Mutex<Roster>>>>,
    directory: RwLock<HashMap<HolderID, AccountID>>,
}

fn poisoned<T>(_: T) -> Error {
    Error::LockPoisoned("bank".into())
}

impl Bank {
    /// Create an empty bank. Fails if the parameters don't make sense
    /// together.
    pub fn new(params: BankParameters) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            groups: RwLock::new(HashMap::new()),
            directory: RwLock::new(HashMap::new()),
        })
    }

    /// The parameters this bank runs with.
    pub fn params(&self) -> &BankParameters {
        &self.params
    }

    /// Item IDs have to stay unique across restarts, since holders come back
    /// from storage carrying the items this (or another) bank made.
    fn next_item_id(&self) -> CurrencyItemID {
        CurrencyItemID::create()
    }

    /// Open a new, empty account group.
    pub fn open_account<T: Into<String>>(&self, id: AccountID, username: T) -> Result<AccountID> {
        let now = util::time::now();
        let account = Account::builder()
            .id(id.clone())
            .username(username)
            .holder_ids(Vec::<HolderID>::new())
            .active(true)
            .created(now.clone())
            .updated(now)
            .build()
            .map_err(Error::BuilderFailed)?;
        let mut groups = self.groups.write().map_err(poisoned)?;
        if groups.contains_key(&id) {
            Err(Error::Config(format!("account {} already exists", id)))?;
        }
        groups.insert(id.clone(), Arc::new(Mutex::new(Roster::new(account))));
        log::info!("Bank::open_account() -- opened account {}", id);
        Ok(id)
    }

    /// Close an account group, returning the holders that were in it.
    pub fn close_account(&self, account_id: &AccountID) -> Result<Vec<Holder>> {
        let group = self.groups.write().map_err(poisoned)?
            .remove(account_id)
            .ok_or(Error::ObjectNotFound("account".into()))?;
        let roster = group.lock().map_err(poisoned)?;
        let mut directory = self.directory.write().map_err(poisoned)?;
        for holder in roster.holders() {
            directory.remove(holder.id());
        }
        log::info!("Bank::close_account() -- closed account {} ({} holders)", account_id, roster.holders().len());
        Ok(roster.holders().clone())
    }

    /// Put an existing holder into the next free slot of their account group.
    /// Holders written by a newer version of this library are refused.
    pub fn enroll(&self, holder: Holder) -> Result<()> {
        holder.check_version()?;
        if holder.is_deleted() {
            Err(Error::ObjectIsDeleted("holder".into()))?;
        }
        let group = self.groups.read().map_err(poisoned)?
            .get(holder.account_id())
            .cloned()
            .ok_or(Error::ObjectNotFound("account".into()))?;
        let mut roster = group.lock().map_err(poisoned)?;
        let mut directory = self.directory.write().map_err(poisoned)?;
        if directory.contains_key(holder.id()) {
            Err(Error::HolderAlreadyEnrolled(holder.id().to_string()))?;
        }

        let now = util::time::now();
        let mut account = roster.account().clone();
        account.add_holder(holder.id().clone(), self.params.group_capacity())?;
        account.set_updated(now);
        let mut mods = Modifications::new_single(Op::Update, account);
        mods.push(Op::Create, holder.clone());
        roster.apply(mods)?;
        directory.insert(holder.id().clone(), holder.account_id().clone());
        log::info!("Bank::enroll() -- enrolled {} ({}) in account {}", holder.id(), holder.name(), holder.account_id());
        Ok(())
    }

    /// Build a fresh holder with an empty bank box and enroll them.
    pub fn create_holder<T: Into<String>>(&self, id: HolderID, account_id: AccountID, name: T, roles: Vec<Role>, sharing: bool) -> Result<Holder> {
        let now = util::time::now();
        let holder = Holder::builder()
            .id(id)
            .account_id(account_id)
            .name(name)
            .roles(roles)
            .sharing(sharing)
            .storage(Storage::new(self.params.storage_capacity()))
            .active(true)
            .created(now.clone())
            .updated(now)
            .build()
            .map_err(Error::BuilderFailed)?;
        self.enroll(holder.clone())?;
        Ok(holder)
    }

    fn group_of(&self, holder_id: &HolderID) -> Result<Arc<Mutex<Roster>>> {
        let account_id = self.directory.read().map_err(poisoned)?
            .get(holder_id)
            .cloned()
            .ok_or(Error::ObjectNotFound("holder".into()))?;
        self.groups.read().map_err(poisoned)?
            .get(&account_id)
            .cloned()
            .ok_or(Error::ObjectNotFound("account".into()))
    }

    /// Run `f` with the holder's account group locked.
    pub fn with_roster<F, T>(&self, holder_id: &HolderID, f: F) -> Result<T>
        where F: FnOnce(&Roster) -> Result<T>
    {
        let group = self.group_of(holder_id)?;
        let roster = group.lock().map_err(poisoned)?;
        f(&roster)
    }

    /// Lock the holder's group, run a transaction with that holder as the
    /// caller, and apply what it returns.
    fn transact<F>(&self, holder_id: &HolderID, f: F) -> Result<()>
        where F: FnOnce(&Holder, &[Holder]) -> Result<Modifications>
    {
        let group = self.group_of(holder_id)?;
        let mut roster = group.lock().map_err(poisoned)?;
        let caller = roster.holder(holder_id)?.clone();
        let mods = f(&caller, roster.holders())?;
        roster.apply(mods)
    }

    /// Grab a copy of a holder.
    pub fn holder(&self, holder_id: &HolderID) -> Result<Holder> {
        self.with_roster(holder_id, |roster| roster.holder(holder_id).map(|h| h.clone()))
    }

    /// Grab a copy of every holder in an account group, in slot order.
    pub fn holders_in(&self, account_id: &AccountID) -> Result<Vec<Holder>> {
        let group = self.groups.read().map_err(poisoned)?
            .get(account_id)
            .cloned()
            .ok_or(Error::ObjectNotFound("account".into()))?;
        let roster = group.lock().map_err(poisoned)?;
        Ok(roster.holders().clone())
    }

    /// Withdraw `amount` for a holder, drawing on their account group if they
    /// share. Returns `Ok(false)` (and changes nothing) when the money isn't
    /// there.
    pub fn request_withdrawal(&self, holder_id: &HolderID, amount: u64) -> Result<bool> {
        let now = util::time::now();
        let res = self.transact(holder_id, |caller, holders| {
            transactions::bank::withdraw(caller, holders.to_vec(), amount, &self.params, &now)
        });
        match res {
            Ok(_) => Ok(true),
            Err(Error::InsufficientFunds { requested, available }) => {
                log::debug!("Bank::request_withdrawal() -- {} asked for {} but only has {}", holder_id, requested, available);
                Ok(false)
            }
            Err(e @ Error::ConservationViolation { .. }) => {
                log::error!("Bank::request_withdrawal() -- withdrawal for {} refused: {}", holder_id, e);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// The value in a holder's own bank box.
    pub fn request_balance(&self, holder_id: &HolderID) -> Result<u64> {
        self.with_roster(holder_id, |roster| {
            let holder = roster.holder(holder_id)?;
            holder.access_check(Permission::BankBalance)?;
            Ok(holder.balance())
        })
    }

    /// What a holder can spend: the pooled balance of their group if they
    /// share, their own balance if not.
    pub fn request_pooled_balance(&self, holder_id: &HolderID) -> Result<u64> {
        self.with_roster(holder_id, |roster| {
            let holder = roster.holder(holder_id)?;
            holder.access_check(Permission::BankBalance)?;
            Ok(pool::accessible_balance(holder, roster.holders()))
        })
    }

    /// Put coin into a holder's bank box.
    pub fn deposit(&self, holder_id: &HolderID, amount: u64) -> Result<()> {
        let now = util::time::now();
        let id = self.next_item_id();
        self.transact(holder_id, |caller, _| {
            transactions::bank::deposit(caller, caller.clone(), id, amount, &self.params, &now)
        })
    }

    /// Put a check into a holder's bank box.
    pub fn deposit_instrument(&self, holder_id: &HolderID, worth: u64) -> Result<CurrencyItemID> {
        let now = util::time::now();
        let id = self.next_item_id();
        self.transact(holder_id, |caller, _| {
            transactions::bank::deposit_instrument(caller, caller.clone(), id.clone(), worth, &self.params, &now)
        })?;
        Ok(id)
    }

    /// Write a check for `amount`, paid for like a withdrawal, and put it in
    /// the holder's bank box.
    pub fn issue_instrument(&self, holder_id: &HolderID, amount: u64) -> Result<CurrencyItemID> {
        let now = util::time::now();
        let id = self.next_item_id();
        self.transact(holder_id, |caller, holders| {
            transactions::bank::issue_instrument(caller, holders.to_vec(), id.clone(), amount, &self.params, &now)
        })?;
        Ok(id)
    }

    /// Cash one of a holder's checks into coin.
    pub fn cash_instrument(&self, holder_id: &HolderID, item_id: &CurrencyItemID) -> Result<()> {
        let now = util::time::now();
        self.transact(holder_id, |caller, _| {
            transactions::bank::cash_instrument(caller, caller.clone(), item_id, &self.params, &now)
        })
    }

    /// Opt a holder in or out of pooled withdrawals.
    pub fn set_sharing(&self, holder_id: &HolderID, sharing: bool) -> Result<()> {
        let now = util::time::now();
        self.transact(holder_id, |caller, _| {
            transactions::bank::set_sharing(caller, caller.clone(), sharing, &now)
        })
    }

    /// Destroy an item from outside the bank (it decayed, got stolen, etc).
    /// The item stays in storage marked deleted until the next transaction
    /// that touches the holder sweeps it out.
    pub fn discard_item(&self, holder_id: &HolderID, item_id: &CurrencyItemID) -> Result<CurrencyItem> {
        let now = util::time::now();
        let group = self.group_of(holder_id)?;
        let mut roster = group.lock().map_err(poisoned)?;
        let holder = roster.holder_mut(holder_id)?;
        let item = holder.storage_mut().discard(item_id, &now)?;
        log::debug!("Bank::discard_item() -- {} lost item {} ({})", holder_id, item.id(), item.value());
        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::currency::CurrencyKind;
    use std::thread;

    fn group(bank: &Bank, members: Vec<(bool, u64)>) -> (AccountID, Vec<HolderID>) {
        let account_id = bank.open_account(AccountID::create(), "ann perkins").unwrap();
        let ids = members.into_iter()
            .enumerate()
            .map(|(i, (sharing, amount))| {
                let id = HolderID::new(format!("{}-{}", account_id, i));
                bank.create_holder(id.clone(), account_id.clone(), format!("ann {}", i), vec![Role::Player], sharing).unwrap();
                bank.deposit(&id, amount).unwrap();
                id
            })
            .collect::<Vec<_>>();
        (account_id, ids)
    }

    #[test]
    fn solo_withdrawal() {
        let bank = Bank::new(BankParameters::default()).unwrap();
        let (_, ids) = group(&bank, vec![(false, 10000)]);
        assert!(bank.request_withdrawal(&ids[0], 4000).unwrap());
        assert_eq!(bank.request_balance(&ids[0]).unwrap(), 6000);
    }

    #[test]
    fn pooled_withdrawal() {
        let bank = Bank::new(BankParameters::default()).unwrap();
        let (_, ids) = group(&bank, vec![(true, 3000), (true, 10000)]);
        assert!(bank.request_withdrawal(&ids[0], 8000).unwrap());
        assert_eq!(bank.request_balance(&ids[0]).unwrap(), 0);
        assert_eq!(bank.request_balance(&ids[1]).unwrap(), 5000);
    }

    #[test]
    fn insufficient_pool() {
        let bank = Bank::new(BankParameters::default()).unwrap();
        let (account_id, ids) = group(&bank, vec![(true, 2000), (true, 3000), (false, 50000)]);
        let before = bank.holders_in(&account_id).unwrap();
        assert_eq!(bank.request_pooled_balance(&ids[0]).unwrap(), 5000);
        assert!(!bank.request_withdrawal(&ids[0], 6000).unwrap());
        assert_eq!(bank.holders_in(&account_id).unwrap(), before);
    }

    #[test]
    fn cashes_small_instruments() {
        let bank = Bank::new(BankParameters::default()).unwrap();
        let (_, ids) = group(&bank, vec![(true, 0), (true, 0)]);
        bank.deposit_instrument(&ids[1], 7000).unwrap();
        assert!(bank.request_withdrawal(&ids[0], 3000).unwrap());
        let them = bank.holder(&ids[1]).unwrap();
        assert_eq!(them.balance(), 4000);
        assert_eq!(them.storage().balance_by_kind(), (4000, 0));
    }

    #[test]
    fn self_first() {
        let bank = Bank::new(BankParameters::default()).unwrap();
        let (account_id, ids) = group(&bank, vec![(true, 9000), (true, 10000), (true, 10000)]);
        let before = bank.holders_in(&account_id).unwrap();
        assert!(bank.request_withdrawal(&ids[0], 9000).unwrap());
        let after = bank.holders_in(&account_id).unwrap();
        assert_eq!(after[0].balance(), 0);
        assert_eq!(after[1], before[1]);
        assert_eq!(after[2], before[2]);
    }

    #[test]
    fn enrollment_rules() {
        let mut params = BankParameters::default();
        params.set_group_capacity(2);
        let bank = Bank::new(params).unwrap();
        let (account_id, ids) = group(&bank, vec![(true, 0), (true, 0)]);
        let res = bank.create_holder(HolderID::create(), account_id.clone(), "jerry", vec![Role::Player], true);
        assert_eq!(res, Err(Error::AccountFull(2)));
        let res = bank.create_holder(ids[0].clone(), account_id.clone(), "jerry", vec![Role::Player], true);
        assert_eq!(res, Err(Error::HolderAlreadyEnrolled(ids[0].to_string())));
        let res = bank.create_holder(HolderID::create(), AccountID::create(), "jerry", vec![Role::Player], true);
        assert_eq!(res, Err(Error::ObjectNotFound("account".into())));

        let mut future = bank.holder(&ids[0]).unwrap();
        future.set_id(HolderID::create());
        future.set_version(crate::models::holder::HOLDER_VERSION + 1);
        let other = bank.open_account(AccountID::create(), "garry").unwrap();
        future.set_account_id(other);
        assert_eq!(bank.enroll(future), Err(Error::UnsupportedVersion(2)));

        let closed = bank.close_account(&account_id).unwrap();
        assert_eq!(closed.len(), 2);
        assert_eq!(bank.request_balance(&ids[0]), Err(Error::ObjectNotFound("holder".into())));
    }

    #[test]
    fn instruments_and_sharing() {
        let bank = Bank::new(BankParameters::default()).unwrap();
        let (_, ids) = group(&bank, vec![(false, 30000), (true, 30000)]);
        // not sharing, so this only sees our own 30,000
        assert!(!bank.request_withdrawal(&ids[0], 40000).unwrap());
        bank.set_sharing(&ids[0], true).unwrap();
        let check = bank.issue_instrument(&ids[0], 40000).unwrap();
        let me = bank.holder(&ids[0]).unwrap();
        assert_eq!(me.storage().item(&check).map(|i| i.kind()), Some(CurrencyKind::Instrument));
        assert_eq!(me.balance(), 40000);
        assert_eq!(bank.request_balance(&ids[1]).unwrap(), 20000);

        bank.cash_instrument(&ids[0], &check).unwrap();
        let me = bank.holder(&ids[0]).unwrap();
        assert_eq!(me.storage().balance_by_kind(), (40000, 0));
        assert_eq!(bank.cash_instrument(&ids[0], &check), Err(Error::ObjectNotFound("currency item".into())));
    }

    #[test]
    fn discarded_items_are_skipped() {
        let bank = Bank::new(BankParameters::default()).unwrap();
        let (_, ids) = group(&bank, vec![(true, 1000), (true, 0)]);
        let doomed = bank.deposit_instrument(&ids[1], 20000).unwrap();
        bank.deposit(&ids[1], 5000).unwrap();
        bank.discard_item(&ids[1], &doomed).unwrap();
        assert_eq!(bank.request_pooled_balance(&ids[0]).unwrap(), 6000);
        assert!(bank.request_withdrawal(&ids[0], 4000).unwrap());
        let them = bank.holder(&ids[1]).unwrap();
        assert_eq!(them.balance(), 2000);
        assert_eq!(them.storage().items().len(), 1);
    }

    #[test]
    fn refuses_bad_params() {
        let mut params = BankParameters::default();
        params.set_max_stack(1000);
        let res = Bank::new(params);
        assert_eq!(res.map(|_| ()), Err(Error::Config("max_stack is below instrument_threshold".into())));
    }

    #[test]
    fn item_ids_survive_a_restart() {
        let account_id = AccountID::new("leslie");
        let holder_id = HolderID::new("leslie-1");

        let bank = Bank::new(BankParameters::default()).unwrap();
        bank.open_account(account_id.clone(), "leslie").unwrap();
        bank.create_holder(holder_id.clone(), account_id.clone(), "leslie", vec![Role::Player], false).unwrap();
        let first = bank.deposit_instrument(&holder_id, 5000).unwrap();
        let mut holders = bank.close_account(&account_id).unwrap();

        let bank = Bank::new(BankParameters::default()).unwrap();
        bank.open_account(account_id.clone(), "leslie").unwrap();
        bank.enroll(holders.remove(0)).unwrap();
        let second = bank.deposit_instrument(&holder_id, 7000).unwrap();
        assert_ne!(first, second);

        assert!(bank.request_withdrawal(&holder_id, 8000).unwrap());
        let me = bank.holder(&holder_id).unwrap();
        assert_eq!(me.balance(), 4000);
        assert_eq!(me.storage().balance_by_kind(), (4000, 0));
        assert!(me.storage().live_items().all(|i| !i.is_sub_threshold(5000)));
    }

    #[test]
    fn concurrent_withdrawals_conserve_value() {
        let bank = Arc::new(Bank::new(BankParameters::default()).unwrap());
        let (account_id, ids) = group(&bank, vec![(true, 50000), (true, 50000), (true, 50000)]);
        let handles = (0..8)
            .map(|i| {
                let bank = bank.clone();
                let id = ids[i % ids.len()].clone();
                thread::spawn(move || {
                    (0..10)
                        .filter(|_| bank.request_withdrawal(&id, 2500).unwrap())
                        .count() as u64
                })
            })
            .collect::<Vec<_>>();
        let succeeded: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        let left: u64 = bank.holders_in(&account_id).unwrap().iter().map(|h| h.balance()).sum();
        assert_eq!(succeeded, 60);
        assert_eq!(left, 150000 - succeeded * 2500);
    }
}
