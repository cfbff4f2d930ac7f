use chrono::{DateTime, Utc};
use crate::{
    access::Role,
    error::{Error, Result},
    models::{
        Modifications,

        account::{Account, AccountID},
        currency::{Currency, CurrencyItem, CurrencyItemID},
        holder::{Holder, HolderID},
        storage::Storage,
    },
    system::params::BankParameters,
    util,
};

/// Make sure a transaction works for the given caller, then make sure it is
/// refused for guests and for deleted or inactive callers.
pub(crate) fn standard_transaction_tests<F>(caller: &Holder, testfn: &F)
    where F: Fn(&Holder) -> Result<Modifications>,
{
    let now = util::time::now();
    let res = testfn(caller);
    if !res.is_ok() {
        panic!("standard transaction tests: expected Ok: {:?}", res);
    }

    let mut guest = caller.clone();
    guest.set_roles(vec![Role::Guest]);
    assert_eq!(testfn(&guest), Err(Error::InsufficientPrivileges));

    let mut deleted = caller.clone();
    deleted.set_deleted(Some(now.clone()));
    assert_eq!(testfn(&deleted), Err(Error::InsufficientPrivileges));

    let mut inactive = caller.clone();
    inactive.set_active(false);
    assert_eq!(testfn(&inactive), Err(Error::InsufficientPrivileges));
}

/// Pull the holder with the given ID out of a list of holders.
pub(crate) fn find<'a>(holders: &'a [Holder], id: &HolderID) -> &'a Holder {
    holders.iter().find(|h| h.id() == id).unwrap()
}

/// Grab every holder update out of a set of modifications.
pub(crate) fn updated_holders(mods: Modifications) -> Vec<Holder> {
    mods.into_vec().into_iter()
        .filter_map(|m| m.expect_op::<Holder>(crate::models::Op::Update).ok())
        .collect()
}

pub fn make_stacked(id: &CurrencyItemID, amount: u64, now: &DateTime<Utc>) -> CurrencyItem {
    CurrencyItem::builder()
        .id(id.clone())
        .currency(Currency::Stacked(amount))
        .active(true)
        .created(now.clone())
        .updated(now.clone())
        .build().unwrap()
}

pub fn make_instrument(id: &CurrencyItemID, worth: u64, now: &DateTime<Utc>) -> CurrencyItem {
    CurrencyItem::builder()
        .id(id.clone())
        .currency(Currency::Instrument(worth))
        .active(true)
        .created(now.clone())
        .updated(now.clone())
        .build().unwrap()
}

pub fn make_holder(id: &HolderID, account_id: &AccountID, sharing: bool, items: Vec<CurrencyItem>, now: &DateTime<Utc>) -> Holder {
    Holder::builder()
        .id(id.clone())
        .account_id(account_id.clone())
        .name(format!("holder {}", id.as_str()))
        .roles(vec![Role::Player])
        .sharing(sharing)
        .storage(Storage::with_items(BankParameters::default().storage_capacity(), items))
        .active(true)
        .created(now.clone())
        .updated(now.clone())
        .build().unwrap()
}

pub fn make_account(id: &AccountID, holder_ids: Vec<HolderID>, now: &DateTime<Utc>) -> Account {
    Account::builder()
        .id(id.clone())
        .username("ron swanson")   // the whole ron swanson
        .holder_ids(holder_ids)
        .active(true)
        .created(now.clone())
        .updated(now.clone())
        .build().unwrap()
}

/// Build an account group where each entry of `members` is one holder: their
/// sharing flag and the items in their storage. Holder IDs are `h0`, `h1`...
pub fn make_group(members: Vec<(bool, Vec<CurrencyItem>)>, now: &DateTime<Utc>) -> (Account, Vec<Holder>) {
    let account_id = AccountID::create();
    let holders = members.into_iter()
        .enumerate()
        .map(|(i, (sharing, items))| make_holder(&HolderID::new(format!("h{}", i)), &account_id, sharing, items, now))
        .collect::<Vec<_>>();
    let account = make_account(&account_id, holders.iter().map(|h| h.id().clone()).collect(), now);
    (account, holders)
}
