use bankbox_core::{
    access::Role,
    error::{Error, Result},
    models::{
        Op,

        account::AccountID,
        currency::{Currency, CurrencyItem, CurrencyItemID},
        holder::{Holder, HolderID},
        storage::Storage,
    },
    system::params::BankParameters,
    transactions::bank,
};
use chrono::{DateTime, Utc};

fn holder(id: &str, sharing: bool, gold: u64, now: &DateTime<Utc>) -> Result<Holder> {
    let params = BankParameters::default();
    let gold = CurrencyItem::builder()
        .id(CurrencyItemID::new(format!("{}-gold", id)))
        .currency(Currency::Stacked(gold))
        .active(true)
        .created(now.clone())
        .updated(now.clone())
        .build()
        .map_err(Error::BuilderFailed)?;
    Holder::builder()
        .id(HolderID::new(id))
        .account_id(AccountID::new("0b6d8f4e-4a2c-4f43-9f86-3d4f1b3e2c11"))
        .name(id)
        .roles(vec![Role::Player])
        .sharing(sharing)
        .storage(Storage::with_items(params.storage_capacity(), vec![gold]))
        .active(true)
        .created(now.clone())
        .updated(now.clone())
        .build()
        .map_err(Error::BuilderFailed)
}

fn example() -> Result<Vec<Holder>> {
    let now = Utc::now();
    // two characters on one account, both sharing. the first one only has
    // 3,000 gold on hand but wants 8,000.
    let roster = vec![
        holder("april", true, 3000, &now)?,
        holder("andy", true, 10000, &now)?,
    ];

    // transactions don't write anything. they hand back the list of changes
    // (delete this pile of gold, update that holder...) for us to apply.
    let mods = bank::withdraw(&roster[0], roster.clone(), 8000, &BankParameters::default(), &now)?;
    let updated = mods.into_vec().into_iter()
        .filter_map(|m| m.expect_op::<Holder>(Op::Update).ok())
        .collect::<Vec<_>>();
    Ok(updated)
}

fn main() {
    for holder in example().unwrap() {
        println!("{} now has {} gold in the bank", holder.name(), holder.balance());
    }
}
