//! The pool module decides whose balances can be combined for a withdrawal.
//!
//! Holders opt in with their sharing flag. Only holders that opted in are
//! pooled, and only when the holder asking has opted in too: you can't draw on
//! everyone else's money while keeping yours to yourself.

use crate::models::holder::Holder;

/// Whether a holder's balance can be pooled. Deleted holders never are.
pub fn is_poolable(holder: &Holder) -> bool {
    *holder.sharing() && !holder.is_deleted()
}

/// The holders in `roster` whose balances pool with the requester's, in roster
/// (slot) order. The requester is included. If the requester hasn't opted in
/// themselves, nobody pools with them and this is empty.
pub fn pool_members<'a>(requester: &Holder, roster: &'a [Holder]) -> Vec<&'a Holder> {
    if !is_poolable(requester) {
        return Vec::new();
    }
    roster.iter()
        .filter(|holder| holder.account_id() == requester.account_id())
        .filter(|holder| is_poolable(holder))
        .collect()
}

/// Like `pool_members`, but leaves the requester out.
pub fn pool_others<'a>(requester: &Holder, roster: &'a [Holder]) -> Vec<&'a Holder> {
    pool_members(requester, roster)
        .into_iter()
        .filter(|holder| holder.id() != requester.id())
        .collect()
}

/// How much the requester can spend: the pooled balance if they share, their
/// own balance otherwise.
pub fn accessible_balance(requester: &Holder, roster: &[Holder]) -> u64 {
    if !is_poolable(requester) {
        return own(requester, roster).balance();
    }
    pool_members(requester, roster)
        .iter()
        .map(|holder| holder.balance())
        .sum()
}

/// The roster's copy of the requester, if it has one. The roster is the source
/// of truth for storage contents.
pub(crate) fn own<'a>(requester: &'a Holder, roster: &'a [Holder]) -> &'a Holder {
    roster.iter()
        .find(|holder| holder.id() == requester.id())
        .unwrap_or(requester)
}
