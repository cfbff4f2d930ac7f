//! Accounts group holders that share one login. The account keeps its
//! holders in slot order, which is also the order pooled withdrawals visit
//! them in.

use crate::{
    error::{Error, Result},
    models::holder::HolderID,
};

bank_model! {
    /// An account group: a fixed number of holder slots under one login.
    pub struct Account {
        /// The login name for this account
        username: String,
        /// The holders in this account, in slot order
        holder_ids: Vec<HolderID>,
    }
    AccountID
    AccountBuilder
}

impl Account {
    /// Whether a holder occupies one of this account's slots.
    pub fn has_holder(&self, holder_id: &HolderID) -> bool {
        self.holder_ids().contains(holder_id)
    }

    /// Put a holder into the next free slot.
    pub(crate) fn add_holder(&mut self, holder_id: HolderID, capacity: usize) -> Result<()> {
        if self.has_holder(&holder_id) {
            Err(Error::HolderAlreadyEnrolled(holder_id.to_string()))?;
        }
        if self.holder_ids.len() >= capacity {
            Err(Error::AccountFull(capacity))?;
        }
        self.holder_ids.push(holder_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        util::{self, test::*},
    };

    #[test]
    fn slots_fill_up() {
        let now = util::time::now();
        let mut account = make_account(&AccountID::create(), vec![], &now);
        let ids = (0..5).map(|_| HolderID::create()).collect::<Vec<_>>();
        for id in &ids {
            account.add_holder(id.clone(), 5).unwrap();
        }
        assert_eq!(account.holder_ids(), &ids);
        assert!(account.has_holder(&ids[3]));

        let res = account.add_holder(HolderID::create(), 5);
        assert_eq!(res, Err(Error::AccountFull(5)));

        let res = account.add_holder(ids[0].clone(), 6);
        assert_eq!(res, Err(Error::HolderAlreadyEnrolled(ids[0].to_string())));
    }
}
