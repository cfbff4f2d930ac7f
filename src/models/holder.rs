//! A holder is anyone with a bank box: a player character, or a synthetic
//! character the regression harness spins up. Holders belong to exactly one
//! [account group][account], own a [storage][storage] full of currency, and
//! carry the sharing flag that opts them into pooled withdrawals.
//!
//! [account]: ../account/struct.Account.html
//! [storage]: ../storage/struct.Storage.html

use crate::{
    access::{Permission, Role},
    error::{Error, Result},
    models::{
        account::AccountID,
        storage::Storage,
    },
};

/// The schema version written into every holder. Bump this when the
/// persisted shape of a holder changes.
pub const HOLDER_VERSION: u32 = 1;

bank_model! {
    /// The `Holder` model describes a character with a bank box.
    pub struct Holder {
        /// The account group this holder is a member of
        account_id: AccountID,
        /// The holder's name, used in log output and banker replies.
        name: String,
        /// Defines this holder's roles, ie what permissions they have.
        roles: Vec<Role>,
        /// Whether this holder shares their balance with (and draws on) the
        /// rest of their account group.
        sharing: bool,
        /// The holder's bank box
        storage: Storage,
        /// Persisted schema version
        #[builder(default = "HOLDER_VERSION")]
        #[serde(default)]
        version: u32,
    }
    HolderID
    HolderBuilder
}

impl Holder {
    /// Determines if a holder can perform an action (based on their roles).
    pub fn can(&self, permission: &Permission) -> bool {
        if !self.is_active() {
            return false;
        }
        for role in self.roles() {
            if role.can(permission) {
                return true;
            }
        }
        false
    }

    /// Check if this holder can perform an action.
    pub fn access_check(&self, permission: Permission) -> Result<()> {
        if !self.can(&permission) {
            Err(Error::InsufficientPrivileges)?;
        }
        Ok(())
    }

    /// The total value sitting in this holder's storage.
    pub fn balance(&self) -> u64 {
        self.storage().balance()
    }

    /// Make sure we know how to read this holder.
    pub fn check_version(&self) -> Result<()> {
        if self.version > HOLDER_VERSION {
            Err(Error::UnsupportedVersion(self.version))?;
        }
        Ok(())
    }

    pub(crate) fn storage_mut(&mut self) -> &mut Storage {
        &mut self.storage
    }
}
