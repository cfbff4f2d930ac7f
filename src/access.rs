//! The access module defines the top-level permissions within the bank and
//! the roles that contain those permissions.
//!
//! Roles can have multiple Permission objects. Permissions are additive,
//! meaning everyone starts with *no* permissions (returning
//! [Error::InsufficientPrivileges][err_priv]) and permissions are added
//! (allowed) from there.
//!
//! The access system applies to [Holders], which are both the callers and
//! the subjects of banking transactions.
//!
//! [err_priv]: ../error/enum.Error.html#variant.InsufficientPrivileges
//! [Holders]: ../models/holder/struct.Holder.html

use serde::{Serialize, Deserialize};

/// Define the bank-wide permissions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Permission {
    All,
    AllBut(Vec<Permission>),

    BankBalance,
    BankCashInstrument,
    BankDeposit,
    BankIssueInstrument,
    BankSetSharing,
    BankWithdraw,

    RegressionControl,
}

/// Define the roles holders can have.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Role {
    Administrator,
    GameMaster,
    Player,
    Guest,
}

impl Role {
    /// For a given role, return the permissions that role has access to.
    pub fn permissions(&self) -> Vec<Permission> {
        match *self {
            Role::Administrator => {
                vec![Permission::All]
            }
            Role::GameMaster => {
                vec![Permission::AllBut(vec![Permission::RegressionControl])]
            }
            Role::Player => {
                vec![
                    Permission::BankBalance,
                    Permission::BankCashInstrument,
                    Permission::BankDeposit,
                    Permission::BankIssueInstrument,
                    Permission::BankSetSharing,
                    Permission::BankWithdraw,
                ]
            }
            Role::Guest => {
                vec![
                    Permission::BankBalance,
                ]
            }
        }
    }

    /// Determine if a role has a specific permission.
    pub fn can(&self, perm: &Permission) -> bool {
        for p in &self.permissions() {
            match p {
                Permission::All => {
                    return true;
                }
                Permission::AllBut(x) => {
                    return !x.contains(perm);
                }
                _ => {
                    if p == perm {
                        return true;
                    }
                }
            }
        }
        false
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    fn permissions_work() {
        let admin = Role::Administrator;
        assert!(admin.can(&Permission::All));
        assert!(admin.can(&Permission::BankWithdraw));
        assert!(admin.can(&Permission::RegressionControl));

        let gm = Role::GameMaster;
        assert!(gm.can(&Permission::BankWithdraw));
        assert!(gm.can(&Permission::BankSetSharing));
        assert!(!gm.can(&Permission::RegressionControl));

        let player = Role::Player;
        assert!(player.can(&Permission::BankBalance));
        assert!(player.can(&Permission::BankWithdraw));
        assert!(player.can(&Permission::BankIssueInstrument));
        assert!(!player.can(&Permission::RegressionControl));

        let guest = Role::Guest;
        assert!(guest.can(&Permission::BankBalance));
        assert!(!guest.can(&Permission::BankWithdraw));
        assert!(!guest.can(&Permission::BankDeposit));
    }
}
