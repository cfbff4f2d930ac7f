//! Turns what a holder says to the banker into bank operations, and the
//! results back into something the banker can say.
//!
//! The banker listens for a handful of keywords anywhere in what's said
//! (case doesn't matter, other words are ignored):
//!
//! - `balance`
//! - `withdraw <amount>`
//! - `check <amount>`
//! - `share on` / `share off`

use crate::{
    access::Permission,
    error::{Error, Result},
    models::holder::HolderID,
    pool,
    system::bank::Bank,
};
use std::fmt;

/// A command the banker understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BankerCommand {
    Balance,
    Withdraw(u64),
    Check(u64),
    Share(bool),
}

impl BankerCommand {
    /// Pick the first command out of a line of speech. Returns `None` if
    /// there isn't one, or if its argument doesn't make sense (amounts are
    /// plain digits, so signs and fractions are refused).
    pub fn parse(text: &str) -> Option<Self> {
        let lowered = text.to_lowercase();
        let words = lowered.split_whitespace().collect::<Vec<_>>();
        let amount = |idx: usize| {
            words.get(idx + 1)
                .filter(|w| w.chars().all(|c| c.is_ascii_digit()))
                .and_then(|w| w.parse::<u64>().ok())
        };
        for (idx, word) in words.iter().enumerate() {
            let command = match *word {
                "balance" => Some(BankerCommand::Balance),
                "withdraw" => amount(idx).map(BankerCommand::Withdraw),
                "check" => amount(idx).map(BankerCommand::Check),
                "share" => match words.get(idx + 1) {
                    Some(&"on") => Some(BankerCommand::Share(true)),
                    Some(&"off") => Some(BankerCommand::Share(false)),
                    _ => None,
                },
                _ => continue,
            };
            return command;
        }
        None
    }
}

/// What the banker says back.
#[derive(Clone, Debug, PartialEq)]
pub enum BankerReply {
    /// Own balance, plus the pooled balance if the holder shares
    Balance {
        own: u64,
        pooled: Option<u64>,
    },
    Withdrawn(u64),
    InsufficientFunds(u64),
    CheckIssued(u64),
    CheckRefused {
        min: u64,
        max: u64,
    },
    StorageFull,
    Sharing(bool),
    NotAllowed,
}

impl fmt::Display for BankerReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BankerReply::Balance { own, pooled: None } => {
                write!(f, "Thy current bank balance is {} gold.", own)
            }
            BankerReply::Balance { own, pooled: Some(pooled) } => {
                write!(f, "Thy current bank balance is {} gold, and {} with thine account's shared funds.", own, pooled)
            }
            BankerReply::Withdrawn(amount) => write!(f, "Here is thy {} gold.", amount),
            BankerReply::InsufficientFunds(amount) => {
                write!(f, "Ah, art thou trying to fool me? Thou hast not {} gold!", amount)
            }
            BankerReply::CheckIssued(amount) => {
                write!(f, "A check worth {} gold has been placed in thy bank box.", amount)
            }
            BankerReply::CheckRefused { min, max } => {
                write!(f, "I can only write checks between {} and {} gold.", min, max)
            }
            BankerReply::StorageFull => write!(f, "Thy bank box is full."),
            BankerReply::Sharing(true) => {
                write!(f, "Thy funds are now shared with thine account's other characters.")
            }
            BankerReply::Sharing(false) => write!(f, "Thy funds are no longer shared."),
            BankerReply::NotAllowed => write!(f, "I cannot do that for thee."),
        }
    }
}

fn run(bank: &Bank, holder_id: &HolderID, command: BankerCommand) -> Result<BankerReply> {
    let reply = match command {
        BankerCommand::Balance => {
            // both numbers come from a single lock of the group
            bank.with_roster(holder_id, |roster| {
                let holder = roster.holder(holder_id)?;
                holder.access_check(Permission::BankBalance)?;
                let pooled = if pool::is_poolable(holder) {
                    Some(pool::accessible_balance(holder, roster.holders()))
                } else {
                    None
                };
                Ok(BankerReply::Balance { own: holder.balance(), pooled })
            })?
        }
        BankerCommand::Withdraw(amount) => {
            if bank.request_withdrawal(holder_id, amount)? {
                BankerReply::Withdrawn(amount)
            } else {
                BankerReply::InsufficientFunds(amount)
            }
        }
        BankerCommand::Check(amount) => {
            bank.issue_instrument(holder_id, amount)?;
            BankerReply::CheckIssued(amount)
        }
        BankerCommand::Share(sharing) => {
            bank.set_sharing(holder_id, sharing)?;
            BankerReply::Sharing(sharing)
        }
    };
    Ok(reply)
}

/// Answer a line of speech from a holder standing at the banker. Returns
/// `None` if nothing in it was meant for the banker. Refusals the holder can
/// do something about come back as replies; anything else is an error.
pub fn respond(bank: &Bank, holder_id: &HolderID, text: &str) -> Result<Option<BankerReply>> {
    let command = match BankerCommand::parse(text) {
        Some(command) => command,
        None => return Ok(None),
    };
    let reply = match run(bank, holder_id, command) {
        Ok(reply) => reply,
        Err(Error::InsufficientFunds { requested, .. }) => BankerReply::InsufficientFunds(requested),
        Err(Error::InvalidInstrumentAmount { min, max, .. }) => BankerReply::CheckRefused { min, max },
        Err(Error::StorageFull) => BankerReply::StorageFull,
        Err(Error::InsufficientPrivileges) => BankerReply::NotAllowed,
        Err(e) => Err(e)?,
    };
    log::debug!("speech::respond() -- {} said {:?}: {}", holder_id, text, reply);
    Ok(Some(reply))
}
