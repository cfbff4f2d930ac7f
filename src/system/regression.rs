//! The regression harness hammers the withdrawal engine with random requests
//! and checks that no value is ever created or destroyed along the way.
//!
//! Starting the harness opens a dedicated account group full of synthetic
//! sharing holders, so it never races a real player's withdrawal. Each holder
//! is funded with a random amount split between coin and a check. After that,
//! every [tick][tick] that falls due picks a random member and asks for a
//! random amount (sometimes more than the pool holds) and checks:
//!
//! - before the request, the pool holds exactly what we think it does
//! - a refused request changed nothing, and really was more than the pool had
//! - a granted request took exactly what was asked for
//!
//! When the pool runs low it gets topped back up.
//!
//! [tick]: struct.RegressionHarness.html#method.tick

use chrono::{DateTime, Duration, Utc};
use crate::{
    access::{Permission, Role},
    error::{Error, Result},
    models::{
        account::AccountID,
        holder::{Holder, HolderID},
    },
    system::bank::Bank,
};
use getset::{CopyGetters, Getters, Setters};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Serialize, Deserialize};
use std::fmt;

/// Tunables for the regression harness.
#[derive(Clone, Debug, PartialEq, CopyGetters, Setters, Serialize, Deserialize)]
#[getset(get_copy = "pub", set = "pub")]
#[serde(default)]
pub struct RegressionParameters {
    /// How many synthetic holders share the pool
    members: usize,
    /// How long to wait between rounds
    interval_ms: u64,
    /// Smallest amount a holder is funded with
    funding_min: u64,
    /// Largest amount a holder is funded with
    funding_max: u64,
    /// Seed for the request generator. Random if not given.
    seed: Option<u64>,
}

impl Default for RegressionParameters {
    fn default() -> Self {
        Self {
            members: 4,
            interval_ms: 1000,
            funding_min: 20_000,
            funding_max: 200_000,
            seed: None,
        }
    }
}

impl RegressionParameters {
    /// Create a params object with the default values
    pub fn new() -> Self {
        Default::default()
    }

    /// Load parameters from a JSON document over the defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let params: Self = serde_json::from_str(json)
            .map_err(|e| Error::Config(e.to_string()))?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        if self.members == 0 {
            Err(Error::Config("members must be positive".into()))?;
        }
        if self.funding_min == 0 || self.funding_min > self.funding_max {
            Err(Error::Config("funding range is empty".into()))?;
        }
        Ok(())
    }
}

/// What happened in one round.
#[derive(Clone, Debug, PartialEq, Getters, CopyGetters)]
pub struct RoundReport {
    #[getset(get_copy = "pub")]
    round: u64,
    /// The member who made the request
    #[getset(get = "pub")]
    member: HolderID,
    #[getset(get_copy = "pub")]
    requested: u64,
    /// Whether the bank granted it
    #[getset(get_copy = "pub")]
    granted: bool,
    /// Pool balance going in
    #[getset(get_copy = "pub")]
    balance_before: u64,
    /// Pool balance coming out (before any refund)
    #[getset(get_copy = "pub")]
    balance_after: u64,
    /// How much was put back in after the round
    #[getset(get_copy = "pub")]
    refunded: u64,
}

impl fmt::Display for RoundReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outcome = if self.granted { "granted" } else { "refused" };
        write!(f, "round {}: {} asked for {} ({}), pool {} -> {}", self.round, self.member, self.requested, outcome, self.balance_before, self.balance_after)?;
        if self.refunded > 0 {
            write!(f, ", refunded {}", self.refunded)?;
        }
        Ok(())
    }
}

#[derive(Debug)]
struct Running {
    account_id: AccountID,
    members: Vec<HolderID>,
    rng: ChaCha8Rng,
    /// What the pool should hold right now
    expected: u64,
    next_due: DateTime<Utc>,
    round: u64,
}

/// The regression harness. Starting and stopping are both idempotent.
#[derive(Debug)]
pub struct RegressionHarness {
    params: RegressionParameters,
    running: Option<Running>,
    runs: u64,
}

fn fail(msg: String) -> Error {
    log::error!("RegressionHarness -- {}", msg);
    Error::RegressionFailed(msg)
}

fn pool_total(bank: &Bank, account_id: &AccountID) -> Result<u64> {
    Ok(bank.holders_in(account_id)?.iter().map(|h| h.balance()).sum())
}

/// Fund a holder with a random amount, half as coin and half as a check (if
/// the half is big enough to be one). Returns the amount.
fn fund(bank: &Bank, rng: &mut ChaCha8Rng, params: &RegressionParameters, holder_id: &HolderID) -> Result<u64> {
    let amount = rng.gen_range(params.funding_min()..=params.funding_max());
    let half = amount / 2;
    let worth = if half >= bank.params().instrument_threshold() {
        half.min(bank.params().instrument_maximum())
    } else {
        0
    };
    if worth > 0 {
        bank.deposit_instrument(holder_id, worth)?;
    }
    bank.deposit(holder_id, amount - worth)?;
    Ok(amount)
}

impl RegressionHarness {
    pub fn new(params: RegressionParameters) -> Self {
        Self {
            params,
            running: None,
            runs: 0,
        }
    }

    pub fn params(&self) -> &RegressionParameters {
        &self.params
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// The synthetic account group, if we're running.
    pub fn account_id(&self) -> Option<&AccountID> {
        self.running.as_ref().map(|r| &r.account_id)
    }

    /// Start the harness. Returns `Ok(false)` if it was already running.
    pub fn start(&mut self, caller: &Holder, bank: &Bank, now: &DateTime<Utc>) -> Result<bool> {
        caller.access_check(Permission::RegressionControl)?;
        if self.is_running() {
            log::warn!("RegressionHarness::start() -- already running");
            return Ok(false);
        }
        self.params.validate()?;
        let seed = self.params.seed().unwrap_or_else(rand::random);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let account_id = bank.open_account(AccountID::new(format!("regression-{}-{}", seed, self.runs)), "regression")?;
        self.runs += 1;

        let mut members = Vec::with_capacity(self.params.members());
        let mut funded = 0;
        let setup = (|| -> Result<()> {
            for i in 0..self.params.members() {
                let holder_id = HolderID::new(format!("{}-{}", account_id, i));
                bank.create_holder(holder_id.clone(), account_id.clone(), format!("regression {}", i), vec![Role::Player], true)?;
                funded += fund(bank, &mut rng, &self.params, &holder_id)?;
                members.push(holder_id);
            }
            let total = pool_total(bank, &account_id)?;
            if total != funded {
                Err(fail(format!("funded {} but the pool holds {}", funded, total)))?;
            }
            for holder_id in &members {
                let pooled = bank.request_pooled_balance(holder_id)?;
                if pooled != total {
                    Err(fail(format!("{} sees {} in a pool holding {}", holder_id, pooled, total)))?;
                }
            }
            Ok(())
        })();
        if let Err(e) = setup {
            bank.close_account(&account_id)?;
            return Err(e);
        }

        log::info!("RegressionHarness::start() -- {} members funded with {} (seed {})", members.len(), funded, seed);
        self.running = Some(Running {
            account_id,
            members,
            rng,
            expected: funded,
            next_due: now.clone(),
            round: 0,
        });
        Ok(true)
    }

    /// Stop the harness and close its account group. Returns `Ok(false)` if it
    /// wasn't running.
    pub fn stop(&mut self, caller: &Holder, bank: &Bank) -> Result<bool> {
        caller.access_check(Permission::RegressionControl)?;
        match self.running.take() {
            Some(running) => {
                bank.close_account(&running.account_id)?;
                log::info!("RegressionHarness::stop() -- stopped after {} rounds", running.round);
                Ok(true)
            }
            None => {
                log::warn!("RegressionHarness::stop() -- not running");
                Ok(false)
            }
        }
    }

    /// Run a round if one is due. Returns `None` when stopped or when it's too
    /// early.
    pub fn tick(&mut self, bank: &Bank, now: &DateTime<Utc>) -> Result<Option<RoundReport>> {
        let params = &self.params;
        let running = match self.running.as_mut() {
            Some(running) => running,
            None => return Ok(None),
        };
        if now < &running.next_due {
            return Ok(None);
        }
        running.next_due = now.clone() + Duration::milliseconds(params.interval_ms() as i64);
        running.round += 1;

        let member = running.members[running.rng.gen_range(0..running.members.len())].clone();
        let before = pool_total(bank, &running.account_id)?;
        if before != running.expected {
            Err(fail(format!("round {}: pool holds {} but should hold {}", running.round, before, running.expected)))?;
        }
        // the bank's own idea of the pool has to match ours too
        let pooled = bank.request_pooled_balance(&member)?;
        if pooled != before {
            Err(fail(format!("round {}: {} sees {} in a pool holding {}", running.round, member, pooled, before)))?;
        }
        let ceiling = before + before / 4 + 1;
        let requested = running.rng.gen_range(1..=ceiling);
        let granted = bank.request_withdrawal(&member, requested)?;
        let after = pool_total(bank, &running.account_id)?;

        if granted {
            match before.checked_sub(after) {
                Some(taken) if taken == requested => {}
                Some(taken) => Err(fail(format!("round {}: asked for {} but {} was taken", running.round, requested, taken)))?,
                None => Err(fail(format!("round {}: pool grew from {} to {} on a withdrawal", running.round, before, after)))?,
            }
        } else if after != before || requested <= before {
            Err(fail(format!("round {}: refused {} with {} in the pool (now {})", running.round, requested, before, after)))?;
        }
        running.expected = after;

        let mut refunded = 0;
        if after < params.funding_min() {
            let lucky = running.members[running.rng.gen_range(0..running.members.len())].clone();
            refunded = fund(bank, &mut running.rng, params, &lucky)?;
            running.expected += refunded;
        }

        let report = RoundReport {
            round: running.round,
            member,
            requested,
            granted,
            balance_before: before,
            balance_after: after,
            refunded,
        };
        log::debug!("RegressionHarness::tick() -- {}", report);
        Ok(Some(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        system::params::BankParameters,
        util::{self, test::*},
    };

    fn admin() -> Holder {
        let now = util::time::now();
        let mut admin = make_holder(&HolderID::new("admin"), &AccountID::new("staff"), false, vec![], &now);
        admin.set_roles(vec![Role::Administrator]);
        admin
    }

    fn harness(seed: u64) -> RegressionHarness {
        let mut params = RegressionParameters::default();
        params.set_seed(Some(seed));
        params.set_interval_ms(0);
        RegressionHarness::new(params)
    }

    #[test]
    fn start_stop_is_idempotent() {
        let bank = Bank::new(BankParameters::default()).unwrap();
        let mut harness = harness(42);
        let now = util::time::now();
        assert!(!harness.stop(&admin(), &bank).unwrap());
        assert!(harness.start(&admin(), &bank, &now).unwrap());
        let account_id = harness.account_id().unwrap().clone();
        assert_eq!(bank.holders_in(&account_id).unwrap().len(), 4);
        assert!(!harness.start(&admin(), &bank, &now).unwrap());
        assert!(harness.stop(&admin(), &bank).unwrap());
        assert!(!harness.stop(&admin(), &bank).unwrap());
        assert!(!harness.is_running());
        assert_eq!(bank.holders_in(&account_id), Err(Error::ObjectNotFound("account".into())));
        assert_eq!(harness.tick(&bank, &now).unwrap(), None);

        // and again, with a fresh account
        assert!(harness.start(&admin(), &bank, &now).unwrap());
        assert_ne!(harness.account_id(), Some(&account_id));
    }

    #[test]
    fn needs_privileges() {
        let bank = Bank::new(BankParameters::default()).unwrap();
        let mut harness = harness(42);
        let now = util::time::now();
        let mut gm = admin();
        gm.set_roles(vec![Role::GameMaster]);
        assert_eq!(harness.start(&gm, &bank, &now), Err(Error::InsufficientPrivileges));
        let mut player = admin();
        player.set_roles(vec![Role::Player]);
        assert_eq!(harness.start(&player, &bank, &now), Err(Error::InsufficientPrivileges));
        assert_eq!(harness.stop(&player, &bank), Err(Error::InsufficientPrivileges));
        assert!(!harness.is_running());
    }

    #[test]
    fn rounds_conserve_value() {
        let bank = Bank::new(BankParameters::default()).unwrap();
        let mut harness = harness(1977);
        let now = util::time::now();
        harness.start(&admin(), &bank, &now).unwrap();
        let mut granted = 0;
        let mut refused = 0;
        for _ in 0..300 {
            let report = harness.tick(&bank, &now).unwrap().unwrap();
            if report.granted() {
                granted += 1;
                assert_eq!(report.balance_before().checked_sub(report.balance_after()), Some(report.requested()));
            } else {
                refused += 1;
                assert!(report.requested() > report.balance_before());
            }
        }
        assert!(granted > 0);
        assert!(refused > 0);
        harness.stop(&admin(), &bank).unwrap();
    }

    #[test]
    fn notices_lost_value() {
        let bank = Bank::new(BankParameters::default()).unwrap();
        let mut harness = harness(8);
        let now = util::time::now();
        harness.start(&admin(), &bank, &now).unwrap();
        harness.tick(&bank, &now).unwrap().unwrap();

        let account_id = harness.account_id().unwrap().clone();
        let victim = bank.holders_in(&account_id).unwrap()
            .into_iter()
            .find(|h| h.balance() > 0)
            .unwrap();
        let item_id = victim.storage().live_items().next().unwrap().id().clone();
        bank.discard_item(victim.id(), &item_id).unwrap();
        assert!(matches!(harness.tick(&bank, &now), Err(Error::RegressionFailed(_))));
    }

    #[test]
    fn waits_for_the_interval() {
        let bank = Bank::new(BankParameters::default()).unwrap();
        let mut params = RegressionParameters::default();
        params.set_seed(Some(7));
        params.set_interval_ms(500);
        let mut harness = RegressionHarness::new(params);
        let now = util::time::now();
        harness.start(&admin(), &bank, &now).unwrap();
        assert_eq!(harness.tick(&bank, &now).unwrap().unwrap().round(), 1);
        assert_eq!(harness.tick(&bank, &(now + Duration::milliseconds(100))).unwrap(), None);
        assert_eq!(harness.tick(&bank, &(now + Duration::milliseconds(500))).unwrap().unwrap().round(), 2);
    }

    #[test]
    fn loads_params() {
        let params = RegressionParameters::from_json(r#"{"members": 2, "seed": 12}"#).unwrap();
        assert_eq!(params.members(), 2);
        assert_eq!(params.seed(), Some(12));
        assert_eq!(params.funding_min(), 20_000);
        let res = RegressionParameters::from_json(r#"{"funding_min": 10, "funding_max": 5}"#);
        assert_eq!(res, Err(Error::Config("funding range is empty".into())));
    }
}
