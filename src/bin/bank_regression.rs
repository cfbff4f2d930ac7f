//! Runs the withdrawal regression harness from a terminal.
//!
//! Log output goes through `env_logger`, so `RUST_LOG=debug` shows every
//! round.

use bankbox_core::{
    access::Role,
    error::{Error, Result},
    models::{account::AccountID, holder::Holder, storage::Storage},
    system::{
        bank::Bank,
        params::BankParameters,
        regression::{RegressionHarness, RegressionParameters},
    },
};
use chrono::Utc;
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

/// Hammer the shared bank with random withdrawals and check that value is
/// conserved
#[derive(Parser, Debug)]
#[command(name = "bank_regression")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// How many rounds to run
    #[arg(short = 'n', long, default_value_t = 100)]
    rounds: u64,

    /// Synthetic holders in the pool (overrides the config file)
    #[arg(short = 'm', long)]
    members: Option<usize>,

    /// Milliseconds between rounds (overrides the config file)
    #[arg(short = 'i', long = "interval-ms")]
    interval_ms: Option<u64>,

    /// Seed for the request generator
    #[arg(short = 's', long)]
    seed: Option<u64>,

    /// JSON file with `bank` and/or `regression` parameter sections
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,
}

#[derive(Default, serde::Deserialize)]
#[serde(default)]
struct Config {
    bank: Option<serde_json::Value>,
    regression: Option<serde_json::Value>,
}

fn load(args: &Args) -> Result<(BankParameters, RegressionParameters)> {
    let config = match &args.config {
        Some(path) => {
            let contents = fs::read_to_string(path)
                .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
            serde_json::from_str::<Config>(&contents)
                .map_err(|e| Error::Config(e.to_string()))?
        }
        None => Config::default(),
    };
    let bank = match config.bank {
        Some(json) => BankParameters::from_json(&json.to_string())?,
        None => BankParameters::default(),
    };
    let mut regression = match config.regression {
        Some(json) => RegressionParameters::from_json(&json.to_string())?,
        None => RegressionParameters::default(),
    };
    if let Some(members) = args.members {
        regression.set_members(members);
    }
    if let Some(interval_ms) = args.interval_ms {
        regression.set_interval_ms(interval_ms);
    }
    if args.seed.is_some() {
        regression.set_seed(args.seed);
    }
    regression.validate()?;
    Ok((bank, regression))
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let (bank_params, params) = load(&args)?;
    let interval = Duration::from_millis(params.interval_ms());

    let now = Utc::now();
    let admin = Holder::builder()
        .id("regression-admin")
        .account_id(AccountID::new("staff"))
        .name("regression admin")
        .roles(vec![Role::Administrator])
        .sharing(false)
        .storage(Storage::new(0))
        .active(true)
        .created(now.clone())
        .updated(now)
        .build()
        .map_err(Error::BuilderFailed)?;

    let bank = Bank::new(bank_params)?;
    let mut harness = RegressionHarness::new(params);
    harness.start(&admin, &bank, &Utc::now())?;

    let mut granted = 0;
    let mut refused = 0;
    let mut refunded = 0;
    let mut round = 0;
    while round < args.rounds {
        match harness.tick(&bank, &Utc::now())? {
            Some(report) => {
                round += 1;
                if report.granted() {
                    granted += 1;
                } else {
                    refused += 1;
                }
                refunded += report.refunded();
            }
            None => thread::sleep(interval),
        }
    }
    harness.stop(&admin, &bank)?;

    println!("{} rounds: {} granted, {} refused, {} refunded, value conserved", round, granted, refused, refunded);
    Ok(())
}
