//! zkapp-bench-harness
//!
//! Run end-to-end reducer scenarios (dispatch -> apply -> prepare -> process)
//! on a deterministic random backlog and append CSV rows into
//! `benchmarks/reports/bench-<unix>.csv`.
//!
//! Usage examples:
//!   cargo run -p zkapp-bench-harness -- --profile benchmarks/configs/small.toml
//!   RUST_LOG=debug cargo run -p zkapp-bench-harness -- --profile benchmarks/configs/medium.toml --seed 3

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::{ensure, Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use zkapp_core::{AccountUpdate, PublicKey, TransactionContext};
use zkapp_crypto::Field;
use zkapp_reducer::{
    ActionSource, BatchReducer, ContractAddress, LocalActionLedger, MacBackend, ReducerConfig,
};

#[derive(Parser, Debug)]
#[command(
    name = "zkapp-bench-harness",
    about = "Time the batch reducer on a synthetic action backlog",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    /// TOML profile (backlog shape plus a `[reducer]` table)
    #[arg(long, default_value = "benchmarks/configs/small.toml")]
    profile: PathBuf,

    /// RNG seed for the backlog
    #[arg(long, default_value_t = 7)]
    seed: u64,

    /// Directory the CSV report is written to
    #[arg(long, default_value = "benchmarks/reports")]
    out_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
struct Profile {
    /// Contract updates carrying actions
    updates: usize,
    /// Updates grouped into one transaction
    updates_per_tx: usize,
    /// Repetitions of the whole scenario
    repeats: u32,
    /// Reducer sizes; `ZKAPP_*` environment overrides apply on top
    #[serde(default)]
    reducer: ReducerConfig,
}

type Reducer = BatchReducer<u64, MacBackend>;

fn dur_ms(d: Duration) -> u128 {
    d.as_millis()
}

/// Initialize tracing with an env-driven filter (default INFO).
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = fmt::layer().with_target(false).with_level(true).compact();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}

/// Random per-update action lists; values count up so order is checkable.
fn backlog(rng: &mut StdRng, updates: usize, max_len: usize) -> Vec<Vec<u64>> {
    let mut next = 1u64;
    (0..updates)
        .map(|_| {
            let len = rng.random_range(0..=max_len) as u64;
            let list: Vec<u64> = (next..next + len).collect();
            next += len;
            list
        })
        .collect()
}

/// Dispatch every list from its own contract update, `per_tx` updates per
/// transaction, and apply the transactions to the ledger.
fn dispatch_all(
    reducer: &Reducer,
    ledger: &mut LocalActionLedger,
    contract: &ContractAddress,
    lists: &[Vec<u64>],
    per_tx: usize,
) -> Result<usize> {
    let mut txs = 0usize;
    for chunk in lists.chunks(per_tx.max(1)) {
        let mut tx = TransactionContext::new(PublicKey(Field::from(1u64)), 0);
        for list in chunk {
            let this = tx.push(AccountUpdate::create(contract.public_key, contract.token_id))?;
            let mut ctx = tx.contract(this)?;
            for a in list {
                reducer.dispatch(&mut ctx, a)?;
            }
        }
        ledger.apply(&tx.finish()?)?;
        txs += 1;
    }
    Ok(txs)
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let profile_src = fs::read_to_string(&cli.profile)
        .with_context(|| format!("read profile {}", cli.profile.display()))?;
    let profile: Profile = toml::from_str(&profile_src).context("parse profile toml")?;
    let cfg = profile.reducer.from_env();
    let reducer = Reducer::new(cfg).context("reducer config")?;
    info!(?cfg, updates = profile.updates, repeats = profile.repeats, seed = cli.seed, "profile");

    fs::create_dir_all(&cli.out_dir)
        .with_context(|| format!("creating {}", cli.out_dir.display()))?;
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let csv_path = cli.out_dir.join(format!("bench-{ts}.csv"));
    let mut csv = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&csv_path)
        .with_context(|| format!("open {}", csv_path.display()))?;
    writeln!(csv, "timestamp,batch_size,updates,repeat,stage,ms,extra")?;
    let row = |csv: &mut fs::File, rep: u32, stage: &str, d: Duration, extra: &str| {
        writeln!(
            csv,
            "{ts},{},{},{rep},{stage},{},{extra}",
            cfg.batch_size,
            profile.updates,
            dur_ms(d)
        )
    };

    let contract = ContractAddress::new(PublicKey(Field::from(0xC0DEu64)));
    for rep in 0..profile.repeats {
        let mut rng = StdRng::seed_from_u64(cli.seed.wrapping_add(u64::from(rep)));
        let lists = backlog(&mut rng, profile.updates, cfg.max_actions_per_update);
        let expected = lists.concat();
        let mut ledger = LocalActionLedger::new();

        // 1) dispatch + apply
        let t0 = Instant::now();
        let txs = dispatch_all(&reducer, &mut ledger, &contract, &lists, profile.updates_per_tx)?;
        row(&mut csv, rep, "dispatch", t0.elapsed(), &format!("txs={txs};actions={}", expected.len()))?;

        // 2) prepare
        let t0 = Instant::now();
        let batches = reducer.prepare_batches(&ledger, &contract)?;
        let recursive = batches.first().is_some_and(|b| b.batch.is_recursive);
        row(
            &mut csv,
            rep,
            "prepare",
            t0.elapsed(),
            &format!("batches={};recursive={recursive}", batches.len()),
        )?;

        // 3) process every batch, storing the anchors after each step
        let t0 = Instant::now();
        let mut seen = Vec::with_capacity(expected.len());
        let mut dummies = 0usize;
        for prepared in &batches {
            let mut state = ledger.reducer_state(&contract)?;
            let onchain = ledger.account_action_state(&contract)?;
            reducer.process_batch(&mut state, onchain, prepared, |a, is_dummy, _| {
                if is_dummy {
                    dummies += 1;
                } else {
                    seen.push(a);
                }
            })?;
            ledger.set_reducer_state(&contract, state);
        }
        let final_state = ledger.reducer_state(&contract)?.action_state;
        row(
            &mut csv,
            rep,
            "process",
            t0.elapsed(),
            &format!("dummies={dummies};state={}", hex::encode(final_state.as_bytes())),
        )?;

        ensure!(seen == expected, "repeat {rep}: actions processed out of order");
        ensure!(
            final_state == ledger.account_action_state(&contract)?,
            "repeat {rep}: reducer did not catch up with the account"
        );
        info!(rep, actions = seen.len(), batches = batches.len(), "repeat done");
    }

    info!(report = %csv_path.display(), "wrote report");
    Ok(())
}
