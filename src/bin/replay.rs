//! Headless scenario replay
//!
//! Loads a JSON scenario, processes its blocks and prints one JSON report
//! per block, optionally followed by the final state.

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use hexrealm::core::error::Result;
use hexrealm::logic::FameTransfer;
use hexrealm::{Database, GameParams, OpenMap, Scenario};

#[derive(Parser, Debug)]
#[command(name = "replay")]
#[command(about = "Replay a hexrealm scenario block by block")]
struct Args {
    /// Scenario JSON file
    scenario: PathBuf,

    /// Game parameter overrides (TOML)
    #[arg(long)]
    params: Option<PathBuf>,

    /// Override the scenario's seed
    #[arg(long)]
    seed: Option<u64>,

    /// Print the final database state
    #[arg(long)]
    dump: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hexrealm=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let params = match &args.params {
        Some(path) => GameParams::load(path)?,
        None => GameParams::default(),
    };
    let mut scenario = Scenario::load(&args.scenario)?;
    if let Some(seed) = args.seed {
        scenario.seed = seed;
    }

    let db = Database::new();
    let map = OpenMap::default();
    let ids = scenario.populate(&db, &params)?;
    tracing::info!(
        "Replaying {} blocks with {} characters",
        scenario.blocks.len(),
        ids.len()
    );

    let mut fame = FameTransfer::new(&params);
    let reports = scenario.run(&db, &params, &map, &mut fame)?;
    for report in &reports {
        println!("{}", serde_json::to_string(report)?);
    }

    let stats = db.write_stats();
    tracing::info!(
        "Done: {} full upserts, {} scalar updates, {} deletes",
        stats.full_upserts,
        stats.scalar_updates,
        stats.deletes
    );
    if args.dump {
        println!("{}", db.dump()?);
    }
    Ok(())
}
