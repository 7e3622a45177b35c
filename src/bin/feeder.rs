use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use feeder_core::utils::MemoryLedger;
use feeder_core::{FeederConfig, Platform, Syncer, TransactionLog};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "feeder")]
#[command(about = "Reconcile scraped transaction snapshots and plan ledger syncs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print transactions in NEW that are not yet accounted for in OLD
    Diff {
        /// Newer snapshot file
        new: PathBuf,

        /// Older snapshot file (everything is new when omitted)
        old: Option<PathBuf>,
    },

    /// Dry-run every configured sync and summarize what would be submitted
    Plan {
        /// Snapshot output root (overrides FEEDER_OUTPUT_DIR)
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Only plan syncs for this platform (human_interest | rippling)
        #[arg(long)]
        platform: Option<Platform>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Silent if the file does not exist; real deployments inject env vars directly.
    let _ = dotenvy::dotenv();

    init_tracing();

    let cli = Cli::parse();
    match cli.cmd {
        Commands::Diff { new, old } => diff(new, old),
        Commands::Plan {
            output_dir,
            platform,
        } => plan(output_dir, platform).await,
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

fn diff(new: PathBuf, old: Option<PathBuf>) -> Result<()> {
    let new_log = TransactionLog::from_json_file(&new)
        .with_context(|| format!("load snapshot {}", new.display()))?;
    let old_log = match old {
        Some(path) => TransactionLog::from_json_file(&path)
            .with_context(|| format!("load snapshot {}", path.display()))?,
        None => TransactionLog::empty(),
    };

    let fresh = new_log.diff(&old_log);
    info!(total = new_log.len(), new = fresh.len(), "reconciled snapshots");

    println!("{}", serde_json::to_string_pretty(&fresh)?);
    Ok(())
}

async fn plan(output_dir: Option<PathBuf>, platform: Option<Platform>) -> Result<()> {
    let mut config = FeederConfig::from_env_for(platform);
    if let Some(dir) = output_dir {
        config.output_dir = dir;
    }

    if config.syncs.is_empty() {
        anyhow::bail!("no syncs configured; set the MONARCH_*_ACCOUNT_ID variables");
    }

    let mut syncer = Syncer::new(MemoryLedger::new(), &config.output_dir);
    let reports = syncer
        .sync_all(&config.syncs, true)
        .await
        .context("plan sync")?;

    for report in reports {
        println!(
            "{:<32} {:?}: {} to submit",
            report.name, report.kind, report.considered
        );
    }
    Ok(())
}
