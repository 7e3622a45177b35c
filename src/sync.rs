//! Sync driver: replay reconciled snapshots into a ledger

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

use crate::snapshot::latest_snapshots;
use crate::traits::*;
use crate::types::*;

/// What a sync pushes into the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncKind {
    /// Newly appeared transactions, one submission each
    Transactions,
    /// The latest holdings, replacing what the ledger has
    Portfolio,
}

/// Platforms that snapshots are scraped from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    HumanInterest,
    Rippling,
}

impl Platform {
    /// All known platforms
    pub const ALL: [Platform; 2] = [Platform::HumanInterest, Platform::Rippling];

    /// Directory name under the output root
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::HumanInterest => "human_interest",
            Platform::Rippling => "rippling",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = FeederError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Platform::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| {
                let available: Vec<&str> = Platform::ALL.iter().map(|p| p.as_str()).collect();
                FeederError::Config(format!(
                    "Unknown platform: {s}. Available platforms: {}",
                    available.join(", ")
                ))
            })
    }
}

/// One account to keep in sync
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Human-readable name used in logs and reports
    pub name: String,
    pub kind: SyncKind,
    pub platform: Platform,
    /// Scraper subtask whose output holds the snapshots
    pub subtask: String,
    /// Ledger account receiving the data
    pub account_id: String,
    /// Ledger category assigned to new transactions
    pub category_id: Option<String>,
    /// Whether the ledger should adjust the account balance per transaction
    pub update_balance: bool,
}

impl SyncConfig {
    /// Directory holding this sync's snapshots: `<output_root>/<platform>/<subtask>`
    pub fn snapshot_dir(&self, output_root: &Path) -> PathBuf {
        output_root.join(self.platform.as_str()).join(&self.subtask)
    }
}

/// Outcome of a single sync
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub name: String,
    pub kind: SyncKind,
    /// Transactions (or holdings) that were due for submission
    pub considered: usize,
    pub submitted: usize,
    pub failed: usize,
    pub dry_run: bool,
}

impl SyncReport {
    fn new(config: &SyncConfig, dry_run: bool) -> Self {
        Self {
            name: config.name.clone(),
            kind: config.kind,
            considered: 0,
            submitted: 0,
            failed: 0,
            dry_run,
        }
    }
}

/// Drives snapshot reconciliation and ledger submission
pub struct Syncer<L: LedgerClient> {
    client: L,
    output_dir: PathBuf,
}

impl<L: LedgerClient> Syncer<L> {
    /// Create a syncer reading snapshots below `output_dir`
    pub fn new(client: L, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            output_dir: output_dir.into(),
        }
    }

    /// The ledger client, for inspecting what was submitted
    pub fn client(&self) -> &L {
        &self.client
    }

    pub fn into_client(self) -> L {
        self.client
    }

    /// Submit the transactions that appeared since the previous snapshot.
    ///
    /// Submissions are sequential. A failed submission is logged and counted
    /// without stopping the rest of the batch.
    pub async fn sync_transactions(
        &mut self,
        config: &SyncConfig,
        dry_run: bool,
    ) -> FeederResult<SyncReport> {
        let dir = config.snapshot_dir(&self.output_dir);
        let files = latest_snapshots(&dir, 2)?;
        let newest = files.first().ok_or_else(|| FeederError::NoSnapshots {
            name: config.name.clone(),
            dir: dir.clone(),
        })?;

        let new_log = TransactionLog::from_json_file(newest)?;
        let old_log = match files.get(1) {
            Some(previous) => TransactionLog::from_json_file(previous)?,
            None => TransactionLog::empty(),
        };

        let pending = new_log.diff(&old_log);
        info!(
            sync = %config.name,
            snapshot = %newest.display(),
            total = new_log.len(),
            new = pending.len(),
            "reconciled transaction snapshots"
        );

        let mut report = SyncReport::new(config, dry_run);
        report.considered = pending.len();

        for transaction in &pending {
            if dry_run {
                info!(
                    sync = %config.name,
                    date = %transaction.date,
                    counterparty = %transaction.counterparty_account,
                    amount = %transaction.amount,
                    "would add transaction"
                );
                continue;
            }

            match self
                .client
                .add_transaction(
                    transaction,
                    &config.account_id,
                    config.category_id.as_deref(),
                    config.update_balance,
                )
                .await
            {
                Ok(()) => report.submitted += 1,
                Err(err) => {
                    warn!(
                        sync = %config.name,
                        date = %transaction.date,
                        counterparty = %transaction.counterparty_account,
                        error = %err,
                        "failed to add transaction"
                    );
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Push the latest portfolio snapshot to the ledger account
    pub async fn sync_portfolio(
        &mut self,
        config: &SyncConfig,
        dry_run: bool,
    ) -> FeederResult<SyncReport> {
        let dir = config.snapshot_dir(&self.output_dir);
        let files = latest_snapshots(&dir, 1)?;
        let newest = files.first().ok_or_else(|| FeederError::NoSnapshots {
            name: config.name.clone(),
            dir: dir.clone(),
        })?;

        let portfolio = Portfolio::from_json_file(newest)?;
        let mut report = SyncReport::new(config, dry_run);
        report.considered = portfolio.total_positions();

        if dry_run {
            for holding in portfolio.holdings() {
                info!(
                    sync = %config.name,
                    ticker = %holding.stock_ticker,
                    shares = %holding.shares,
                    "would sync holding"
                );
            }
            return Ok(report);
        }

        match self
            .client
            .update_holdings(&config.account_id, &portfolio)
            .await
        {
            Ok(()) => report.submitted = portfolio.total_positions(),
            Err(err) => {
                warn!(sync = %config.name, error = %err, "failed to sync portfolio");
                report.failed = portfolio.total_positions();
            }
        }

        Ok(report)
    }

    /// Run every config in order
    pub async fn sync_all(
        &mut self,
        configs: &[SyncConfig],
        dry_run: bool,
    ) -> FeederResult<Vec<SyncReport>> {
        let mut reports = Vec::with_capacity(configs.len());
        for config in configs {
            let report = match config.kind {
                SyncKind::Transactions => self.sync_transactions(config, dry_run).await?,
                SyncKind::Portfolio => self.sync_portfolio(config, dry_run).await?,
            };
            reports.push(report);
        }

        info!(syncs = reports.len(), dry_run, "sync complete");
        Ok(reports)
    }
}
