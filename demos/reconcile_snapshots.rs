//! Reconcile two snapshot captures and sync the result into an in-memory ledger

use feeder_core::utils::MemoryLedger;
use feeder_core::{Platform, SyncConfig, SyncKind, Syncer};
use std::fs;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔄 Feeder Core - Snapshot Reconciliation Example\n");

    let output_root = std::env::temp_dir().join("feeder_demo_outputs");
    let config = SyncConfig {
        name: "Rippling Commuter Benefits".to_string(),
        kind: SyncKind::Transactions,
        platform: Platform::Rippling,
        subtask: "commuter_benefits".to_string(),
        account_id: "demo-commuter".to_string(),
        category_id: Some("transit".to_string()),
        update_balance: true,
    };

    // 1. Write two captures, a week apart
    let dir = config.snapshot_dir(&output_root);
    fs::create_dir_all(&dir)?;
    fs::write(
        dir.join("commuter_benefits_20240101_090000.json"),
        r#"{"transactions": [
            {"date": "2023-12-28", "user_account": "Commuter", "counterparty_account": "Transit Agency", "amount": 2.75},
            {"date": "2023-12-29", "user_account": "Commuter", "counterparty_account": "Transit Agency", "amount": 2.75}
        ]}"#,
    )?;
    fs::write(
        dir.join("commuter_benefits_20240108_090000.json"),
        r#"{"transactions": [
            {"date": "2023-12-28", "user_account": "Commuter", "counterparty_account": "Transit Agency", "amount": 2.75},
            {"date": "2023-12-29", "user_account": "Commuter", "counterparty_account": "Transit Agency", "amount": 2.75},
            {"date": "2024-01-03", "user_account": "Commuter", "counterparty_account": "Transit Agency", "amount": 2.75},
            {"date": "2024-01-05", "user_account": "Commuter", "counterparty_account": "Parking Garage", "amount": 18}
        ]}"#,
    )?;
    println!("📁 Wrote snapshots to {}", dir.display());

    // 2. Dry run first
    let mut syncer = Syncer::new(MemoryLedger::new(), &output_root);
    let plan = syncer.sync_transactions(&config, true).await?;
    println!("🔍 Dry run: {} transaction(s) would be added", plan.considered);

    // 3. Real sync
    let report = syncer.sync_transactions(&config, false).await?;
    println!(
        "✅ Submitted {} transaction(s), {} failed\n",
        report.submitted, report.failed
    );

    for entry in syncer.client().entries_for("demo-commuter")? {
        println!(
            "  ✓ {} - {} - {}",
            entry.transaction.date,
            entry.transaction.counterparty_account,
            entry.transaction.amount
        );
    }

    fs::remove_dir_all(&output_root)?;
    Ok(())
}
