//! # Feeder Core
//!
//! Snapshot reconciliation and ledger sync for transaction and portfolio data
//! scraped from benefits platforms.
//!
//! ## Features
//!
//! - **Snapshot loading**: strict JSON loaders for transaction logs and portfolios
//! - **Reconciliation**: find the transactions that appeared between two snapshots
//! - **Snapshot discovery**: pick the newest snapshot files by embedded timestamp
//! - **Sync driver**: replay new transactions and holdings into any ledger backend
//! - **Ledger abstraction**: trait-based ledger client with an in-memory implementation
//!
//! ## Quick Start
//!
//! ```rust
//! use feeder_core::TransactionLog;
//!
//! let old = TransactionLog::from_json_str(r#"[
//!     {"date": "2024-01-01", "user_account": "401k", "counterparty_account": "Employer", "amount": 50}
//! ]"#).unwrap();
//! let new = TransactionLog::from_json_str(r#"[
//!     {"date": "2024-01-01", "user_account": "401k", "counterparty_account": "Employer", "amount": 50},
//!     {"date": "2024-01-15", "user_account": "401k", "counterparty_account": "Employer", "amount": 50}
//! ]"#).unwrap();
//!
//! let fresh = new.diff(&old);
//! assert_eq!(fresh.len(), 1);
//! assert_eq!(fresh.transactions()[0].date.to_string(), "2024-01-15");
//! ```

pub mod config;
pub mod reconciliation;
pub mod snapshot;
pub mod sync;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use config::FeederConfig;
pub use reconciliation::diff;
pub use sync::*;
pub use traits::*;
pub use types::*;
