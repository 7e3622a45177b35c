//! Environment-driven configuration

use std::path::PathBuf;
use tracing::warn;

use crate::sync::{Platform, SyncConfig, SyncKind};

/// Variable naming the snapshot output root
pub const OUTPUT_DIR_VAR: &str = "FEEDER_OUTPUT_DIR";

/// Output root used when [`OUTPUT_DIR_VAR`] is unset
pub const DEFAULT_OUTPUT_DIR: &str = "automation_outputs";

/// Top-level configuration for a sync run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeederConfig {
    pub output_dir: PathBuf,
    pub syncs: Vec<SyncConfig>,
}

struct SyncTemplate {
    name: &'static str,
    kind: SyncKind,
    platform: Platform,
    subtask: &'static str,
    account_var: &'static str,
    category_var: Option<&'static str>,
    update_balance: bool,
}

const STANDARD_SYNCS: [SyncTemplate; 5] = [
    SyncTemplate {
        name: "Human Interest Transactions",
        kind: SyncKind::Transactions,
        platform: Platform::HumanInterest,
        subtask: "transactions",
        account_var: "MONARCH_HUMAN_INTEREST_ACCOUNT_ID",
        category_var: Some("MONARCH_HUMAN_INTEREST_CATEGORY_ID"),
        update_balance: false,
    },
    SyncTemplate {
        name: "Human Interest Portfolio",
        kind: SyncKind::Portfolio,
        platform: Platform::HumanInterest,
        subtask: "portfolio",
        account_var: "MONARCH_HUMAN_INTEREST_ACCOUNT_ID",
        category_var: None,
        update_balance: false,
    },
    SyncTemplate {
        name: "Rippling HSA Transactions",
        kind: SyncKind::Transactions,
        platform: Platform::Rippling,
        subtask: "hsa_transactions",
        account_var: "MONARCH_ELEVATE_UMB_ACCOUNT_ID",
        category_var: Some("MONARCH_ELEVATE_UMB_CATEGORY_ID"),
        update_balance: false,
    },
    SyncTemplate {
        name: "Rippling HSA Portfolio",
        kind: SyncKind::Portfolio,
        platform: Platform::Rippling,
        subtask: "hsa_portfolio",
        account_var: "MONARCH_ELEVATE_UMB_ACCOUNT_ID",
        category_var: None,
        update_balance: false,
    },
    SyncTemplate {
        name: "Rippling Commuter Benefits",
        kind: SyncKind::Transactions,
        platform: Platform::Rippling,
        subtask: "commuter_benefits",
        account_var: "MONARCH_RIPPLING_COMMUTER_ACCOUNT_ID",
        category_var: Some("MONARCH_RIPPLING_COMMUTER_CATEGORY_ID"),
        update_balance: true,
    },
];

impl FeederConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_env_for(None)
    }

    /// Read configuration from the process environment, keeping only the
    /// syncs for `platform` when one is given
    pub fn from_env_for(platform: Option<Platform>) -> Self {
        Self::from_lookup_for(|key| std::env::var(key).ok(), platform)
    }

    /// Read configuration through an arbitrary key lookup.
    ///
    /// Syncs whose account id is unset or blank are skipped with a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::from_lookup_for(lookup, None)
    }

    /// Like [`FeederConfig::from_lookup`], restricted to `platform`.
    /// Syncs of other platforms are dropped without a warning.
    pub fn from_lookup_for<F>(lookup: F, platform: Option<Platform>) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let output_dir = non_blank(OUTPUT_DIR_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));

        let mut syncs = Vec::new();
        for template in &STANDARD_SYNCS {
            if platform.is_some_and(|p| p != template.platform) {
                continue;
            }

            let Some(account_id) = non_blank(template.account_var) else {
                warn!(
                    sync = template.name,
                    variable = template.account_var,
                    "account id not configured, skipping sync"
                );
                continue;
            };

            syncs.push(SyncConfig {
                name: template.name.to_string(),
                kind: template.kind,
                platform: template.platform,
                subtask: template.subtask.to_string(),
                account_id,
                category_id: template.category_var.and_then(|var| non_blank(var)),
                update_balance: template.update_balance,
            });
        }

        Self { output_dir, syncs }
    }
}
