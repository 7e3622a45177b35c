//! In-memory ledger implementation for testing

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::traits::*;
use crate::types::*;

/// A transaction as recorded by [`MemoryLedger`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub account_id: String,
    pub category_id: Option<String>,
    pub update_balance: bool,
    pub transaction: Transaction,
}

/// In-memory ledger for testing, demos and dry runs
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    entries: Arc<RwLock<Vec<LedgerEntry>>>,
    holdings: Arc<RwLock<HashMap<String, Portfolio>>>,
    rejected_counterparties: Arc<RwLock<HashSet<String>>>,
}

impl MemoryLedger {
    /// Create a new, empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later submission with this counterparty fail
    pub fn reject_counterparty(&self, counterparty: &str) -> FeederResult<()> {
        write(&self.rejected_counterparties)?.insert(counterparty.to_string());
        Ok(())
    }

    /// All recorded transactions in submission order
    pub fn entries(&self) -> FeederResult<Vec<LedgerEntry>> {
        Ok(read(&self.entries)?.clone())
    }

    /// Recorded transactions for a single account
    pub fn entries_for(&self, account_id: &str) -> FeederResult<Vec<LedgerEntry>> {
        Ok(read(&self.entries)?
            .iter()
            .filter(|entry| entry.account_id == account_id)
            .cloned()
            .collect())
    }

    /// Current holdings of an account, if any were pushed
    pub fn holdings_for(&self, account_id: &str) -> FeederResult<Option<Portfolio>> {
        Ok(read(&self.holdings)?.get(account_id).cloned())
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) -> FeederResult<()> {
        write(&self.entries)?.clear();
        write(&self.holdings)?.clear();
        Ok(())
    }
}

fn read<T>(lock: &RwLock<T>) -> FeederResult<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|_| FeederError::Ledger("memory ledger lock poisoned".to_string()))
}

fn write<T>(lock: &RwLock<T>) -> FeederResult<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|_| FeederError::Ledger("memory ledger lock poisoned".to_string()))
}

#[async_trait]
impl LedgerClient for MemoryLedger {
    async fn add_transaction(
        &mut self,
        transaction: &Transaction,
        account_id: &str,
        category_id: Option<&str>,
        update_balance: bool,
    ) -> FeederResult<()> {
        if read(&self.rejected_counterparties)?.contains(&transaction.counterparty_account) {
            return Err(FeederError::Ledger(format!(
                "submission rejected for counterparty '{}'",
                transaction.counterparty_account
            )));
        }

        write(&self.entries)?.push(LedgerEntry {
            account_id: account_id.to_string(),
            category_id: category_id.map(str::to_string),
            update_balance,
            transaction: transaction.clone(),
        });
        Ok(())
    }

    async fn update_holdings(
        &mut self,
        account_id: &str,
        portfolio: &Portfolio,
    ) -> FeederResult<()> {
        write(&self.holdings)?.insert(account_id.to_string(), portfolio.clone());
        Ok(())
    }
}
