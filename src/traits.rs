//! Traits for ledger abstraction and extensibility

use async_trait::async_trait;

use crate::types::*;

/// Ledger collaborator that receives reconciled data
///
/// This trait lets the sync driver push transactions and holdings into any
/// budgeting backend. Implementations report failure per call; the caller
/// decides whether a failure aborts anything.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Record a single transaction against a ledger account
    async fn add_transaction(
        &mut self,
        transaction: &Transaction,
        account_id: &str,
        category_id: Option<&str>,
        update_balance: bool,
    ) -> FeederResult<()>;

    /// Replace the holdings of a ledger account with `portfolio`
    async fn update_holdings(&mut self, account_id: &str, portfolio: &Portfolio)
        -> FeederResult<()>;
}

/// Trait for implementing custom transaction validation rules
pub trait TransactionValidator: Send + Sync {
    /// Validate a transaction before it joins a log
    fn validate_transaction(&self, transaction: &Transaction) -> FeederResult<()>;
}

/// Default transaction validator.
///
/// Dates and amounts are already well-typed once deserialized, so every
/// transaction is accepted; uniqueness is checked by the log itself.
pub struct DefaultTransactionValidator;

impl TransactionValidator for DefaultTransactionValidator {
    fn validate_transaction(&self, _transaction: &Transaction) -> FeederResult<()> {
        Ok(())
    }
}
