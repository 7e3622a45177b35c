//! Validation utilities

use crate::traits::*;
use crate::types::*;
use bigdecimal::BigDecimal;

/// Validate that an amount is positive
pub fn validate_positive_amount(amount: &BigDecimal) -> FeederResult<()> {
    if *amount <= BigDecimal::from(0) {
        Err(FeederError::Validation(format!(
            "Amount must be positive, got {amount}"
        )))
    } else {
        Ok(())
    }
}

/// Validate that an account name is present
pub fn validate_account_name(field: &str, name: &str) -> FeederResult<()> {
    if name.trim().is_empty() {
        return Err(FeederError::Validation(format!("{field} cannot be empty")));
    }

    Ok(())
}

/// Validate that a stock ticker only contains letters
pub fn validate_ticker(ticker: &str) -> FeederResult<()> {
    if ticker.is_empty() || !ticker.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(FeederError::Validation(format!(
            "Stock ticker '{ticker}' must contain only letters"
        )));
    }

    Ok(())
}

/// Strict validator for scrapers that only report inflows
///
/// Requires both account names to be non-blank and the amount to be positive.
pub struct StrictTransactionValidator;

impl TransactionValidator for StrictTransactionValidator {
    fn validate_transaction(&self, transaction: &Transaction) -> FeederResult<()> {
        validate_account_name("user_account", &transaction.user_account)?;
        validate_account_name("counterparty_account", &transaction.counterparty_account)?;
        validate_positive_amount(&transaction.amount)?;

        Ok(())
    }
}
