//! Core types and data structures for snapshot reconciliation

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use crate::traits::{DefaultTransactionValidator, TransactionValidator};
use crate::utils::validation::{validate_positive_amount, validate_ticker};

/// Date format used by every snapshot file
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Key under which transactions are grouped during reconciliation
pub type GroupKey = (NaiveDate, BigDecimal);

/// Key that defines transaction equality for duplicate detection
pub type IdentityKey<'a> = (NaiveDate, &'a str, &'a str, BigDecimal);

/// A single transaction as captured from an external platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Calendar date the transaction posted
    #[serde(with = "date_format")]
    pub date: NaiveDate,
    /// Account on the user's side of the transaction
    pub user_account: String,
    /// The other party (employer, fund, merchant, ...)
    pub counterparty_account: String,
    /// Signed or unsigned amount, currency-agnostic
    #[serde(deserialize_with = "amount_format::deserialize")]
    pub amount: BigDecimal,
    /// Free-form description. Never used for identity or grouping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Transaction {
    /// Create a new transaction without a description
    pub fn new(
        date: NaiveDate,
        user_account: String,
        counterparty_account: String,
        amount: BigDecimal,
    ) -> Self {
        Self {
            date,
            user_account,
            counterparty_account,
            amount,
            description: None,
        }
    }

    /// Attach a description
    pub fn with_description(mut self, description: String) -> Self {
        self.description = Some(description);
        self
    }

    /// Identity tuple `(date, user_account, counterparty_account, amount)`.
    /// Amounts are normalized so `100.00` and `100` compare equal.
    pub fn identity(&self) -> IdentityKey<'_> {
        (
            self.date,
            self.user_account.as_str(),
            self.counterparty_account.as_str(),
            self.amount.normalized(),
        )
    }

    /// Reconciliation key `(date, amount)`
    pub fn grouping_key(&self) -> GroupKey {
        (self.date, self.amount.normalized())
    }
}

/// Ordered sequence of transactions with no duplicates under [`Transaction::identity`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TransactionLog {
    transactions: Vec<Transaction>,
}

impl TransactionLog {
    /// Build a log, rejecting duplicate transactions
    pub fn new(transactions: Vec<Transaction>) -> FeederResult<Self> {
        Self::with_validator(transactions, &DefaultTransactionValidator)
    }

    /// Build a log, running every transaction through `validator` first
    pub fn with_validator(
        transactions: Vec<Transaction>,
        validator: &dyn TransactionValidator,
    ) -> FeederResult<Self> {
        for transaction in &transactions {
            validator.validate_transaction(transaction)?;
        }

        let mut seen = HashSet::with_capacity(transactions.len());
        for transaction in &transactions {
            if !seen.insert(transaction.identity()) {
                return Err(duplicate_error(transaction));
            }
        }

        Ok(Self { transactions })
    }

    /// An empty log, used as the baseline when no earlier snapshot exists
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a log from JSON.
    ///
    /// Accepts either a bare array of transactions or an object of the form
    /// `{"transactions": [...]}`.
    pub fn from_json_str(json: &str) -> FeederResult<Self> {
        Self::from_json_str_with_validator(json, &DefaultTransactionValidator)
    }

    /// Parse a log from JSON with a custom validator
    pub fn from_json_str_with_validator(
        json: &str,
        validator: &dyn TransactionValidator,
    ) -> FeederResult<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_value(value, validator)
    }

    /// Parse a log from any reader
    pub fn from_reader<R: Read>(reader: R) -> FeederResult<Self> {
        let value: serde_json::Value = serde_json::from_reader(reader)?;
        Self::from_value(value, &DefaultTransactionValidator)
    }

    /// Load a log from a snapshot file
    pub fn from_json_file(path: impl AsRef<Path>) -> FeederResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| FeederError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(BufReader::new(file))
    }

    fn from_value(
        value: serde_json::Value,
        validator: &dyn TransactionValidator,
    ) -> FeederResult<Self> {
        let records = match value {
            serde_json::Value::Object(mut object) => object
                .remove("transactions")
                .ok_or_else(|| {
                    FeederError::Validation(
                        "Transaction log object must contain a 'transactions' array".to_string(),
                    )
                })?,
            other => other,
        };

        let transactions: Vec<Transaction> = serde_json::from_value(records)?;
        Self::with_validator(transactions, validator)
    }

    /// Transactions in their original order
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Transaction> {
        self.transactions.iter()
    }

    /// Consume the log and return the underlying transactions
    pub fn into_inner(self) -> Vec<Transaction> {
        self.transactions
    }

    /// Transactions in `self` not yet accounted for in `old`.
    ///
    /// See [`crate::reconciliation::diff`] for the matching policy. The result
    /// is a sub-sequence of `self`, so it upholds the log invariant as well.
    pub fn diff(&self, old: &TransactionLog) -> TransactionLog {
        TransactionLog {
            transactions: crate::reconciliation::diff(&self.transactions, &old.transactions),
        }
    }
}

impl<'a> IntoIterator for &'a TransactionLog {
    type Item = &'a Transaction;
    type IntoIter = std::slice::Iter<'a, Transaction>;

    fn into_iter(self) -> Self::IntoIter {
        self.transactions.iter()
    }
}

fn duplicate_error(transaction: &Transaction) -> FeederError {
    FeederError::DuplicateTransaction(format!(
        "{} {} -> {} {}",
        transaction.date,
        transaction.user_account,
        transaction.counterparty_account,
        transaction.amount
    ))
}

/// A single portfolio position
///
/// Deserializing goes through [`Holding::new`], so a parsed holding is
/// already validated and upper-cased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawHolding")]
pub struct Holding {
    /// Upper-case alphabetic ticker
    pub stock_ticker: String,
    /// Number of shares held, always positive
    pub shares: BigDecimal,
    /// Identifier of the holding on the ledger side, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub holding_id: Option<String>,
}

#[derive(Deserialize)]
struct RawHolding {
    stock_ticker: String,
    #[serde(deserialize_with = "amount_format::deserialize")]
    shares: BigDecimal,
    #[serde(default)]
    holding_id: Option<String>,
}

impl TryFrom<RawHolding> for Holding {
    type Error = FeederError;

    fn try_from(raw: RawHolding) -> Result<Self, Self::Error> {
        Holding::new(raw.stock_ticker, raw.shares, raw.holding_id)
    }
}

impl Holding {
    /// Create a validated holding. The ticker is upper-cased.
    pub fn new(
        stock_ticker: String,
        shares: BigDecimal,
        holding_id: Option<String>,
    ) -> FeederResult<Self> {
        Self {
            stock_ticker,
            shares,
            holding_id,
        }
        .normalized()
    }

    fn normalized(mut self) -> FeederResult<Self> {
        validate_ticker(&self.stock_ticker)?;
        validate_positive_amount(&self.shares)?;
        self.stock_ticker = self.stock_ticker.to_uppercase();
        Ok(self)
    }
}

/// Share count and ledger id of a holding, keyed by ticker in [`Portfolio::to_map`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldingData {
    pub shares: BigDecimal,
    pub holding_id: Option<String>,
}

/// Point-in-time capture of an account's holdings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Portfolio {
    holdings: Vec<Holding>,
}

#[derive(Deserialize)]
struct RawPortfolio {
    holdings: Vec<Holding>,
}

impl Portfolio {
    /// Build a portfolio, validating every holding and rejecting repeated tickers
    pub fn new(holdings: Vec<Holding>) -> FeederResult<Self> {
        let holdings = holdings
            .into_iter()
            .map(Holding::normalized)
            .collect::<FeederResult<Vec<_>>>()?;

        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();
        for holding in &holdings {
            if !seen.insert(holding.stock_ticker.as_str())
                && !duplicates.contains(&holding.stock_ticker.as_str())
            {
                duplicates.push(holding.stock_ticker.as_str());
            }
        }
        if !duplicates.is_empty() {
            return Err(FeederError::Validation(format!(
                "Duplicate stock tickers found: {}",
                duplicates.join(", ")
            )));
        }

        Ok(Self { holdings })
    }

    /// Parse a portfolio from JSON of the form `{"holdings": [...]}`
    pub fn from_json_str(json: &str) -> FeederResult<Self> {
        let raw: RawPortfolio = serde_json::from_str(json)?;
        Self::new(raw.holdings)
    }

    /// Load a portfolio from a snapshot file
    pub fn from_json_file(path: impl AsRef<Path>) -> FeederResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| FeederError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let raw: RawPortfolio = serde_json::from_reader(BufReader::new(file))?;
        Self::new(raw.holdings)
    }

    pub fn holdings(&self) -> &[Holding] {
        &self.holdings
    }

    /// Number of distinct positions
    pub fn total_positions(&self) -> usize {
        self.holdings.len()
    }

    /// Look up a holding by ticker, case-insensitively
    pub fn holding_by_ticker(&self, ticker: &str) -> Option<&Holding> {
        let ticker = ticker.to_uppercase();
        self.holdings.iter().find(|h| h.stock_ticker == ticker)
    }

    /// All holdings keyed by ticker
    pub fn to_map(&self) -> HashMap<String, HoldingData> {
        self.holdings
            .iter()
            .map(|h| {
                (
                    h.stock_ticker.clone(),
                    HoldingData {
                        shares: h.shares.clone(),
                        holding_id: h.holding_id.clone(),
                    },
                )
            })
            .collect()
    }
}

/// Errors that can occur while loading, reconciling or syncing snapshots
#[derive(Debug, thiserror::Error)]
pub enum FeederError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Duplicate transaction: {0}")]
    DuplicateTransaction(String),
    #[error("No snapshots found for {name} in {}", dir.display())]
    NoSnapshots { name: String, dir: PathBuf },
    #[error("Ledger error: {0}")]
    Ledger(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for feeder operations
pub type FeederResult<T> = Result<T, FeederError>;

mod date_format {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::DATE_FORMAT;

    pub fn serialize<S>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&date.format(DATE_FORMAT))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        if !has_date_shape(&raw) {
            return Err(serde::de::Error::custom(format!(
                "date '{raw}' must be in YYYY-MM-DD format"
            )));
        }
        NaiveDate::parse_from_str(&raw, DATE_FORMAT).map_err(|_| {
            serde::de::Error::custom(format!("date '{raw}' must be in YYYY-MM-DD format"))
        })
    }

    /// Four-digit year, then one- or two-digit month and day. chrono's `%Y`
    /// alone would also take a sign or leading whitespace.
    fn has_date_shape(raw: &str) -> bool {
        let mut parts = raw.split('-');
        let widths = [4..=4, 1..=2, 1..=2];
        let shaped = widths.iter().all(|width| {
            parts.next().is_some_and(|part| {
                width.contains(&part.len()) && part.bytes().all(|b| b.is_ascii_digit())
            })
        });
        shaped && parts.next().is_none()
    }
}

mod amount_format {
    use bigdecimal::BigDecimal;
    use serde::de::{self, Visitor};
    use serde::Deserializer;
    use std::fmt;
    use std::str::FromStr;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BigDecimal, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(AmountVisitor)
    }

    struct AmountVisitor;

    impl<'de> Visitor<'de> for AmountVisitor {
        type Value = BigDecimal;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a decimal number or a numeric string")
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<BigDecimal, E> {
            Ok(BigDecimal::from(v))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<BigDecimal, E> {
            Ok(BigDecimal::from(v))
        }

        // Shortest round-trip text keeps `100.1` as 100.1 rather than its binary expansion.
        fn visit_f64<E: de::Error>(self, v: f64) -> Result<BigDecimal, E> {
            if !v.is_finite() {
                return Err(E::custom(format!("amount {v} is not finite")));
            }
            BigDecimal::from_str(&v.to_string())
                .map_err(|e| E::custom(format!("invalid amount {v}: {e}")))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<BigDecimal, E> {
            BigDecimal::from_str(v.trim())
                .map_err(|_| E::custom(format!("non-numeric amount '{v}'")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_load_bare_array() {
        let log = TransactionLog::from_json_str(
            r#"[
                {"date": "2024-01-01", "user_account": "401k", "counterparty_account": "Employer", "amount": 50.0},
                {"date": "2024-01-02", "user_account": "401k", "counterparty_account": "Payroll", "amount": "10.25"}
            ]"#,
        )
        .unwrap();

        assert_eq!(log.len(), 2);
        assert_eq!(log.transactions()[0].date, date(2024, 1, 1));
        assert_eq!(log.transactions()[0].amount, BigDecimal::from(50));
        assert_eq!(
            log.transactions()[1].amount,
            BigDecimal::from_str("10.25").unwrap()
        );
        assert_eq!(log.transactions()[1].description, None);
    }

    #[test]
    fn test_load_wrapped_object() {
        let log = TransactionLog::from_json_str(
            r#"{"transactions": [
                {"date": "2024-03-05", "user_account": "HSA", "counterparty_account": "Pharmacy", "amount": -12.5, "description": "Copay"}
            ]}"#,
        )
        .unwrap();

        assert_eq!(log.len(), 1);
        assert_eq!(
            log.transactions()[0].amount,
            BigDecimal::from_str("-12.5").unwrap()
        );
        assert_eq!(log.transactions()[0].description.as_deref(), Some("Copay"));
    }

    #[test]
    fn test_float_amount_keeps_decimal_text() {
        let log = TransactionLog::from_json_str(
            r#"[{"date": "2024-01-01", "user_account": "a", "counterparty_account": "b", "amount": 100.1}]"#,
        )
        .unwrap();
        assert_eq!(
            log.transactions()[0].amount,
            BigDecimal::from_str("100.1").unwrap()
        );
    }

    #[test]
    fn test_malformed_date_rejected() {
        let result = TransactionLog::from_json_str(
            r#"[{"date": "01/02/2024", "user_account": "a", "counterparty_account": "b", "amount": 1}]"#,
        );
        let err = result.unwrap_err();
        assert!(matches!(err, FeederError::Json(_)));
        assert!(err.to_string().contains("YYYY-MM-DD"));

        let result = TransactionLog::from_json_str(
            r#"[{"date": "2024-02-30", "user_account": "a", "counterparty_account": "b", "amount": 1}]"#,
        );
        assert!(result.is_err());

        for raw in [
            "-2024-01-01",
            "+2024-01-01",
            " 2024-01-01",
            "2024-01-01 ",
            "02024-01-01",
            "2024-001-01",
            "2024-01-01-01",
        ] {
            let json = format!(
                r#"[{{"date": "{raw}", "user_account": "a", "counterparty_account": "b", "amount": 1}}]"#
            );
            let err = TransactionLog::from_json_str(&json).unwrap_err();
            assert!(err.to_string().contains("YYYY-MM-DD"), "accepted {raw:?}");
        }
    }

    #[test]
    fn test_unpadded_month_and_day_accepted() {
        let log = TransactionLog::from_json_str(
            r#"[{"date": "2024-1-5", "user_account": "a", "counterparty_account": "b", "amount": 1}]"#,
        )
        .unwrap();
        assert_eq!(log.transactions()[0].date, date(2024, 1, 5));
    }

    #[test]
    fn test_non_numeric_amount_rejected() {
        let result = TransactionLog::from_json_str(
            r#"[{"date": "2024-01-01", "user_account": "a", "counterparty_account": "b", "amount": "fifty"}]"#,
        );
        let err = result.unwrap_err();
        assert!(err.to_string().contains("non-numeric amount"));

        let result = TransactionLog::from_json_str(
            r#"[{"date": "2024-01-01", "user_account": "a", "counterparty_account": "b", "amount": true}]"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_object_without_transactions_rejected() {
        let result = TransactionLog::from_json_str(r#"{"items": []}"#);
        assert!(matches!(result, Err(FeederError::Validation(_))));
    }

    #[test]
    fn test_duplicate_identity_rejected() {
        let txn = Transaction::new(
            date(2024, 1, 1),
            "401k".to_string(),
            "Employer".to_string(),
            BigDecimal::from(50),
        );
        let same_value = Transaction::new(
            date(2024, 1, 1),
            "401k".to_string(),
            "Employer".to_string(),
            BigDecimal::from_str("50.00").unwrap(),
        )
        .with_description("different text".to_string());

        let result = TransactionLog::new(vec![txn, same_value]);
        assert!(matches!(result, Err(FeederError::DuplicateTransaction(_))));
    }

    #[test]
    fn test_same_date_and_amount_with_distinct_accounts_allowed() {
        let log = TransactionLog::new(vec![
            Transaction::new(
                date(2024, 1, 1),
                "401k".to_string(),
                "Employer".to_string(),
                BigDecimal::from(50),
            ),
            Transaction::new(
                date(2024, 1, 1),
                "401k".to_string(),
                "Employer Match".to_string(),
                BigDecimal::from(50),
            ),
        ])
        .unwrap();
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_serialize_log_as_array() {
        let log = TransactionLog::new(vec![Transaction::new(
            date(2024, 1, 1),
            "401k".to_string(),
            "Employer".to_string(),
            BigDecimal::from_str("50.5").unwrap(),
        )])
        .unwrap();

        let json = serde_json::to_value(&log).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["date"], "2024-01-01");
        assert!(json[0].get("description").is_none());

        let reloaded = TransactionLog::from_json_str(&json.to_string()).unwrap();
        assert_eq!(reloaded, log);
    }

    #[test]
    fn test_portfolio_normalizes_tickers() {
        let portfolio = Portfolio::from_json_str(
            r#"{"holdings": [
                {"stock_ticker": "vti", "shares": 12.5},
                {"stock_ticker": "BND", "shares": 3, "holding_id": "h-1"}
            ]}"#,
        )
        .unwrap();

        assert_eq!(portfolio.total_positions(), 2);
        assert_eq!(portfolio.holdings()[0].stock_ticker, "VTI");
        assert_eq!(
            portfolio.holding_by_ticker("bnd").unwrap().holding_id.as_deref(),
            Some("h-1")
        );
        assert!(portfolio.holding_by_ticker("SPY").is_none());

        let map = portfolio.to_map();
        assert_eq!(map["VTI"].shares, BigDecimal::from_str("12.5").unwrap());
        assert_eq!(map["VTI"].holding_id, None);
    }

    #[test]
    fn test_portfolio_rejects_bad_holdings() {
        assert!(Portfolio::from_json_str(
            r#"{"holdings": [{"stock_ticker": "VTI", "shares": 0}]}"#
        )
        .is_err());
        assert!(Portfolio::from_json_str(
            r#"{"holdings": [{"stock_ticker": "BRK.B", "shares": 1}]}"#
        )
        .is_err());

        let err = Portfolio::from_json_str(
            r#"{"holdings": [{"stock_ticker": "VTI", "shares": -3}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("must be positive"));

        let err = Portfolio::from_json_str(
            r#"{"holdings": [
                {"stock_ticker": "vti", "shares": 1},
                {"stock_ticker": "VTI", "shares": 2}
            ]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Duplicate stock tickers found: VTI"));
    }

    #[test]
    fn test_holding_deserialize_validates() {
        let holding: Holding =
            serde_json::from_str(r#"{"stock_ticker": "vti", "shares": "2.5"}"#).unwrap();
        assert_eq!(holding.stock_ticker, "VTI");
        assert_eq!(holding.shares, BigDecimal::from_str("2.5").unwrap());
        assert_eq!(holding.holding_id, None);

        for json in [
            r#"{"stock_ticker": "BRK.B", "shares": 1}"#,
            r#"{"stock_ticker": "VTI", "shares": 0}"#,
            r#"{"stock_ticker": "", "shares": 1}"#,
        ] {
            assert!(serde_json::from_str::<Holding>(json).is_err(), "accepted {json}");
        }
    }

    #[test]
    fn test_log_iteration_and_ownership() {
        let log = TransactionLog::from_json_str(
            r#"[
                {"date": "2024-01-01", "user_account": "401k", "counterparty_account": "Employer", "amount": 50},
                {"date": "2024-01-02", "user_account": "401k", "counterparty_account": "Payroll", "amount": 10}
            ]"#,
        )
        .unwrap();

        let counterparties: Vec<&str> = log
            .iter()
            .map(|t| t.counterparty_account.as_str())
            .collect();
        assert_eq!(counterparties, vec!["Employer", "Payroll"]);
        assert_eq!((&log).into_iter().count(), log.len());

        let transactions = log.into_inner();
        assert_eq!(transactions.len(), 2);
        assert_eq!(transactions[1].date, date(2024, 1, 2));
    }
}
