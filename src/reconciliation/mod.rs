//! Snapshot reconciliation
//!
//! Two successive captures of the same account's history overlap almost
//! entirely. [`diff`] finds the transactions that appeared between them so
//! only those are replayed into the ledger.
//!
//! Transactions are matched by `(date, amount)` only. Descriptions and
//! account names are not stable across captures, so they never take part.
//! Within a group the first `new_count - old_count` entries are reported as
//! new. When a group holds several entries both before and after, this can
//! pick the wrong members of the group; the counts are always right, the
//! choice of which member is not.

use std::collections::HashMap;

use crate::types::{GroupKey, Transaction};

/// Transactions in `new_log` not yet accounted for in `old_log`.
///
/// Output follows first appearance of each `(date, amount)` group in
/// `new_log`, and original order inside a group. Never fails; empty inputs
/// give well-defined (possibly empty) output.
pub fn diff(new_log: &[Transaction], old_log: &[Transaction]) -> Vec<Transaction> {
    let old_counts = count_by_group(old_log);

    group_by_date_and_amount(new_log)
        .into_iter()
        .flat_map(|(key, members)| {
            let seen = old_counts.get(&key).copied().unwrap_or(0);
            let surplus = members.len().saturating_sub(seen);
            members.into_iter().take(surplus)
        })
        .cloned()
        .collect()
}

/// Partition `log` by `(date, amount)`, keeping first-seen key order
fn group_by_date_and_amount(log: &[Transaction]) -> Vec<(GroupKey, Vec<&Transaction>)> {
    let mut index: HashMap<GroupKey, usize> = HashMap::new();
    let mut groups: Vec<(GroupKey, Vec<&Transaction>)> = Vec::new();

    for transaction in log {
        let key = transaction.grouping_key();
        match index.get(&key) {
            Some(&position) => groups[position].1.push(transaction),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push((key, vec![transaction]));
            }
        }
    }

    groups
}

fn count_by_group(log: &[Transaction]) -> HashMap<GroupKey, usize> {
    let mut counts = HashMap::new();
    for transaction in log {
        *counts.entry(transaction.grouping_key()).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use chrono::NaiveDate;
    use std::str::FromStr;

    fn txn(date: &str, counterparty: &str, amount: &str) -> Transaction {
        Transaction::new(
            NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            "401k".to_string(),
            counterparty.to_string(),
            BigDecimal::from_str(amount).unwrap(),
        )
    }

    fn sample_log() -> Vec<Transaction> {
        vec![
            txn("2024-01-01", "Employer", "50"),
            txn("2024-01-01", "Employer Match", "50"),
            txn("2024-01-02", "Payroll", "10"),
            txn("2024-01-15", "Employer", "50"),
            txn("2024-01-15", "Dividend", "3.21"),
        ]
    }

    #[test]
    fn test_diff_against_itself_is_empty() {
        let log = sample_log();
        assert!(diff(&log, &log).is_empty());
    }

    #[test]
    fn test_diff_against_empty_baseline_returns_everything() {
        let log = sample_log();
        assert_eq!(diff(&log, &[]), log);
    }

    #[test]
    fn test_empty_new_log_yields_nothing() {
        assert!(diff(&[], &sample_log()).is_empty());
        assert!(diff(&[], &[]).is_empty());
    }

    #[test]
    fn test_scenario_surplus_in_one_group() {
        let new_log = vec![
            txn("2024-01-01", "Employer", "50"),
            txn("2024-01-01", "Employer Match", "50"),
            txn("2024-01-02", "Payroll", "10"),
        ];
        let old_log = vec![txn("2024-01-01", "Employer", "50")];

        let result = diff(&new_log, &old_log);

        // Head of the surplus group is reported, even though the old entry
        // matches it by counterparty.
        assert_eq!(result.len(), 2);
        assert_eq!(result, vec![new_log[0].clone(), new_log[2].clone()]);
    }

    #[test]
    fn test_scenario_exact_count_match() {
        let new_log = vec![txn("2024-03-05", "HSA Deposit", "100.00")];
        let old_log = vec![txn("2024-03-05", "HSA Deposit", "100.00")];

        assert!(diff(&new_log, &old_log).is_empty());
    }

    #[test]
    fn test_scenario_coincidental_collisions_are_not_new() {
        let new_log = vec![
            txn("2024-03-05", "Pharmacy", "100.00"),
            txn("2024-03-05", "Clinic", "100.00"),
        ];
        let old_log = vec![
            txn("2024-03-05", "Lab", "100.00"),
            txn("2024-03-05", "Dentist", "100.00"),
        ];

        // Counterparties differ entirely, but the counts match.
        assert!(diff(&new_log, &old_log).is_empty());
    }

    #[test]
    fn test_fewer_new_entries_than_old_yields_nothing() {
        let new_log = vec![txn("2024-03-05", "Pharmacy", "20")];
        let old_log = vec![
            txn("2024-03-05", "Pharmacy", "20"),
            txn("2024-03-05", "Clinic", "20"),
        ];

        assert!(diff(&new_log, &old_log).is_empty());
    }

    #[test]
    fn test_amounts_grouped_numerically() {
        let new_log = vec![
            txn("2024-03-05", "Pharmacy", "100"),
            txn("2024-03-05", "Clinic", "100.00"),
        ];
        let old_log = vec![txn("2024-03-05", "Pharmacy", "100.0")];

        let result = diff(&new_log, &old_log);
        assert_eq!(result, vec![new_log[0].clone()]);
    }

    #[test]
    fn test_description_does_not_affect_matching() {
        let new_log = vec![txn("2024-02-01", "Employer", "75")
            .with_description("Contribution - pay period 3".to_string())];
        let old_log = vec![txn("2024-02-01", "Employer", "75")
            .with_description("Pending contribution".to_string())];

        assert!(diff(&new_log, &old_log).is_empty());
    }

    #[test]
    fn test_output_follows_first_seen_group_order() {
        let new_log = vec![
            txn("2024-01-03", "A", "1"),
            txn("2024-01-01", "B", "2"),
            txn("2024-01-03", "C", "1"),
            txn("2024-01-02", "D", "3"),
        ];

        let result = diff(&new_log, &[]);
        let counterparties: Vec<&str> = result
            .iter()
            .map(|t| t.counterparty_account.as_str())
            .collect();
        assert_eq!(counterparties, vec!["A", "C", "B", "D"]);
    }

    #[test]
    fn test_reordering_old_log_does_not_change_result() {
        let new_log = sample_log();
        let old_log = vec![
            txn("2024-01-01", "Employer", "50"),
            txn("2024-01-02", "Payroll", "10"),
            txn("2024-01-15", "Dividend", "3.21"),
        ];
        let mut reversed = old_log.clone();
        reversed.reverse();

        assert_eq!(diff(&new_log, &old_log), diff(&new_log, &reversed));
    }

    #[test]
    fn test_reordering_new_log_keeps_selection_within_group() {
        let old_log = vec![txn("2024-01-01", "Employer", "50")];
        let new_log = vec![
            txn("2024-01-01", "Employer", "50"),
            txn("2024-01-02", "Payroll", "10"),
            txn("2024-01-01", "Employer Match", "50"),
            txn("2024-01-01", "Bonus", "50"),
        ];
        // Same relative order inside the (2024-01-01, 50) group, other group moved first.
        let reordered = vec![
            new_log[1].clone(),
            new_log[0].clone(),
            new_log[2].clone(),
            new_log[3].clone(),
        ];

        let mut original = diff(&new_log, &old_log);
        let mut moved = diff(&reordered, &old_log);
        assert_eq!(original.len(), 3);
        assert_ne!(original, moved);

        original.sort_by(|a, b| a.counterparty_account.cmp(&b.counterparty_account));
        moved.sort_by(|a, b| a.counterparty_account.cmp(&b.counterparty_account));
        assert_eq!(original, moved);
        assert!(original.iter().all(|t| t.counterparty_account != "Bonus"));
    }

    #[test]
    fn test_output_is_drawn_from_new_log() {
        let new_log = sample_log();
        let old_log = vec![txn("2024-01-15", "Employer", "50")];

        for transaction in diff(&new_log, &old_log) {
            assert!(new_log.contains(&transaction));
        }
    }
}
