//! Grouping of unresolved transactions by short description

use std::collections::HashMap;

use tracing::{debug, info};

use crate::models::{CategorizedTransaction, TransactionGroup};

/// Fold transactions into groups keyed by their short description
///
/// Groups come out in first-seen order. Within a group, `amounts` and
/// `transaction_ids` keep input order while `dates` is sorted on its own.
pub fn group_transactions(transactions: &[CategorizedTransaction]) -> Vec<TransactionGroup> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<TransactionGroup> = Vec::new();

    for ct in transactions {
        let key = ct.short_description.as_str();
        let slot = *index.entry(key).or_insert_with(|| {
            groups.push(TransactionGroup {
                short_description: key.to_string(),
                amounts: Vec::new(),
                dates: Vec::new(),
                transaction_ids: Vec::new(),
                llm_category: None,
                llm_confidence: None,
                frequency: String::new(),
            });
            groups.len() - 1
        });

        let group = &mut groups[slot];
        group.amounts.push(ct.transaction.amount);
        group.dates.push(ct.transaction.date);
        group.transaction_ids.push(ct.transaction.id.clone());
    }

    for group in &mut groups {
        group.dates.sort();
        group.frequency = frequency(group);
        debug!(
            key = %group.short_description,
            count = group.len(),
            frequency = %group.frequency,
            "Built transaction group"
        );
    }

    info!(
        transactions = transactions.len(),
        groups = groups.len(),
        "Grouped transactions"
    );
    groups
}

/// "1 time", or "<n> times in <days> days" counting both end dates
pub fn frequency(group: &TransactionGroup) -> String {
    match (group.dates.first(), group.dates.last()) {
        (Some(first), Some(last)) if group.dates.len() > 1 => {
            let days = (*last - *first).num_days() + 1;
            format!("{} times in {} days", group.dates.len(), days)
        }
        _ => "1 time".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Transaction;
    use chrono::NaiveDate;

    fn ct(id: &str, key: &str, date: &str, amount: f64) -> CategorizedTransaction {
        let tx = Transaction::new(
            Some(id),
            NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            key,
            amount,
        );
        let mut ct = CategorizedTransaction::unprocessed(tx, "");
        ct.processing_error = None;
        ct.short_description = key.to_string();
        ct
    }

    #[test]
    fn test_frequency_counts_inclusive_days() {
        let groups = group_transactions(&[
            ct("a", "zelle", "2024-03-05", -10.0),
            ct("b", "zelle", "2024-03-01", -20.0),
        ]);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].frequency, "2 times in 5 days");
    }

    #[test]
    fn test_single_transaction_frequency() {
        let groups = group_transactions(&[ct("a", "venmo", "2024-03-05", -10.0)]);
        assert_eq!(groups[0].frequency, "1 time");
    }

    #[test]
    fn test_same_day_repeats() {
        let groups = group_transactions(&[
            ct("a", "venmo", "2024-03-05", -10.0),
            ct("b", "venmo", "2024-03-05", -12.0),
        ]);
        assert_eq!(groups[0].frequency, "2 times in 1 days");
    }

    #[test]
    fn test_dates_sorted_independently_of_amounts() {
        let groups = group_transactions(&[
            ct("a", "zelle", "2024-03-05", -10.0),
            ct("b", "zelle", "2024-03-01", -20.0),
        ]);
        let g = &groups[0];

        assert_eq!(g.amounts, vec![-10.0, -20.0]);
        assert_eq!(
            g.transaction_ids,
            vec![Some("a".to_string()), Some("b".to_string())]
        );
        assert_eq!(
            g.dates,
            vec![
                NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
            ]
        );
    }

    #[test]
    fn test_groups_keep_first_seen_order() {
        let groups = group_transactions(&[
            ct("a", "zelle", "2024-03-05", -10.0),
            ct("b", "square", "2024-03-02", 300.0),
            ct("c", "zelle", "2024-03-06", -15.0),
        ]);

        let keys: Vec<_> = groups.iter().map(|g| g.short_description.as_str()).collect();
        assert_eq!(keys, vec!["zelle", "square"]);
        assert_eq!(groups[0].len(), 2);
        assert!(groups[0].llm_category.is_none());
    }

    #[test]
    fn test_empty_input() {
        assert!(group_transactions(&[]).is_empty());
    }
}
