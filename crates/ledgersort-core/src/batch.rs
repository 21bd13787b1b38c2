//! Fixed-size batching of transaction groups for model calls

use tracing::info;

use crate::models::TransactionGroup;

/// Split groups into consecutive batches of at most `batch_size`
///
/// Order is preserved and only the last batch may be short. A `batch_size`
/// of 0 is treated as 1.
pub fn batch(groups: Vec<TransactionGroup>, batch_size: usize) -> Vec<Vec<TransactionGroup>> {
    let size = batch_size.max(1);
    let mut batches = Vec::with_capacity(groups.len().div_ceil(size));
    let mut current = Vec::with_capacity(size);

    for group in groups {
        current.push(group);
        if current.len() == size {
            batches.push(std::mem::replace(&mut current, Vec::with_capacity(size)));
        }
    }
    if !current.is_empty() {
        batches.push(current);
    }

    info!(batches = batches.len(), batch_size = size, "Prepared batches of transaction groups");
    batches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(key: &str) -> TransactionGroup {
        TransactionGroup {
            short_description: key.to_string(),
            amounts: vec![1.0],
            dates: vec![],
            transaction_ids: vec![None],
            llm_category: None,
            llm_confidence: None,
            frequency: "1 time".to_string(),
        }
    }

    fn keys(batches: &[Vec<TransactionGroup>]) -> Vec<Vec<&str>> {
        batches
            .iter()
            .map(|b| b.iter().map(|g| g.short_description.as_str()).collect())
            .collect()
    }

    #[test]
    fn test_last_batch_may_be_short() {
        let groups = ["a", "b", "c", "d", "e", "f", "g"].map(group).to_vec();
        let batches = batch(groups, 5);
        assert_eq!(keys(&batches), vec![vec!["a", "b", "c", "d", "e"], vec!["f", "g"]]);
    }

    #[test]
    fn test_exact_multiple() {
        let groups = ["a", "b", "c", "d"].map(group).to_vec();
        let batches = batch(groups, 2);
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|b| b.len() == 2));
    }

    #[test]
    fn test_empty_and_zero_size() {
        assert!(batch(Vec::new(), 5).is_empty());
        let batches = batch(["a", "b"].map(group).to_vec(), 0);
        assert_eq!(keys(&batches), vec![vec!["a"], vec!["b"]]);
    }
}
