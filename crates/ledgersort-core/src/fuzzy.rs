//! Fuzzy dictionary matching
//!
//! Scores a normalized key against every dictionary entry with a
//! token-order-insensitive Indel ratio and keeps the best one.
//! Results are memoized per `(key, dictionary)` for the lifetime of the
//! matcher; dictionaries never change after load, so the cache is never
//! invalidated.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::{debug, info};

use crate::dictionary::{Dictionary, DictionaryStore};
use crate::error::{Error, Result};
use crate::models::{CategorizedTransaction, DictionaryKind, ResolutionStage, Transaction};
use crate::normalize::Normalizer;

/// Best category for a key and its confidence in [0, 1]
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub category: Option<String>,
    pub confidence: f64,
}

impl MatchResult {
    fn none() -> Self {
        Self {
            category: None,
            confidence: 0.0,
        }
    }
}

/// Lookup counters, useful for checking the cascade short-circuits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchStats {
    pub industry_lookups: usize,
    pub general_lookups: usize,
    pub cache_hits: usize,
}

impl MatchStats {
    pub fn lookups(&self, kind: DictionaryKind) -> usize {
        match kind {
            DictionaryKind::Industry => self.industry_lookups,
            DictionaryKind::General => self.general_lookups,
        }
    }
}

#[derive(Default)]
struct MatchCache {
    results: HashMap<(String, DictionaryKind), MatchResult>,
    stats: MatchStats,
}

/// Similarity in [0, 1] between two keys, ignoring token order
///
/// Both sides are reduced to lowercase alphanumeric tokens, sorted and joined
/// before comparison. The score is the Indel ratio `2 * lcs / (len_a + len_b)`
/// rounded to a whole percent.
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = sorted_tokens(a).chars().collect();
    let b: Vec<char> = sorted_tokens(b).chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let lcs = longest_common_subsequence(&a, &b);
    let ratio = 2.0 * lcs as f64 / (a.len() + b.len()) as f64;
    (ratio * 100.0).round() / 100.0
}

fn longest_common_subsequence(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut row = vec![0usize; b.len() + 1];
    for &ca in a {
        for (j, &cb) in b.iter().enumerate() {
            row[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(row[j])
            };
        }
        std::mem::swap(&mut prev, &mut row);
    }
    prev[b.len()]
}

fn sorted_tokens(s: &str) -> String {
    let cleaned: String = s
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .to_lowercase();
    let mut tokens: Vec<&str> = cleaned.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Dictionary cascade: industry first, then general
pub struct FuzzyMatcher<'a> {
    store: &'a DictionaryStore,
    normalizer: Normalizer,
    cache: Mutex<MatchCache>,
}

impl<'a> FuzzyMatcher<'a> {
    pub fn new(store: &'a DictionaryStore, normalizer: Normalizer) -> Self {
        Self {
            store,
            normalizer,
            cache: Mutex::new(MatchCache::default()),
        }
    }

    pub fn store(&self) -> &DictionaryStore {
        self.store
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Best category for `key` in one of the loaded dictionaries
    ///
    /// Ties keep the first entry in dictionary order. An empty dictionary
    /// yields no category with confidence 0.
    pub fn best_match(&self, key: &str, kind: DictionaryKind) -> MatchResult {
        let cache_key = (key.to_string(), kind);
        {
            let mut cache = self.cache.lock().unwrap();
            match kind {
                DictionaryKind::Industry => cache.stats.industry_lookups += 1,
                DictionaryKind::General => cache.stats.general_lookups += 1,
            }
            if let Some(hit) = cache.results.get(&cache_key).cloned() {
                cache.stats.cache_hits += 1;
                return hit;
            }
        }

        let result = score_dictionary(key, self.store.dictionary(kind));
        debug!(
            key = %key,
            dictionary = %kind,
            category = ?result.category,
            confidence = result.confidence,
            "Dictionary match"
        );

        self.cache
            .lock()
            .unwrap()
            .results
            .entry(cache_key)
            .or_insert_with(|| result.clone());
        result
    }

    /// Run one transaction through the dictionary cascade
    ///
    /// The general dictionary is only consulted when the industry match is
    /// below `threshold`. Anything still below threshold after both lookups
    /// is left unresolved for the model stage.
    pub fn process_transaction(
        &self,
        transaction: &Transaction,
        threshold: f64,
    ) -> Result<CategorizedTransaction> {
        validate_transaction(transaction)?;

        let short_description = self.normalizer.normalize(&transaction.description);
        let industry = self.best_match(&short_description, DictionaryKind::Industry);

        let mut result = CategorizedTransaction {
            transaction: transaction.clone(),
            short_description,
            industry_category: industry.category,
            industry_confidence: industry.confidence,
            general_category: None,
            general_confidence: None,
            llm_category: None,
            llm_confidence: None,
            percent_outside_range: None,
            resolved_by: ResolutionStage::IndustryDictionary,
            processing_error: None,
        };

        if result.industry_confidence >= threshold && result.industry_category.is_some() {
            return Ok(result);
        }

        let general = self.best_match(&result.short_description, DictionaryKind::General);
        let general_resolves = general.confidence >= threshold && general.category.is_some();
        result.general_category = general.category;
        result.general_confidence = Some(general.confidence);
        result.resolved_by = if general_resolves {
            ResolutionStage::GeneralDictionary
        } else {
            ResolutionStage::Unresolved
        };

        Ok(result)
    }

    /// Process a list of transactions, passing failed records through
    pub fn process_all(
        &self,
        transactions: &[Transaction],
        threshold: f64,
    ) -> Vec<CategorizedTransaction> {
        let processed: Vec<_> = transactions
            .iter()
            .map(|tx| match self.process_transaction(tx, threshold) {
                Ok(ct) => ct,
                Err(e) => {
                    tracing::error!(
                        id = ?tx.id,
                        description = %tx.description,
                        error = %e,
                        "Error processing transaction"
                    );
                    CategorizedTransaction::unprocessed(tx.clone(), e.to_string())
                }
            })
            .collect();

        let industry_matches = processed
            .iter()
            .filter(|t| t.industry_category.is_some())
            .count();
        let general_matches = processed
            .iter()
            .filter(|t| t.general_category.is_some())
            .count();
        let model_needed = processed.iter().filter(|t| t.requires_model()).count();
        info!(
            total = processed.len(),
            industry_matches, general_matches, model_needed, "Matching statistics"
        );

        processed
    }

    pub fn stats(&self) -> MatchStats {
        self.cache.lock().unwrap().stats
    }

    /// Number of memoized `(key, dictionary)` results
    pub fn cached(&self) -> usize {
        self.cache.lock().unwrap().results.len()
    }
}

fn score_dictionary(key: &str, dictionary: &Dictionary) -> MatchResult {
    let mut best = MatchResult::none();
    for entry in dictionary.entries() {
        let score = token_sort_ratio(key, &entry.short_description);
        if score > best.confidence {
            best = MatchResult {
                category: Some(entry.category.clone()),
                confidence: score,
            };
        }
    }
    best
}

/// Per-record sanity checks; failures pass the record through unprocessed
fn validate_transaction(transaction: &Transaction) -> Result<()> {
    if !transaction.amount.is_finite() {
        return Err(Error::InvalidData(format!(
            "amount is not a finite number: {}",
            transaction.amount
        )));
    }
    if transaction.description.trim().is_empty() {
        return Err(Error::InvalidData("description is empty".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::DictionaryEntry;
    use crate::ranges::CategoryRanges;
    use chrono::NaiveDate;

    fn entry(key: &str, category: &str) -> DictionaryEntry {
        DictionaryEntry {
            short_description: key.to_string(),
            category: category.to_string(),
        }
    }

    fn store() -> DictionaryStore {
        DictionaryStore::new(
            Dictionary::new(
                DictionaryKind::Industry,
                [
                    entry("sysco", "Cost of Goods Sold: Food"),
                    entry("restaurant depot", "Cost of Goods Sold: Food"),
                ],
            ),
            Dictionary::new(
                DictionaryKind::General,
                [
                    entry("comcast", "Operating Expenses: Utilities"),
                    entry("gusto", "Payroll: Wages"),
                ],
            ),
            CategoryRanges::default(),
        )
    }

    fn tx(description: &str) -> Transaction {
        Transaction::new(
            None,
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            description,
            -120.0,
        )
    }

    #[test]
    fn test_token_sort_ratio() {
        assert_eq!(token_sort_ratio("sysco", "sysco"), 1.0);
        assert_eq!(token_sort_ratio("depot restaurant", "restaurant depot"), 1.0);
        assert_eq!(token_sort_ratio("", "sysco"), 0.0);
        assert_eq!(token_sort_ratio("abc", "xyz"), 0.0);
        let partial = token_sort_ratio("sysco foods", "sysco");
        assert!(partial > 0.0 && partial < 1.0);
    }

    #[test]
    fn test_token_sort_ratio_is_indel_based() {
        // lcs 9 over 12 + 9 characters: 18 / 21
        assert_eq!(token_sort_ratio("shell oil co", "shell oil"), 0.86);
        // lcs 7 over 13 + 7 characters: 14 / 20
        assert_eq!(token_sort_ratio("comcast cable", "comcast"), 0.7);
        assert_eq!(token_sort_ratio("co shell oil", "shell oil co"), 1.0);
    }

    #[test]
    fn test_near_match_resolves_in_general_dictionary() {
        let store = DictionaryStore::new(
            Dictionary::empty(DictionaryKind::Industry),
            Dictionary::new(DictionaryKind::General, [entry("shell oil", "Auto: Fuel")]),
            CategoryRanges::default(),
        );
        let matcher = FuzzyMatcher::new(&store, Normalizer::new());

        let ct = matcher.process_transaction(&tx("SHELL OIL CO"), 0.8).unwrap();

        assert_eq!(ct.resolved_by, ResolutionStage::GeneralDictionary);
        assert_eq!(ct.general_category.as_deref(), Some("Auto: Fuel"));
        assert_eq!(ct.general_confidence, Some(0.86));
    }

    #[test]
    fn test_best_match_empty_dictionary() {
        let store = DictionaryStore::new(
            Dictionary::empty(DictionaryKind::Industry),
            Dictionary::empty(DictionaryKind::General),
            CategoryRanges::default(),
        );
        let matcher = FuzzyMatcher::new(&store, Normalizer::new());
        let result = matcher.best_match("anything", DictionaryKind::Industry);
        assert_eq!(result, MatchResult::none());
    }

    #[test]
    fn test_ties_keep_first_entry() {
        let store = DictionaryStore::new(
            Dictionary::new(
                DictionaryKind::Industry,
                [entry("shell", "Auto: Fuel"), entry("shell", "Auto: Other")],
            ),
            Dictionary::empty(DictionaryKind::General),
            CategoryRanges::default(),
        );
        let matcher = FuzzyMatcher::new(&store, Normalizer::new());
        let result = matcher.best_match("shell", DictionaryKind::Industry);
        assert_eq!(result.category.as_deref(), Some("Auto: Fuel"));
    }

    #[test]
    fn test_best_match_is_idempotent_and_cached() {
        let store = store();
        let matcher = FuzzyMatcher::new(&store, Normalizer::new());

        let first = matcher.best_match("sysco", DictionaryKind::Industry);
        let second = matcher.best_match("sysco", DictionaryKind::Industry);

        assert_eq!(first, second);
        assert_eq!(matcher.cached(), 1);
        assert_eq!(matcher.stats().cache_hits, 1);
    }

    #[test]
    fn test_cache_is_keyed_per_dictionary() {
        let store = store();
        let matcher = FuzzyMatcher::new(&store, Normalizer::new());

        matcher.best_match("gusto", DictionaryKind::Industry);
        let general = matcher.best_match("gusto", DictionaryKind::General);

        assert_eq!(general.category.as_deref(), Some("Payroll: Wages"));
        assert_eq!(matcher.cached(), 2);
    }

    #[test]
    fn test_industry_match_skips_general_dictionary() {
        let store = store();
        let matcher = FuzzyMatcher::new(&store, Normalizer::new());

        let ct = matcher.process_transaction(&tx("SYSCO 01/02"), 0.8).unwrap();

        assert_eq!(ct.resolved_by, ResolutionStage::IndustryDictionary);
        assert_eq!(ct.industry_category.as_deref(), Some("Cost of Goods Sold: Food"));
        assert_eq!(ct.industry_confidence, 1.0);
        assert_eq!(ct.general_category, None);
        assert_eq!(ct.general_confidence, None);
        assert_eq!(matcher.stats().lookups(DictionaryKind::General), 0);
    }

    #[test]
    fn test_general_fallback() {
        let store = store();
        let matcher = FuzzyMatcher::new(&store, Normalizer::new());

        let ct = matcher.process_transaction(&tx("COMCAST CABLE 8005551234"), 0.8);
        let ct = ct.unwrap();

        assert_eq!(ct.short_description, "comcast cable");
        assert!(ct.industry_confidence < 0.8);
        assert_eq!(ct.resolved_by, ResolutionStage::Unresolved);
        assert_eq!(matcher.stats().general_lookups, 1);

        let ct = matcher.process_transaction(&tx("COMCAST"), 0.8).unwrap();
        assert_eq!(ct.resolved_by, ResolutionStage::GeneralDictionary);
        assert_eq!(ct.category(), Some("Operating Expenses: Utilities"));
        assert_eq!(ct.general_confidence, Some(1.0));
    }

    #[test]
    fn test_unmatched_requires_model() {
        let store = store();
        let matcher = FuzzyMatcher::new(&store, Normalizer::new());

        let ct = matcher.process_transaction(&tx("ZELLE TO MARIA"), 0.8).unwrap();
        assert!(ct.requires_model());
        assert_eq!(ct.llm_category, None);
    }

    #[test]
    fn test_bad_record_is_passed_through() {
        let store = store();
        let matcher = FuzzyMatcher::new(&store, Normalizer::new());
        let mut bad = tx("SYSCO");
        bad.amount = f64::NAN;

        let out = matcher.process_all(&[bad, tx("SYSCO")], 0.8);

        assert_eq!(out.len(), 2);
        assert!(out[0].processing_error.is_some());
        assert_eq!(out[0].short_description, "");
        assert!(!out[0].requires_model());
        assert_eq!(out[1].resolved_by, ResolutionStage::IndustryDictionary);
    }
}
