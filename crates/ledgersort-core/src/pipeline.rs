//! Categorization pipeline
//!
//! Stage 1 and 2 are the industry and general dictionaries; stage 3 sends
//! whatever is left to the model. Range deviation is computed for whichever
//! stage produced the final category.

use serde::Serialize;
use tracing::{info, warn};

use crate::ai::{AICategorizer, AIClient, CategorizerReport};
use crate::config::PipelineConfig;
use crate::dictionary::DictionaryStore;
use crate::fuzzy::FuzzyMatcher;
use crate::models::{CategorizedTransaction, ResolutionStage, Transaction};
use crate::normalize::Normalizer;
use crate::prompts::Prompt;

/// Per-stage counts for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub total: usize,
    pub industry_resolved: usize,
    pub general_resolved: usize,
    pub model_resolved: usize,
    /// Transactions left after both dictionaries
    pub sent_to_model: usize,
    pub unresolved: usize,
    pub processing_errors: usize,
    pub groups: usize,
    pub batches: usize,
    pub failed_batches: usize,
    pub dropped_results: usize,
    /// Categorized transactions whose amount is outside the parent range
    pub outside_range: usize,
}

/// Categorized transactions in input order, plus run statistics
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub transactions: Vec<CategorizedTransaction>,
    pub stats: PipelineStats,
}

pub struct CategorizationPipeline<'a> {
    store: &'a DictionaryStore,
    threshold: f64,
    matcher: FuzzyMatcher<'a>,
    categorizer: Option<AICategorizer<'a>>,
}

impl<'a> CategorizationPipeline<'a> {
    /// Dictionary-only pipeline; unresolved transactions stay uncategorized
    pub fn new(store: &'a DictionaryStore, config: &PipelineConfig) -> Self {
        Self {
            store,
            threshold: config.confidence_threshold,
            matcher: FuzzyMatcher::new(store, Normalizer::new()),
            categorizer: None,
        }
    }

    /// Enable the model stage
    pub fn with_model(mut self, client: AIClient, prompt: Prompt, config: &PipelineConfig) -> Self {
        self.categorizer = Some(AICategorizer::new(client, self.store, prompt, config));
        self
    }

    pub fn matcher(&self) -> &FuzzyMatcher<'a> {
        &self.matcher
    }

    pub fn has_model(&self) -> bool {
        self.categorizer.is_some()
    }

    /// Run every stage over `transactions`
    ///
    /// Per-record and per-batch failures are absorbed and show up in the
    /// stats; this never fails.
    pub async fn run(&self, transactions: &[Transaction]) -> PipelineOutput {
        info!(count = transactions.len(), threshold = self.threshold, "Starting categorization");

        let mut processed = self.matcher.process_all(transactions, self.threshold);

        for ct in processed.iter_mut() {
            if let Some(category) = ct.category() {
                ct.percent_outside_range = self
                    .store
                    .ranges
                    .deviation(ct.transaction.amount, category)
                    .percent();
            }
        }

        let sent_to_model = processed.iter().filter(|t| t.requires_model()).count();

        let report = match &self.categorizer {
            Some(categorizer) if sent_to_model > 0 => {
                categorizer.process_transactions(&mut processed).await
            }
            Some(_) => CategorizerReport::default(),
            None => {
                if sent_to_model > 0 {
                    warn!(
                        count = sent_to_model,
                        "No model backend configured, leaving transactions uncategorized"
                    );
                }
                CategorizerReport::default()
            }
        };

        let stats = collect_stats(&processed, sent_to_model, &report, self.store);
        info!(
            total = stats.total,
            industry = stats.industry_resolved,
            general = stats.general_resolved,
            model = stats.model_resolved,
            unresolved = stats.unresolved,
            outside_range = stats.outside_range,
            "Categorization statistics"
        );

        PipelineOutput {
            transactions: processed,
            stats,
        }
    }
}

fn collect_stats(
    processed: &[CategorizedTransaction],
    sent_to_model: usize,
    report: &CategorizerReport,
    store: &DictionaryStore,
) -> PipelineStats {
    let mut stats = PipelineStats {
        total: processed.len(),
        sent_to_model,
        groups: report.groups,
        batches: report.batches,
        failed_batches: report.failed_batches,
        dropped_results: report.dropped_results,
        ..Default::default()
    };

    for ct in processed {
        match ct.resolved_by {
            ResolutionStage::IndustryDictionary => stats.industry_resolved += 1,
            ResolutionStage::GeneralDictionary => stats.general_resolved += 1,
            ResolutionStage::Model => stats.model_resolved += 1,
            ResolutionStage::Unresolved => stats.unresolved += 1,
        }
        if ct.processing_error.is_some() {
            stats.processing_errors += 1;
        }
        if let Some(category) = ct.category() {
            if store.ranges.deviation(ct.transaction.amount, category).is_outside() {
                stats.outside_range += 1;
            }
        }
    }

    stats
}
