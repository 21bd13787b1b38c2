//! Model categorization of unresolved transactions
//!
//! Unresolved transactions are grouped by short description, the groups are
//! split into fixed-size batches, and each batch becomes one prompt. Batches
//! run one after another. A batch whose call or reply fails yields no results
//! and the run moves on to the next one.

use std::collections::HashMap;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::batch::batch;
use crate::config::PipelineConfig;
use crate::dictionary::{CategoryVocabulary, DictionaryStore};
use crate::error::Result;
use crate::grouping::group_transactions;
use crate::models::{CategorizedTransaction, ResolutionStage, TransactionGroup};
use crate::prompts::{Prompt, RenderedPrompt};
use crate::ranges::{parent_category, CategoryRange, CategoryRanges};

use super::parsing::parse_categorizations;
use super::types::{BatchOutcome, GroupRecord, ValidatedResult};
use super::{AIBackend, AIClient};

/// Counters from one `process_transactions` run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategorizerReport {
    pub groups: usize,
    pub batches: usize,
    pub failed_batches: usize,
    /// Model results that failed validation
    pub dropped_results: usize,
    /// Transactions that received a model category
    pub categorized: usize,
}

/// Prompts the model for groups the dictionaries could not resolve
pub struct AICategorizer<'a> {
    client: AIClient,
    vocabulary: &'a CategoryVocabulary,
    ranges: &'a CategoryRanges,
    prompt: Prompt,
    batch_size: usize,
    max_retries: u32,
    retry_backoff: Duration,
}

impl<'a> AICategorizer<'a> {
    pub fn new(
        client: AIClient,
        store: &'a DictionaryStore,
        prompt: Prompt,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            client,
            vocabulary: &store.vocabulary,
            ranges: &store.ranges,
            prompt,
            batch_size: config.batch_size,
            max_retries: config.model.max_retries,
            retry_backoff: config.model.retry_backoff,
        }
    }

    pub fn client(&self) -> &AIClient {
        &self.client
    }

    /// Render the categorization prompt for one batch
    pub fn build_prompt(&self, groups: &[TransactionGroup]) -> Result<RenderedPrompt> {
        let records: Vec<GroupRecord> = groups.iter().map(GroupRecord::from).collect();
        let groups_json = serde_json::to_string_pretty(&records)?;
        let categories = self.vocabulary.iter().collect::<Vec<_>>().join(", ");
        let guidance = range_guidance(self.ranges);
        let example = range_example(self.ranges, self.vocabulary);

        let mut vars = HashMap::new();
        vars.insert("categories", categories.as_str());
        vars.insert("range_guidance", guidance.as_str());
        vars.insert("range_example", example.as_str());
        vars.insert("groups", groups_json.as_str());

        Ok(self.prompt.render(&vars))
    }

    /// Categorize one batch of groups
    ///
    /// Never fails: transport or parse problems void the batch and are
    /// reported through `BatchOutcome::error`.
    pub async fn categorize_batch(&self, groups: &[TransactionGroup]) -> BatchOutcome {
        let prompt = match self.build_prompt(groups) {
            Ok(p) => p,
            Err(e) => {
                error!(error = %e, "Error creating prompt");
                return BatchOutcome::failed(e.to_string());
            }
        };

        let reply = match self.complete_with_retry(&prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(error = %e, groups = groups.len(), "Error calling model");
                return BatchOutcome::failed(e.to_string());
            }
        };

        match parse_categorizations(&reply, self.vocabulary) {
            Ok((results, dropped)) => {
                debug!(accepted = results.len(), dropped, "Batch categorized");
                BatchOutcome {
                    results,
                    dropped,
                    error: None,
                }
            }
            Err(e) => {
                error!(error = %e, "Unparsable model response");
                BatchOutcome::failed(e.to_string())
            }
        }
    }

    /// Call the model, retrying transient failures with exponential backoff
    async fn complete_with_retry(&self, prompt: &RenderedPrompt) -> Result<String> {
        let mut attempt = 0;
        loop {
            match self
                .client
                .complete(prompt.system.as_deref(), &prompt.user)
                .await
            {
                Ok(reply) => return Ok(reply),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let delay = self.retry_backoff * 2u32.saturating_pow(attempt);
                    warn!(
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Model call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Categorize every transaction still waiting on the model
    ///
    /// Results are matched back to transactions by short description. A
    /// transaction whose group got no valid result stays unresolved.
    pub async fn process_transactions(
        &self,
        transactions: &mut [CategorizedTransaction],
    ) -> CategorizerReport {
        let pending: Vec<CategorizedTransaction> = transactions
            .iter()
            .filter(|t| t.requires_model())
            .cloned()
            .collect();

        let groups = group_transactions(&pending);
        let mut report = CategorizerReport {
            groups: groups.len(),
            ..Default::default()
        };

        let mut categorized: HashMap<String, ValidatedResult> = HashMap::new();
        for (index, chunk) in batch(groups, self.batch_size).iter().enumerate() {
            report.batches += 1;
            let outcome = self.categorize_batch(chunk).await;
            if outcome.is_failed() {
                report.failed_batches += 1;
                warn!(batch = index + 1, "Batch yielded no categorizations");
            }
            report.dropped_results += outcome.dropped;
            for result in outcome.results {
                categorized.insert(result.short_description.clone(), result);
            }
        }

        for ct in transactions.iter_mut().filter(|t| t.requires_model()) {
            let Some(result) = categorized.get(&ct.short_description) else {
                continue;
            };
            ct.llm_category = Some(result.llm_category.clone());
            ct.llm_confidence = Some(result.llm_confidence);
            ct.percent_outside_range = self
                .ranges
                .deviation(ct.transaction.amount, &result.llm_category)
                .percent();
            ct.resolved_by = ResolutionStage::Model;
            report.categorized += 1;
        }

        info!(
            groups = report.groups,
            batches = report.batches,
            failed_batches = report.failed_batches,
            dropped_results = report.dropped_results,
            categorized = report.categorized,
            "Model categorization finished"
        );
        report
    }
}

/// One line per parent range, e.g. `- Revenue: $100.00 to $5,000.00`
pub fn range_guidance(ranges: &CategoryRanges) -> String {
    ranges
        .iter()
        .map(|r| {
            format!(
                "- {}: {} to {}",
                r.parent_category,
                format_money(r.min_amount),
                format_money(r.max_amount)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Worked in-range / out-of-range example for the prompt
///
/// Uses the Revenue range when there is one, otherwise the first range.
pub fn range_example(ranges: &CategoryRanges, vocabulary: &CategoryVocabulary) -> String {
    let Some(range) = ranges.get("Revenue").or_else(|| ranges.iter().next()) else {
        return String::new();
    };
    let category = vocabulary
        .iter()
        .find(|c| parent_category(c) == range.parent_category)
        .unwrap_or(range.parent_category.as_str());

    let inside = (range.min_amount + range.max_amount) / 2.0;
    let outside = outside_example(range);

    format!(
        "- A {} transaction categorized as \"{}\" is within the {} range ({} to {})\n\
         - A {} transaction categorized as \"{}\" should have a lower confidence score as it's outside the typical range",
        format_money(inside),
        category,
        range.parent_category,
        format_money(range.min_amount),
        format_money(range.max_amount),
        format_money(outside),
        category,
    )
}

fn outside_example(range: &CategoryRange) -> f64 {
    let width = (range.max_amount - range.min_amount).abs().max(1.0);
    if range.max_amount > 0.0 || range.min_amount >= 0.0 {
        range.max_amount + width * 10.0
    } else {
        range.min_amount - width * 10.0
    }
}

/// `$1,234.50`; negative amounts render as `$-1,234.50`
pub fn format_money(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!("${}{}.{:02}", sign, grouped, cents % 100)
}
