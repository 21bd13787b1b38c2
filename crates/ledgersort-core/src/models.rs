//! Data models for ledgersort

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A bank transaction as ingested
///
/// Immutable once loaded; the pipeline wraps it rather than editing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub date: NaiveDate,
    pub description: String,
    /// Negative = outflow, positive = inflow
    pub amount: f64,
}

impl Transaction {
    pub fn new(id: Option<&str>, date: NaiveDate, description: &str, amount: f64) -> Self {
        Self {
            id: id.map(str::to_string),
            date,
            description: description.to_string(),
            amount,
        }
    }
}

/// Which category dictionary an entry or match belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DictionaryKind {
    /// Industry-specific dictionary, consulted first
    Industry,
    /// General fallback dictionary
    General,
}

impl DictionaryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Industry => "industry",
            Self::General => "general",
        }
    }
}

impl std::fmt::Display for DictionaryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pipeline stage that produced a transaction's final category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStage {
    IndustryDictionary,
    GeneralDictionary,
    Model,
    /// No stage produced a confident category
    Unresolved,
}

impl ResolutionStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IndustryDictionary => "industry_dictionary",
            Self::GeneralDictionary => "general_dictionary",
            Self::Model => "model",
            Self::Unresolved => "unresolved",
        }
    }
}

impl std::fmt::Display for ResolutionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ResolutionStage {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "industry_dictionary" => Ok(Self::IndustryDictionary),
            "general_dictionary" => Ok(Self::GeneralDictionary),
            "model" => Ok(Self::Model),
            "unresolved" => Ok(Self::Unresolved),
            _ => Err(format!("Unknown resolution stage: {}", s)),
        }
    }
}

/// Transactions sharing one short description
///
/// `amounts` and `transaction_ids` keep insertion order, while `dates` is
/// sorted ascending on its own. Positions across the three vectors do not
/// line up once a group holds out-of-order dates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionGroup {
    pub short_description: String,
    pub amounts: Vec<f64>,
    pub dates: Vec<NaiveDate>,
    pub transaction_ids: Vec<Option<String>>,
    pub llm_category: Option<String>,
    pub llm_confidence: Option<f64>,
    /// e.g. "1 time" or "3 times in 45 days"
    pub frequency: String,
}

impl TransactionGroup {
    /// Number of transactions in the group
    pub fn len(&self) -> usize {
        self.amounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.amounts.is_empty()
    }
}

/// A transaction enriched with the results of every pipeline stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorizedTransaction {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub short_description: String,
    /// Best industry dictionary match (None renders as "N/A")
    pub industry_category: Option<String>,
    pub industry_confidence: f64,
    /// Only populated when the industry match fell below the threshold
    pub general_category: Option<String>,
    pub general_confidence: Option<f64>,
    pub llm_category: Option<String>,
    pub llm_confidence: Option<f64>,
    /// Signed deviation from the parent category's amount range
    pub percent_outside_range: Option<f64>,
    pub resolved_by: ResolutionStage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_error: Option<String>,
}

impl CategorizedTransaction {
    /// Pass a transaction through untouched after a per-record failure
    pub fn unprocessed(transaction: Transaction, error: impl Into<String>) -> Self {
        Self {
            transaction,
            short_description: String::new(),
            industry_category: None,
            industry_confidence: 0.0,
            general_category: None,
            general_confidence: None,
            llm_category: None,
            llm_confidence: None,
            percent_outside_range: None,
            resolved_by: ResolutionStage::Unresolved,
            processing_error: Some(error.into()),
        }
    }

    /// Category assigned by whichever stage resolved this transaction
    pub fn category(&self) -> Option<&str> {
        match self.resolved_by {
            ResolutionStage::IndustryDictionary => self.industry_category.as_deref(),
            ResolutionStage::GeneralDictionary => self.general_category.as_deref(),
            ResolutionStage::Model => self.llm_category.as_deref(),
            ResolutionStage::Unresolved => None,
        }
    }

    /// Confidence of the resolving stage
    pub fn confidence(&self) -> Option<f64> {
        match self.resolved_by {
            ResolutionStage::IndustryDictionary => Some(self.industry_confidence),
            ResolutionStage::GeneralDictionary => self.general_confidence,
            ResolutionStage::Model => self.llm_confidence,
            ResolutionStage::Unresolved => None,
        }
    }

    /// Still waiting on model categorization
    ///
    /// Records that failed per-record processing are never sent to the model.
    pub fn requires_model(&self) -> bool {
        self.resolved_by == ResolutionStage::Unresolved && self.processing_error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx() -> Transaction {
        Transaction::new(
            Some("t1"),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            "SYSCO FOODS",
            -250.0,
        )
    }

    #[test]
    fn test_unprocessed_is_not_sent_to_model() {
        let ct = CategorizedTransaction::unprocessed(tx(), "boom");
        assert_eq!(ct.resolved_by, ResolutionStage::Unresolved);
        assert!(!ct.requires_model());
        assert_eq!(ct.category(), None);
    }

    #[test]
    fn test_category_follows_resolving_stage() {
        let mut ct = CategorizedTransaction::unprocessed(tx(), "x");
        ct.processing_error = None;
        ct.industry_category = Some("COGS: Food".to_string());
        ct.industry_confidence = 0.4;
        ct.general_category = Some("Expenses: Supplies".to_string());
        ct.general_confidence = Some(0.9);
        ct.resolved_by = ResolutionStage::GeneralDictionary;

        assert_eq!(ct.category(), Some("Expenses: Supplies"));
        assert_eq!(ct.confidence(), Some(0.9));
        assert!(!ct.requires_model());
    }

    #[test]
    fn test_resolution_stage_round_trip() {
        for stage in [
            ResolutionStage::IndustryDictionary,
            ResolutionStage::GeneralDictionary,
            ResolutionStage::Model,
            ResolutionStage::Unresolved,
        ] {
            assert_eq!(stage.as_str().parse::<ResolutionStage>().unwrap(), stage);
        }
    }

    #[test]
    fn test_serialized_transaction_is_flattened() {
        let ct = CategorizedTransaction::unprocessed(tx(), "x");
        let value = serde_json::to_value(&ct).unwrap();
        assert_eq!(value["description"], "SYSCO FOODS");
        assert_eq!(value["date"], "2024-03-01");
        assert_eq!(value["resolved_by"], "unresolved");
    }
}
