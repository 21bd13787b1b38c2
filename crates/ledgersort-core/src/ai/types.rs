//! AI categorization request/response types
//!
//! These types are backend-agnostic and used across all AI implementations.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::TransactionGroup;

/// One group as presented to the model
///
/// `llm_category` and `llm_confidence` are sent as `null` for the model to
/// fill in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub short_description: String,
    pub amounts: Vec<f64>,
    pub dates: Vec<NaiveDate>,
    pub frequency: String,
    pub llm_category: Option<String>,
    pub llm_confidence: Option<f64>,
}

impl From<&TransactionGroup> for GroupRecord {
    fn from(group: &TransactionGroup) -> Self {
        Self {
            short_description: group.short_description.clone(),
            amounts: group.amounts.clone(),
            dates: group.dates.clone(),
            frequency: group.frequency.clone(),
            llm_category: None,
            llm_confidence: None,
        }
    }
}

/// A model categorization that passed validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedResult {
    pub short_description: String,
    /// Member of the category vocabulary
    pub llm_category: String,
    /// In [0, 1]
    pub llm_confidence: f64,
}

/// Why a single model result was dropped
#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    NotAnObject,
    MissingField(&'static str),
    UnknownCategory(String),
    NonNumericConfidence,
    ConfidenceOutOfRange(f64),
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAnObject => write!(f, "result is not an object"),
            Self::MissingField(field) => write!(f, "missing field '{}'", field),
            Self::UnknownCategory(c) => write!(f, "category '{}' is not in the vocabulary", c),
            Self::NonNumericConfidence => write!(f, "confidence is not a number"),
            Self::ConfidenceOutOfRange(c) => write!(f, "confidence {} is outside [0, 1]", c),
        }
    }
}

/// Outcome of categorizing one batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    pub results: Vec<ValidatedResult>,
    /// Elements dropped by validation
    pub dropped: usize,
    /// Transport or parse failure that voided the whole batch
    pub error: Option<String>,
}

impl BatchOutcome {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            results: Vec::new(),
            dropped: 0,
            error: Some(error.into()),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Health information for a configured backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendInfo {
    pub backend: String,
    pub model: String,
    pub host: String,
}
