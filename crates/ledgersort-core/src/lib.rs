//! Ledgersort Core Library
//!
//! Transaction categorization for small-business bookkeeping:
//! - Description normalization into short merchant keys
//! - Industry and general category dictionaries with fuzzy matching
//! - Grouping and batching of unresolved transactions
//! - Pluggable model backends (Anthropic, Ollama, OpenAI-compatible)
//! - Prompt library for customizable categorization prompts
//! - Parent category amount ranges and deviation scoring
//! - JSON/CSV transaction import and export

pub mod ai;
pub mod batch;
pub mod config;
pub mod dictionary;
pub mod error;
pub mod export;
pub mod fuzzy;
pub mod grouping;
pub mod import;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod prompts;
pub mod ranges;

/// Test utilities including a mock model server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use ai::{
    AIBackend, AICategorizer, AIClient, AnthropicBackend, BackendInfo, BatchOutcome,
    CategorizerReport, MockBackend, MockRule, OllamaBackend, OpenAICompatibleBackend,
    ValidatedResult,
};
pub use config::{BackendKind, DictionaryConfig, ModelConfig, PipelineConfig};
pub use dictionary::{CategoryVocabulary, Dictionary, DictionaryEntry, DictionaryStore};
pub use error::{Error, Result};
pub use export::ExportFormat;
pub use fuzzy::{FuzzyMatcher, MatchResult, MatchStats};
pub use models::{
    CategorizedTransaction, DictionaryKind, ResolutionStage, Transaction, TransactionGroup,
};
pub use normalize::Normalizer;
pub use pipeline::{CategorizationPipeline, PipelineOutput, PipelineStats};
pub use prompts::{Prompt, PromptId, PromptInfo, PromptLibrary};
pub use ranges::{CategoryRange, CategoryRanges, RangeDeviation};
