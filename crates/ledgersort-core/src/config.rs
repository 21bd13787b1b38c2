//! Pipeline configuration
//!
//! ## Configuration Resolution
//!
//! Config is loaded with a two-layer resolution:
//! 1. An explicit path (CLI `--config`), or the user override in the data dir
//!    (~/.local/share/ledgersort/config.toml)
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! Hosts and API keys are never read from the file; see [`crate::ai`].

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/ledgersort.toml");

/// Which model backend categorizes unresolved groups
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Anthropic,
    Ollama,
    OpenAICompatible,
    Mock,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::Ollama => "ollama",
            Self::OpenAICompatible => "openai_compatible",
            Self::Mock => "mock",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "anthropic" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            "openai_compatible" | "openai" => Ok(Self::OpenAICompatible),
            "mock" => Ok(Self::Mock),
            other => Err(Error::Config(format!("Unknown model backend: {}", other))),
        }
    }
}

/// Model call settings
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub backend: BackendKind,
    /// Model name for the configured backend
    pub model: String,
    /// Per-request timeout enforced by the HTTP client
    pub timeout: Duration,
    /// Extra attempts after a transport failure
    pub max_retries: u32,
    /// Delay before the first retry; doubled on each further attempt
    pub retry_backoff: Duration,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Anthropic,
            model: "claude-3-haiku-20240307".to_string(),
            timeout: Duration::from_secs(60),
            max_retries: 2,
            retry_backoff: Duration::from_millis(500),
            temperature: 0.0,
            max_tokens: 1024,
        }
    }
}

/// Where dictionaries and range tables live
#[derive(Debug, Clone)]
pub struct DictionaryConfig {
    pub dir: PathBuf,
    pub industry: String,
    /// Resolved against `dir` when relative
    pub ranges_file: PathBuf,
}

impl Default for DictionaryConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("dictionaries"),
            industry: "restaurant".to_string(),
            ranges_file: PathBuf::from("ranges/parent_category_ranges.csv"),
        }
    }
}

/// Full pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Minimum confidence to accept a dictionary match
    pub confidence_threshold: f64,
    /// Transaction groups per model call
    pub batch_size: usize,
    pub dictionaries: DictionaryConfig,
    pub model: ModelConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.8,
            batch_size: 5,
            dictionaries: DictionaryConfig::default(),
            model: ModelConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration (explicit path or override first, then default)
    ///
    /// An explicit path that does not exist is an error; a missing override
    /// in the data dir silently falls back to the embedded default.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let content = match explicit {
            Some(path) => read_config(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => read_config(&path)?,
                _ => DEFAULT_CONFIG.to_string(),
            },
        };
        Self::from_toml(&content)
    }

    /// Parse and validate TOML content on top of the built-in defaults
    pub fn from_toml(content: &str) -> Result<Self> {
        let config = parse_config(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Embedded default configuration
    pub fn embedded() -> Result<Self> {
        Self::from_toml(DEFAULT_CONFIG)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(Error::Config(format!(
                "confidence_threshold must be between 0 and 1, got {}",
                self.confidence_threshold
            )));
        }
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".to_string()));
        }
        if self.dictionaries.industry.trim().is_empty() {
            return Err(Error::Config("industry must not be empty".to_string()));
        }
        if self.model.max_tokens == 0 {
            return Err(Error::Config("max_tokens must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("ledgersort").join("config.toml"))
}

fn read_config(path: &Path) -> Result<String> {
    debug!(path = %path.display(), "Reading config");
    fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read config {}: {}", path.display(), e)))
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    matching: Option<RawMatching>,
    batching: Option<RawBatching>,
    dictionaries: Option<RawDictionaries>,
    model: Option<RawModel>,
}

#[derive(Debug, Deserialize)]
struct RawMatching {
    confidence_threshold: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawBatching {
    batch_size: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawDictionaries {
    dir: Option<PathBuf>,
    industry: Option<String>,
    ranges_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct RawModel {
    backend: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
    retry_backoff_ms: Option<u64>,
    temperature: Option<f64>,
    max_tokens: Option<u32>,
}

/// Parse config from TOML content
fn parse_config(content: &str) -> Result<PipelineConfig> {
    let raw: RawConfig = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

    let mut config = PipelineConfig::default();

    if let Some(matching) = raw.matching {
        if let Some(threshold) = matching.confidence_threshold {
            config.confidence_threshold = threshold;
        }
    }

    if let Some(batch_size) = raw.batching.and_then(|b| b.batch_size) {
        config.batch_size = batch_size;
    }

    if let Some(dicts) = raw.dictionaries {
        if let Some(dir) = dicts.dir {
            config.dictionaries.dir = dir;
        }
        if let Some(industry) = dicts.industry {
            config.dictionaries.industry = industry;
        }
        if let Some(ranges_file) = dicts.ranges_file {
            config.dictionaries.ranges_file = ranges_file;
        }
    }

    if let Some(model) = raw.model {
        if let Some(backend) = model.backend {
            config.model.backend = backend.parse()?;
        }
        if let Some(name) = model.model {
            config.model.model = name;
        }
        if let Some(timeout) = model.timeout_secs {
            config.model.timeout = Duration::from_secs(timeout);
        }
        if let Some(retries) = model.max_retries {
            config.model.max_retries = retries;
        }
        if let Some(backoff) = model.retry_backoff_ms {
            config.model.retry_backoff = Duration::from_millis(backoff);
        }
        if let Some(temperature) = model.temperature {
            config.model.temperature = temperature;
        }
        if let Some(max_tokens) = model.max_tokens {
            config.model.max_tokens = max_tokens;
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_config() {
        let config = PipelineConfig::embedded().unwrap();
        assert_eq!(config.confidence_threshold, 0.8);
        assert_eq!(config.batch_size, 5);
        assert_eq!(config.model.backend, BackendKind::Anthropic);
        assert_eq!(config.model.model, "claude-3-haiku-20240307");
        assert_eq!(config.model.max_tokens, 1024);
        assert_eq!(config.model.temperature, 0.0);
        assert_eq!(config.dictionaries.industry, "restaurant");
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = PipelineConfig::from_toml("[batching]\nbatch_size = 12\n").unwrap();
        assert_eq!(config.batch_size, 12);
        assert_eq!(config.confidence_threshold, 0.8);
        assert_eq!(config.model.timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let err = PipelineConfig::from_toml("[matching]\nconfidence_threshold = 1.5\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let err = PipelineConfig::from_toml("[batching]\nbatch_size = 0\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let err = PipelineConfig::from_toml("[model]\nbackend = \"gpt5\"\n").unwrap_err();
        assert!(err.to_string().contains("gpt5"));
    }

    #[test]
    fn test_unknown_section_rejected() {
        assert!(PipelineConfig::from_toml("[database]\npath = \"x\"\n").is_err());
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[model]\nbackend = \"mock\"\nmax_retries = 0\n").unwrap();

        let config = PipelineConfig::load(Some(&path)).unwrap();
        assert_eq!(config.model.backend, BackendKind::Mock);
        assert_eq!(config.model.max_retries, 0);
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let err = PipelineConfig::load(Some(Path::new("/nonexistent/ledgersort.toml"))).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!("Ollama".parse::<BackendKind>().unwrap(), BackendKind::Ollama);
        assert_eq!(
            "openai_compatible".parse::<BackendKind>().unwrap(),
            BackendKind::OpenAICompatible
        );
        assert_eq!(BackendKind::Mock.to_string(), "mock");
    }
}
