//! Shared command utilities
//!
//! This module contains:
//! - `Overrides` - Command-line overrides for the pipeline config
//! - `load_config` - Resolve config file + overrides
//! - `open_store` - Load dictionaries and ranges for a config

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ledgersort_core::{DictionaryStore, PipelineConfig};

/// Config values that can be overridden per invocation
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub industry: Option<String>,
    pub dictionaries: Option<PathBuf>,
    pub threshold: Option<f64>,
    pub batch_size: Option<usize>,
}

/// Load the pipeline config and apply command-line overrides
pub fn load_config(path: Option<&Path>, overrides: &Overrides) -> Result<PipelineConfig> {
    let mut config = PipelineConfig::load(path).context("Failed to load configuration")?;

    if let Some(ref industry) = overrides.industry {
        config.dictionaries.industry = industry.clone();
    }
    if let Some(ref dir) = overrides.dictionaries {
        config.dictionaries.dir = dir.clone();
    }
    if let Some(threshold) = overrides.threshold {
        config.confidence_threshold = threshold;
    }
    if let Some(batch_size) = overrides.batch_size {
        config.batch_size = batch_size;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Load the dictionaries and range table named by `config`
pub fn open_store(config: &PipelineConfig) -> Result<DictionaryStore> {
    DictionaryStore::load(
        &config.dictionaries.dir,
        &config.dictionaries.industry,
        &config.dictionaries.ranges_file,
    )
    .with_context(|| {
        format!(
            "Failed to load dictionaries from {}",
            config.dictionaries.dir.display()
        )
    })
}
