//! Normalize and match command implementations

use std::path::Path;

use anyhow::Result;
use ledgersort_core::{normalize::Normalizer, DictionaryKind, FuzzyMatcher};

use super::{load_config, open_store, Overrides};

/// Print the short description for each raw description
pub fn cmd_normalize(descriptions: &[String]) -> Result<()> {
    let normalizer = Normalizer::new();

    for description in descriptions {
        println!("{:<40} → {}", description, normalizer.normalize(description));
    }

    Ok(())
}

/// Show industry and general matches for one description
pub fn cmd_match(config_path: Option<&Path>, overrides: &Overrides, description: &str) -> Result<()> {
    let config = load_config(config_path, overrides)?;
    let store = open_store(&config)?;
    let matcher = FuzzyMatcher::new(&store, Normalizer::new());
    let key = matcher.normalizer().normalize(description);

    println!("Description: {}", description);
    println!("Short description: {}", key);
    println!(
        "Threshold: {:.2} (industry: {})",
        config.confidence_threshold, config.dictionaries.industry
    );
    println!();

    for kind in [DictionaryKind::Industry, DictionaryKind::General] {
        let result = matcher.best_match(&key, kind);
        let status = if result.confidence >= config.confidence_threshold {
            "✓"
        } else {
            " "
        };
        println!(
            "  {} {:<9} {:<40} {:.2}",
            status,
            kind.as_str(),
            result.category.as_deref().unwrap_or("N/A"),
            result.confidence
        );
    }

    Ok(())
}
