//! Category dictionaries and the closed category vocabulary
//!
//! Two dictionaries map short descriptions to categories: an industry-specific
//! one (consulted first, optional on disk) and a general one (mandatory).
//! Files are looked up in a dictionaries directory:
//!
//! ```text
//! dictionaries/
//!   general_categories.csv
//!   <industry>_categories.csv
//!   ranges/parent_category_ranges.csv
//! ```

use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::models::DictionaryKind;
use crate::ranges::CategoryRanges;

/// Columns every dictionary source must provide
pub const REQUIRED_COLUMNS: [&str; 2] = ["short_description", "category"];

/// One short-description → category mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DictionaryEntry {
    pub short_description: String,
    pub category: String,
}

/// A read-only category dictionary
#[derive(Debug, Clone)]
pub struct Dictionary {
    kind: DictionaryKind,
    entries: Vec<DictionaryEntry>,
}

impl Dictionary {
    /// Build a dictionary, normalizing stored keys to lowercase/trimmed form
    pub fn new(kind: DictionaryKind, entries: impl IntoIterator<Item = DictionaryEntry>) -> Self {
        let entries = entries
            .into_iter()
            .map(|e| DictionaryEntry {
                short_description: e.short_description.trim().to_lowercase(),
                category: e.category.trim().to_string(),
            })
            .collect();
        Self { kind, entries }
    }

    pub fn empty(kind: DictionaryKind) -> Self {
        Self {
            kind,
            entries: Vec::new(),
        }
    }

    /// Parse a dictionary from CSV
    ///
    /// Fails with a configuration error if either required column is missing.
    /// Extra columns are ignored; rows with a blank key or category are skipped.
    pub fn from_reader<R: Read>(kind: DictionaryKind, reader: R) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        let position = |name: &str| headers.iter().position(|h| h.trim() == name);

        let (Some(key_col), Some(category_col)) = (position("short_description"), position("category"))
        else {
            return Err(Error::Config(format!(
                "{} dictionary must contain columns: {}",
                kind,
                REQUIRED_COLUMNS.join(", ")
            )));
        };

        let mut entries = Vec::new();
        for (line, record) in rdr.records().enumerate() {
            let record = record?;
            let key = record.get(key_col).unwrap_or("").trim();
            let category = record.get(category_col).unwrap_or("").trim();
            if key.is_empty() || category.is_empty() {
                debug!(dictionary = %kind, row = line + 1, "Skipping incomplete dictionary row");
                continue;
            }
            entries.push(DictionaryEntry {
                short_description: key.to_string(),
                category: category.to_string(),
            });
        }

        Ok(Self::new(kind, entries))
    }

    /// Load a dictionary file
    pub fn load(kind: DictionaryKind, path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            Error::Config(format!(
                "Cannot open {} dictionary {}: {}",
                kind,
                path.display(),
                e
            ))
        })?;
        Self::from_reader(kind, file)
    }

    pub fn kind(&self) -> DictionaryKind {
        self.kind
    }

    pub fn entries(&self) -> &[DictionaryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct categories used by this dictionary
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.category.as_str())
    }
}

/// Closed set of valid categories, built once at startup
///
/// Iteration order is sorted, which keeps prompts deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryVocabulary {
    categories: BTreeSet<String>,
}

impl CategoryVocabulary {
    pub fn new(categories: impl IntoIterator<Item = String>) -> Self {
        Self {
            categories: categories.into_iter().collect(),
        }
    }

    /// Union of every category in the given dictionaries
    pub fn from_dictionaries<'a>(dictionaries: impl IntoIterator<Item = &'a Dictionary>) -> Self {
        Self::new(
            dictionaries
                .into_iter()
                .flat_map(|d| d.categories().map(str::to_string)),
        )
    }

    pub fn contains(&self, category: &str) -> bool {
        self.categories.contains(category)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

/// Everything loaded from a dictionaries directory for one run
#[derive(Debug, Clone)]
pub struct DictionaryStore {
    pub industry: Dictionary,
    pub general: Dictionary,
    pub vocabulary: CategoryVocabulary,
    pub ranges: CategoryRanges,
}

impl DictionaryStore {
    /// Assemble a store from already-parsed parts
    pub fn new(industry: Dictionary, general: Dictionary, ranges: CategoryRanges) -> Self {
        let vocabulary = CategoryVocabulary::from_dictionaries([&industry, &general]);
        Self {
            industry,
            general,
            vocabulary,
            ranges,
        }
    }

    /// Load the industry, general and range tables from `dir`
    ///
    /// The general dictionary is mandatory. A missing industry dictionary is
    /// treated as empty, and missing range data disables range checks.
    pub fn load(dir: &Path, industry: &str, ranges_file: &Path) -> Result<Self> {
        let general = Dictionary::load(DictionaryKind::General, &general_path(dir))?;

        let industry_path = industry_path(dir, industry);
        let industry_dict = if industry_path.exists() {
            Dictionary::load(DictionaryKind::Industry, &industry_path)?
        } else {
            warn!(industry = %industry, path = %industry_path.display(), "No dictionary found for industry");
            Dictionary::empty(DictionaryKind::Industry)
        };

        let ranges_path = if ranges_file.is_absolute() {
            ranges_file.to_path_buf()
        } else {
            dir.join(ranges_file)
        };
        let ranges = CategoryRanges::load_or_empty(&ranges_path);

        let store = Self::new(industry_dict, general, ranges);
        info!(
            industry_entries = store.industry.len(),
            general_entries = store.general.len(),
            categories = store.vocabulary.len(),
            "Loaded category dictionaries"
        );
        Ok(store)
    }

    pub fn dictionary(&self, kind: DictionaryKind) -> &Dictionary {
        match kind {
            DictionaryKind::Industry => &self.industry,
            DictionaryKind::General => &self.general,
        }
    }
}

/// Path of the general dictionary inside `dir`
pub fn general_path(dir: &Path) -> PathBuf {
    dir.join("general_categories.csv")
}

/// Path of an industry dictionary inside `dir`
pub fn industry_path(dir: &Path, industry: &str) -> PathBuf {
    dir.join(format!("{}_categories.csv", industry.trim().to_lowercase()))
}
