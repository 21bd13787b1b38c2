//! Expected amount ranges per parent category and the range validator
//!
//! A full category looks like `"Revenue: Services"`; its parent is the text
//! before the first colon. Each parent may carry a `[min_amount, max_amount]`
//! range, and the validator reports how far an amount falls outside it.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Expected amount range for one parent category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRange {
    pub parent_category: String,
    pub min_amount: f64,
    pub max_amount: f64,
}

/// Outcome of checking an amount against its category's range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RangeDeviation {
    /// Amount lies within `[min_amount, max_amount]`
    Within,
    /// Percentage distance from the exceeded bound, `(amount - bound) / bound * 100`
    Outside { percent: f64 },
    /// The parent category has no configured range, or the exceeded bound
    /// is zero and no percentage exists
    NoRange,
}

impl RangeDeviation {
    /// Percentage for reporting; `None` when there is nothing to compare against
    pub fn percent(&self) -> Option<f64> {
        match self {
            Self::Within => Some(0.0),
            Self::Outside { percent } => Some(*percent),
            Self::NoRange => None,
        }
    }

    pub fn is_outside(&self) -> bool {
        matches!(self, Self::Outside { .. })
    }
}

/// Parent category of a full category string
pub fn parent_category(category: &str) -> &str {
    category.split(':').next().unwrap_or(category).trim()
}

/// Range table keyed by parent category
#[derive(Debug, Clone, Default)]
pub struct CategoryRanges {
    ranges: BTreeMap<String, CategoryRange>,
}

impl CategoryRanges {
    pub fn new(ranges: impl IntoIterator<Item = CategoryRange>) -> Self {
        Self {
            ranges: ranges
                .into_iter()
                .map(|r| (r.parent_category.clone(), r))
                .collect(),
        }
    }

    /// Parse a range table from CSV with columns
    /// `parent_category`, `min_amount`, `max_amount`
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        for required in ["parent_category", "min_amount", "max_amount"] {
            if !headers.iter().any(|h| h == required) {
                return Err(Error::Config(format!(
                    "Range table must contain column '{}'",
                    required
                )));
            }
        }

        let mut ranges = Vec::new();
        for row in rdr.deserialize::<CategoryRange>() {
            let range = row?;
            if range.min_amount > range.max_amount {
                warn!(
                    parent = %range.parent_category,
                    min = range.min_amount,
                    max = range.max_amount,
                    "Skipping range with min above max"
                );
                continue;
            }
            ranges.push(range);
        }

        Ok(Self::new(ranges))
    }

    /// Load a range table from disk
    ///
    /// Missing or unreadable data degrades to an empty table, which turns
    /// range validation into a no-op.
    pub fn load_or_empty(path: &Path) -> Self {
        let loaded = File::open(path)
            .map_err(Error::from)
            .and_then(Self::from_reader);

        match loaded {
            Ok(ranges) => {
                info!(count = ranges.len(), path = %path.display(), "Loaded parent category ranges");
                ranges
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "No usable category ranges, range checks disabled");
                Self::default()
            }
        }
    }

    pub fn get(&self, parent: &str) -> Option<&CategoryRange> {
        self.ranges.get(parent)
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Ranges in parent-name order
    pub fn iter(&self) -> impl Iterator<Item = &CategoryRange> {
        self.ranges.values()
    }

    /// How far `amount` falls outside the range of `category`'s parent
    ///
    /// The percentage is relative to the exceeded bound, sign included, so
    /// for a negative-valued expense range an amount below the minimum gives
    /// a positive percentage.
    pub fn deviation(&self, amount: f64, category: &str) -> RangeDeviation {
        let parent = parent_category(category);
        let Some(range) = self.ranges.get(parent) else {
            debug!(parent = %parent, "No range configured for parent category");
            return RangeDeviation::NoRange;
        };

        let bound = if amount < range.min_amount {
            range.min_amount
        } else if amount > range.max_amount {
            range.max_amount
        } else {
            return RangeDeviation::Within;
        };

        if bound == 0.0 {
            debug!(parent = %parent, amount, "Exceeded bound is zero, no percentage");
            return RangeDeviation::NoRange;
        }
        RangeDeviation::Outside {
            percent: (amount - bound) / bound * 100.0,
        }
    }
}
