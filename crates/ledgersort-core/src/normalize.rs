//! Short-description normalizer
//!
//! Turns a raw bank description into the canonical key used for grouping and
//! dictionary lookups. Keys are at most 20 characters long and contain only
//! lowercase letters, digits, spaces and `&`.
//!
//! Two descriptions collapsing to the same key is intentional: that is what
//! defines a transaction group.

use regex::Regex;
use tracing::{debug, warn};

use crate::error::Result;

/// Maximum length of a normalized key, in characters
pub const MAX_KEY_LEN: usize = 20;

/// Compiled normalization patterns
struct Patterns {
    domain: Regex,
    date: Regex,
    time: Regex,
    leading_number: Regex,
    long_number: Regex,
    disallowed: Regex,
    trailing_number: Regex,
}

impl Patterns {
    fn compile() -> Result<Self> {
        Ok(Self {
            // ".com", ".net", ... and whatever is glued to it
            domain: Regex::new(r"\.(?:com|net|org|edu|gov|io|co|us|uk|ca)[^\s]*")?,
            // MM/DD, DD-MM, optionally with a year
            date: Regex::new(r"\b\d{1,2}[/-]\d{1,2}(?:[/-]\d{2,4})?")?,
            // HH:MM[:SS][ am/pm]
            time: Regex::new(r"\b\d{1,2}:\d{2}(?::\d{2})?(?:\s*[ap]m)?")?,
            leading_number: Regex::new(r"^\d+\s+")?,
            long_number: Regex::new(r"\d{4,}")?,
            disallowed: Regex::new(r"[^a-z0-9\s&]")?,
            trailing_number: Regex::new(r"\s+\d+\s*$")?,
        })
    }

    fn normalize(&self, description: &str) -> String {
        let mut desc = description.trim().to_lowercase();

        desc = prefix_before(&self.domain, &desc).to_string();

        for pattern in [&self.date, &self.time] {
            desc = prefix_before(pattern, &desc).trim().to_string();
        }

        desc = self.leading_number.replace(&desc, "").into_owned();

        // Everything from the first token holding a long number onward is an ID
        desc = desc
            .split_whitespace()
            .take_while(|token| !self.long_number.is_match(token))
            .collect::<Vec<_>>()
            .join(" ");

        desc = prefix_before(&self.disallowed, &desc).to_string();

        desc = self.trailing_number.replace(&desc, "").into_owned();

        let collapsed = desc.split_whitespace().collect::<Vec<_>>().join(" ");
        let key = truncate_chars(&collapsed, MAX_KEY_LEN).trim().to_string();

        debug!(description = %description, key = %key, "Short description created");
        key
    }
}

/// Short-description normalizer
///
/// Owned by whoever does the matching and passed in explicitly. If the
/// patterns fail to compile it degrades to a plain 20-character truncation of
/// the raw input, so normalizing never fails.
pub struct Normalizer {
    patterns: Option<Patterns>,
}

impl Normalizer {
    pub fn new() -> Self {
        match Patterns::compile() {
            Ok(patterns) => Self {
                patterns: Some(patterns),
            },
            Err(e) => {
                warn!(error = %e, "Failed to compile normalization patterns, truncating only");
                Self { patterns: None }
            }
        }
    }

    /// Normalize a description into its short key
    pub fn normalize(&self, description: &str) -> String {
        match &self.patterns {
            Some(patterns) => patterns.normalize(description),
            None => truncate_chars(description, MAX_KEY_LEN),
        }
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Text before the first match of `pattern`, or the whole text
fn prefix_before<'a>(pattern: &Regex, text: &'a str) -> &'a str {
    match pattern.find(text) {
        Some(m) => &text[..m.start()],
        None => text,
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
