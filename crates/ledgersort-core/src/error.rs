//! Error types for ledgersort

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Import error: {0}")]
    Import(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Prompt error: {0}")]
    Prompt(String),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl Error {
    /// Whether a failed model call is worth retrying
    ///
    /// Transport-level failures are retryable; anything produced after a
    /// response was received (parse, validation) is not.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Http(_) | Error::Model(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
