//! Export of categorized transactions
//!
//! Supports:
//! - CSV with one row per transaction and "N/A" for missing categories
//! - JSON array of the full enriched records

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::error::{Error, Result};
use crate::models::CategorizedTransaction;

const NOT_AVAILABLE: &str = "N/A";

/// Export format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }

    /// Guess the format from a file extension, defaulting to CSV
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Csv,
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(Error::InvalidData(format!("Unknown export format: {}", other))),
        }
    }
}

/// One flattened CSV row
#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    id: &'a str,
    date: String,
    description: &'a str,
    amount: f64,
    short_description: &'a str,
    industry_category: &'a str,
    industry_confidence: f64,
    general_category: &'a str,
    general_confidence: Option<f64>,
    llm_category: &'a str,
    llm_confidence: Option<f64>,
    percent_outside_range: Option<f64>,
    resolved_by: &'static str,
    category: &'a str,
    processing_error: &'a str,
}

impl<'a> From<&'a CategorizedTransaction> for ExportRow<'a> {
    fn from(ct: &'a CategorizedTransaction) -> Self {
        let or_na = |v: &'a Option<String>| v.as_deref().unwrap_or(NOT_AVAILABLE);
        Self {
            id: ct.transaction.id.as_deref().unwrap_or(""),
            date: ct.transaction.date.format("%Y-%m-%d").to_string(),
            description: &ct.transaction.description,
            amount: ct.transaction.amount,
            short_description: &ct.short_description,
            industry_category: or_na(&ct.industry_category),
            industry_confidence: ct.industry_confidence,
            general_category: or_na(&ct.general_category),
            general_confidence: ct.general_confidence,
            llm_category: or_na(&ct.llm_category),
            llm_confidence: ct.llm_confidence,
            percent_outside_range: ct.percent_outside_range,
            resolved_by: ct.resolved_by.as_str(),
            category: ct.category().unwrap_or(NOT_AVAILABLE),
            processing_error: ct.processing_error.as_deref().unwrap_or(""),
        }
    }
}

/// Write categorized transactions as CSV
///
/// Missing categories render as "N/A"; missing numbers as empty cells.
pub fn write_csv<W: Write>(writer: W, transactions: &[CategorizedTransaction]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for ct in transactions {
        wtr.serialize(ExportRow::from(ct))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write categorized transactions as a pretty-printed JSON array
pub fn write_json<W: Write>(writer: W, transactions: &[CategorizedTransaction]) -> Result<()> {
    serde_json::to_writer_pretty(writer, transactions)?;
    Ok(())
}

/// Write to `path` in the requested format
pub fn export_transactions(
    path: &Path,
    format: ExportFormat,
    transactions: &[CategorizedTransaction],
) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    match format {
        ExportFormat::Csv => write_csv(&mut out, transactions)?,
        ExportFormat::Json => write_json(&mut out, transactions)?,
    }
    out.flush()?;

    info!(
        count = transactions.len(),
        format = format.as_str(),
        path = %path.display(),
        "Exported transactions"
    );
    Ok(())
}
