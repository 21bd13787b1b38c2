//! Transaction loaders for JSON and CSV input

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::ReaderBuilder;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::models::Transaction;

const REQUIRED_FIELDS: [&str; 3] = ["date", "description", "amount"];

/// Load transactions from a `.json` or `.csv` file
pub fn load_transactions(path: &Path) -> Result<Vec<Transaction>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let transactions = match ext.as_str() {
        "json" => load_transactions_json(reader)?,
        "csv" => load_transactions_csv(reader)?,
        other => {
            return Err(Error::Import(format!(
                "Unsupported transaction file type '{}' for {}",
                other,
                path.display()
            )))
        }
    };

    info!(count = transactions.len(), path = %path.display(), "Loaded transactions");
    Ok(transactions)
}

/// Load a JSON array of transaction objects
///
/// Every element must carry `date`, `description` and `amount`; `id` is
/// optional and may be a string or a number.
pub fn load_transactions_json<R: Read>(reader: R) -> Result<Vec<Transaction>> {
    let value: Value = serde_json::from_reader(reader)?;
    let Value::Array(items) = value else {
        return Err(Error::Import(
            "JSON file must contain a list of transactions".into(),
        ));
    };

    items
        .iter()
        .enumerate()
        .map(|(idx, item)| json_transaction(idx, item))
        .collect()
}

fn json_transaction(idx: usize, item: &Value) -> Result<Transaction> {
    let Some(obj) = item.as_object() else {
        return Err(Error::Import(format!(
            "Transaction at index {} is not an object",
            idx
        )));
    };

    let missing: Vec<&str> = REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|f| obj.get(*f).map_or(true, Value::is_null))
        .collect();
    if !missing.is_empty() {
        return Err(Error::Import(format!(
            "Transaction at index {} missing required fields: {}",
            idx,
            missing.join(", ")
        )));
    }

    let field_error = |field: &str, e: Error| {
        Error::Import(format!("Transaction at index {} has invalid {}: {}", idx, field, e))
    };

    let date = match &obj["date"] {
        Value::String(s) => parse_date(s).map_err(|e| field_error("date", e))?,
        other => return Err(field_error("date", Error::InvalidData(other.to_string()))),
    };

    let amount = match &obj["amount"] {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| field_error("amount", Error::InvalidData(n.to_string())))?,
        Value::String(s) => parse_amount(s).map_err(|e| field_error("amount", e))?,
        other => return Err(field_error("amount", Error::InvalidData(other.to_string()))),
    };

    let description = scalar_to_string(&obj["description"]);
    let id = obj.get("id").filter(|v| !v.is_null()).map(scalar_to_string);

    Ok(Transaction {
        id,
        date,
        description,
        amount,
    })
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Load transactions from CSV with `date`, `description`, `amount` and an
/// optional `id` column (header names are case-insensitive)
pub fn load_transactions_csv<R: Read>(reader: R) -> Result<Vec<Transaction>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let column = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));

    let (Some(date_col), Some(desc_col), Some(amount_col)) =
        (column("date"), column("description"), column("amount"))
    else {
        return Err(Error::Import(format!(
            "CSV must contain columns: {}",
            REQUIRED_FIELDS.join(", ")
        )));
    };
    let id_col = column("id");

    let mut transactions = Vec::new();
    for (idx, record) in rdr.records().enumerate() {
        let record = record?;
        let get = |col: usize| record.get(col).unwrap_or("");

        let row_error = |field: &str, e: Error| {
            Error::Import(format!("Row {} has invalid {}: {}", idx + 1, field, e))
        };

        let date = parse_date(get(date_col)).map_err(|e| row_error("date", e))?;
        let amount = parse_amount(get(amount_col)).map_err(|e| row_error("amount", e))?;
        let id = id_col.map(get).filter(|s| !s.is_empty()).map(str::to_string);

        transactions.push(Transaction {
            id,
            date,
            description: get(desc_col).to_string(),
            amount,
        });
    }

    debug!(count = transactions.len(), "Parsed CSV transactions");
    Ok(transactions)
}

/// Parse a date in one of the common bank formats
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.date_naive());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt.date());
        }
    }

    // MM/DD/YY: a two-digit trailing year must not be read as year 00xx
    let parts: Vec<&str> = s.split(['/', '-']).collect();
    let short_year = parts.len() == 3
        && parts.iter().all(|p| p.chars().all(|c| c.is_ascii_digit()))
        && (1..=2).contains(&parts[0].len())
        && (1..=2).contains(&parts[1].len())
        && parts[2].len() == 2;

    let formats: &[&str] = if short_year {
        &["%m/%d/%y", "%m-%d-%y"]
    } else {
        &[
            "%Y-%m-%d", // 2024-01-15
            "%m/%d/%Y", // 01/15/2024
            "%m-%d-%Y", // 01-15-2024
            "%d/%m/%Y", // 15/01/2024 (European)
        ]
    };

    for fmt in formats {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(date);
        }
    }

    Err(Error::Import(format!("Unable to parse date: {}", s)))
}

/// Parse an amount string, handling currency symbols and commas
pub fn parse_amount(s: &str) -> Result<f64> {
    let cleaned: String = s
        .trim()
        .replace(['$', ',', ' '], "")
        .replace('(', "-")
        .replace(')', "");

    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| Error::Import(format!("Unable to parse amount: {}", s)))
}
