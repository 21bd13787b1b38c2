//! JSON parsing helpers for AI backend responses
//!
//! Models often wrap the JSON payload in prose or code fences, so the array is
//! located by its outermost brackets before parsing.

use serde_json::Value;
use tracing::warn;

use crate::dictionary::CategoryVocabulary;
use crate::error::{Error, Result};

use super::types::{RejectReason, ValidatedResult};

const REQUIRED_FIELDS: [&str; 3] = ["short_description", "llm_category", "llm_confidence"];

/// Extract and parse the JSON array in a model reply
///
/// Anything that is not a JSON array is a parse failure for the whole batch.
pub fn parse_result_array(response: &str) -> Result<Vec<Value>> {
    let response = response.trim();
    let start = response.find('[');
    let end = response.rfind(']');

    match (start, end) {
        (Some(s), Some(e)) if s < e => {
            let json_str = &response[s..=e];
            serde_json::from_str(json_str).map_err(|e| {
                Error::InvalidData(format!(
                    "Invalid JSON from AI: {} | Raw: {}",
                    e,
                    truncate(json_str, 200)
                ))
            })
        }
        _ => Err(Error::InvalidData(format!(
            "No JSON array found in AI response | Raw: {}",
            truncate(response, 200)
        ))),
    }
}

/// Check one result element against the vocabulary
pub fn validate_result(
    value: &Value,
    vocabulary: &CategoryVocabulary,
) -> std::result::Result<ValidatedResult, RejectReason> {
    let obj = value.as_object().ok_or(RejectReason::NotAnObject)?;

    for field in REQUIRED_FIELDS {
        if !obj.contains_key(field) {
            return Err(RejectReason::MissingField(field));
        }
    }

    let short_description = obj["short_description"]
        .as_str()
        .ok_or(RejectReason::MissingField("short_description"))?;

    let category = obj["llm_category"]
        .as_str()
        .ok_or_else(|| RejectReason::UnknownCategory(obj["llm_category"].to_string()))?;
    if !vocabulary.contains(category) {
        return Err(RejectReason::UnknownCategory(category.to_string()));
    }

    let confidence = obj["llm_confidence"]
        .as_f64()
        .ok_or(RejectReason::NonNumericConfidence)?;
    if !(0.0..=1.0).contains(&confidence) {
        return Err(RejectReason::ConfidenceOutOfRange(confidence));
    }

    Ok(ValidatedResult {
        short_description: short_description.to_string(),
        llm_category: category.to_string(),
        llm_confidence: confidence,
    })
}

/// Parse a reply and keep the elements that validate
///
/// Returns the accepted results and how many elements were dropped. Only a
/// reply that cannot be read as an array at all is an error.
pub fn parse_categorizations(
    response: &str,
    vocabulary: &CategoryVocabulary,
) -> Result<(Vec<ValidatedResult>, usize)> {
    let values = parse_result_array(response)?;
    let mut accepted = Vec::with_capacity(values.len());
    let mut dropped = 0;

    for value in &values {
        match validate_result(value, vocabulary) {
            Ok(result) => accepted.push(result),
            Err(reason) => {
                dropped += 1;
                warn!(reason = %reason, result = %truncate(&value.to_string(), 200), "Invalid group result");
            }
        }
    }

    Ok((accepted, dropped))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        format!("{}...", s.chars().take(max).collect::<String>())
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vocab() -> CategoryVocabulary {
        CategoryVocabulary::new(["Revenue: Services".to_string(), "Payroll: Wages".to_string()])
    }

    #[test]
    fn test_parse_array_with_surrounding_text() {
        let reply = "Here you go:\n```json\n[{\"short_description\": \"zelle\"}]\n```";
        let values = parse_result_array(reply).unwrap();
        assert_eq!(values.len(), 1);
    }

    #[test]
    fn test_parse_invalid_json_is_error() {
        assert!(parse_result_array("not json at all").is_err());
        assert!(parse_result_array("[{\"short_description\": }]").is_err());
        assert!(parse_result_array("{\"short_description\": \"x\"}").is_err());
    }

    #[test]
    fn test_valid_result() {
        let value = json!({
            "short_description": "square",
            "amounts": [300.0],
            "llm_category": "Revenue: Services",
            "llm_confidence": 0.9
        });
        let result = validate_result(&value, &vocab()).unwrap();
        assert_eq!(result.llm_category, "Revenue: Services");
        assert_eq!(result.llm_confidence, 0.9);
    }

    #[test]
    fn test_integer_confidence_accepted() {
        let value = json!({
            "short_description": "gusto",
            "llm_category": "Payroll: Wages",
            "llm_confidence": 1
        });
        assert_eq!(validate_result(&value, &vocab()).unwrap().llm_confidence, 1.0);
    }

    #[test]
    fn test_rejections() {
        let v = vocab();
        assert_eq!(
            validate_result(&json!({"short_description": "x", "llm_category": "Revenue: Services"}), &v),
            Err(RejectReason::MissingField("llm_confidence"))
        );
        assert_eq!(
            validate_result(
                &json!({"short_description": "x", "llm_category": "Travel: Hotels", "llm_confidence": 0.5}),
                &v
            ),
            Err(RejectReason::UnknownCategory("Travel: Hotels".to_string()))
        );
        assert_eq!(
            validate_result(
                &json!({"short_description": "x", "llm_category": "Payroll: Wages", "llm_confidence": "high"}),
                &v
            ),
            Err(RejectReason::NonNumericConfidence)
        );
        assert_eq!(
            validate_result(
                &json!({"short_description": "x", "llm_category": "Payroll: Wages", "llm_confidence": 1.2}),
                &v
            ),
            Err(RejectReason::ConfidenceOutOfRange(1.2))
        );
        assert_eq!(validate_result(&json!("x"), &v), Err(RejectReason::NotAnObject));
    }

    #[test]
    fn test_null_category_is_rejected() {
        let value = json!({"short_description": "x", "llm_category": null, "llm_confidence": 0.4});
        assert!(matches!(
            validate_result(&value, &vocab()),
            Err(RejectReason::UnknownCategory(_))
        ));
    }

    #[test]
    fn test_parse_categorizations_drops_bad_elements() {
        let reply = json!([
            {"short_description": "gusto", "llm_category": "Payroll: Wages", "llm_confidence": 0.95},
            {"short_description": "zelle", "llm_category": "Made Up", "llm_confidence": 0.5},
            {"short_description": "square", "llm_category": "Revenue: Services", "llm_confidence": -0.1}
        ])
        .to_string();

        let (accepted, dropped) = parse_categorizations(&reply, &vocab()).unwrap();
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].short_description, "gusto");
        assert_eq!(dropped, 2);
    }
}
