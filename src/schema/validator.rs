//! Response validation against survey field rules
//!
//! Validation semantics:
//! - Required fields must be present and non-empty
//! - Empty optional fields are skipped
//! - number / rating: numeric, within min/max
//! - text: within minLength/maxLength (characters)
//! - select / radio: one declared option value
//! - checkbox: list of declared option values
//! - date: ISO-8601 date or datetime
//!
//! Every problem is reported; validation does not stop at the first one.
//! Keys not declared by the survey are ignored.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::Value;

use super::errors::ValidationDetails;
use super::types::{Field, FieldType, Survey};

const COMPLETION_WEIGHT: f64 = 0.4;
const QUALITY_WEIGHT: f64 = 0.6;

/// Outcome of validating one response payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Validates response payloads for one survey.
///
/// Validator does not mutate payloads. Validation is deterministic.
pub struct ResponseValidator<'a> {
    survey: &'a Survey,
}

impl<'a> ResponseValidator<'a> {
    pub fn new(survey: &'a Survey) -> Self {
        Self { survey }
    }

    /// Validates a payload, collecting every violation in field order
    pub fn validate(&self, data: &BTreeMap<String, Value>) -> ValidationReport {
        let mut errors = Vec::new();

        for field in &self.survey.fields {
            let value = data.get(&field.id).filter(|v| !is_empty(v));

            match value {
                None if field.is_required() => {
                    errors.push(ValidationDetails::new(&field.id, "an answer", "missing").to_string());
                }
                None => {}
                Some(value) => {
                    if let Err(details) = validate_value(field, value) {
                        errors.push(details.to_string());
                    }
                }
            }
        }

        ValidationReport {
            valid: errors.is_empty(),
            errors,
        }
    }

    /// Completeness and quality score in [0, 1].
    ///
    /// 0.4 x completion ratio + 0.6 x mean per-field quality, where quality
    /// depends on the field type (longer text scores higher).
    pub fn quality_score(&self, data: &BTreeMap<String, Value>) -> f64 {
        let total = self.survey.fields.len();
        if total == 0 {
            return 0.0;
        }

        let mut completed = 0usize;
        let mut quality = 0.0;

        for field in &self.survey.fields {
            let Some(value) = data.get(&field.id).filter(|v| !is_empty(v)) else {
                continue;
            };
            completed += 1;

            quality += match field.field_type {
                FieldType::Text => {
                    let len = value.as_str().map_or(0, |s| s.chars().count());
                    if len > 50 {
                        1.0
                    } else if len > 20 {
                        0.7
                    } else {
                        0.5
                    }
                }
                FieldType::Select | FieldType::Radio | FieldType::Checkbox => 1.0,
                FieldType::Number | FieldType::Rating => 0.8,
                FieldType::Date => 0.6,
            };
        }

        let completion_ratio = completed as f64 / total as f64;
        let avg_quality = quality / total as f64;
        (completion_ratio * COMPLETION_WEIGHT + avg_quality * QUALITY_WEIGHT).clamp(0.0, 1.0)
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn validate_value(field: &Field, value: &Value) -> Result<(), ValidationDetails> {
    let rules = field.validation.clone().unwrap_or_default();

    match field.field_type {
        FieldType::Number | FieldType::Rating => {
            let number = as_number(value).ok_or_else(|| {
                ValidationDetails::new(&field.id, "a number", json_type_name(value))
            })?;
            if let Some(min) = rules.min {
                if number < min {
                    return Err(ValidationDetails::new(
                        &field.id,
                        format!("at least {}", min),
                        number.to_string(),
                    ));
                }
            }
            if let Some(max) = rules.max {
                if number > max {
                    return Err(ValidationDetails::new(
                        &field.id,
                        format!("at most {}", max),
                        number.to_string(),
                    ));
                }
            }
        }
        FieldType::Text => {
            let text = value.as_str().ok_or_else(|| {
                ValidationDetails::new(&field.id, "text", json_type_name(value))
            })?;
            let len = text.chars().count();
            if let Some(min) = rules.min_length {
                if len < min {
                    return Err(ValidationDetails::new(
                        &field.id,
                        format!("at least {} characters", min),
                        format!("{} characters", len),
                    ));
                }
            }
            if let Some(max) = rules.max_length {
                if len > max {
                    return Err(ValidationDetails::new(
                        &field.id,
                        format!("at most {} characters", max),
                        format!("{} characters", len),
                    ));
                }
            }
        }
        FieldType::Select | FieldType::Radio => {
            let raw = scalar_text(value).ok_or_else(|| {
                ValidationDetails::new(&field.id, "an option value", json_type_name(value))
            })?;
            if !field.options.iter().any(|o| o.value == raw) {
                return Err(ValidationDetails::new(
                    &field.id,
                    "a declared option",
                    format!("'{}'", raw),
                ));
            }
        }
        FieldType::Checkbox => {
            let items = value.as_array().ok_or_else(|| {
                ValidationDetails::new(&field.id, "a list of options", json_type_name(value))
            })?;
            for item in items {
                let raw = scalar_text(item).unwrap_or_default();
                if !field.options.iter().any(|o| o.value == raw) {
                    return Err(ValidationDetails::new(
                        &field.id,
                        "declared checkbox options",
                        format!("'{}'", raw),
                    ));
                }
            }
        }
        FieldType::Date => {
            let raw = value.as_str().ok_or_else(|| {
                ValidationDetails::new(&field.id, "an ISO-8601 date", json_type_name(value))
            })?;
            if parse_date(raw).is_none() {
                return Err(ValidationDetails::new(
                    &field.id,
                    "an ISO-8601 date",
                    format!("'{}'", raw),
                ));
            }
        }
    }

    Ok(())
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Parses an ISO-8601 date, datetime, or RFC 3339 timestamp
pub fn parse_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Returns the JSON type name for error messages.
fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldOption, ValidationRules};
    use serde_json::json;

    fn survey() -> Survey {
        Survey::new("pulse", "Pulse", 1)
            .with_field(
                Field::new("satisfaction", "Satisfaction", FieldType::Rating).with_validation(
                    ValidationRules {
                        min: Some(1.0),
                        max: Some(5.0),
                        required: true,
                        ..Default::default()
                    },
                ),
            )
            .with_field(
                Field::new("plan", "Plan", FieldType::Radio).with_options(vec![
                    FieldOption::new("basic", "Basic"),
                    FieldOption::new("pro", "Pro"),
                ]),
            )
            .with_field(
                Field::new("channels", "Channels", FieldType::Checkbox).with_options(vec![
                    FieldOption::new("email", "Email"),
                    FieldOption::new("phone", "Phone"),
                ]),
            )
            .with_field(
                Field::new("comment", "Comment", FieldType::Text).with_validation(
                    ValidationRules {
                        max_length: Some(10),
                        ..Default::default()
                    },
                ),
            )
            .with_field(Field::new("visited", "Visit date", FieldType::Date))
    }

    fn data(value: Value) -> BTreeMap<String, Value> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_valid_response_passes() {
        let survey = survey();
        let report = ResponseValidator::new(&survey).validate(&data(json!({
            "satisfaction": 4,
            "plan": "pro",
            "channels": ["email"],
            "comment": "fine",
            "visited": "2024-03-01"
        })));
        assert!(report.valid, "{:?}", report.errors);
    }

    #[test]
    fn test_missing_required_field() {
        let survey = survey();
        let report = ResponseValidator::new(&survey).validate(&data(json!({"plan": "basic"})));
        assert!(!report.valid);
        assert!(report.errors[0].contains("satisfaction"));
    }

    #[test]
    fn test_collects_every_violation() {
        let survey = survey();
        let report = ResponseValidator::new(&survey).validate(&data(json!({
            "satisfaction": 9,
            "plan": "gold",
            "channels": ["fax"],
            "comment": "far too long for the limit",
            "visited": "yesterday"
        })));
        assert_eq!(report.errors.len(), 5);
    }

    #[test]
    fn test_numeric_string_accepted() {
        let survey = survey();
        let report =
            ResponseValidator::new(&survey).validate(&data(json!({"satisfaction": "3"})));
        assert!(report.valid);
    }

    #[test]
    fn test_date_formats() {
        assert!(parse_date("2024-03-01").is_some());
        assert!(parse_date("2024-03-01T10:00:00Z").is_some());
        assert!(parse_date("2024-03-01T10:00:00").is_some());
        assert!(parse_date("03/01/2024").is_none());
    }

    #[test]
    fn test_quality_score_bounds() {
        let survey = survey();
        let validator = ResponseValidator::new(&survey);

        assert_eq!(validator.quality_score(&BTreeMap::new()), 0.0);

        let full = validator.quality_score(&data(json!({
            "satisfaction": 4,
            "plan": "pro",
            "channels": ["email"],
            "comment": "x",
            "visited": "2024-03-01"
        })));
        // completion 1.0, quality (0.8 + 1 + 1 + 0.5 + 0.6) / 5 = 0.78
        assert!((full - (0.4 + 0.6 * 0.78)).abs() < 1e-9);
    }
}
