//! Answer to number
//!
//! | field type        | accepted                                   |
//! |-------------------|--------------------------------------------|
//! | number, rating    | numbers, numeric strings, booleans as 1/0  |
//! | select, radio     | option value or label → 1-based position   |
//! | text, date, checkbox | nothing                                 |
//!
//! A missing or null answer is not a value and is skipped. Any other
//! answer that does not coerce is excluded and counted.

use serde_json::Value;

use crate::schema::{Field, FieldType};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Coerced {
    Value(f64),
    /// Answered, but not usable as a number
    Excluded,
    /// Not answered
    Missing,
}

pub fn coerce(field: &Field, answer: Option<&Value>) -> Coerced {
    let value = match answer {
        None | Some(Value::Null) => return Coerced::Missing,
        Some(value) => value,
    };

    let number = match field.field_type {
        FieldType::Number | FieldType::Rating => numeric(value),
        FieldType::Select | FieldType::Radio => ordinal(field, value),
        FieldType::Text | FieldType::Date | FieldType::Checkbox => None,
    };

    match number {
        Some(n) if n.is_finite() => Coerced::Value(n),
        _ => Coerced::Excluded,
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn ordinal(field: &Field, value: &Value) -> Option<f64> {
    let raw = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    field.option_position(&raw).map(|pos| pos as f64)
}

/// Text key of an answer, used for strata and groups
pub fn category(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldOption;
    use serde_json::json;

    fn size() -> Field {
        Field::new("size", "Company size", FieldType::Radio).with_options(vec![
            FieldOption::new("small", "Small"),
            FieldOption::new("medium", "Medium"),
            FieldOption::new("large", "Large"),
        ])
    }

    #[test]
    fn test_numbers_and_booleans() {
        let field = Field::new("score", "Score", FieldType::Number);
        assert_eq!(coerce(&field, Some(&json!(4))), Coerced::Value(4.0));
        assert_eq!(coerce(&field, Some(&json!(" 4.5 "))), Coerced::Value(4.5));
        assert_eq!(coerce(&field, Some(&json!(true))), Coerced::Value(1.0));
        assert_eq!(coerce(&field, Some(&json!("lots"))), Coerced::Excluded);
        assert_eq!(coerce(&field, None), Coerced::Missing);
        assert_eq!(coerce(&field, Some(&Value::Null)), Coerced::Missing);
    }

    #[test]
    fn test_ordinal_by_value_or_label() {
        let field = size();
        assert_eq!(coerce(&field, Some(&json!("medium"))), Coerced::Value(2.0));
        assert_eq!(coerce(&field, Some(&json!("LARGE"))), Coerced::Value(3.0));
        assert_eq!(coerce(&field, Some(&json!("huge"))), Coerced::Excluded);
    }

    #[test]
    fn test_text_like_types_are_excluded() {
        let field = Field::new("comment", "Comment", FieldType::Text);
        assert_eq!(coerce(&field, Some(&json!("5"))), Coerced::Excluded);
        let field = Field::new("tools", "Tools", FieldType::Checkbox);
        assert_eq!(coerce(&field, Some(&json!(["a"]))), Coerced::Excluded);
    }

    #[test]
    fn test_category_keys() {
        assert_eq!(category(Some(&json!("north"))), Some("north".to_string()));
        assert_eq!(category(Some(&json!(3))), Some("3".to_string()));
        assert_eq!(category(Some(&json!(["a"]))), None);
        assert_eq!(category(None), None);
    }
}
