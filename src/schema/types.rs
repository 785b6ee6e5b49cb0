//! Survey and field definitions
//!
//! Field types:
//! - text: free text
//! - number: numeric answer
//! - select / radio: one of the declared options
//! - checkbox: list of declared options
//! - date: ISO-8601 date or datetime
//! - rating: numeric scale bounded by `validation.min..=max`

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::errors::{SchemaError, SchemaResult, ValidationDetails};
use crate::adaptive::BranchRule;

/// Field type of a survey question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Number,
    Select,
    Radio,
    Checkbox,
    Date,
    Rating,
}

impl FieldType {
    /// Returns the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Number => "number",
            FieldType::Select => "select",
            FieldType::Radio => "radio",
            FieldType::Checkbox => "checkbox",
            FieldType::Date => "date",
            FieldType::Rating => "rating",
        }
    }

    /// True for types that carry an option list
    pub fn has_options(&self) -> bool {
        matches!(self, FieldType::Select | FieldType::Radio | FieldType::Checkbox)
    }

    /// True for number and rating
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Number | FieldType::Rating)
    }

    /// True for types whose values have an order (range comparisons apply)
    pub fn is_ordered(&self) -> bool {
        matches!(self, FieldType::Number | FieldType::Rating | FieldType::Date)
    }

    /// True for single-choice types mapped to option position
    pub fn is_ordinal(&self) -> bool {
        matches!(self, FieldType::Select | FieldType::Radio)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// One declared option of a choice field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOption {
    pub value: String,
    pub label: String,
}

impl FieldOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// Per-field validation rules
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default)]
    pub required: bool,
}

/// A survey question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FieldOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationRules>,
    /// Extra phrases the matcher accepts for this field
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub synonyms: Vec<String>,
    /// Branching rules evaluated after this field is answered
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub branching: Vec<BranchRule>,
    /// Only reachable through a branching rule
    #[serde(default)]
    pub conditional: bool,
}

impl Field {
    /// Create a field with no options, rules or synonyms
    pub fn new(id: impl Into<String>, label: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            field_type,
            options: Vec::new(),
            validation: None,
            synonyms: Vec::new(),
            branching: Vec::new(),
            conditional: false,
        }
    }

    pub fn with_options(mut self, options: Vec<FieldOption>) -> Self {
        self.options = options;
        self
    }

    pub fn with_validation(mut self, rules: ValidationRules) -> Self {
        self.validation = Some(rules);
        self
    }

    pub fn with_synonyms<I, S>(mut self, synonyms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.synonyms = synonyms.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_branching(mut self, rules: Vec<BranchRule>) -> Self {
        self.branching = rules;
        self
    }

    pub fn conditional(mut self) -> Self {
        self.conditional = true;
        self
    }

    pub fn is_required(&self) -> bool {
        self.validation.as_ref().map_or(false, |v| v.required)
    }

    /// 1-based position of an option matched by value or label, case-insensitive
    pub fn option_position(&self, raw: &str) -> Option<usize> {
        let needle = raw.trim().to_lowercase();
        self.options
            .iter()
            .position(|o| o.value.to_lowercase() == needle || o.label.to_lowercase() == needle)
            .map(|idx| idx + 1)
    }

    /// Option matched by value or label, case-insensitive
    pub fn find_option(&self, raw: &str) -> Option<&FieldOption> {
        self.option_position(raw).map(|pos| &self.options[pos - 1])
    }
}

/// A published survey definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Survey {
    pub survey_id: String,
    pub title: String,
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_field: Option<String>,
    /// Declaration order is the static linear order
    pub fields: Vec<Field>,
}

impl Survey {
    pub fn new(survey_id: impl Into<String>, title: impl Into<String>, version: u32) -> Self {
        Self {
            survey_id: survey_id.into(),
            title: title.into(),
            version,
            first_field: None,
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_first_field(mut self, field_id: impl Into<String>) -> Self {
        self.first_field = Some(field_id.into());
        self
    }

    pub fn field(&self, field_id: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.id == field_id)
    }

    /// Declaration index of a field
    pub fn position(&self, field_id: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.id == field_id)
    }

    /// Validates the survey definition itself (not a response)
    pub fn validate_structure(&self) -> SchemaResult<()> {
        let invalid = |details| SchemaError::invalid_structure(&self.survey_id, details);

        if self.survey_id.trim().is_empty() {
            return Err(invalid(ValidationDetails::new(
                "survey",
                "non-empty surveyId",
                "empty",
            )));
        }

        let mut seen = BTreeSet::new();
        for field in &self.fields {
            if field.id.trim().is_empty() {
                return Err(invalid(ValidationDetails::new(
                    "survey",
                    "non-empty field id",
                    "empty",
                )));
            }
            if !seen.insert(field.id.as_str()) {
                return Err(invalid(ValidationDetails::duplicate_field(&field.id)));
            }
            if field.field_type.has_options() && field.options.is_empty() {
                return Err(invalid(ValidationDetails::missing_options(
                    &field.id,
                    field.field_type.type_name(),
                )));
            }
            if let Some(rules) = &field.validation {
                if let (Some(min), Some(max)) = (rules.min, rules.max) {
                    if min > max {
                        return Err(invalid(ValidationDetails::inverted_bounds(&field.id, "min/max")));
                    }
                }
                if let (Some(min), Some(max)) = (rules.min_length, rules.max_length) {
                    if min > max {
                        return Err(invalid(ValidationDetails::inverted_bounds(
                            &field.id,
                            "minLength/maxLength",
                        )));
                    }
                }
            }
        }

        if let Some(first) = &self.first_field {
            if !seen.contains(first.as_str()) {
                return Err(invalid(ValidationDetails::dangling_target("firstField", first)));
            }
        }

        for field in &self.fields {
            for rule in &field.branching {
                if !seen.contains(rule.goto.as_str()) {
                    return Err(invalid(ValidationDetails::dangling_target(&field.id, &rule.goto)));
                }
                let subject = rule.when.field();
                if !seen.contains(subject) {
                    return Err(invalid(ValidationDetails::dangling_target(&field.id, subject)));
                }
            }
        }

        Ok(())
    }
}

/// Reference to a field of a specific survey
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldRef {
    pub survey_id: String,
    pub field_id: String,
}

impl FieldRef {
    pub fn new(survey_id: impl Into<String>, field_id: impl Into<String>) -> Self {
        Self {
            survey_id: survey_id.into(),
            field_id: field_id.into(),
        }
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.survey_id, self.field_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adaptive::{RulePredicate, ThresholdOp};
    use crate::schema::SchemaErrorCode;
    use serde_json::json;

    fn sample_survey() -> Survey {
        Survey::new("pulse", "Customer pulse", 1)
            .with_field(
                Field::new("satisfaction", "Satisfaction rating", FieldType::Rating)
                    .with_validation(ValidationRules {
                        min: Some(1.0),
                        max: Some(5.0),
                        ..Default::default()
                    }),
            )
            .with_field(
                Field::new("age_group", "Age group", FieldType::Select).with_options(vec![
                    FieldOption::new("18-25", "18-25"),
                    FieldOption::new("26-35", "26-35"),
                ]),
            )
    }

    #[test]
    fn test_structure_valid() {
        assert!(sample_survey().validate_structure().is_ok());
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let survey = sample_survey().with_field(Field::new("satisfaction", "Again", FieldType::Text));
        let err = survey.validate_structure().unwrap_err();
        assert_eq!(err.code(), SchemaErrorCode::SurveyInvalidStructure);
        assert_eq!(err.details().unwrap().field, "satisfaction");
    }

    #[test]
    fn test_choice_field_requires_options() {
        let survey = sample_survey().with_field(Field::new("plan", "Plan", FieldType::Radio));
        assert!(survey.validate_structure().is_err());
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let survey = Survey::new("s", "S", 1).with_field(
            Field::new("n", "N", FieldType::Number).with_validation(ValidationRules {
                min: Some(10.0),
                max: Some(1.0),
                ..Default::default()
            }),
        );
        assert!(survey.validate_structure().is_err());
    }

    #[test]
    fn test_branch_target_must_exist() {
        let survey = sample_survey().with_field(
            Field::new("nps", "NPS", FieldType::Number).with_branching(vec![BranchRule {
                when: RulePredicate::Threshold {
                    field: "nps".into(),
                    op: ThresholdOp::Lte,
                    value: 6.0,
                },
                goto: "ghost".into(),
            }]),
        );
        let err = survey.validate_structure().unwrap_err();
        assert!(err.message().contains("ghost"));
    }

    #[test]
    fn test_first_field_must_exist() {
        let survey = sample_survey().with_first_field("missing");
        assert!(survey.validate_structure().is_err());
    }

    #[test]
    fn test_option_position_matches_value_or_label() {
        let field = Field::new("plan", "Plan", FieldType::Select).with_options(vec![
            FieldOption::new("basic", "Basic"),
            FieldOption::new("pro", "Professional"),
        ]);
        assert_eq!(field.option_position("basic"), Some(1));
        assert_eq!(field.option_position("PROFESSIONAL"), Some(2));
        assert_eq!(field.option_position("enterprise"), None);
    }

    #[test]
    fn test_survey_deserializes_camel_case() {
        let survey: Survey = serde_json::from_value(json!({
            "surveyId": "pulse",
            "title": "Pulse",
            "version": 3,
            "firstField": "q1",
            "fields": [
                {"id": "q1", "label": "Q1", "type": "rating", "validation": {"min": 1, "max": 5, "required": true}}
            ]
        }))
        .unwrap();
        assert_eq!(survey.version, 3);
        assert!(survey.fields[0].is_required());
        assert_eq!(survey.fields[0].field_type, FieldType::Rating);
    }
}
