//! In-memory survey registry
//!
//! One current view per survey id. A published (surveyId, version) pair is
//! immutable; a higher version replaces the view.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

use super::errors::{SchemaError, SchemaResult};
use super::types::{Field, FieldRef, Survey};

/// Source of survey field definitions
pub trait FieldProvider {
    /// Ordered fields of a survey, `None` when the survey is unknown
    fn get_fields(&self, survey_id: &str) -> Option<&[Field]>;
}

#[derive(Debug, Clone)]
struct Entry {
    survey: Survey,
    fingerprint: String,
}

/// Registry of published surveys
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    surveys: BTreeMap<String, Entry>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and publishes a survey.
    ///
    /// Re-registering identical content is a no-op. Registering the same
    /// version with different content fails with SURVEY_IMMUTABLE.
    pub fn register(&mut self, survey: Survey) -> SchemaResult<()> {
        survey.validate_structure()?;

        if let Some(existing) = self.surveys.get(&survey.survey_id) {
            let current = existing.survey.version;
            if survey.version == current {
                if existing.survey == survey {
                    return Ok(());
                }
                return Err(SchemaError::immutable(&survey.survey_id, survey.version));
            }
            if survey.version < current {
                return Err(SchemaError::version_regression(
                    &survey.survey_id,
                    current,
                    survey.version,
                ));
            }
        }

        let fingerprint = compute_fingerprint(&survey);
        self.surveys
            .insert(survey.survey_id.clone(), Entry { survey, fingerprint });
        Ok(())
    }

    pub fn survey(&self, survey_id: &str) -> Option<&Survey> {
        self.surveys.get(survey_id).map(|e| &e.survey)
    }

    pub fn contains(&self, survey_id: &str) -> bool {
        self.surveys.contains_key(survey_id)
    }

    /// Ordered fields of a survey
    pub fn fields(&self, survey_id: &str) -> SchemaResult<&[Field]> {
        self.survey(survey_id)
            .map(|s| s.fields.as_slice())
            .ok_or_else(|| SchemaError::unknown_survey(survey_id))
    }

    /// Resolves a reference to its field definition
    pub fn resolve(&self, field_ref: &FieldRef) -> Option<&Field> {
        self.survey(&field_ref.survey_id)
            .and_then(|s| s.field(&field_ref.field_id))
    }

    /// SHA-256 of the canonical JSON of the survey's field set
    pub fn fingerprint(&self, survey_id: &str) -> Option<&str> {
        self.surveys.get(survey_id).map(|e| e.fingerprint.as_str())
    }

    /// Registered survey ids in lexicographic order
    pub fn survey_ids(&self) -> impl Iterator<Item = &str> {
        self.surveys.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.surveys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surveys.is_empty()
    }
}

impl FieldProvider for SchemaRegistry {
    fn get_fields(&self, survey_id: &str) -> Option<&[Field]> {
        self.fields(survey_id).ok()
    }
}

fn compute_fingerprint(survey: &Survey) -> String {
    let mut hasher = Sha256::new();
    // Field structs serialize in declaration order, so the encoding is canonical
    match serde_json::to_vec(&survey.fields) {
        Ok(bytes) => hasher.update(&bytes),
        Err(_) => hasher.update(survey.survey_id.as_bytes()),
    }
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}
