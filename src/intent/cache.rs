//! Intent cache
//!
//! Parsing is deterministic, so an intent can be reused for the same
//! normalized question as long as the survey's field set is unchanged.
//! Entries are grouped per survey under the fingerprint they were parsed
//! against; a new fingerprint drops the whole group.

use std::collections::HashMap;

use super::types::QueryIntent;

#[derive(Debug)]
struct SurveyEntries {
    fingerprint: String,
    intents: HashMap<String, QueryIntent>,
}

/// Caller-owned cache of parsed intents
#[derive(Debug, Default)]
pub struct IntentCache {
    surveys: HashMap<String, SurveyEntries>,
}

impl IntentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached intent for `normalized_text`, re-labelled with `raw_text`
    pub fn get(
        &self,
        survey_id: &str,
        fingerprint: &str,
        normalized_text: &str,
        raw_text: &str,
    ) -> Option<QueryIntent> {
        let entries = self.surveys.get(survey_id)?;
        if entries.fingerprint != fingerprint {
            return None;
        }
        let mut intent = entries.intents.get(normalized_text)?.clone();
        intent.raw_text = raw_text.to_string();
        Some(intent)
    }

    pub fn insert(&mut self, survey_id: &str, fingerprint: &str, intent: QueryIntent) {
        let entries = self
            .surveys
            .entry(survey_id.to_string())
            .or_insert_with(|| SurveyEntries {
                fingerprint: fingerprint.to_string(),
                intents: HashMap::new(),
            });
        if entries.fingerprint != fingerprint {
            entries.fingerprint = fingerprint.to_string();
            entries.intents.clear();
        }
        entries
            .intents
            .insert(intent.normalized_text.clone(), intent);
    }

    /// Drops every entry for a survey
    pub fn invalidate(&mut self, survey_id: &str) {
        self.surveys.remove(survey_id);
    }

    pub fn len(&self) -> usize {
        self.surveys.values().map(|e| e.intents.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
