//! Next-field selection
//!
//! Order of precedence:
//! 1. No current field: `firstField`, else the first declared field
//! 2. Current field's branching rules, in declaration order
//! 3. Next non-conditional field after the current one
//! 4. Terminal

use serde::Serialize;
use serde_json::Value;

use super::errors::{AdaptiveError, AdaptiveResult};
use crate::response::ResponseData;
use crate::schema::Survey;

/// Outcome of one selection step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdaptiveDecision {
    pub next_field_id: Option<String>,
    pub reasoning: String,
    pub survey_complete: bool,
    /// Index of the matched rule in the current field's branching list
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_rule: Option<usize>,
}

impl AdaptiveDecision {
    fn ask(field_id: &str, reasoning: String, matched_rule: Option<usize>) -> Self {
        Self {
            next_field_id: Some(field_id.to_string()),
            reasoning,
            survey_complete: false,
            matched_rule,
        }
    }

    fn complete(reasoning: String) -> Self {
        Self {
            next_field_id: None,
            reasoning,
            survey_complete: true,
            matched_rule: None,
        }
    }
}

/// Selects the next field of one survey
pub struct AdaptiveSelector<'a> {
    survey: &'a Survey,
}

impl<'a> AdaptiveSelector<'a> {
    pub fn new(survey: &'a Survey) -> Self {
        Self { survey }
    }

    /// Chooses the field to ask after `current`, given the answers so far
    pub fn next(
        &self,
        current: Option<&str>,
        answers: &ResponseData,
    ) -> AdaptiveResult<AdaptiveDecision> {
        let Some(current_id) = current else {
            return Ok(self.start());
        };

        let position = self
            .survey
            .position(current_id)
            .ok_or_else(|| AdaptiveError::UnknownField {
                survey_id: self.survey.survey_id.clone(),
                field_id: current_id.to_string(),
            })?;
        let field = &self.survey.fields[position];

        for (index, rule) in field.branching.iter().enumerate() {
            if rule.when.evaluate(answers) {
                return Ok(AdaptiveDecision::ask(
                    &rule.goto,
                    format!("rule {} on '{}' matched: {}", index, field.id, rule.when),
                    Some(index),
                ));
            }
        }

        let next = self.survey.fields[position + 1..]
            .iter()
            .find(|f| !f.conditional);

        Ok(match next {
            Some(next) => AdaptiveDecision::ask(
                &next.id,
                format!("no rule matched on '{}'; next in declared order", field.id),
                None,
            ),
            None => AdaptiveDecision::complete(format!(
                "no rule matched on '{}' and no field follows",
                field.id
            )),
        })
    }

    fn start(&self) -> AdaptiveDecision {
        if let Some(first) = &self.survey.first_field {
            return AdaptiveDecision::ask(first, "configured first field".to_string(), None);
        }
        match self.survey.fields.iter().find(|f| !f.conditional) {
            Some(field) => AdaptiveDecision::ask(&field.id, "first declared field".to_string(), None),
            None => AdaptiveDecision::complete("survey declares no reachable fields".to_string()),
        }
    }

    /// Walks an ordered answer log and returns every decision.
    ///
    /// The first decision is the start of the survey; each following one is
    /// taken right after the corresponding answer was recorded.
    pub fn replay(&self, log: &[(String, Value)]) -> AdaptiveResult<Vec<AdaptiveDecision>> {
        let mut answers = ResponseData::new();
        let mut decisions = Vec::with_capacity(log.len() + 1);
        decisions.push(self.start());

        for (field_id, value) in log {
            answers.insert(field_id.clone(), value.clone());
            decisions.push(self.next(Some(field_id), &answers)?);
        }

        Ok(decisions)
    }
}
