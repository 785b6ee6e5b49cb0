//! Survey responses
//!
//! Responses are read-only inputs. The core never writes them; storage
//! belongs to the caller behind `ResponseStore`.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Answers keyed by field id
pub type ResponseData = BTreeMap<String, Value>;

/// One respondent's submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub id: String,
    pub survey_id: String,
    #[serde(default)]
    pub data: ResponseData,
    #[serde(default)]
    pub is_complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_time_seconds: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl Response {
    pub fn new(id: impl Into<String>, survey_id: impl Into<String>, data: ResponseData) -> Self {
        Self {
            id: id.into(),
            survey_id: survey_id.into(),
            data,
            is_complete: true,
            completion_time_seconds: None,
            created_at: DateTime::<Utc>::default(),
        }
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn incomplete(mut self) -> Self {
        self.is_complete = false;
        self
    }

    pub fn answer(&self, field_id: &str) -> Option<&Value> {
        self.data.get(field_id)
    }
}

/// Selection applied by a response store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseFilter {
    pub complete_only: bool,
    /// Inclusive lower bound on `created_at`
    pub created_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`
    pub created_until: Option<DateTime<Utc>>,
}

impl ResponseFilter {
    pub fn matches(&self, response: &Response) -> bool {
        if self.complete_only && !response.is_complete {
            return false;
        }
        if let Some(from) = self.created_from {
            if response.created_at < from {
                return false;
            }
        }
        if let Some(until) = self.created_until {
            if response.created_at >= until {
                return false;
            }
        }
        true
    }
}

/// Source of responses for a survey
pub trait ResponseStore {
    fn get_responses(&self, survey_id: &str, filter: &ResponseFilter) -> Vec<&Response>;
}

#[derive(Debug, Error)]
pub enum ResponseLoadError {
    #[error("failed to read responses from '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed responses file '{path}': {reason}")]
    Malformed { path: String, reason: String },
}

/// In-memory response store
#[derive(Debug, Clone, Default)]
pub struct ResponseSet {
    responses: Vec<Response>,
}

impl ResponseSet {
    pub fn new(responses: Vec<Response>) -> Self {
        Self { responses }
    }

    /// Loads a JSON array of responses
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self, ResponseLoadError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let content = fs::read_to_string(path).map_err(|source| ResponseLoadError::Io {
            path: display.clone(),
            source,
        })?;
        let responses: Vec<Response> =
            serde_json::from_str(&content).map_err(|e| ResponseLoadError::Malformed {
                path: display,
                reason: e.to_string(),
            })?;
        Ok(Self { responses })
    }

    pub fn push(&mut self, response: Response) {
        self.responses.push(response);
    }

    pub fn as_slice(&self) -> &[Response] {
        &self.responses
    }

    /// Responses of one survey, in insertion order
    pub fn for_survey(&self, survey_id: &str) -> Vec<Response> {
        self.responses
            .iter()
            .filter(|r| r.survey_id == survey_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.responses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }
}

impl ResponseStore for ResponseSet {
    fn get_responses(&self, survey_id: &str, filter: &ResponseFilter) -> Vec<&Response> {
        self.responses
            .iter()
            .filter(|r| r.survey_id == survey_id && filter.matches(r))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use tempfile::TempDir;

    fn data(value: Value) -> ResponseData {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_store_filters_by_survey_and_completion() {
        let set = ResponseSet::new(vec![
            Response::new("r1", "pulse", data(json!({"q": 1}))),
            Response::new("r2", "pulse", data(json!({"q": 2}))).incomplete(),
            Response::new("r3", "other", data(json!({"q": 3}))),
        ]);

        let all = set.get_responses("pulse", &ResponseFilter::default());
        assert_eq!(all.len(), 2);

        let complete = set.get_responses(
            "pulse",
            &ResponseFilter {
                complete_only: true,
                ..Default::default()
            },
        );
        assert_eq!(complete.len(), 1);
        assert_eq!(complete[0].id, "r1");
    }

    #[test]
    fn test_created_window_is_half_open() {
        let day = |d| Utc.with_ymd_and_hms(2024, 3, d, 0, 0, 0).unwrap();
        let set = ResponseSet::new(vec![
            Response::new("a", "s", ResponseData::new()).with_created_at(day(1)),
            Response::new("b", "s", ResponseData::new()).with_created_at(day(2)),
        ]);
        let filter = ResponseFilter {
            created_from: Some(day(1)),
            created_until: Some(day(2)),
            ..Default::default()
        };
        let hits = set.get_responses("s", &filter);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a");
    }

    #[test]
    fn test_load_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("responses.json");
        fs::write(
            &path,
            json!([{
                "id": "r1",
                "surveyId": "pulse",
                "data": {"satisfaction": 5},
                "isComplete": true,
                "createdAt": "2024-03-01T12:00:00Z"
            }])
            .to_string(),
        )
        .unwrap();

        let set = ResponseSet::load_file(&path).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.as_slice()[0].answer("satisfaction"), Some(&json!(5)));
    }

    #[test]
    fn test_load_malformed_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("responses.json");
        fs::write(&path, "{}").unwrap();
        assert!(matches!(
            ResponseSet::load_file(&path),
            Err(ResponseLoadError::Malformed { .. })
        ));
    }
}
