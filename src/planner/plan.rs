//! Query plan types

use serde::{Deserialize, Serialize};

use super::errors::{PlannerError, PlannerErrorCode};
use crate::intent::{Aggregation, IntentFilter, SortDirection, TimeWindow};
use crate::schema::FieldRef;

/// Outcome of plan validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Safety {
    Safe,
    Rejected {
        code: PlannerErrorCode,
        reason: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        field: Option<FieldRef>,
    },
}

impl Safety {
    pub fn is_safe(&self) -> bool {
        matches!(self, Safety::Safe)
    }

    pub fn code(&self) -> Option<PlannerErrorCode> {
        match self {
            Safety::Safe => None,
            Safety::Rejected { code, .. } => Some(*code),
        }
    }
}

impl From<PlannerError> for Safety {
    fn from(err: PlannerError) -> Self {
        Safety::Rejected {
            code: err.code(),
            reason: err.message().to_string(),
            field: err.field().cloned(),
        }
    }
}

/// Validated counterpart of a `QueryIntent`.
///
/// Immutable once built. A rejected plan keeps the intent's content so it
/// can still be explained, but it never reaches execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPlan {
    pub survey_id: String,
    pub aggregation: Aggregation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<FieldRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_by: Option<FieldRef>,
    #[serde(default)]
    pub filters: Vec<IntentFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortDirection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_window: Option<TimeWindow>,
    /// Result feeds the statistical estimator
    pub estimate: bool,
    pub safety: Safety,
}

impl QueryPlan {
    pub fn is_safe(&self) -> bool {
        self.safety.is_safe()
    }

    /// Field references carried by the plan, in a fixed order
    pub fn field_refs(&self) -> impl Iterator<Item = &FieldRef> {
        self.target
            .iter()
            .chain(self.group_by.iter())
            .chain(self.filters.iter().map(|f| &f.field))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_safety_serialization() {
        assert_eq!(serde_json::to_value(Safety::Safe).unwrap(), json!({"status": "safe"}));

        let rejected: Safety =
            PlannerError::unresolved(&FieldRef::new("pulse", "nope")).into();
        let value = serde_json::to_value(&rejected).unwrap();
        assert_eq!(value["status"], "rejected");
        assert_eq!(value["code"], "UNRESOLVED_REFERENCE");
        assert_eq!(value["field"]["fieldId"], "nope");
        assert_eq!(rejected.code(), Some(PlannerErrorCode::UnresolvedReference));
    }
}
