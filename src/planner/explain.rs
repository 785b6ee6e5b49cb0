//! Explain output
//!
//! Deterministic, human-readable rendering of a plan, accepted or not.

use std::fmt;

use serde::Serialize;

use super::plan::{QueryPlan, Safety};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplainPlan {
    pub accepted: bool,
    pub survey_id: String,
    pub aggregation: String,
    pub target: Option<String>,
    pub group_by: Option<String>,
    pub predicates: Vec<String>,
    pub time_window: Option<String>,
    pub sort: Option<String>,
    pub limit: Option<u64>,
    pub estimate: bool,
    pub rejection_code: Option<String>,
    pub rejection_reason: Option<String>,
    pub rejection_field: Option<String>,
}

impl ExplainPlan {
    pub fn from_plan(plan: &QueryPlan) -> Self {
        let predicates = plan
            .filters
            .iter()
            .map(|f| format!("{} {} {}", f.field.field_id, f.operator, f.value))
            .collect();

        let (rejection_code, rejection_reason, rejection_field) = match &plan.safety {
            Safety::Safe => (None, None, None),
            Safety::Rejected {
                code,
                reason,
                field,
            } => (
                Some(code.code().to_string()),
                Some(reason.clone()),
                field.as_ref().map(|f| f.to_string()),
            ),
        };

        Self {
            accepted: plan.is_safe(),
            survey_id: plan.survey_id.clone(),
            aggregation: plan.aggregation.as_str().to_string(),
            target: plan.target.as_ref().map(|f| f.field_id.clone()),
            group_by: plan.group_by.as_ref().map(|f| f.field_id.clone()),
            predicates,
            time_window: plan.time_window.map(|w| w.phrase().to_string()),
            sort: plan.sort.map(|s| s.keyword().to_string()),
            limit: plan.limit,
            estimate: plan.estimate,
            rejection_code,
            rejection_reason,
            rejection_field,
        }
    }
}

impl fmt::Display for ExplainPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== EXPLAIN PLAN ===")?;
        writeln!(f, "Survey: {}", self.survey_id)?;

        if !self.accepted {
            writeln!(f, "Status: REJECTED")?;
            if let Some(code) = &self.rejection_code {
                writeln!(f, "Error Code: {}", code)?;
            }
            if let Some(reason) = &self.rejection_reason {
                writeln!(f, "Reason: {}", reason)?;
            }
            if let Some(field) = &self.rejection_field {
                writeln!(f, "Field: {}", field)?;
            }
            return Ok(());
        }

        writeln!(f, "Status: ACCEPTED")?;
        writeln!(f, "Aggregation: {}", self.aggregation)?;
        if let Some(target) = &self.target {
            writeln!(f, "Target: {}", target)?;
        }
        if let Some(group) = &self.group_by {
            writeln!(f, "Group By: {}", group)?;
        }
        if !self.predicates.is_empty() {
            writeln!(f, "Predicates:")?;
            for pred in &self.predicates {
                writeln!(f, "  - {}", pred)?;
            }
        }
        if let Some(window) = &self.time_window {
            writeln!(f, "Time Window: {}", window)?;
        }
        if let Some(sort) = &self.sort {
            writeln!(f, "Sort: {}", sort)?;
        }
        if let Some(limit) = self.limit {
            writeln!(f, "Limit: {}", limit)?;
        }
        writeln!(f, "Estimate: {}", if self.estimate { "yes" } else { "no" })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::{Aggregation, FilterOperator, IntentFilter};
    use crate::planner::{PlannerError, PlannerErrorCode};
    use crate::schema::FieldRef;
    use serde_json::json;

    fn plan() -> QueryPlan {
        QueryPlan {
            survey_id: "pulse".into(),
            aggregation: Aggregation::Avg,
            target: Some(FieldRef::new("pulse", "satisfaction")),
            group_by: Some(FieldRef::new("pulse", "age_group")),
            filters: vec![IntentFilter::new(
                FieldRef::new("pulse", "satisfaction"),
                FilterOperator::Gte,
                json!(2),
            )],
            sort: None,
            limit: None,
            time_window: None,
            estimate: true,
            safety: Safety::Safe,
        }
    }

    #[test]
    fn test_explain_accepted_plan() {
        let explain = ExplainPlan::from_plan(&plan());
        assert!(explain.accepted);
        assert_eq!(explain.predicates, vec!["satisfaction gte 2"]);

        let output = explain.to_string();
        assert!(output.starts_with("=== EXPLAIN PLAN ===\n"));
        assert!(output.contains("Status: ACCEPTED"));
        assert!(output.contains("Group By: age_group"));
        assert!(output.contains("Estimate: yes"));
    }

    #[test]
    fn test_explain_rejected_plan() {
        let mut rejected = plan();
        rejected.safety = PlannerError::unresolved(&FieldRef::new("pulse", "nope")).into();

        let explain = ExplainPlan::from_plan(&rejected);
        assert!(!explain.accepted);
        assert_eq!(
            explain.rejection_code.as_deref(),
            Some(PlannerErrorCode::UnresolvedReference.code())
        );

        let output = explain.to_string();
        assert!(output.contains("Status: REJECTED"));
        assert!(output.contains("Field: pulse.nope"));
        assert!(!output.contains("Aggregation"));
    }

    #[test]
    fn test_explain_deterministic() {
        let p = plan();
        assert_eq!(
            ExplainPlan::from_plan(&p).to_string(),
            ExplainPlan::from_plan(&p).to_string()
        );
    }
}
