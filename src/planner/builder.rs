//! Plan builder
//!
//! Checks an intent against the registry in a strict order and stops at
//! the first violation. The builder never fails: a violation becomes
//! `Safety::Rejected` on the returned plan.
//!
//! Deterministic: same intent and registry, same plan.

use serde_json::Value;

use super::errors::{PlannerError, PlannerResult};
use super::plan::{QueryPlan, Safety};
use crate::intent::{Aggregation, FilterOperator, IntentFilter, QueryIntent};
use crate::schema::{parse_date, Field, FieldRef, FieldType, SchemaRegistry, Survey};

/// Default largest row limit
pub const DEFAULT_MAX_LIMIT: u64 = 1000;

/// Builds plans against one registry
#[derive(Debug, Clone)]
pub struct PlanBuilder<'a> {
    registry: &'a SchemaRegistry,
    max_limit: u64,
}

/// Build with the default limit
pub fn build(intent: &QueryIntent, registry: &SchemaRegistry, survey_id: &str) -> QueryPlan {
    PlanBuilder::new(registry).build(intent, survey_id)
}

impl<'a> PlanBuilder<'a> {
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        Self {
            registry,
            max_limit: DEFAULT_MAX_LIMIT,
        }
    }

    pub fn with_max_limit(mut self, max_limit: u64) -> Self {
        self.max_limit = max_limit;
        self
    }

    /// Builds a plan for `survey_id` from an intent.
    pub fn build(&self, intent: &QueryIntent, survey_id: &str) -> QueryPlan {
        let mut plan = QueryPlan {
            survey_id: survey_id.to_string(),
            aggregation: intent.aggregation,
            target: intent.target_field.clone(),
            group_by: intent.group_by_field.clone(),
            filters: intent.filters.clone(),
            sort: intent.sort,
            limit: intent.limit,
            time_window: intent.time_window,
            estimate: false,
            safety: Safety::Safe,
        };

        match self.check(intent, survey_id) {
            Ok(survey) => {
                // a grouped listing counts per group
                if plan.aggregation == Aggregation::None && plan.group_by.is_some() {
                    plan.aggregation = Aggregation::Count;
                }
                plan.estimate = plan.aggregation == Aggregation::Avg
                    && plan
                        .target
                        .as_ref()
                        .and_then(|t| survey.field(&t.field_id))
                        .map_or(false, |f| is_coercible(f.field_type));
            }
            Err(err) => plan.safety = err.into(),
        }

        plan
    }

    fn check(&self, intent: &QueryIntent, survey_id: &str) -> PlannerResult<&'a Survey> {
        // 1. Survey exists
        let survey = self
            .registry
            .survey(survey_id)
            .ok_or_else(|| PlannerError::unknown_survey(survey_id))?;

        // 2. Every reference belongs to this survey and resolves
        for field_ref in intent.field_refs() {
            if field_ref.survey_id != survey_id {
                return Err(PlannerError::cross_survey(field_ref, survey_id));
            }
            if survey.field(&field_ref.field_id).is_none() {
                return Err(PlannerError::unresolved(field_ref));
            }
        }

        // 3. Something to query
        if intent.aggregation == Aggregation::None
            && intent.target_field.is_none()
            && intent.group_by_field.is_none()
        {
            return Err(PlannerError::empty_intent());
        }

        // 4. Aggregations other than count need a target
        let needs_target = !matches!(intent.aggregation, Aggregation::None | Aggregation::Count);
        let target = match &intent.target_field {
            Some(target) => Some((target, lookup(survey, &target.field_id)?)),
            None if needs_target => {
                return Err(PlannerError::missing_target(intent.aggregation.as_str()))
            }
            None => None,
        };

        // 5. Aggregation type compatibility
        if let Some((target_ref, field)) = target {
            if !aggregation_accepts(intent.aggregation, field.field_type) {
                return Err(PlannerError::aggregation_mismatch(
                    target_ref,
                    intent.aggregation.as_str(),
                    field.field_type,
                ));
            }
        }

        // 6. Operator type compatibility
        for filter in &intent.filters {
            let field = lookup(survey, &filter.field.field_id)?;
            if !operator_accepts(filter.operator, field.field_type) {
                return Err(PlannerError::operator_mismatch(
                    &filter.field,
                    filter.operator.as_str(),
                    field.field_type,
                ));
            }
        }

        // 7. Filter value shape
        for filter in &intent.filters {
            let field = lookup(survey, &filter.field.field_id)?;
            check_value(filter, field)?;
        }

        // 8. Limit
        if let Some(limit) = intent.limit {
            if limit > self.max_limit {
                return Err(PlannerError::limit_exceeded(limit, self.max_limit));
            }
        }

        Ok(survey)
    }
}

fn lookup<'s>(survey: &'s Survey, field_id: &str) -> PlannerResult<&'s Field> {
    survey
        .field(field_id)
        .ok_or_else(|| PlannerError::unresolved(&FieldRef::new(&survey.survey_id, field_id)))
}

/// Types the estimator can coerce to numbers
fn is_coercible(field_type: FieldType) -> bool {
    field_type.is_numeric() || field_type.is_ordinal()
}

fn aggregation_accepts(aggregation: Aggregation, field_type: FieldType) -> bool {
    match aggregation {
        Aggregation::None | Aggregation::Count => true,
        Aggregation::Avg => is_coercible(field_type),
        Aggregation::Sum => field_type.is_numeric(),
        Aggregation::Min | Aggregation::Max => field_type.is_ordered(),
    }
}

fn operator_accepts(operator: FilterOperator, field_type: FieldType) -> bool {
    match operator {
        FilterOperator::Eq | FilterOperator::In => true,
        FilterOperator::DateRange => field_type == FieldType::Date,
        _ => field_type.is_ordered(),
    }
}

fn check_value(filter: &IntentFilter, field: &Field) -> PlannerResult<()> {
    let invalid = |reason: String| PlannerError::invalid_value(&filter.field, reason);

    match filter.operator {
        FilterOperator::Between | FilterOperator::DateRange => {
            let bounds = filter
                .value
                .as_array()
                .filter(|a| a.len() == 2)
                .ok_or_else(|| {
                    invalid(format!("'{}' needs a 2-element array", filter.operator))
                })?;
            for bound in bounds {
                ordered_scalar(bound, field).map_err(&invalid)?;
            }
        }
        FilterOperator::In => {
            let values = filter
                .value
                .as_array()
                .filter(|a| !a.is_empty())
                .ok_or_else(|| invalid("'in' needs a non-empty array".to_string()))?;
            if values.iter().any(|v| !is_scalar(v)) {
                return Err(invalid("'in' values must be scalars".to_string()));
            }
        }
        FilterOperator::Eq => {
            if !is_scalar(&filter.value) {
                return Err(invalid("'eq' needs a scalar value".to_string()));
            }
        }
        FilterOperator::Gt | FilterOperator::Gte | FilterOperator::Lt | FilterOperator::Lte => {
            ordered_scalar(&filter.value, field).map_err(&invalid)?;
        }
    }

    Ok(())
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

/// Range bound fitting an ordered field
fn ordered_scalar(value: &Value, field: &Field) -> Result<(), String> {
    if field.field_type == FieldType::Date {
        return match value.as_str().and_then(parse_date) {
            Some(_) => Ok(()),
            None => Err(format!("{} is not a date", value)),
        };
    }
    let numeric = match value {
        Value::Number(_) => true,
        Value::String(s) => s.trim().parse::<f64>().map_or(false, f64::is_finite),
        _ => false,
    };
    if numeric {
        Ok(())
    } else {
        Err(format!("{} is not a number", value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::{IntentFilter, SortDirection};
    use crate::planner::PlannerErrorCode;
    use crate::schema::FieldOption;
    use serde_json::json;

    fn registry() -> SchemaRegistry {
        let survey = Survey::new("pulse", "Pulse", 1)
            .with_field(Field::new("satisfaction", "Satisfaction", FieldType::Rating))
            .with_field(
                Field::new("age_group", "Age group", FieldType::Select)
                    .with_options(vec![FieldOption::new("18-25", "18-25")]),
            )
            .with_field(Field::new("comments", "Comments", FieldType::Text))
            .with_field(Field::new("visited_on", "Visit date", FieldType::Date));
        let mut registry = SchemaRegistry::new();
        registry.register(survey).unwrap();
        registry
    }

    fn r(field: &str) -> FieldRef {
        FieldRef::new("pulse", field)
    }

    fn intent(aggregation: Aggregation, target: Option<&str>, group: Option<&str>) -> QueryIntent {
        let mut intent = QueryIntent::empty("q", "q");
        intent.aggregation = aggregation;
        intent.target_field = target.map(r);
        intent.group_by_field = group.map(r);
        intent.confidence = 1.0;
        intent
    }

    fn code(plan: &QueryPlan) -> Option<PlannerErrorCode> {
        plan.safety.code()
    }

    #[test]
    fn test_safe_average_by_group() {
        let registry = registry();
        let plan = build(
            &intent(Aggregation::Avg, Some("satisfaction"), Some("age_group")),
            &registry,
            "pulse",
        );
        assert!(plan.is_safe());
        assert!(plan.estimate);
    }

    #[test]
    fn test_unknown_survey() {
        let registry = registry();
        let plan = build(&intent(Aggregation::Count, None, None), &registry, "nope");
        assert_eq!(code(&plan), Some(PlannerErrorCode::UnknownSurvey));
        assert!(!plan.estimate);
    }

    #[test]
    fn test_reference_checks() {
        let registry = registry();

        let plan = build(&intent(Aggregation::Avg, Some("missing"), None), &registry, "pulse");
        assert_eq!(code(&plan), Some(PlannerErrorCode::UnresolvedReference));

        let mut cross = intent(Aggregation::Avg, Some("satisfaction"), None);
        cross.target_field = Some(FieldRef::new("other", "satisfaction"));
        let plan = build(&cross, &registry, "pulse");
        assert_eq!(code(&plan), Some(PlannerErrorCode::CrossSurveyReference));
    }

    #[test]
    fn test_empty_and_missing_target() {
        let registry = registry();
        let plan = build(&intent(Aggregation::None, None, None), &registry, "pulse");
        assert_eq!(code(&plan), Some(PlannerErrorCode::EmptyIntent));

        let plan = build(&intent(Aggregation::Sum, None, Some("age_group")), &registry, "pulse");
        assert_eq!(code(&plan), Some(PlannerErrorCode::MissingTarget));

        // count needs no target
        let plan = build(&intent(Aggregation::Count, None, Some("age_group")), &registry, "pulse");
        assert!(plan.is_safe());
        assert!(!plan.estimate);
    }

    #[test]
    fn test_aggregation_type_mismatch() {
        let registry = registry();
        let plan = build(&intent(Aggregation::Avg, Some("comments"), None), &registry, "pulse");
        assert_eq!(code(&plan), Some(PlannerErrorCode::AggregationTypeMismatch));

        let plan = build(&intent(Aggregation::Sum, Some("age_group"), None), &registry, "pulse");
        assert_eq!(code(&plan), Some(PlannerErrorCode::AggregationTypeMismatch));

        let plan = build(&intent(Aggregation::Max, Some("visited_on"), None), &registry, "pulse");
        assert!(plan.is_safe());

        // ordinal average is estimable
        let plan = build(&intent(Aggregation::Avg, Some("age_group"), None), &registry, "pulse");
        assert!(plan.is_safe());
        assert!(plan.estimate);
    }

    #[test]
    fn test_filter_checks() {
        let registry = registry();
        let mut q = intent(Aggregation::Count, None, None);
        q.filters = vec![IntentFilter::new(r("comments"), FilterOperator::Gt, json!(3))];
        assert_eq!(
            code(&build(&q, &registry, "pulse")),
            Some(PlannerErrorCode::OperatorTypeMismatch)
        );

        q.filters = vec![IntentFilter::new(
            r("satisfaction"),
            FilterOperator::DateRange,
            json!([1, 2]),
        )];
        assert_eq!(
            code(&build(&q, &registry, "pulse")),
            Some(PlannerErrorCode::OperatorTypeMismatch)
        );

        q.filters = vec![IntentFilter::new(
            r("satisfaction"),
            FilterOperator::Between,
            json!([1]),
        )];
        assert_eq!(
            code(&build(&q, &registry, "pulse")),
            Some(PlannerErrorCode::InvalidFilterValue)
        );

        q.filters = vec![IntentFilter::new(r("age_group"), FilterOperator::In, json!([]))];
        assert_eq!(
            code(&build(&q, &registry, "pulse")),
            Some(PlannerErrorCode::InvalidFilterValue)
        );

        q.filters = vec![IntentFilter::new(
            r("visited_on"),
            FilterOperator::DateRange,
            json!(["2024-01-01", "2024-02-01"]),
        )];
        assert!(build(&q, &registry, "pulse").is_safe());
    }

    #[test]
    fn test_limit_exceeded() {
        let registry = registry();
        let mut q = intent(Aggregation::Count, None, Some("age_group"));
        q.sort = Some(SortDirection::Desc);
        q.limit = Some(5000);
        let plan = PlanBuilder::new(&registry).with_max_limit(100).build(&q, "pulse");
        assert_eq!(code(&plan), Some(PlannerErrorCode::LimitExceeded));

        q.limit = Some(100);
        assert!(PlanBuilder::new(&registry).with_max_limit(100).build(&q, "pulse").is_safe());
    }

    #[test]
    fn test_first_violation_wins() {
        let registry = registry();
        let mut q = intent(Aggregation::Sum, Some("comments"), None);
        q.limit = Some(1_000_000);
        let plan = build(&q, &registry, "pulse");
        assert_eq!(code(&plan), Some(PlannerErrorCode::AggregationTypeMismatch));
    }

    #[test]
    fn test_grouped_listing_counts() {
        let registry = registry();
        let plan = build(
            &intent(Aggregation::None, Some("satisfaction"), Some("age_group")),
            &registry,
            "pulse",
        );
        assert!(plan.is_safe());
        assert_eq!(plan.aggregation, Aggregation::Count);
    }
}
