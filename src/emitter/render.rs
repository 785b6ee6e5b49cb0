//! Plan to parameterized query
//!
//! Rendering order:
//! 1. Projections (field keys bound on first use)
//! 2. `survey_id = $n`
//! 3. Time-window bounds on `created_at`
//! 4. Filters in plan order
//! 5. GROUP BY, ORDER BY, LIMIT
//!
//! A field key is bound once and reused; literals are bound per use.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::errors::UnsafeQueryError;
use super::statement::{
    AggregateFunction, Alias, Cast, Comparison, OrderTerm, Operand, Predicate, Projection,
    Relation, Statement, SystemColumn, Verb,
};
use crate::intent::{Aggregation, FilterOperator, IntentFilter, SortDirection};
use crate::planner::{QueryPlan, Safety};
use crate::schema::{Field, FieldType, SchemaRegistry, Survey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParamKind {
    Literal,
    FieldKey,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryParam {
    /// 1-based placeholder number
    pub index: usize,
    pub kind: ParamKind,
    pub value: Value,
}

/// Parameterized query ready for an executor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedQuery {
    pub survey_id: String,
    pub sql: String,
    pub params: Vec<QueryParam>,
    pub statement: Statement,
}

impl RenderedQuery {
    pub fn param(&self, index: usize) -> Option<&QueryParam> {
        index.checked_sub(1).and_then(|i| self.params.get(i))
    }
}

/// Placeholder allocation
#[derive(Default)]
struct Binder {
    params: Vec<QueryParam>,
    keys: BTreeMap<String, usize>,
}

impl Binder {
    fn literal(&mut self, value: Value) -> Operand {
        Operand::Param {
            index: self.literal_index(value),
        }
    }

    fn literal_index(&mut self, value: Value) -> usize {
        self.params.push(QueryParam {
            index: self.params.len() + 1,
            kind: ParamKind::Literal,
            value,
        });
        self.params.len()
    }

    fn key(&mut self, field_id: &str) -> usize {
        if let Some(&index) = self.keys.get(field_id) {
            return index;
        }
        self.params.push(QueryParam {
            index: self.params.len() + 1,
            kind: ParamKind::FieldKey,
            value: Value::String(field_id.to_string()),
        });
        let index = self.params.len();
        self.keys.insert(field_id.to_string(), index);
        index
    }

    fn field(&mut self, field: &Field, cast: Cast) -> Operand {
        Operand::Field {
            key: self.key(&field.id),
            cast,
        }
    }
}

/// Renders plans against one registry
#[derive(Debug, Clone)]
pub struct QueryEmitter<'a> {
    registry: &'a SchemaRegistry,
    as_of: DateTime<Utc>,
}

impl<'a> QueryEmitter<'a> {
    /// Time windows resolve against the current time
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        Self {
            registry,
            as_of: Utc::now(),
        }
    }

    /// Pins the reference time for time windows
    pub fn with_as_of(mut self, as_of: DateTime<Utc>) -> Self {
        self.as_of = as_of;
        self
    }

    pub fn registry(&self) -> &'a SchemaRegistry {
        self.registry
    }

    /// Renders the plan's aggregate query. Refuses rejected plans.
    pub fn emit(&self, plan: &QueryPlan) -> Result<RenderedQuery, UnsafeQueryError> {
        let survey = self.admit(plan)?;
        let mut binder = Binder::default();

        let target = self.plan_field(survey, plan.target.as_ref().map(|f| f.field_id.as_str()))?;
        let group = self.plan_field(survey, plan.group_by.as_ref().map(|f| f.field_id.as_str()))?;

        let mut projections = Vec::new();
        let mut group_by = Vec::new();
        let mut order_by = Vec::new();

        if let Some(group) = group {
            projections.push(Projection::Expr {
                operand: binder.field(group, Cast::Text),
                alias: Alias::GroupKey,
            });
            group_by.push(Alias::GroupKey);
        }

        match AggregateFunction::from_aggregation(plan.aggregation) {
            Some(function) => {
                let operand = match target {
                    Some(field) => Some(aggregate_operand(&mut binder, plan.aggregation, field)),
                    None => None,
                };
                projections.push(Projection::Aggregate {
                    function,
                    operand,
                    alias: Alias::Value,
                });
                if let Some(direction) = plan.sort {
                    order_by.push(OrderTerm::alias(Alias::Value, direction));
                }
                if !group_by.is_empty() {
                    order_by.push(OrderTerm::alias(Alias::GroupKey, SortDirection::Asc));
                }
            }
            None => {
                // listing
                projections.push(Projection::Column {
                    column: SystemColumn::Id,
                });
                projections.push(Projection::Column {
                    column: SystemColumn::CreatedAt,
                });
                if let Some(field) = target {
                    projections.push(Projection::Expr {
                        operand: binder.field(field, Cast::Text),
                        alias: Alias::Target,
                    });
                    if let Some(direction) = plan.sort {
                        order_by.push(OrderTerm::alias(Alias::Target, direction));
                    }
                }
                order_by.push(OrderTerm::column(SystemColumn::CreatedAt, SortDirection::Asc));
                order_by.push(OrderTerm::column(SystemColumn::Id, SortDirection::Asc));
            }
        }

        let predicates = self.predicates(survey, plan, &mut binder)?;
        let limit = plan.limit.map(|n| binder.literal(json!(n)));

        let statement = Statement {
            verb: Verb::Select,
            relation: Relation::SurveyResponses,
            projections,
            predicates,
            group_by,
            order_by,
            limit,
        };

        Ok(finish(plan, statement, binder))
    }

    /// Renders the raw-response projection with the plan's predicates,
    /// used to feed the estimator. Grouping, sort and limit are dropped.
    pub fn emit_sample(&self, plan: &QueryPlan) -> Result<RenderedQuery, UnsafeQueryError> {
        let survey = self.admit(plan)?;
        let mut binder = Binder::default();

        let projections = [SystemColumn::Id, SystemColumn::Data, SystemColumn::CreatedAt]
            .into_iter()
            .map(|column| Projection::Column { column })
            .collect();
        let predicates = self.predicates(survey, plan, &mut binder)?;

        let statement = Statement {
            verb: Verb::Select,
            relation: Relation::SurveyResponses,
            projections,
            predicates,
            group_by: Vec::new(),
            order_by: vec![OrderTerm::column(SystemColumn::Id, SortDirection::Asc)],
            limit: None,
        };

        Ok(finish(plan, statement, binder))
    }

    /// Safety gate shared by both renderings
    fn admit(&self, plan: &QueryPlan) -> Result<&'a Survey, UnsafeQueryError> {
        if let Safety::Rejected { code, reason, .. } = &plan.safety {
            return Err(UnsafeQueryError::RejectedPlan {
                code: *code,
                reason: reason.clone(),
            });
        }
        let survey = self
            .registry
            .survey(&plan.survey_id)
            .ok_or_else(|| UnsafeQueryError::UnknownSurvey {
                survey_id: plan.survey_id.clone(),
            })?;
        for field_ref in plan.field_refs() {
            if field_ref.survey_id != plan.survey_id || survey.field(&field_ref.field_id).is_none() {
                return Err(UnsafeQueryError::UnresolvedField {
                    survey_id: field_ref.survey_id.clone(),
                    field_id: field_ref.field_id.clone(),
                });
            }
        }
        Ok(survey)
    }

    fn plan_field(
        &self,
        survey: &'a Survey,
        field_id: Option<&str>,
    ) -> Result<Option<&'a Field>, UnsafeQueryError> {
        match field_id {
            None => Ok(None),
            Some(id) => survey
                .field(id)
                .map(Some)
                .ok_or_else(|| UnsafeQueryError::UnresolvedField {
                    survey_id: survey.survey_id.clone(),
                    field_id: id.to_string(),
                }),
        }
    }

    fn predicates(
        &self,
        survey: &'a Survey,
        plan: &QueryPlan,
        binder: &mut Binder,
    ) -> Result<Vec<Predicate>, UnsafeQueryError> {
        let mut predicates = vec![Predicate::Compare {
            left: Operand::Column {
                column: SystemColumn::SurveyId,
            },
            op: Comparison::Eq,
            right: binder.literal(Value::String(plan.survey_id.clone())),
        }];

        if let Some(window) = plan.time_window {
            let (start, end) = window.bounds(self.as_of).ok_or_else(|| {
                UnsafeQueryError::TimeWindowOutOfRange {
                    window: window.phrase().to_string(),
                }
            })?;
            let created_at = Operand::Column {
                column: SystemColumn::CreatedAt,
            };
            predicates.push(Predicate::Compare {
                left: created_at.clone(),
                op: Comparison::Gte,
                right: binder.literal(json!(timestamp(start))),
            });
            predicates.push(Predicate::Compare {
                left: created_at,
                op: Comparison::Lt,
                right: binder.literal(json!(timestamp(end))),
            });
        }

        for filter in &plan.filters {
            let field = self
                .plan_field(survey, Some(&filter.field.field_id))?
                .ok_or_else(|| UnsafeQueryError::UnresolvedField {
                    survey_id: survey.survey_id.clone(),
                    field_id: filter.field.field_id.clone(),
                })?;
            predicates.push(filter_predicate(binder, field, filter));
        }

        Ok(predicates)
    }
}

fn finish(plan: &QueryPlan, statement: Statement, binder: Binder) -> RenderedQuery {
    RenderedQuery {
        survey_id: plan.survey_id.clone(),
        sql: statement.render(),
        params: binder.params,
        statement,
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn aggregate_operand(binder: &mut Binder, aggregation: Aggregation, field: &Field) -> Operand {
    match (aggregation, field.field_type) {
        (Aggregation::Count, _) => binder.field(field, Cast::Text),
        (Aggregation::Avg, FieldType::Select | FieldType::Radio) => {
            let key = binder.key(&field.id);
            let values: Vec<Value> = field
                .options
                .iter()
                .map(|o| Value::String(o.value.clone()))
                .collect();
            let options = binder.literal_index(Value::Array(values));
            Operand::OptionPosition { key, options }
        }
        (_, FieldType::Date) => binder.field(field, Cast::Date),
        _ => binder.field(field, Cast::Numeric),
    }
}

/// Cast used when comparing a field
fn filter_cast(field_type: FieldType) -> Cast {
    match field_type {
        FieldType::Number | FieldType::Rating => Cast::Numeric,
        FieldType::Date => Cast::Date,
        FieldType::Checkbox => Cast::Json,
        _ => Cast::Text,
    }
}

/// Literal as bound for a field of `cast`
fn bind_value(value: &Value, cast: Cast) -> Value {
    match (cast, value) {
        (Cast::Numeric, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map_or_else(|| value.clone(), |n| json!(n)),
        (Cast::Text, Value::Number(n)) => Value::String(n.to_string()),
        (Cast::Text, Value::Bool(b)) => Value::String(b.to_string()),
        _ => value.clone(),
    }
}

fn filter_predicate(binder: &mut Binder, field: &Field, filter: &IntentFilter) -> Predicate {
    let cast = filter_cast(field.field_type);
    let operand = binder.field(field, cast);

    let values: Vec<Value> = match &filter.value {
        Value::Array(items) => items.iter().map(|v| bind_value(v, cast)).collect(),
        other => vec![bind_value(other, cast)],
    };

    if cast == Cast::Json {
        // checkbox answers are arrays: match when any listed value is selected
        let list = values.into_iter().map(|v| json!([v])).collect();
        return Predicate::ContainsAny {
            operand,
            list: binder.literal(Value::Array(list)),
        };
    }

    let comparison = match filter.operator {
        FilterOperator::Eq => Some(Comparison::Eq),
        FilterOperator::Gt => Some(Comparison::Gt),
        FilterOperator::Gte => Some(Comparison::Gte),
        FilterOperator::Lt => Some(Comparison::Lt),
        FilterOperator::Lte => Some(Comparison::Lte),
        _ => None,
    };

    match (filter.operator, comparison) {
        (_, Some(op)) => Predicate::Compare {
            left: operand,
            op,
            right: binder.literal(values.into_iter().next().unwrap_or(Value::Null)),
        },
        (FilterOperator::In, None) => Predicate::AnyOf {
            operand,
            list: binder.literal(Value::Array(values)),
        },
        _ => {
            let mut bounds = values.into_iter();
            let low = binder.literal(bounds.next().unwrap_or(Value::Null));
            let high = binder.literal(bounds.next().unwrap_or(Value::Null));
            Predicate::Between { operand, low, high }
        }
    }
}
