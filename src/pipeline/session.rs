//! Analytics session
//!
//! One caller's view of the core: question → intent → plan → checked
//! query → rows or estimate. The session owns its intent cache and query
//! log; the registry, audit log and metrics are shared.
//!
//! Flow (strict order):
//! 1. Parse (or reuse a cached intent for the same survey fingerprint)
//! 2. Build the plan and record it in the query log
//! 3. Emit, validate and audit through the execution gate
//! 4. Execute, then estimate if asked

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::errors::{PipelineError, PipelineResult};
use crate::adaptive::{AdaptiveDecision, AdaptiveSelector};
use crate::config::{ConfigError, CoreConfig};
use crate::emitter::{ExecutionGate, QueryEmitter, QueryExecutor, RenderedQuery, ResultRow};
use crate::estimator::{EstimationResult, Estimator, SamplingDesign};
use crate::intent::{normalize, IntentCache, IntentParser, QueryIntent};
use crate::observability::{log_event_with_fields, AuditLog, Event, MetricsRegistry};
use crate::planner::{PlanBuilder, QueryLog, QueryPlan, Safety};
use crate::response::{Response, ResponseData};
use crate::schema::{SchemaRegistry, Survey};

/// Plan of one question, as recorded in the query log
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedQuestion {
    pub request_id: Uuid,
    pub intent: QueryIntent,
    pub plan: QueryPlan,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOutcome {
    pub request_id: Uuid,
    pub intent: QueryIntent,
    pub plan: QueryPlan,
    pub query: RenderedQuery,
    pub rows: Vec<ResultRow>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateOutcome {
    pub request_id: Uuid,
    pub plan: QueryPlan,
    pub design: SamplingDesign,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall: Option<EstimationResult>,
    /// Keyed by group value, sorted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups: Option<BTreeMap<String, EstimationResult>>,
}

pub struct AnalyticsSession<'a> {
    registry: &'a SchemaRegistry,
    audit: &'a dyn AuditLog,
    metrics: &'a MetricsRegistry,
    config: CoreConfig,
    cache: IntentCache,
    log: QueryLog,
    as_of: Option<DateTime<Utc>>,
}

impl<'a> AnalyticsSession<'a> {
    pub fn new(
        registry: &'a SchemaRegistry,
        audit: &'a dyn AuditLog,
        metrics: &'a MetricsRegistry,
    ) -> Self {
        Self {
            registry,
            audit,
            metrics,
            config: CoreConfig::default(),
            cache: IntentCache::new(),
            log: QueryLog::new(),
            as_of: None,
        }
    }

    /// Replaces the defaults; the config is validated first
    pub fn with_config(mut self, config: CoreConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    /// Pins the reference time for time windows
    pub fn with_as_of(mut self, as_of: DateTime<Utc>) -> Self {
        self.as_of = Some(as_of);
        self
    }

    pub fn query_log(&self) -> &QueryLog {
        &self.log
    }

    pub fn cache(&self) -> &IntentCache {
        &self.cache
    }

    pub fn parse(&mut self, survey_id: &str, question: &str) -> PipelineResult<QueryIntent> {
        let survey = self.survey(survey_id)?;
        let fingerprint = self.registry.fingerprint(survey_id).unwrap_or_default();
        let normalized = normalize(question);

        if let Some(intent) = self
            .cache
            .get(survey_id, fingerprint, &normalized.text, question)
        {
            log_event_with_fields(Event::IntentCacheHit, &[("survey_id", survey_id)]);
            return Ok(intent);
        }

        let intent = IntentParser::new(survey)
            .with_threshold(self.config.match_threshold)
            .parse(question);

        self.metrics.increment_intents_parsed();
        let confidence = format!("{:.3}", intent.confidence);
        log_event_with_fields(
            Event::IntentParsed,
            &[
                ("survey_id", survey_id),
                ("aggregation", intent.aggregation.as_str()),
                ("confidence", &confidence),
            ],
        );
        if intent.is_low_confidence(self.config.low_confidence_threshold) {
            self.metrics.increment_low_confidence();
            log_event_with_fields(
                Event::IntentLowConfidence,
                &[("survey_id", survey_id), ("confidence", &confidence)],
            );
        }

        self.cache.insert(survey_id, fingerprint, intent.clone());
        Ok(intent)
    }

    pub fn plan(&mut self, survey_id: &str, question: &str) -> PipelineResult<PlannedQuestion> {
        let intent = self.parse(survey_id, question)?;
        let plan = PlanBuilder::new(self.registry)
            .with_max_limit(self.config.max_limit)
            .build(&intent, survey_id);

        match &plan.safety {
            Safety::Safe => {
                self.metrics.increment_plans_built();
                log_event_with_fields(Event::PlanBuilt, &[("survey_id", survey_id)]);
            }
            Safety::Rejected { code, .. } => {
                self.metrics.increment_plans_rejected();
                log_event_with_fields(
                    Event::PlanRejected,
                    &[("survey_id", survey_id), ("code", code.code())],
                );
            }
        }

        let request_id = self.log.record(intent.clone(), plan.clone());
        Ok(PlannedQuestion {
            request_id,
            intent,
            plan,
        })
    }

    /// Answers a question with rows from `executor`
    pub fn query<E: QueryExecutor + ?Sized>(
        &mut self,
        survey_id: &str,
        question: &str,
        executor: &E,
    ) -> PipelineResult<QueryOutcome> {
        let planned = self.plan(survey_id, question)?;
        let checked = self
            .gate()
            .execute(&planned.plan, executor, Some(planned.request_id))?;

        Ok(QueryOutcome {
            request_id: planned.request_id,
            intent: planned.intent,
            plan: planned.plan,
            query: checked.query,
            rows: checked.rows,
        })
    }

    /// Estimates the question's target field from a checked sample of
    /// raw responses, per group when the question groups
    pub fn estimate<E: QueryExecutor + ?Sized>(
        &mut self,
        survey_id: &str,
        question: &str,
        design: &SamplingDesign,
        executor: &E,
    ) -> PipelineResult<EstimateOutcome> {
        let planned = self.plan(survey_id, question)?;
        // unsafe plans are refused (and audited) by the gate
        if planned.plan.is_safe() {
            if planned.plan.target.is_none() {
                return Err(PipelineError::NoEstimateTarget);
            }
            if !planned.plan.estimate {
                return Err(PipelineError::NotEstimable {
                    aggregation: planned.plan.aggregation.as_str().to_string(),
                });
            }
        }
        let checked =
            self.gate()
                .execute_sample(&planned.plan, executor, Some(planned.request_id))?;

        let plan = planned.plan;
        let target = plan.target.clone().ok_or(PipelineError::NoEstimateTarget)?;
        let responses = rows_to_responses(survey_id, &checked.rows)?;
        let estimator = Estimator::from_config(self.survey(survey_id)?, &self.config);

        let estimated = match &plan.group_by {
            Some(group) => estimator
                .estimate_by_group(&responses, &target.field_id, &group.field_id, design)
                .map(|groups| (None, Some(groups))),
            None => estimator
                .estimate(&responses, &target.field_id, design)
                .map(|overall| (Some(overall), None)),
        };

        let (overall, groups) = match estimated {
            Ok(result) => result,
            Err(err) => {
                self.metrics.increment_estimate_failures();
                log_event_with_fields(
                    Event::EstimateFailed,
                    &[("survey_id", survey_id), ("code", err.code())],
                );
                return Err(err.into());
            }
        };

        self.metrics.increment_estimates();
        let excluded: usize = overall.iter().map(|r| r.excluded).sum::<usize>()
            + groups
                .iter()
                .flat_map(|g| g.values())
                .map(|r| r.excluded)
                .sum::<usize>();
        self.metrics.add_values_excluded(excluded as u64);
        log_event_with_fields(
            Event::EstimateComplete,
            &[
                ("survey_id", survey_id),
                ("field", target.field_id.as_str()),
                ("rows", &responses.len().to_string()),
            ],
        );

        Ok(EstimateOutcome {
            request_id: planned.request_id,
            plan,
            design: design.clone(),
            overall,
            groups,
        })
    }

    /// Next field to ask, given the answers so far
    pub fn next(
        &self,
        survey_id: &str,
        current: Option<&str>,
        answers: &ResponseData,
    ) -> PipelineResult<AdaptiveDecision> {
        let decision = AdaptiveSelector::new(self.survey(survey_id)?).next(current, answers)?;
        self.metrics.increment_decisions();
        match &decision.next_field_id {
            Some(next) => log_event_with_fields(
                Event::NextFieldSelected,
                &[("survey_id", survey_id), ("field", next.as_str())],
            ),
            None => log_event_with_fields(Event::SurveyComplete, &[("survey_id", survey_id)]),
        }
        Ok(decision)
    }

    fn survey(&self, survey_id: &str) -> PipelineResult<&'a Survey> {
        self.registry
            .survey(survey_id)
            .ok_or_else(|| PipelineError::UnknownSurvey {
                survey_id: survey_id.to_string(),
            })
    }

    fn gate(&self) -> ExecutionGate<'a> {
        let emitter = QueryEmitter::new(self.registry);
        let emitter = match self.as_of {
            Some(as_of) => emitter.with_as_of(as_of),
            None => emitter,
        };
        ExecutionGate::new(emitter, self.audit).with_metrics(self.metrics)
    }
}

/// Sample rows (`id`, `data`, `created_at`) back into responses
fn rows_to_responses(survey_id: &str, rows: &[ResultRow]) -> PipelineResult<Vec<Response>> {
    rows.iter()
        .map(|row| {
            let malformed = |reason: &str| PipelineError::MalformedRow {
                reason: reason.to_string(),
            };
            let id = row
                .get("id")
                .and_then(Value::as_str)
                .ok_or_else(|| malformed("missing id"))?;
            let data: ResponseData = match row.get("data") {
                Some(Value::Object(map)) => map.clone().into_iter().collect(),
                _ => return Err(malformed("data is not an object")),
            };
            let created_at = row
                .get("created_at")
                .and_then(Value::as_str)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .ok_or_else(|| malformed("created_at is not a timestamp"))?;
            Ok(Response::new(id, survey_id, data).with_created_at(created_at.with_timezone(&Utc)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ResponseExecutor;
    use crate::observability::{AuditAction, MemoryAuditLog};
    use crate::response::ResponseSet;
    use crate::schema::{Field, FieldOption, FieldType};
    use serde_json::json;

    fn registry() -> SchemaRegistry {
        let mut registry = SchemaRegistry::new();
        registry
            .register(
                Survey::new("pulse", "Pulse", 1)
                    .with_field(Field::new("satisfaction", "Satisfaction rating", FieldType::Rating))
                    .with_field(
                        Field::new("age_group", "Age group", FieldType::Select).with_options(vec![
                            FieldOption::new("18-25", "18-25"),
                            FieldOption::new("26-35", "26-35"),
                        ]),
                    ),
            )
            .unwrap();
        registry
    }

    fn responses() -> ResponseSet {
        let rows = [
            json!({"satisfaction": 4, "age_group": "18-25"}),
            json!({"satisfaction": 5, "age_group": "18-25"}),
            json!({"satisfaction": 3, "age_group": "26-35"}),
        ];
        ResponseSet::new(
            rows.into_iter()
                .enumerate()
                .map(|(i, data)| {
                    let data: ResponseData = serde_json::from_value(data).unwrap();
                    Response::new(format!("r{}", i), "pulse", data)
                })
                .collect(),
        )
    }

    #[test]
    fn test_parse_uses_cache() {
        let registry = registry();
        let audit = MemoryAuditLog::new();
        let metrics = MetricsRegistry::new();
        let mut session = AnalyticsSession::new(&registry, &audit, &metrics);

        let first = session.parse("pulse", "average satisfaction").unwrap();
        let second = session.parse("pulse", "Average   satisfaction").unwrap();

        assert_eq!(first.aggregation, second.aggregation);
        assert_eq!(second.raw_text, "Average   satisfaction");
        assert_eq!(metrics.snapshot().intents_parsed, 1);
        assert_eq!(session.cache().len(), 1);
    }

    #[test]
    fn test_query_records_and_audits() {
        let registry = registry();
        let audit = MemoryAuditLog::new();
        let metrics = MetricsRegistry::new();
        let set = responses();
        let mut session = AnalyticsSession::new(&registry, &audit, &metrics);

        let outcome = session
            .query("pulse", "average satisfaction by age group", &ResponseExecutor::new(&set))
            .unwrap();

        assert_eq!(outcome.rows.len(), 2);
        assert_eq!(session.query_log().len(), 1);
        let records = audit.records();
        assert!(records.iter().all(|r| r.request_id == Some(outcome.request_id)));
    }

    #[test]
    fn test_unknown_survey() {
        let registry = registry();
        let audit = MemoryAuditLog::new();
        let metrics = MetricsRegistry::new();
        let mut session = AnalyticsSession::new(&registry, &audit, &metrics);
        let err = session.parse("nope", "how many").unwrap_err();
        assert_eq!(err.code(), "PIPELINE_UNKNOWN_SURVEY");
    }

    #[test]
    fn test_estimate_by_group() {
        let registry = registry();
        let audit = MemoryAuditLog::new();
        let metrics = MetricsRegistry::new();
        let set = responses();
        let mut session = AnalyticsSession::new(&registry, &audit, &metrics);

        let outcome = session
            .estimate(
                "pulse",
                "What is the average satisfaction rating by age group?",
                &SamplingDesign::none(),
                &ResponseExecutor::new(&set),
            )
            .unwrap();

        let groups = outcome.groups.unwrap();
        assert_eq!(groups["18-25"].mean, 4.5);
        assert_eq!(groups["18-25"].sample_size, 2);
        assert_eq!(metrics.snapshot().estimates_computed, 1);
    }

    #[test]
    fn test_estimate_requires_an_average() {
        let registry = registry();
        let audit = MemoryAuditLog::new();
        let metrics = MetricsRegistry::new();
        let set = responses();
        let mut session = AnalyticsSession::new(&registry, &audit, &metrics);

        let err = session
            .estimate(
                "pulse",
                "What is the highest satisfaction rating?",
                &SamplingDesign::none(),
                &ResponseExecutor::new(&set),
            )
            .unwrap_err();

        assert_eq!(err.code(), "PIPELINE_NOT_ESTIMABLE");
        assert!(err.to_string().contains("max"));
        assert_eq!(metrics.snapshot().estimates_computed, 0);
    }

    #[test]
    fn test_config_is_validated() {
        let registry = registry();
        let audit = MemoryAuditLog::new();
        let metrics = MetricsRegistry::new();
        let config = CoreConfig {
            confidence_level: 1.5,
            ..CoreConfig::default()
        };
        let result = AnalyticsSession::new(&registry, &audit, &metrics).with_config(config);
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { key: "confidence_level", .. })
        ));
    }

    #[test]
    fn test_rejected_question_is_audited() {
        let registry = registry();
        let audit = MemoryAuditLog::new();
        let metrics = MetricsRegistry::new();
        let set = responses();
        let mut session = AnalyticsSession::new(&registry, &audit, &metrics);

        let err = session
            .query("pulse", "tell me a joke", &ResponseExecutor::new(&set))
            .unwrap_err();

        assert_eq!(err.code(), "QUERY_PLAN_REJECTED");
        assert_eq!(audit.records()[0].action, AuditAction::PlanRefused);
        assert_eq!(metrics.snapshot().plans_rejected, 1);
    }

    #[test]
    fn test_rows_to_responses_rejects_malformed() {
        let mut row = ResultRow::new();
        row.insert("id".into(), json!("r1"));
        row.insert("data".into(), json!([]));
        let err = rows_to_responses("pulse", &[row]).unwrap_err();
        assert_eq!(err.code(), "PIPELINE_MALFORMED_ROW");
    }
}
