//! Execution boundary
//!
//! The only path from a plan to an executor. A query reaches the executor
//! only after the plan is safe, rendering succeeded, the validator passed
//! and the decision was written to the audit log.

use std::collections::BTreeMap;

use serde_json::{json, Value};
use uuid::Uuid;

use super::errors::{ExecutionError, UnsafeQueryError};
use super::render::{QueryEmitter, RenderedQuery};
use super::validator::QueryValidator;
use crate::executor::ExecutorResult;
use crate::observability::{
    log_event_with_fields, AuditAction, AuditLog, AuditOutcome, AuditRecord, Event, Logger,
    MetricsRegistry,
};
use crate::planner::QueryPlan;

/// One result row, column name to value
pub type ResultRow = BTreeMap<String, Value>;

/// Runs rendered queries against a response source
pub trait QueryExecutor {
    fn execute(&self, query: &RenderedQuery) -> ExecutorResult<Vec<ResultRow>>;
}

/// Query that passed the boundary and the rows it produced
#[derive(Debug, Clone)]
pub struct CheckedQuery {
    pub query: RenderedQuery,
    pub rows: Vec<ResultRow>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rendering {
    Aggregate,
    Sample,
}

/// Gate in front of an executor
pub struct ExecutionGate<'a> {
    emitter: QueryEmitter<'a>,
    validator: QueryValidator<'a>,
    audit: &'a dyn AuditLog,
    metrics: Option<&'a MetricsRegistry>,
}

/// Emit, validate, audit and execute the plan's aggregate query
pub fn execute_checked<E: QueryExecutor + ?Sized>(
    emitter: &QueryEmitter<'_>,
    plan: &QueryPlan,
    executor: &E,
    audit: &dyn AuditLog,
) -> Result<CheckedQuery, ExecutionError> {
    ExecutionGate::new(emitter.clone(), audit).execute(plan, executor, None)
}

impl<'a> ExecutionGate<'a> {
    pub fn new(emitter: QueryEmitter<'a>, audit: &'a dyn AuditLog) -> Self {
        let validator = QueryValidator::new(emitter.registry());
        Self {
            emitter,
            validator,
            audit,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: &'a MetricsRegistry) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Aggregate query for the plan
    pub fn execute<E: QueryExecutor + ?Sized>(
        &self,
        plan: &QueryPlan,
        executor: &E,
        request_id: Option<Uuid>,
    ) -> Result<CheckedQuery, ExecutionError> {
        self.run(plan, executor, request_id, Rendering::Aggregate)
    }

    /// Raw-response sample for the estimator
    pub fn execute_sample<E: QueryExecutor + ?Sized>(
        &self,
        plan: &QueryPlan,
        executor: &E,
        request_id: Option<Uuid>,
    ) -> Result<CheckedQuery, ExecutionError> {
        self.run(plan, executor, request_id, Rendering::Sample)
    }

    fn run<E: QueryExecutor + ?Sized>(
        &self,
        plan: &QueryPlan,
        executor: &E,
        request_id: Option<Uuid>,
        rendering: Rendering,
    ) -> Result<CheckedQuery, ExecutionError> {
        let rendered = match rendering {
            Rendering::Aggregate => self.emitter.emit(plan),
            Rendering::Sample => self.emitter.emit_sample(plan),
        };

        let query = match rendered {
            Ok(query) => query,
            Err(err) => {
                let action = match err {
                    UnsafeQueryError::RejectedPlan { .. } => AuditAction::PlanRefused,
                    _ => AuditAction::QueryRejected,
                };
                let structure = serde_json::to_value(plan).unwrap_or(Value::Null);
                return Err(self.reject(action, &plan.survey_id, request_id, err, structure));
            }
        };

        if let Err(err) = self.validator.check(&query) {
            let structure = serde_json::to_value(&query).unwrap_or(Value::Null);
            return Err(self.reject(
                AuditAction::QueryRejected,
                &plan.survey_id,
                request_id,
                err,
                structure,
            ));
        }

        let emitted = self
            .record(AuditAction::QueryEmitted, AuditOutcome::Success, &plan.survey_id, request_id)
            .with_structure(json!({ "sql": query.sql, "params": query.params.len() }));
        self.audit.append(&emitted).map_err(ExecutionError::Audit)?;
        if let Some(metrics) = self.metrics {
            metrics.increment_queries_emitted();
        }
        log_event_with_fields(
            Event::QueryEmitted,
            &[("survey_id", plan.survey_id.as_str()), ("sql", query.sql.as_str())],
        );

        let rows = match executor.execute(&query) {
            Ok(rows) => rows,
            Err(err) => {
                let failed = self
                    .record(AuditAction::ExecutionFailed, AuditOutcome::Failed, &plan.survey_id, request_id)
                    .with_code(err.code().code())
                    .with_reason(err.message());
                if let Err(io) = self.audit.append(&failed) {
                    Logger::warn("AUDIT_WRITE_FAILED", &[("error", &io.to_string())]);
                }
                return Err(ExecutionError::Executor(err));
            }
        };

        let executed = self
            .record(AuditAction::QueryExecuted, AuditOutcome::Success, &plan.survey_id, request_id)
            .with_structure(json!({ "rows": rows.len() }));
        self.audit.append(&executed).map_err(ExecutionError::Audit)?;
        log_event_with_fields(
            Event::QueryExecuted,
            &[
                ("survey_id", plan.survey_id.as_str()),
                ("rows", &rows.len().to_string()),
            ],
        );

        Ok(CheckedQuery { query, rows })
    }

    fn record(
        &self,
        action: AuditAction,
        outcome: AuditOutcome,
        survey_id: &str,
        request_id: Option<Uuid>,
    ) -> AuditRecord {
        let record = AuditRecord::new(action, outcome).with_survey(survey_id);
        match request_id {
            Some(id) => record.with_request_id(id),
            None => record,
        }
    }

    /// Audits and logs a rejection. The rejection is returned even when the
    /// audit write fails.
    fn reject(
        &self,
        action: AuditAction,
        survey_id: &str,
        request_id: Option<Uuid>,
        err: UnsafeQueryError,
        structure: Value,
    ) -> ExecutionError {
        let record = self
            .record(action, AuditOutcome::Rejected, survey_id, request_id)
            .with_code(err.code())
            .with_reason(err.to_string())
            .with_structure(structure);
        if let Err(io) = self.audit.append(&record) {
            Logger::warn("AUDIT_WRITE_FAILED", &[("error", &io.to_string())]);
        }
        if let Some(metrics) = self.metrics {
            metrics.increment_queries_rejected();
        }
        log_event_with_fields(
            Event::QueryRejected,
            &[("survey_id", survey_id), ("code", err.code())],
        );
        ExecutionError::Unsafe(err)
    }
}
