//! Injection Safety Tests
//!
//! - Literal values from a question never appear in SQL text
//! - Unresolved fields are rejected at plan time and refused at emission
//! - Tampered SQL fails validation before it reaches an executor
//! - Every refusal is audited

use std::path::Path;

use serde_json::json;
use surveylens::emitter::{
    execute_checked, ExecutionError, QueryEmitter, QueryExecutor, QueryValidator,
    RenderedQuery, ResultRow, UnsafeQueryError,
};
use surveylens::executor::ExecutorResult;
use surveylens::intent::{parse, Aggregation, FilterOperator, IntentFilter, QueryIntent};
use surveylens::observability::{AuditAction, MemoryAuditLog};
use surveylens::planner::{PlanBuilder, PlannerErrorCode, Safety};
use surveylens::schema::{FieldRef, SchemaLoader, SchemaRegistry};

// =============================================================================
// Helper Functions
// =============================================================================

fn registry() -> SchemaRegistry {
    let fixture = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/pulse.json");
    SchemaLoader::new(fixture).load().unwrap()
}

/// Executor that must never be reached
struct Unreachable;

impl QueryExecutor for Unreachable {
    fn execute(&self, _query: &RenderedQuery) -> ExecutorResult<Vec<ResultRow>> {
        panic!("executor reached with an unsafe query");
    }
}

fn count_where(field: &str, operator: FilterOperator, value: serde_json::Value) -> QueryIntent {
    let mut intent = QueryIntent::empty("crafted", "crafted");
    intent.aggregation = Aggregation::Count;
    intent.filters = vec![IntentFilter::new(FieldRef::new("pulse", field), operator, value)];
    intent.confidence = 1.0;
    intent
}

const PAYLOADS: &[&str] = &[
    "x'; DROP TABLE responses; --",
    "1 OR 1=1",
    "') UNION SELECT * FROM users --",
    "/* comment */ DELETE FROM responses",
];

// =============================================================================
// Literal Values
// =============================================================================

/// Crafted filter values travel only as bound parameters.
#[test]
fn test_filter_values_are_never_inlined() {
    let registry = registry();
    let emitter = QueryEmitter::new(&registry);
    let validator = QueryValidator::new(&registry);

    for payload in PAYLOADS {
        let intent = count_where("comments", FilterOperator::Eq, json!(payload));
        let plan = PlanBuilder::new(&registry).build(&intent, "pulse");
        assert!(plan.is_safe(), "payload plan: {:?}", plan.safety);

        let query = emitter.emit(&plan).unwrap();
        assert!(!query.sql.contains(payload), "sql: {}", query.sql);
        assert!(query.params.iter().any(|p| p.value == json!(payload)));
        validator.check(&query).unwrap();
    }
}

/// Values parsed from a question are parameters too.
#[test]
fn test_parsed_values_are_parameters() {
    let registry = registry();
    let survey = registry.survey("pulse").unwrap();
    let emitter = QueryEmitter::new(&registry);

    let intent = parse("average satisfaction where plan in basic or pro", survey);
    let plan = PlanBuilder::new(&registry).build(&intent, "pulse");
    let query = emitter.emit(&plan).unwrap();

    assert!(!query.sql.contains("basic"));
    assert!(!query.sql.contains("'pro'"));
}

// =============================================================================
// Unresolved Fields
// =============================================================================

/// A field the survey never declared cannot be planned or emitted.
#[test]
fn test_unknown_field_is_refused() {
    let registry = registry();
    let intent = count_where("password; DROP TABLE responses", FilterOperator::Eq, json!("x"));
    let plan = PlanBuilder::new(&registry).build(&intent, "pulse");

    assert!(matches!(plan.safety, Safety::Rejected { .. }));
    assert_eq!(plan.safety.code(), Some(PlannerErrorCode::UnresolvedReference));

    let err = QueryEmitter::new(&registry).emit(&plan).unwrap_err();
    assert!(matches!(err, UnsafeQueryError::RejectedPlan { .. }));
}

/// A field from another survey is refused as well.
#[test]
fn test_cross_survey_field_is_refused() {
    let registry = registry();
    let mut intent = count_where("satisfaction", FilterOperator::Gt, json!(3));
    intent.filters[0].field = FieldRef::new("other", "satisfaction");

    let plan = PlanBuilder::new(&registry).build(&intent, "pulse");
    assert!(!plan.is_safe());
}

// =============================================================================
// Tampering and Audit
// =============================================================================

/// Edited SQL text no longer matches its statement and is rejected.
#[test]
fn test_tampered_sql_fails_validation() {
    let registry = registry();
    let survey = registry.survey("pulse").unwrap();
    let intent = parse("How many responses where satisfaction is above 3?", survey);
    let plan = PlanBuilder::new(&registry).build(&intent, "pulse");
    let query = QueryEmitter::new(&registry).emit(&plan).unwrap();
    let validator = QueryValidator::new(&registry);

    let mut dropped = query.clone();
    dropped.sql.push_str("; DROP TABLE responses");
    assert!(!validator.validate(&dropped));

    let mut deleted = query.clone();
    deleted.sql = deleted.sql.replacen("SELECT", "DELETE", 1);
    assert!(validator.check(&deleted).is_err());

    let mut extra = query;
    extra.params.pop();
    assert!(validator.check(&extra).is_err());
}

/// Refused plans are audited and never executed.
#[test]
fn test_refusal_is_audited() {
    let registry = registry();
    let audit = MemoryAuditLog::new();
    let intent = count_where("nope", FilterOperator::Eq, json!("x"));
    let plan = PlanBuilder::new(&registry).build(&intent, "pulse");

    let err = execute_checked(&QueryEmitter::new(&registry), &plan, &Unreachable, &audit)
        .unwrap_err();

    assert!(matches!(err, ExecutionError::Unsafe(_)));
    let records = audit.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].action, AuditAction::PlanRefused);
    assert!(records[0].structure.is_some());
}
