//! CLI command implementations
//!
//! Every command follows the same sequence:
//! 1. Load configuration (defaults when no file is given)
//! 2. Load survey definitions into a registry
//! 3. Read one request from stdin
//! 4. Answer it through an `AnalyticsSession`
//! 5. Write one response to stdout
//!
//! Setup failures (steps 1-3) are returned as `CliError`. Request failures
//! are written as an error response and the command still succeeds.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::CoreConfig;
use crate::estimator::SamplingDesign;
use crate::executor::ResponseExecutor;
use crate::intent::suggest;
use crate::observability::{
    log_event_with_fields, AuditLog, Event, FileAuditLog, Logger, MemoryAuditLog,
    MetricsRegistry,
};
use crate::pipeline::{AnalyticsSession, PipelineError};
use crate::planner::ExplainPlan;
use crate::response::{ResponseData, ResponseSet};
use crate::schema::{SchemaLoader, SchemaRegistry};

use super::args::{Command, CommonArgs, DataArgs};
use super::errors::{CliError, CliResult};
use super::io::{read_request, write_error, write_response};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct QuestionRequest {
    pub survey_id: String,
    pub question: String,
    /// Reference time for relative time windows
    #[serde(default)]
    pub as_of: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EstimateRequest {
    pub survey_id: String,
    pub question: String,
    #[serde(default)]
    pub design: SamplingDesign,
    #[serde(default)]
    pub as_of: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NextRequest {
    pub survey_id: String,
    #[serde(default)]
    pub current_field_id: Option<String>,
    #[serde(default)]
    pub answers: ResponseData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SuggestRequest {
    pub survey_id: String,
    #[serde(default)]
    pub partial: String,
}

/// Loaded configuration and surveys
pub struct Environment {
    pub config: CoreConfig,
    pub registry: SchemaRegistry,
}

impl Environment {
    pub fn load(common: &CommonArgs) -> CliResult<Self> {
        let config = match &common.config {
            Some(path) => {
                let config = CoreConfig::load(path)?;
                log_event_with_fields(
                    Event::ConfigLoaded,
                    &[("path", &path.display().to_string())],
                );
                config
            }
            None => CoreConfig::default(),
        };
        Logger::set_min_severity(config.log_level);

        let registry = load_surveys(&common.surveys)?;
        Ok(Self { config, registry })
    }

    fn session<'a>(
        &'a self,
        audit: &'a dyn AuditLog,
        metrics: &'a MetricsRegistry,
        as_of: Option<DateTime<Utc>>,
    ) -> CliResult<AnalyticsSession<'a>> {
        let session = AnalyticsSession::new(&self.registry, audit, metrics)
            .with_config(self.config.clone())?;
        Ok(match as_of {
            Some(as_of) => session.with_as_of(as_of),
            None => session,
        })
    }
}

fn load_surveys(source: &Path) -> CliResult<SchemaRegistry> {
    let mut registry = SchemaRegistry::new();
    let loaded = SchemaLoader::new(source).load_into(&mut registry)?;
    for survey_id in &loaded {
        log_event_with_fields(Event::SchemaLoaded, &[("survey_id", survey_id)]);
    }
    Ok(registry)
}

/// Entry point for the CLI
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    let reply = match cmd {
        Command::Parse { common } => {
            let env = Environment::load(&common)?;
            parse(&env, &read_request()?)?
        }
        Command::Plan { common } => {
            let env = Environment::load(&common)?;
            plan(&env, &read_request()?)?
        }
        Command::Query { common, data } => {
            let env = Environment::load(&common)?;
            let responses = ResponseSet::load_file(&data.responses)?;
            let audit = open_audit(&data)?;
            query(&env, &responses, audit.as_ref(), &read_request()?)?
        }
        Command::Estimate { common, data } => {
            let env = Environment::load(&common)?;
            let responses = ResponseSet::load_file(&data.responses)?;
            let audit = open_audit(&data)?;
            estimate(&env, &responses, audit.as_ref(), &read_request()?)?
        }
        Command::Next { common } => {
            let env = Environment::load(&common)?;
            next(&env, &read_request()?)?
        }
        Command::Suggest { common } => {
            let env = Environment::load(&common)?;
            suggest_questions(&env, &read_request()?)?
        }
    };

    match reply {
        Ok(data) => write_response(data),
        Err(err) => write_error(err.code(), &err.to_string()),
    }
}

fn open_audit(data: &DataArgs) -> CliResult<Box<dyn AuditLog>> {
    match &data.audit_log {
        Some(path) => Ok(Box::new(FileAuditLog::open(path).map_err(|e| {
            CliError::io_error(format!("Failed to open audit log: {}", e))
        })?)),
        None => Ok(Box::new(MemoryAuditLog::new())),
    }
}

fn request<T: DeserializeOwned>(request: &Value) -> CliResult<T> {
    serde_json::from_value(request.clone())
        .map_err(|e| CliError::bad_request(format!("Invalid request: {}", e)))
}

/// Outer result is setup, inner is the request itself
pub type Reply = CliResult<Result<Value, PipelineError>>;

pub fn parse(env: &Environment, raw: &Value) -> Reply {
    let req: QuestionRequest = request(raw)?;
    let audit = MemoryAuditLog::new();
    let metrics = MetricsRegistry::new();
    let mut session = env.session(&audit, &metrics, req.as_of)?;

    Ok(session
        .parse(&req.survey_id, &req.question)
        .and_then(|intent| to_value(&intent)))
}

pub fn plan(env: &Environment, raw: &Value) -> Reply {
    let req: QuestionRequest = request(raw)?;
    let audit = MemoryAuditLog::new();
    let metrics = MetricsRegistry::new();
    let mut session = env.session(&audit, &metrics, req.as_of)?;

    Ok(session.plan(&req.survey_id, &req.question).map(|planned| {
        let explain = ExplainPlan::from_plan(&planned.plan);
        json!({
            "requestId": planned.request_id,
            "intent": planned.intent,
            "plan": planned.plan,
            "explain": explain,
            "explainText": explain.to_string(),
        })
    }))
}

pub fn query(
    env: &Environment,
    responses: &ResponseSet,
    audit: &dyn AuditLog,
    raw: &Value,
) -> Reply {
    let req: QuestionRequest = request(raw)?;
    let metrics = MetricsRegistry::new();
    let mut session = env.session(audit, &metrics, req.as_of)?;
    let executor = ResponseExecutor::new(responses);

    Ok(session
        .query(&req.survey_id, &req.question, &executor)
        .and_then(|outcome| to_value(&outcome)))
}

pub fn estimate(
    env: &Environment,
    responses: &ResponseSet,
    audit: &dyn AuditLog,
    raw: &Value,
) -> Reply {
    let req: EstimateRequest = request(raw)?;
    let metrics = MetricsRegistry::new();
    let mut session = env.session(audit, &metrics, req.as_of)?;
    let executor = ResponseExecutor::new(responses);

    Ok(session
        .estimate(&req.survey_id, &req.question, &req.design, &executor)
        .and_then(|outcome| to_value(&outcome)))
}

pub fn next(env: &Environment, raw: &Value) -> Reply {
    let req: NextRequest = request(raw)?;
    let audit = MemoryAuditLog::new();
    let metrics = MetricsRegistry::new();
    let session = env.session(&audit, &metrics, None)?;

    Ok(session
        .next(&req.survey_id, req.current_field_id.as_deref(), &req.answers)
        .and_then(|decision| to_value(&decision)))
}

pub fn suggest_questions(env: &Environment, raw: &Value) -> Reply {
    let req: SuggestRequest = request(raw)?;
    Ok(match env.registry.survey(&req.survey_id) {
        Some(survey) => Ok(json!({ "suggestions": suggest(&req.partial, survey) })),
        None => Err(PipelineError::UnknownSurvey {
            survey_id: req.survey_id,
        }),
    })
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, PipelineError> {
    serde_json::to_value(value).map_err(|e| PipelineError::MalformedRow {
        reason: format!("output is not serializable: {}", e),
    })
}
