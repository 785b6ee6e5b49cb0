//! Audit logging for the emission boundary
//!
//! Every query that reaches the emitter leaves one record: emitted,
//! rejected by the validator, or handed to the executor. Rejections carry
//! the rendered structure that failed, so the decision can be reviewed
//! without re-running the request.
//!
//! The log is append-only. One JSON record per line.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Audit action type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    /// A rejected plan was presented for emission.
    PlanRefused,

    /// Query rendered and passed the validator.
    QueryEmitted,

    /// Rendered query failed the validator.
    QueryRejected,

    /// Query handed to the execution collaborator.
    QueryExecuted,

    /// Execution collaborator reported a failure.
    ExecutionFailed,
}

impl AuditAction {
    /// Returns the action name string.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::PlanRefused => "PLAN_REFUSED",
            AuditAction::QueryEmitted => "QUERY_EMITTED",
            AuditAction::QueryRejected => "QUERY_REJECTED",
            AuditAction::QueryExecuted => "QUERY_EXECUTED",
            AuditAction::ExecutionFailed => "EXECUTION_FAILED",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Audit record outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditOutcome {
    Success,
    Rejected,
    Failed,
}

impl AuditOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditOutcome::Success => "SUCCESS",
            AuditOutcome::Rejected => "REJECTED",
            AuditOutcome::Failed => "FAILED",
        }
    }
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub action: AuditAction,
    pub outcome: AuditOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub survey_id: Option<String>,
    /// Machine-readable rejection code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Rendered structure under review
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure: Option<Value>,
}

impl AuditRecord {
    /// Create a new audit record.
    pub fn new(action: AuditAction, outcome: AuditOutcome) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            action,
            outcome,
            request_id: None,
            survey_id: None,
            code: None,
            reason: None,
            structure: None,
        }
    }

    pub fn with_request_id(mut self, id: Uuid) -> Self {
        self.request_id = Some(id);
        self
    }

    pub fn with_survey(mut self, survey_id: impl Into<String>) -> Self {
        self.survey_id = Some(survey_id.into());
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attach the structure that was checked.
    pub fn with_structure(mut self, structure: Value) -> Self {
        self.structure = Some(structure);
        self
    }

    /// Serialize to a single JSON line.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                r#"{{"id":"{}","action":"{}","outcome":"{}"}}"#,
                self.id, self.action, self.outcome
            )
        })
    }
}

/// Append-only audit sink.
pub trait AuditLog: Send + Sync {
    /// Append a record; the record is visible once this returns.
    fn append(&self, record: &AuditRecord) -> io::Result<()>;
}

/// File-backed audit log, one JSON record per line.
pub struct FileAuditLog {
    path: PathBuf,
    writer: Arc<Mutex<BufWriter<File>>>,
}

impl FileAuditLog {
    /// Open or create an audit log file.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            path,
            writer: Arc::new(Mutex::new(BufWriter::new(file))),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditLog for FileAuditLog {
    fn append(&self, record: &AuditRecord) -> io::Result<()> {
        let json = record.to_json();
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "audit writer poisoned"))?;
        writeln!(writer, "{}", json)?;
        writer.flush()?;
        writer.get_ref().sync_data()
    }
}

/// In-memory audit log.
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of all recorded entries, oldest first.
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditLog for MemoryAuditLog {
    fn append(&self, record: &AuditRecord) -> io::Result<()> {
        match self.records.lock() {
            Ok(mut records) => records.push(record.clone()),
            Err(poisoned) => poisoned.into_inner().push(record.clone()),
        }
        Ok(())
    }
}

/// Sink that drops every record.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAuditLog;

impl AuditLog for NullAuditLog {
    fn append(&self, _record: &AuditRecord) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_audit_record_creation() {
        let request = Uuid::new_v4();
        let record = AuditRecord::new(AuditAction::QueryRejected, AuditOutcome::Rejected)
            .with_request_id(request)
            .with_survey("customer_pulse")
            .with_code("FORBIDDEN_VERB");

        assert_eq!(record.action, AuditAction::QueryRejected);
        assert_eq!(record.request_id, Some(request));
        assert_eq!(record.code.as_deref(), Some("FORBIDDEN_VERB"));
    }

    #[test]
    fn test_audit_record_json() {
        let record = AuditRecord::new(AuditAction::QueryRejected, AuditOutcome::Rejected)
            .with_reason("verb DELETE is not allowed")
            .with_structure(json!({"verb": "DELETE"}));

        let parsed: Value = serde_json::from_str(&record.to_json()).unwrap();
        assert_eq!(parsed["action"], "QUERY_REJECTED");
        assert_eq!(parsed["outcome"], "REJECTED");
        assert_eq!(parsed["structure"]["verb"], "DELETE");
        assert!(parsed.get("request_id").is_none());
    }

    #[test]
    fn test_memory_audit_log() {
        let log = MemoryAuditLog::new();
        log.append(&AuditRecord::new(AuditAction::QueryEmitted, AuditOutcome::Success))
            .unwrap();
        log.append(&AuditRecord::new(AuditAction::QueryExecuted, AuditOutcome::Success))
            .unwrap();

        let records = log.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].action, AuditAction::QueryEmitted);
        assert_eq!(records[1].action, AuditAction::QueryExecuted);
    }

    #[test]
    fn test_file_audit_log() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.log");

        let log = FileAuditLog::open(&path).unwrap();
        log.append(
            &AuditRecord::new(AuditAction::QueryRejected, AuditOutcome::Rejected)
                .with_code("UNKNOWN_RELATION"),
        )
        .unwrap();
        log.append(&AuditRecord::new(AuditAction::QueryEmitted, AuditOutcome::Success))
            .unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.contains("UNKNOWN_RELATION"));
    }
}
