//! Observability for the analytics core
//!
//! - Structured logging (JSON lines on stderr)
//! - Atomic counters
//! - Append-only audit log for the emission boundary
//!
//! Observers never change a result. A failed log write is swallowed; a
//! failed audit write is reported to the caller, which decides.
//!
//! ```ignore
//! use surveylens::observability::{log_event_with_fields, Event};
//!
//! log_event_with_fields(Event::PlanBuilt, &[("survey_id", "pulse")]);
//! ```

pub mod audit;
mod events;
mod logger;
mod metrics;

pub use audit::{
    AuditAction, AuditLog, AuditOutcome, AuditRecord, FileAuditLog, MemoryAuditLog, NullAuditLog,
};
pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};

/// Default severity for an event.
pub fn event_severity(event: Event) -> Severity {
    match event {
        Event::QueryRejected | Event::EstimateFailed => Severity::Error,
        Event::IntentLowConfidence | Event::PlanRejected | Event::ValuesExcluded => Severity::Warn,
        Event::IntentCacheHit => Severity::Trace,
        _ => Severity::Info,
    }
}

/// Log a lifecycle event
pub fn log_event(event: Event) {
    Logger::log(event_severity(event), event.as_str(), &[]);
}

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event_severity(event), event.as_str(), fields);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_events_log_as_error() {
        assert_eq!(event_severity(Event::QueryRejected), Severity::Error);
        assert_eq!(event_severity(Event::EstimateFailed), Severity::Error);
        for event in [Event::QueryRejected, Event::EstimateFailed] {
            assert!(event.is_failure());
        }
    }

    #[test]
    fn test_rejections_log_as_warn() {
        assert_eq!(event_severity(Event::PlanRejected), Severity::Warn);
        assert_eq!(event_severity(Event::IntentLowConfidence), Severity::Warn);
        assert_eq!(event_severity(Event::PlanBuilt), Severity::Info);
    }

    #[test]
    fn test_log_event_with_fields() {
        // Verifies no panic
        log_event(Event::ConfigLoaded);
        log_event_with_fields(Event::SchemaLoaded, &[("survey_id", "pulse")]);
    }
}
