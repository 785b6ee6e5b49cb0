//! Observable events
//!
//! Every log line the core emits names one of these events.

use std::fmt;

/// Observable events in the analytics core
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    /// Configuration loaded
    ConfigLoaded,
    /// Survey schema registered
    SchemaLoaded,

    // Intent
    /// Question parsed into an intent
    IntentParsed,
    /// Parsed intent fell below the confidence threshold
    IntentLowConfidence,
    /// Intent served from cache
    IntentCacheHit,

    // Planning
    /// Plan accepted
    PlanBuilt,
    /// Plan rejected
    PlanRejected,

    // Emission
    /// Query rendered and validated
    QueryEmitted,
    /// Rendered query failed the whitelist check
    QueryRejected,
    /// Query handed to the execution collaborator
    QueryExecuted,

    // Estimation
    /// Estimate produced
    EstimateComplete,
    /// Estimator precondition violated
    EstimateFailed,
    /// Values dropped during coercion
    ValuesExcluded,
    /// Significance test completed
    SignificanceTested,

    // Adaptive
    /// Next field selected
    NextFieldSelected,
    /// Survey reached the terminal state
    SurveyComplete,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::SchemaLoaded => "SCHEMA_LOADED",

            Event::IntentParsed => "INTENT_PARSED",
            Event::IntentLowConfidence => "INTENT_LOW_CONFIDENCE",
            Event::IntentCacheHit => "INTENT_CACHE_HIT",

            Event::PlanBuilt => "PLAN_BUILT",
            Event::PlanRejected => "PLAN_REJECTED",

            Event::QueryEmitted => "QUERY_EMITTED",
            Event::QueryRejected => "QUERY_REJECTED",
            Event::QueryExecuted => "QUERY_EXECUTED",

            Event::EstimateComplete => "ESTIMATE_COMPLETE",
            Event::EstimateFailed => "ESTIMATE_FAILED",
            Event::ValuesExcluded => "ESTIMATE_VALUES_EXCLUDED",
            Event::SignificanceTested => "SIGNIFICANCE_TESTED",

            Event::NextFieldSelected => "NEXT_FIELD_SELECTED",
            Event::SurveyComplete => "SURVEY_COMPLETE",
        }
    }

    /// Returns true if this event reports a failed request
    pub fn is_failure(&self) -> bool {
        matches!(self, Event::QueryRejected | Event::EstimateFailed)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_events_have_string_representation() {
        let events = [
            Event::ConfigLoaded,
            Event::SchemaLoaded,
            Event::IntentParsed,
            Event::IntentLowConfidence,
            Event::IntentCacheHit,
            Event::PlanBuilt,
            Event::PlanRejected,
            Event::QueryEmitted,
            Event::QueryRejected,
            Event::QueryExecuted,
            Event::EstimateComplete,
            Event::EstimateFailed,
            Event::ValuesExcluded,
            Event::SignificanceTested,
            Event::NextFieldSelected,
            Event::SurveyComplete,
        ];

        for event in events {
            let s = event.as_str();
            assert!(!s.is_empty());
            assert!(s.chars().all(|c| c.is_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_failure_events() {
        assert!(Event::QueryRejected.is_failure());
        assert!(Event::EstimateFailed.is_failure());
        assert!(!Event::PlanRejected.is_failure());
        assert!(!Event::IntentParsed.is_failure());
    }
}
