//! Per-session query log
//!
//! An arena of `(request id, intent, plan)` entries. The log is owned by
//! whoever drives the session and passed explicitly; there is no global
//! history.

use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

use super::plan::QueryPlan;
use crate::intent::QueryIntent;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryLogEntry {
    pub request_id: Uuid,
    pub intent: QueryIntent,
    pub plan: QueryPlan,
}

#[derive(Debug, Default)]
pub struct QueryLog {
    entries: Vec<QueryLogEntry>,
    by_id: HashMap<Uuid, usize>,
}

impl QueryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an entry under a fresh request id
    pub fn record(&mut self, intent: QueryIntent, plan: QueryPlan) -> Uuid {
        self.record_with_id(Uuid::new_v4(), intent, plan)
    }

    /// Records an entry under a caller-chosen id. A reused id points at
    /// the newest entry; older entries stay in order.
    pub fn record_with_id(&mut self, request_id: Uuid, intent: QueryIntent, plan: QueryPlan) -> Uuid {
        self.by_id.insert(request_id, self.entries.len());
        self.entries.push(QueryLogEntry {
            request_id,
            intent,
            plan,
        });
        request_id
    }

    pub fn get(&self, request_id: &Uuid) -> Option<&QueryLogEntry> {
        self.by_id.get(request_id).map(|&i| &self.entries[i])
    }

    /// Entries in recording order
    pub fn entries(&self) -> &[QueryLogEntry] {
        &self.entries
    }

    pub fn latest(&self) -> Option<&QueryLogEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::Aggregation;
    use crate::planner::Safety;

    fn plan() -> QueryPlan {
        QueryPlan {
            survey_id: "pulse".into(),
            aggregation: Aggregation::Count,
            target: None,
            group_by: None,
            filters: Vec::new(),
            sort: None,
            limit: None,
            time_window: None,
            estimate: false,
            safety: Safety::Safe,
        }
    }

    #[test]
    fn test_record_and_lookup() {
        let mut log = QueryLog::new();
        let first = log.record(QueryIntent::empty("a", "a"), plan());
        let second = log.record(QueryIntent::empty("b", "b"), plan());

        assert_ne!(first, second);
        assert_eq!(log.len(), 2);
        assert_eq!(log.get(&first).unwrap().intent.raw_text, "a");
        assert_eq!(log.latest().unwrap().request_id, second);
        assert!(log.get(&Uuid::nil()).is_none());
    }

    #[test]
    fn test_reused_id_points_at_newest() {
        let mut log = QueryLog::new();
        let id = Uuid::new_v4();
        log.record_with_id(id, QueryIntent::empty("a", "a"), plan());
        log.record_with_id(id, QueryIntent::empty("b", "b"), plan());

        assert_eq!(log.len(), 2);
        assert_eq!(log.get(&id).unwrap().intent.raw_text, "b");
        assert_eq!(log.entries()[0].intent.raw_text, "a");
    }
}
