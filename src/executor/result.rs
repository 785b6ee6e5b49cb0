//! Result types for query execution

use crate::emitter::ResultRow;

/// Rows of one execution and what it took to produce them
#[derive(Debug, Clone, Default)]
pub struct ExecutionResult {
    /// Rows in result order
    pub rows: Vec<ResultRow>,
    /// Responses read
    pub scanned_count: usize,
    /// Responses that passed every predicate
    pub matched_count: usize,
    /// Whether LIMIT dropped rows
    pub limit_applied: bool,
}

impl ExecutionResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResultRow> {
        self.rows.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_result_empty() {
        let result = ExecutionResult::empty();
        assert!(result.is_empty());
        assert_eq!(result.len(), 0);
        assert!(!result.limit_applied);
    }
}
