//! In-process query executor
//!
//! Runs a rendered statement over a response store, producing the rows a
//! SQL backend would.
//!
//! Execution flow (strict order):
//! 1. Fetch the survey's responses from the store
//! 2. Filter strictly according to predicates
//! 3. Group and aggregate, or project each response
//! 4. Apply ORDER BY
//! 5. Apply LIMIT
//!
//! Same statement, same parameters, same responses: same rows.

use serde_json::Value;

use super::aggregate::aggregate;
use super::errors::{ExecutorError, ExecutorResult};
use super::filters::PredicateFilter;
use super::result::ExecutionResult;
use super::scalar::{column, Bindings};
use super::sorter::ResultSorter;
use crate::emitter::{Operand, Projection, QueryExecutor, RenderedQuery, ResultRow, Statement};
use crate::response::{Response, ResponseFilter, ResponseStore};

/// Executes rendered queries against a response store
pub struct ResponseExecutor<'a, S: ResponseStore> {
    store: &'a S,
}

impl<'a, S: ResponseStore> ResponseExecutor<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn run(&self, query: &RenderedQuery) -> ExecutorResult<ExecutionResult> {
        let bindings = Bindings::new(query);
        let statement = &query.statement;

        // Steps 1-2
        let candidates = self
            .store
            .get_responses(&query.survey_id, &ResponseFilter::default());
        let scanned_count = candidates.len();
        let mut matched = Vec::new();
        for response in candidates {
            if PredicateFilter::matches(response, &statement.predicates, &bindings)? {
                matched.push(response);
            }
        }
        let matched_count = matched.len();

        // Step 3
        let mut rows = if is_aggregate(statement) {
            aggregate_rows(statement, &matched, &bindings)?
        } else {
            matched
                .iter()
                .map(|response| project(statement, response, &bindings))
                .collect::<ExecutorResult<Vec<_>>>()?
        };

        // Step 4
        ResultSorter::sort(&mut rows, &statement.order_by);

        // Step 5
        let mut limit_applied = false;
        if let Some(limit) = &statement.limit {
            let limit = limit_value(limit, &bindings)?;
            limit_applied = rows.len() > limit;
            rows.truncate(limit);
        }

        Ok(ExecutionResult {
            rows,
            scanned_count,
            matched_count,
            limit_applied,
        })
    }
}

impl<S: ResponseStore> QueryExecutor for ResponseExecutor<'_, S> {
    fn execute(&self, query: &RenderedQuery) -> ExecutorResult<Vec<ResultRow>> {
        self.run(query).map(|result| result.rows)
    }
}

fn is_aggregate(statement: &Statement) -> bool {
    !statement.group_by.is_empty()
        || statement
            .projections
            .iter()
            .any(|p| matches!(p, Projection::Aggregate { .. }))
}

fn project(
    statement: &Statement,
    response: &Response,
    bindings: &Bindings<'_>,
) -> ExecutorResult<ResultRow> {
    let mut row = ResultRow::new();
    for projection in &statement.projections {
        match projection {
            Projection::Column { column: c } => {
                row.insert(c.name().to_string(), column(response, *c).to_json());
            }
            Projection::Expr { operand, alias } => {
                let value = bindings.eval(operand, response)?.to_json();
                row.insert(alias.name().to_string(), value);
            }
            Projection::Aggregate { .. } => {
                return Err(ExecutorError::unsupported(
                    "aggregate in a non-aggregate statement",
                ));
            }
        }
    }
    Ok(row)
}

/// One row per group, groups in first-seen order. Without GROUP BY the
/// whole input is one group, even when empty.
fn aggregate_rows(
    statement: &Statement,
    matched: &[&Response],
    bindings: &Bindings<'_>,
) -> ExecutorResult<Vec<ResultRow>> {
    let keyed: Vec<(&Operand, &str)> = statement
        .projections
        .iter()
        .filter_map(|p| match p {
            Projection::Expr { operand, alias } if statement.group_by.contains(alias) => {
                Some((operand, alias.name()))
            }
            _ => None,
        })
        .collect();

    let mut groups: Vec<(Vec<Value>, Vec<&Response>)> = Vec::new();
    if statement.group_by.is_empty() {
        groups.push((Vec::new(), matched.to_vec()));
    } else {
        for &response in matched {
            let mut key = Vec::with_capacity(keyed.len());
            for (operand, _) in &keyed {
                key.push(bindings.eval(operand, response)?.to_json());
            }
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, members)) => members.push(response),
                None => groups.push((key, vec![response])),
            }
        }
    }

    let mut rows = Vec::with_capacity(groups.len());
    for (key, members) in &groups {
        let mut row = ResultRow::new();
        for (value, (_, name)) in key.iter().zip(&keyed) {
            row.insert(name.to_string(), value.clone());
        }
        for projection in &statement.projections {
            match projection {
                Projection::Aggregate {
                    function,
                    operand,
                    alias,
                } => {
                    let value = aggregate(*function, operand.as_ref(), members, bindings)?;
                    row.insert(alias.name().to_string(), value);
                }
                Projection::Expr { alias, .. } if statement.group_by.contains(alias) => {}
                _ => {
                    return Err(ExecutorError::unsupported(
                        "projection is neither grouped nor aggregated",
                    ));
                }
            }
        }
        rows.push(row);
    }
    Ok(rows)
}

fn limit_value(limit: &Operand, bindings: &Bindings<'_>) -> ExecutorResult<usize> {
    match limit {
        Operand::Param { index } => bindings
            .value(*index)?
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| ExecutorError::bad_param(*index, "limit must be a non-negative integer")),
        _ => Err(ExecutorError::unsupported("limit must be a bound parameter")),
    }
}
