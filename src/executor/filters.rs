//! Predicate filtering for query execution
//!
//! All predicates must hold (AND). Null on either side never matches,
//! as in SQL.

use std::cmp::Ordering;

use serde_json::Value;

use super::errors::{ExecutorError, ExecutorResult};
use super::scalar::{Bindings, Scalar};
use crate::emitter::{Comparison, Operand, Predicate};
use crate::response::Response;

/// Evaluates WHERE clauses against responses
pub struct PredicateFilter;

impl PredicateFilter {
    pub fn matches(
        response: &Response,
        predicates: &[Predicate],
        bindings: &Bindings<'_>,
    ) -> ExecutorResult<bool> {
        for predicate in predicates {
            if !Self::matches_predicate(response, predicate, bindings)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn matches_predicate(
        response: &Response,
        predicate: &Predicate,
        bindings: &Bindings<'_>,
    ) -> ExecutorResult<bool> {
        match predicate {
            Predicate::Compare { left, op, right } => {
                let actual = bindings.eval(left, response)?;
                if actual.is_null() {
                    return Ok(false);
                }
                let expected = bindings.eval_like(right, &actual, response)?;
                Ok(Self::compare_match(&actual, *op, &expected))
            }
            Predicate::Between { operand, low, high } => {
                let actual = bindings.eval(operand, response)?;
                if actual.is_null() {
                    return Ok(false);
                }
                let low = bindings.eval_like(low, &actual, response)?;
                let high = bindings.eval_like(high, &actual, response)?;
                Ok(Self::compare_match(&actual, Comparison::Gte, &low)
                    && Self::compare_match(&actual, Comparison::Lte, &high))
            }
            Predicate::AnyOf { operand, list } => {
                let actual = bindings.eval(operand, response)?;
                if actual.is_null() {
                    return Ok(false);
                }
                let items = Self::list(list, bindings)?;
                Ok(items.iter().any(|item| {
                    Self::compare_match(&actual, Comparison::Eq, &actual.coerce_like(item))
                }))
            }
            Predicate::ContainsAny { operand, list } => {
                let Scalar::Json(actual) = bindings.eval(operand, response)? else {
                    return Ok(false);
                };
                let items = Self::list(list, bindings)?;
                Ok(items.iter().any(|item| Self::contains(&actual, item)))
            }
        }
    }

    fn list<'q>(operand: &Operand, bindings: &Bindings<'q>) -> ExecutorResult<&'q [Value]> {
        match operand {
            Operand::Param { index } => bindings.list(*index),
            _ => Err(ExecutorError::unsupported(
                "list operand must be a bound parameter",
            )),
        }
    }

    fn compare_match(actual: &Scalar, op: Comparison, expected: &Scalar) -> bool {
        let Some(ordering) = actual.compare(expected) else {
            return false;
        };
        match op {
            Comparison::Eq => ordering == Ordering::Equal,
            Comparison::Gt => ordering == Ordering::Greater,
            Comparison::Gte => ordering != Ordering::Less,
            Comparison::Lt => ordering == Ordering::Less,
            Comparison::Lte => ordering != Ordering::Greater,
        }
    }

    /// JSON containment: every element of `expected` is in `actual`
    fn contains(actual: &Value, expected: &Value) -> bool {
        match (actual, expected) {
            (Value::Array(have), Value::Array(want)) => want
                .iter()
                .all(|w| have.iter().any(|h| Self::contains(h, w))),
            (Value::Object(have), Value::Object(want)) => want
                .iter()
                .all(|(k, w)| have.get(k).is_some_and(|h| Self::contains(h, w))),
            (a, b) => a == b,
        }
    }
}
