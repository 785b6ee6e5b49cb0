//! Result sorting for query execution
//!
//! Sorts output rows by ORDER BY terms, deterministically.

use std::cmp::Ordering;

use serde_json::Value;

use crate::emitter::{OrderKey, OrderTerm, ResultRow};
use crate::intent::SortDirection;

/// Sorts result rows
pub struct ResultSorter;

impl ResultSorter {
    /// Sort is stable: rows equal on every term keep their input order.
    pub fn sort(rows: &mut [ResultRow], terms: &[OrderTerm]) {
        if terms.is_empty() {
            return;
        }
        rows.sort_by(|a, b| {
            for term in terms {
                let name = match term.key {
                    OrderKey::Alias { alias } => alias.name(),
                    OrderKey::Column { column } => column.name(),
                };
                let ordering = Self::compare_values(a.get(name), b.get(name));
                let ordering = match term.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
    }

    /// Compares two JSON values for sorting.
    ///
    /// Ordering rules:
    /// - missing < null < bool < number < string
    /// - For same types, natural ordering
    fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
        match (a, b) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(a_val), Some(b_val)) => {
                let type_order = |v: &Value| -> u8 {
                    match v {
                        Value::Null => 0,
                        Value::Bool(_) => 1,
                        Value::Number(_) => 2,
                        Value::String(_) => 3,
                        Value::Array(_) => 4,
                        Value::Object(_) => 5,
                    }
                };

                let a_type = type_order(a_val);
                let b_type = type_order(b_val);
                if a_type != b_type {
                    return a_type.cmp(&b_type);
                }

                match (a_val, b_val) {
                    (Value::Bool(a_b), Value::Bool(b_b)) => a_b.cmp(b_b),
                    (Value::Number(a_n), Value::Number(b_n)) => {
                        let a_f = a_n.as_f64().unwrap_or(0.0);
                        let b_f = b_n.as_f64().unwrap_or(0.0);
                        a_f.partial_cmp(&b_f).unwrap_or(Ordering::Equal)
                    }
                    (Value::String(a_s), Value::String(b_s)) => a_s.cmp(b_s),
                    _ => Ordering::Equal,
                }
            }
        }
    }
}
