//! Aggregate functions over a group of responses
//!
//! Nulls are skipped. `COUNT(*)` counts rows; every other aggregate of an
//! empty input is null.

use std::cmp::Ordering;

use serde_json::{json, Value};

use super::errors::ExecutorResult;
use super::scalar::{Bindings, Scalar};
use crate::emitter::{AggregateFunction, Operand};
use crate::response::Response;

pub fn aggregate(
    function: AggregateFunction,
    operand: Option<&Operand>,
    rows: &[&Response],
    bindings: &Bindings<'_>,
) -> ExecutorResult<Value> {
    let Some(operand) = operand else {
        return Ok(match function {
            AggregateFunction::Count => json!(rows.len()),
            _ => Value::Null,
        });
    };

    let mut values = Vec::with_capacity(rows.len());
    for response in rows {
        let scalar = bindings.eval(operand, response)?;
        if !scalar.is_null() {
            values.push(scalar);
        }
    }

    Ok(match function {
        AggregateFunction::Count => json!(values.len()),
        AggregateFunction::Sum => {
            let numbers: Vec<f64> = values.iter().filter_map(Scalar::as_number).collect();
            if numbers.is_empty() {
                Value::Null
            } else {
                json!(numbers.iter().sum::<f64>())
            }
        }
        AggregateFunction::Avg => {
            let numbers: Vec<f64> = values.iter().filter_map(Scalar::as_number).collect();
            if numbers.is_empty() {
                Value::Null
            } else {
                json!(numbers.iter().sum::<f64>() / numbers.len() as f64)
            }
        }
        AggregateFunction::Min => extreme(&values, Ordering::Less),
        AggregateFunction::Max => extreme(&values, Ordering::Greater),
    })
}

fn extreme(values: &[Scalar], wanted: Ordering) -> Value {
    let mut best: Option<&Scalar> = None;
    for value in values {
        best = match best {
            Some(current) if value.compare(current) != Some(wanted) => Some(current),
            _ => Some(value),
        };
    }
    best.map_or(Value::Null, Scalar::to_json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::{Cast, ParamKind, QueryParam, RenderedQuery, Relation, Statement, Verb};
    use crate::response::ResponseData;

    fn query() -> RenderedQuery {
        RenderedQuery {
            survey_id: "pulse".into(),
            sql: String::new(),
            params: vec![QueryParam {
                index: 1,
                kind: ParamKind::FieldKey,
                value: json!("score"),
            }],
            statement: Statement {
                verb: Verb::Select,
                relation: Relation::SurveyResponses,
                projections: Vec::new(),
                predicates: Vec::new(),
                group_by: Vec::new(),
                order_by: Vec::new(),
                limit: None,
            },
        }
    }

    fn responses(values: &[Value]) -> Vec<Response> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let mut data = ResponseData::new();
                data.insert("score".into(), v.clone());
                Response::new(format!("r{}", i), "pulse", data)
            })
            .collect()
    }

    #[test]
    fn test_aggregates_skip_nulls() {
        let q = query();
        let b = Bindings::new(&q);
        let set = responses(&[json!(4), json!("5"), Value::Null, json!("n/a")]);
        let rows: Vec<&Response> = set.iter().collect();
        let score = Operand::Field { key: 1, cast: Cast::Numeric };

        let run = |f| aggregate(f, Some(&score), &rows, &b).unwrap();
        assert_eq!(run(AggregateFunction::Count), json!(2));
        assert_eq!(run(AggregateFunction::Avg), json!(4.5));
        assert_eq!(run(AggregateFunction::Sum), json!(9.0));
        assert_eq!(run(AggregateFunction::Min), json!(4.0));
        assert_eq!(run(AggregateFunction::Max), json!(5.0));
        assert_eq!(
            aggregate(AggregateFunction::Count, None, &rows, &b).unwrap(),
            json!(4)
        );
    }

    #[test]
    fn test_empty_group() {
        let q = query();
        let b = Bindings::new(&q);
        let score = Operand::Field { key: 1, cast: Cast::Numeric };
        assert_eq!(aggregate(AggregateFunction::Count, None, &[], &b).unwrap(), json!(0));
        assert_eq!(
            aggregate(AggregateFunction::Avg, Some(&score), &[], &b).unwrap(),
            Value::Null
        );
    }
}
