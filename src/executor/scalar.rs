//! Operand evaluation
//!
//! Reads operands out of a response the way the rendered SQL would.
//! A value that does not cast reads as null, and null never compares.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde_json::{json, Value};

use super::errors::{ExecutorError, ExecutorResult};
use crate::emitter::{Cast, Operand, RenderedQuery, SystemColumn};
use crate::response::Response;
use crate::schema::parse_date;

/// Typed value of one operand for one response
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Date(NaiveDate),
    Time(DateTime<Utc>),
    Json(Value),
}

impl Scalar {
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Ordering within one kind; `None` across kinds or for JSON
    pub fn compare(&self, other: &Scalar) -> Option<Ordering> {
        match (self, other) {
            (Scalar::Bool(a), Scalar::Bool(b)) => Some(a.cmp(b)),
            (Scalar::Number(a), Scalar::Number(b)) => a.partial_cmp(b),
            (Scalar::Text(a), Scalar::Text(b)) => Some(a.cmp(b)),
            (Scalar::Date(a), Scalar::Date(b)) => Some(a.cmp(b)),
            (Scalar::Time(a), Scalar::Time(b)) => Some(a.cmp(b)),
            (Scalar::Json(a), Scalar::Json(b)) if a == b => Some(Ordering::Equal),
            _ => None,
        }
    }

    /// Reads a bound literal as the same kind as `self`
    pub fn coerce_like(&self, value: &Value) -> Scalar {
        match self {
            Scalar::Null => Scalar::Null,
            Scalar::Bool(_) => value.as_bool().map_or(Scalar::Null, Scalar::Bool),
            Scalar::Number(_) => numeric(value),
            Scalar::Text(_) => text(value),
            Scalar::Date(_) => date(value),
            Scalar::Time(_) => value
                .as_str()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map_or(Scalar::Null, |t| Scalar::Time(t.with_timezone(&Utc))),
            Scalar::Json(_) => Scalar::Json(value.clone()),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Scalar::Null => Value::Null,
            Scalar::Bool(b) => Value::Bool(*b),
            Scalar::Number(n) => json!(n),
            Scalar::Text(s) => Value::String(s.clone()),
            Scalar::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            Scalar::Time(t) => Value::String(timestamp(t)),
            Scalar::Json(v) => v.clone(),
        }
    }
}

/// Fixed-width timestamps so text order is time order
pub fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// `data ->> key`
fn text(value: &Value) -> Scalar {
    match value {
        Value::Null => Scalar::Null,
        Value::String(s) => Scalar::Text(s.clone()),
        Value::Number(n) => Scalar::Text(n.to_string()),
        Value::Bool(b) => Scalar::Text(b.to_string()),
        other => Scalar::Text(other.to_string()),
    }
}

fn numeric(value: &Value) -> Scalar {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|n| n.is_finite())
        .map_or(Scalar::Null, Scalar::Number)
}

fn date(value: &Value) -> Scalar {
    value
        .as_str()
        .and_then(parse_date)
        .map_or(Scalar::Null, |dt| Scalar::Date(dt.date()))
}

pub fn cast(value: Option<&Value>, cast: Cast) -> Scalar {
    let Some(value) = value else {
        return Scalar::Null;
    };
    match cast {
        Cast::Text => text(value),
        Cast::Numeric => numeric(value),
        Cast::Date => date(value),
        Cast::Json if value.is_null() => Scalar::Null,
        Cast::Json => Scalar::Json(value.clone()),
    }
}

pub fn column(response: &Response, column: SystemColumn) -> Scalar {
    match column {
        SystemColumn::Id => Scalar::Text(response.id.clone()),
        SystemColumn::SurveyId => Scalar::Text(response.survey_id.clone()),
        SystemColumn::Data => Scalar::Json(Value::Object(
            response.data.clone().into_iter().collect(),
        )),
        SystemColumn::IsComplete => Scalar::Bool(response.is_complete),
        SystemColumn::CompletionTime => response
            .completion_time_seconds
            .map_or(Scalar::Null, Scalar::Number),
        SystemColumn::CreatedAt => Scalar::Time(response.created_at),
    }
}

/// Parameter lookup for one query
#[derive(Debug, Clone, Copy)]
pub struct Bindings<'q> {
    query: &'q RenderedQuery,
}

impl<'q> Bindings<'q> {
    pub fn new(query: &'q RenderedQuery) -> Self {
        Self { query }
    }

    pub fn value(&self, index: usize) -> ExecutorResult<&'q Value> {
        self.query
            .param(index)
            .map(|p| &p.value)
            .ok_or_else(|| ExecutorError::missing_param(index))
    }

    pub fn key(&self, index: usize) -> ExecutorResult<&'q str> {
        self.value(index)?
            .as_str()
            .ok_or_else(|| ExecutorError::bad_param(index, "field key must be a string"))
    }

    pub fn list(&self, index: usize) -> ExecutorResult<&'q [Value]> {
        self.value(index)?
            .as_array()
            .map(Vec::as_slice)
            .ok_or_else(|| ExecutorError::bad_param(index, "expected an array"))
    }

    /// Evaluates an operand against a response. A bare parameter has no
    /// kind of its own and reads as JSON.
    pub fn eval(&self, operand: &Operand, response: &Response) -> ExecutorResult<Scalar> {
        match operand {
            Operand::Column { column: c } => Ok(column(response, *c)),
            Operand::Param { index } => Ok(Scalar::Json(self.value(*index)?.clone())),
            Operand::Field { key, cast: c } => {
                let key = self.key(*key)?;
                Ok(cast(response.answer(key), *c))
            }
            Operand::OptionPosition { key, options } => {
                let key = self.key(*key)?;
                let options = self.list(*options)?;
                let Scalar::Text(answer) = cast(response.answer(key), Cast::Text) else {
                    return Ok(Scalar::Null);
                };
                Ok(options
                    .iter()
                    .position(|o| o.as_str() == Some(answer.as_str()))
                    .map_or(Scalar::Null, |i| Scalar::Number((i + 1) as f64)))
            }
        }
    }

    /// Right-hand side of a comparison, read as the kind of `like`
    pub fn eval_like(
        &self,
        operand: &Operand,
        like: &Scalar,
        response: &Response,
    ) -> ExecutorResult<Scalar> {
        match operand {
            Operand::Param { index } => Ok(like.coerce_like(self.value(*index)?)),
            other => self.eval(other, response),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::ResponseData;

    fn response(data: Value) -> Response {
        let data: ResponseData = serde_json::from_value(data).unwrap();
        Response::new("r1", "pulse", data)
    }

    #[test]
    fn test_cast_reads_like_sql() {
        assert_eq!(cast(Some(&json!("4.5")), Cast::Numeric), Scalar::Number(4.5));
        assert_eq!(cast(Some(&json!("n/a")), Cast::Numeric), Scalar::Null);
        assert_eq!(cast(Some(&json!(25)), Cast::Text), Scalar::Text("25".into()));
        assert_eq!(cast(None, Cast::Text), Scalar::Null);
        assert_eq!(
            cast(Some(&json!("2024-03-01")), Cast::Date),
            Scalar::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
        );
    }

    #[test]
    fn test_cross_kind_never_compares() {
        assert_eq!(Scalar::Number(1.0).compare(&Scalar::Text("1".into())), None);
        assert_eq!(Scalar::Null.compare(&Scalar::Null), None);
        assert_eq!(
            Scalar::Number(1.0).compare(&Scalar::Number(2.0)),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn test_coerce_literal_to_left_kind() {
        let like = Scalar::Number(0.0);
        assert_eq!(like.coerce_like(&json!("3")), Scalar::Number(3.0));
        let like = Scalar::Text(String::new());
        assert_eq!(like.coerce_like(&json!(3)), Scalar::Text("3".into()));
    }

    #[test]
    fn test_option_position_is_one_based() {
        let query = RenderedQuery {
            survey_id: "pulse".into(),
            sql: String::new(),
            params: vec![
                crate::emitter::QueryParam {
                    index: 1,
                    kind: crate::emitter::ParamKind::FieldKey,
                    value: json!("size"),
                },
                crate::emitter::QueryParam {
                    index: 2,
                    kind: crate::emitter::ParamKind::Literal,
                    value: json!(["small", "medium", "large"]),
                },
            ],
            statement: crate::emitter::Statement {
                verb: crate::emitter::Verb::Select,
                relation: crate::emitter::Relation::SurveyResponses,
                projections: Vec::new(),
                predicates: Vec::new(),
                group_by: Vec::new(),
                order_by: Vec::new(),
                limit: None,
            },
        };
        let bindings = Bindings::new(&query);
        let operand = Operand::OptionPosition { key: 1, options: 2 };

        let scalar = bindings.eval(&operand, &response(json!({"size": "medium"}))).unwrap();
        assert_eq!(scalar, Scalar::Number(2.0));

        let scalar = bindings.eval(&operand, &response(json!({"size": "huge"}))).unwrap();
        assert_eq!(scalar, Scalar::Null);

        let missing = Operand::Field { key: 9, cast: Cast::Text };
        let err = bindings.eval(&missing, &response(json!({}))).unwrap_err();
        assert!(err.is_fatal());
    }
}
