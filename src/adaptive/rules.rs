//! Branching predicates
//!
//! One tagged predicate type and one interpreter. A predicate over a
//! missing answer is false.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::response::ResponseData;

/// Comparison used by threshold rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdOp {
    Lt,
    Lte,
    Gt,
    Gte,
}

impl ThresholdOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            ThresholdOp::Lt => "<",
            ThresholdOp::Lte => "<=",
            ThresholdOp::Gt => ">",
            ThresholdOp::Gte => ">=",
        }
    }

    fn holds(&self, left: f64, right: f64) -> bool {
        match self {
            ThresholdOp::Lt => left < right,
            ThresholdOp::Lte => left <= right,
            ThresholdOp::Gt => left > right,
            ThresholdOp::Gte => left >= right,
        }
    }
}

/// Condition on a prior answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RulePredicate {
    /// Numeric answer compared against a constant
    Threshold {
        field: String,
        op: ThresholdOp,
        value: f64,
    },
    /// Answer equal to a value (strings compare case-insensitively)
    Equals { field: String, value: Value },
    /// Numeric answer within `[min, max]`
    RangeIn { field: String, min: f64, max: f64 },
}

impl RulePredicate {
    /// Field whose answer the predicate reads
    pub fn field(&self) -> &str {
        match self {
            RulePredicate::Threshold { field, .. }
            | RulePredicate::Equals { field, .. }
            | RulePredicate::RangeIn { field, .. } => field,
        }
    }

    /// Evaluates the predicate against the answers so far
    pub fn evaluate(&self, answers: &ResponseData) -> bool {
        let Some(answer) = answers.get(self.field()) else {
            return false;
        };

        match self {
            RulePredicate::Threshold { op, value, .. } => {
                numeric(answer).map_or(false, |n| op.holds(n, *value))
            }
            RulePredicate::RangeIn { min, max, .. } => {
                numeric(answer).map_or(false, |n| n >= *min && n <= *max)
            }
            RulePredicate::Equals { value, .. } => values_equal(answer, value),
        }
    }
}

impl fmt::Display for RulePredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RulePredicate::Threshold { field, op, value } => {
                write!(f, "{} {} {}", field, op.symbol(), value)
            }
            RulePredicate::Equals { field, value } => write!(f, "{} = {}", field, value),
            RulePredicate::RangeIn { field, min, max } => {
                write!(f, "{} in [{}, {}]", field, min, max)
            }
        }
    }
}

/// Predicate plus the field to jump to when it holds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchRule {
    pub when: RulePredicate,
    pub goto: String,
}

impl BranchRule {
    pub fn new(when: RulePredicate, goto: impl Into<String>) -> Self {
        Self {
            when,
            goto: goto.into(),
        }
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

fn values_equal(answer: &Value, expected: &Value) -> bool {
    match (answer, expected) {
        (Value::String(a), Value::String(b)) => a.trim().eq_ignore_ascii_case(b.trim()),
        (Value::Number(_), _) | (_, Value::Number(_)) => match (numeric(answer), numeric(expected)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
        // A checkbox answer equals a value when the value was ticked
        (Value::Array(items), _) => items.iter().any(|item| values_equal(item, expected)),
        _ => answer == expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn answers(value: Value) -> ResponseData {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_threshold() {
        let rule = RulePredicate::Threshold {
            field: "satisfaction".into(),
            op: ThresholdOp::Lte,
            value: 2.0,
        };
        assert!(rule.evaluate(&answers(json!({"satisfaction": 2}))));
        assert!(rule.evaluate(&answers(json!({"satisfaction": "1"}))));
        assert!(!rule.evaluate(&answers(json!({"satisfaction": 4}))));
        assert!(!rule.evaluate(&answers(json!({}))));
    }

    #[test]
    fn test_equals() {
        let rule = RulePredicate::Equals {
            field: "plan".into(),
            value: json!("Pro"),
        };
        assert!(rule.evaluate(&answers(json!({"plan": "pro"}))));
        assert!(!rule.evaluate(&answers(json!({"plan": "basic"}))));

        let ticked = RulePredicate::Equals {
            field: "channels".into(),
            value: json!("email"),
        };
        assert!(ticked.evaluate(&answers(json!({"channels": ["phone", "email"]}))));

        let numeric_rule = RulePredicate::Equals {
            field: "nps".into(),
            value: json!(10),
        };
        assert!(numeric_rule.evaluate(&answers(json!({"nps": "10"}))));
    }

    #[test]
    fn test_range_in_is_inclusive() {
        let rule = RulePredicate::RangeIn {
            field: "nps".into(),
            min: 7.0,
            max: 8.0,
        };
        assert!(rule.evaluate(&answers(json!({"nps": 7}))));
        assert!(rule.evaluate(&answers(json!({"nps": 8}))));
        assert!(!rule.evaluate(&answers(json!({"nps": 9}))));
        assert!(!rule.evaluate(&answers(json!({"nps": "high"}))));
    }

    #[test]
    fn test_tagged_serde() {
        let rule: BranchRule = serde_json::from_value(json!({
            "when": {"kind": "rangeIn", "field": "nps", "min": 0, "max": 6},
            "goto": "detractor_reason"
        }))
        .unwrap();
        assert_eq!(rule.when.field(), "nps");
        assert_eq!(rule.when.to_string(), "nps in [0, 6]");

        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(json["when"]["kind"], "rangeIn");
    }
}
