//! Query intent types
//!
//! A `QueryIntent` is the parser's reading of one question. It is built
//! fresh per question and never mutated afterwards.

use std::fmt;

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::FieldRef;

/// Aggregate requested by the question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    None,
    Count,
    Avg,
    Sum,
    Min,
    Max,
}

impl Aggregation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregation::None => "none",
            Aggregation::Count => "count",
            Aggregation::Avg => "avg",
            Aggregation::Sum => "sum",
            Aggregation::Min => "min",
            Aggregation::Max => "max",
        }
    }

    /// SQL aggregate function name
    pub fn function_name(&self) -> Option<&'static str> {
        match self {
            Aggregation::None => None,
            Aggregation::Count => Some("COUNT"),
            Aggregation::Avg => Some("AVG"),
            Aggregation::Sum => Some("SUM"),
            Aggregation::Min => Some("MIN"),
            Aggregation::Max => Some("MAX"),
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Filter comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterOperator {
    Eq,
    Gt,
    Lt,
    Gte,
    Lte,
    Between,
    In,
    DateRange,
}

impl FilterOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "eq",
            FilterOperator::Gt => "gt",
            FilterOperator::Lt => "lt",
            FilterOperator::Gte => "gte",
            FilterOperator::Lte => "lte",
            FilterOperator::Between => "between",
            FilterOperator::In => "in",
            FilterOperator::DateRange => "dateRange",
        }
    }

    /// True for comparisons that need an ordered field type
    pub fn is_range(&self) -> bool {
        matches!(
            self,
            FilterOperator::Gt
                | FilterOperator::Lt
                | FilterOperator::Gte
                | FilterOperator::Lte
                | FilterOperator::Between
                | FilterOperator::DateRange
        )
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One filter condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentFilter {
    pub field: FieldRef,
    pub operator: FilterOperator,
    pub value: Value,
}

impl IntentFilter {
    pub fn new(field: FieldRef, operator: FilterOperator, value: Value) -> Self {
        Self {
            field,
            operator,
            value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn keyword(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Relative creation-time window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimeWindow {
    Today,
    Yesterday,
    ThisWeek,
    LastWeek,
    ThisMonth,
    LastMonth,
    ThisYear,
    LastYear,
}

impl TimeWindow {
    pub const ALL: [TimeWindow; 8] = [
        TimeWindow::Today,
        TimeWindow::Yesterday,
        TimeWindow::ThisWeek,
        TimeWindow::LastWeek,
        TimeWindow::ThisMonth,
        TimeWindow::LastMonth,
        TimeWindow::ThisYear,
        TimeWindow::LastYear,
    ];

    /// Phrase as it appears in a normalized question
    pub fn phrase(&self) -> &'static str {
        match self {
            TimeWindow::Today => "today",
            TimeWindow::Yesterday => "yesterday",
            TimeWindow::ThisWeek => "this week",
            TimeWindow::LastWeek => "last week",
            TimeWindow::ThisMonth => "this month",
            TimeWindow::LastMonth => "last month",
            TimeWindow::ThisYear => "this year",
            TimeWindow::LastYear => "last year",
        }
    }

    /// Half-open `[start, end)` bounds relative to `as_of`.
    ///
    /// Weeks start on Monday. `None` only when the calendar arithmetic
    /// leaves chrono's supported range.
    pub fn bounds(&self, as_of: DateTime<Utc>) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let today = as_of.date_naive();
        let (start, end) = match self {
            TimeWindow::Today => (today, today.checked_add_signed(Duration::days(1))?),
            TimeWindow::Yesterday => (today.checked_sub_signed(Duration::days(1))?, today),
            TimeWindow::ThisWeek | TimeWindow::LastWeek => {
                let offset = i64::from(today.weekday().num_days_from_monday());
                let monday = today.checked_sub_signed(Duration::days(offset))?;
                if *self == TimeWindow::ThisWeek {
                    (monday, monday.checked_add_signed(Duration::days(7))?)
                } else {
                    (monday.checked_sub_signed(Duration::days(7))?, monday)
                }
            }
            TimeWindow::ThisMonth | TimeWindow::LastMonth => {
                let first = NaiveDate::from_ymd_opt(today.year(), today.month(), 1)?;
                if *self == TimeWindow::ThisMonth {
                    (first, first.checked_add_months(Months::new(1))?)
                } else {
                    (first.checked_sub_months(Months::new(1))?, first)
                }
            }
            TimeWindow::ThisYear | TimeWindow::LastYear => {
                let first = NaiveDate::from_ymd_opt(today.year(), 1, 1)?;
                if *self == TimeWindow::ThisYear {
                    (first, NaiveDate::from_ymd_opt(today.year() + 1, 1, 1)?)
                } else {
                    (NaiveDate::from_ymd_opt(today.year() - 1, 1, 1)?, first)
                }
            }
        };
        Some((midnight(start), midnight(end)))
    }
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.phrase())
    }
}

/// Parsed reading of a natural-language question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryIntent {
    pub raw_text: String,
    pub normalized_text: String,
    pub aggregation: Aggregation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_field: Option<FieldRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_by_field: Option<FieldRef>,
    #[serde(default)]
    pub filters: Vec<IntentFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortDirection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_window: Option<TimeWindow>,
    pub confidence: f64,
}

impl QueryIntent {
    /// Intent for input nothing could be read from
    pub fn empty(raw_text: impl Into<String>, normalized_text: impl Into<String>) -> Self {
        Self {
            raw_text: raw_text.into(),
            normalized_text: normalized_text.into(),
            aggregation: Aggregation::None,
            target_field: None,
            group_by_field: None,
            filters: Vec::new(),
            sort: None,
            limit: None,
            time_window: None,
            confidence: 0.0,
        }
    }

    /// True when the caller should ask for clarification
    pub fn is_low_confidence(&self, threshold: f64) -> bool {
        self.confidence < threshold
    }

    /// Every field reference the intent carries, in a fixed order
    pub fn field_refs(&self) -> impl Iterator<Item = &FieldRef> {
        self.target_field
            .iter()
            .chain(self.group_by_field.iter())
            .chain(self.filters.iter().map(|f| &f.field))
    }
}
