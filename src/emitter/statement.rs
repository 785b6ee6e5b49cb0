//! Statement AST
//!
//! The only shape a rendered query can take. Every value and every field
//! key is a parameter index; identifiers come from closed enums, so the
//! rendered text holds nothing but keywords, whitelisted names and
//! placeholders.

use serde::{Deserialize, Serialize};

use crate::intent::{Aggregation, SortDirection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verb {
    Select,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    SurveyResponses,
}

impl Relation {
    pub fn name(&self) -> &'static str {
        match self {
            Relation::SurveyResponses => "survey_responses",
        }
    }
}

/// Columns of the response relation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemColumn {
    Id,
    SurveyId,
    Data,
    IsComplete,
    CompletionTime,
    CreatedAt,
}

impl SystemColumn {
    pub const ALL: [SystemColumn; 6] = [
        SystemColumn::Id,
        SystemColumn::SurveyId,
        SystemColumn::Data,
        SystemColumn::IsComplete,
        SystemColumn::CompletionTime,
        SystemColumn::CreatedAt,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SystemColumn::Id => "id",
            SystemColumn::SurveyId => "survey_id",
            SystemColumn::Data => "data",
            SystemColumn::IsComplete => "is_complete",
            SystemColumn::CompletionTime => "completion_time",
            SystemColumn::CreatedAt => "created_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AggregateFunction {
    Count,
    Avg,
    Sum,
    Min,
    Max,
}

impl AggregateFunction {
    pub const ALL: [AggregateFunction; 5] = [
        AggregateFunction::Count,
        AggregateFunction::Avg,
        AggregateFunction::Sum,
        AggregateFunction::Min,
        AggregateFunction::Max,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AggregateFunction::Count => "COUNT",
            AggregateFunction::Avg => "AVG",
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
        }
    }

    pub fn from_aggregation(aggregation: Aggregation) -> Option<Self> {
        match aggregation {
            Aggregation::None => None,
            Aggregation::Count => Some(AggregateFunction::Count),
            Aggregation::Avg => Some(AggregateFunction::Avg),
            Aggregation::Sum => Some(AggregateFunction::Sum),
            Aggregation::Min => Some(AggregateFunction::Min),
            Aggregation::Max => Some(AggregateFunction::Max),
        }
    }
}

/// How a response field is read out of `data`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cast {
    /// `data ->> key`
    Text,
    /// `CAST(data ->> key AS NUMERIC)`
    Numeric,
    /// `CAST(data ->> key AS DATE)`
    Date,
    /// `data -> key`
    Json,
}

/// Output column names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alias {
    Value,
    GroupKey,
    Target,
}

impl Alias {
    pub fn name(&self) -> &'static str {
        match self {
            Alias::Value => "value",
            Alias::GroupKey => "group_key",
            Alias::Target => "target",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Operand {
    Column { column: SystemColumn },
    /// Bound literal
    Param { index: usize },
    /// Response field, `key` is the index of its field-key parameter
    Field { key: usize, cast: Cast },
    /// 1-based position of the field's value in a bound option list
    OptionPosition { key: usize, options: usize },
}

impl Operand {
    fn render(&self) -> String {
        match self {
            Operand::Column { column } => column.name().to_string(),
            Operand::Param { index } => format!("${}", index),
            Operand::Field { key, cast } => match cast {
                Cast::Text => format!("data ->> ${}", key),
                Cast::Numeric => format!("CAST(data ->> ${} AS NUMERIC)", key),
                Cast::Date => format!("CAST(data ->> ${} AS DATE)", key),
                Cast::Json => format!("data -> ${}", key),
            },
            Operand::OptionPosition { key, options } => {
                format!("array_position(${}, data ->> ${})", options, key)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Projection {
    Column {
        column: SystemColumn,
    },
    Expr {
        operand: Operand,
        alias: Alias,
    },
    Aggregate {
        function: AggregateFunction,
        /// `None` renders `*`
        #[serde(default, skip_serializing_if = "Option::is_none")]
        operand: Option<Operand>,
        alias: Alias,
    },
}

impl Projection {
    fn render(&self) -> String {
        match self {
            Projection::Column { column } => column.name().to_string(),
            Projection::Expr { operand, alias } => {
                format!("{} AS {}", operand.render(), alias.name())
            }
            Projection::Aggregate {
                function,
                operand,
                alias,
            } => {
                let inner = operand
                    .as_ref()
                    .map_or_else(|| "*".to_string(), Operand::render);
                format!("{}({}) AS {}", function.name(), inner, alias.name())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Comparison {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Comparison {
    pub fn symbol(&self) -> &'static str {
        match self {
            Comparison::Eq => "=",
            Comparison::Gt => ">",
            Comparison::Gte => ">=",
            Comparison::Lt => "<",
            Comparison::Lte => "<=",
        }
    }
}

/// Conjunct of the WHERE clause
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Predicate {
    Compare {
        left: Operand,
        op: Comparison,
        right: Operand,
    },
    Between {
        operand: Operand,
        low: Operand,
        high: Operand,
    },
    /// `operand = ANY(list)`
    AnyOf { operand: Operand, list: Operand },
    /// `operand @> ANY(list)`, JSON containment of any element
    ContainsAny { operand: Operand, list: Operand },
}

impl Predicate {
    fn render(&self) -> String {
        match self {
            Predicate::Compare { left, op, right } => {
                format!("{} {} {}", left.render(), op.symbol(), right.render())
            }
            Predicate::Between { operand, low, high } => format!(
                "{} BETWEEN {} AND {}",
                operand.render(),
                low.render(),
                high.render()
            ),
            Predicate::AnyOf { operand, list } => {
                format!("{} = ANY({})", operand.render(), list.render())
            }
            Predicate::ContainsAny { operand, list } => {
                format!("{} @> ANY({})", operand.render(), list.render())
            }
        }
    }

    pub fn operands(&self) -> Vec<&Operand> {
        match self {
            Predicate::Compare { left, right, .. } => vec![left, right],
            Predicate::Between { operand, low, high } => vec![operand, low, high],
            Predicate::AnyOf { operand, list } | Predicate::ContainsAny { operand, list } => {
                vec![operand, list]
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum OrderKey {
    Alias { alias: Alias },
    Column { column: SystemColumn },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTerm {
    pub key: OrderKey,
    pub direction: SortDirection,
}

impl OrderTerm {
    pub fn alias(alias: Alias, direction: SortDirection) -> Self {
        Self {
            key: OrderKey::Alias { alias },
            direction,
        }
    }

    pub fn column(column: SystemColumn, direction: SortDirection) -> Self {
        Self {
            key: OrderKey::Column { column },
            direction,
        }
    }

    fn render(&self) -> String {
        let key = match &self.key {
            OrderKey::Alias { alias } => alias.name(),
            OrderKey::Column { column } => column.name(),
        };
        format!("{} {}", key, self.direction.keyword())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statement {
    pub verb: Verb,
    pub relation: Relation,
    pub projections: Vec<Projection>,
    #[serde(default)]
    pub predicates: Vec<Predicate>,
    #[serde(default)]
    pub group_by: Vec<Alias>,
    #[serde(default)]
    pub order_by: Vec<OrderTerm>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<Operand>,
}

impl Statement {
    /// SQL text for this statement. Same statement, same text.
    pub fn render(&self) -> String {
        let verb = match self.verb {
            Verb::Select => "SELECT",
        };
        let projections: Vec<String> = self.projections.iter().map(Projection::render).collect();
        let mut sql = format!(
            "{} {} FROM {}",
            verb,
            projections.join(", "),
            self.relation.name()
        );

        if !self.predicates.is_empty() {
            let predicates: Vec<String> = self.predicates.iter().map(Predicate::render).collect();
            sql.push_str(" WHERE ");
            sql.push_str(&predicates.join(" AND "));
        }
        if !self.group_by.is_empty() {
            let keys: Vec<&str> = self.group_by.iter().map(Alias::name).collect();
            sql.push_str(" GROUP BY ");
            sql.push_str(&keys.join(", "));
        }
        if !self.order_by.is_empty() {
            let terms: Vec<String> = self.order_by.iter().map(OrderTerm::render).collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&terms.join(", "));
        }
        if let Some(limit) = &self.limit {
            sql.push_str(" LIMIT ");
            sql.push_str(&limit.render());
        }

        sql
    }

    /// Every operand, in projection, predicate, limit order
    pub fn operands(&self) -> Vec<&Operand> {
        let mut out = Vec::new();
        for projection in &self.projections {
            match projection {
                Projection::Column { .. } => {}
                Projection::Expr { operand, .. } => out.push(operand),
                Projection::Aggregate { operand, .. } => out.extend(operand.iter()),
            }
        }
        for predicate in &self.predicates {
            out.extend(predicate.operands());
        }
        out.extend(self.limit.iter());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_grouped_average() {
        let statement = Statement {
            verb: Verb::Select,
            relation: Relation::SurveyResponses,
            projections: vec![
                Projection::Expr {
                    operand: Operand::Field { key: 1, cast: Cast::Text },
                    alias: Alias::GroupKey,
                },
                Projection::Aggregate {
                    function: AggregateFunction::Avg,
                    operand: Some(Operand::Field { key: 2, cast: Cast::Numeric }),
                    alias: Alias::Value,
                },
            ],
            predicates: vec![Predicate::Compare {
                left: Operand::Column { column: SystemColumn::SurveyId },
                op: Comparison::Eq,
                right: Operand::Param { index: 3 },
            }],
            group_by: vec![Alias::GroupKey],
            order_by: vec![OrderTerm::alias(Alias::GroupKey, SortDirection::Asc)],
            limit: None,
        };

        assert_eq!(
            statement.render(),
            "SELECT data ->> $1 AS group_key, AVG(CAST(data ->> $2 AS NUMERIC)) AS value \
             FROM survey_responses WHERE survey_id = $3 GROUP BY group_key ORDER BY group_key ASC"
        );
        assert_eq!(statement.operands().len(), 4);
    }

    #[test]
    fn test_render_count_star_and_limit() {
        let statement = Statement {
            verb: Verb::Select,
            relation: Relation::SurveyResponses,
            projections: vec![Projection::Aggregate {
                function: AggregateFunction::Count,
                operand: None,
                alias: Alias::Value,
            }],
            predicates: vec![Predicate::AnyOf {
                operand: Operand::Field { key: 1, cast: Cast::Text },
                list: Operand::Param { index: 2 },
            }],
            group_by: Vec::new(),
            order_by: Vec::new(),
            limit: Some(Operand::Param { index: 3 }),
        };
        assert_eq!(
            statement.render(),
            "SELECT COUNT(*) AS value FROM survey_responses WHERE data ->> $1 = ANY($2) LIMIT $3"
        );
    }

    #[test]
    fn test_statement_serde_shape() {
        let operand = Operand::OptionPosition { key: 1, options: 2 };
        let value = serde_json::to_value(&operand).unwrap();
        assert_eq!(value["kind"], "optionPosition");
        let back: Operand = serde_json::from_value(value).unwrap();
        assert_eq!(back, operand);
    }
}
