//! Emission-time validator
//!
//! Re-checks a rendered query without trusting the plan it came from.
//! Fails closed: anything not explicitly allowed is rejected.
//!
//! Checks, in order:
//! 1. Text starts with SELECT
//! 2. No statement terminators, comments or quote characters
//! 3. No forbidden verb anywhere in the text
//! 4. Every identifier is whitelisted
//! 5. Placeholders are exactly `$1..$n` for `n` parameters
//! 6. Parameter kinds match their use in the statement
//! 7. Survey exists and every field key resolves in it
//! 8. The query is scoped by `survey_id` to its own survey
//! 9. Text is exactly the rendering of the statement

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use super::errors::UnsafeQueryError;
use super::render::{ParamKind, RenderedQuery};
use super::statement::{AggregateFunction, Comparison, Operand, Predicate, SystemColumn};
use crate::schema::SchemaRegistry;

/// Verbs that never appear in an emitted query
pub const FORBIDDEN_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "CREATE", "TRUNCATE", "GRANT", "REVOKE",
    "EXEC", "EXECUTE", "MERGE", "CALL", "COPY", "UNION",
];

const FORBIDDEN_SEQUENCES: &[&str] = &[";", "--", "/*", "*/", "'", "\"", "`", "\\"];

const KEYWORDS: &[&str] = &[
    "SELECT", "FROM", "WHERE", "AND", "GROUP", "BY", "ORDER", "ASC", "DESC", "LIMIT", "AS",
    "CAST", "NUMERIC", "DATE", "BETWEEN", "ANY", "array_position", "survey_responses", "value",
    "group_key", "target",
];

struct Patterns {
    forbidden: Regex,
    identifier: Regex,
    placeholder: Regex,
}

/// Compiled once; `None` only if a pattern fails to compile, which
/// rejects every query
fn patterns() -> Option<&'static Patterns> {
    static PATTERNS: OnceLock<Option<Patterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            let forbidden = format!(r"(?i)\b({})\b", FORBIDDEN_KEYWORDS.join("|"));
            Some(Patterns {
                forbidden: Regex::new(&forbidden).ok()?,
                identifier: Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").ok()?,
                placeholder: Regex::new(r"\$([0-9]+)").ok()?,
            })
        })
        .as_ref()
}

fn is_whitelisted(identifier: &str) -> bool {
    KEYWORDS.contains(&identifier)
        || SystemColumn::ALL.iter().any(|c| c.name() == identifier)
        || AggregateFunction::ALL.iter().any(|f| f.name() == identifier)
}

/// Whitelist validator for rendered queries
#[derive(Debug, Clone)]
pub struct QueryValidator<'a> {
    registry: &'a SchemaRegistry,
}

impl<'a> QueryValidator<'a> {
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        Self { registry }
    }

    pub fn validate(&self, query: &RenderedQuery) -> bool {
        self.check(query).is_ok()
    }

    pub fn check(&self, query: &RenderedQuery) -> Result<(), UnsafeQueryError> {
        let sql = query.sql.as_str();
        let patterns = patterns().ok_or(UnsafeQueryError::StructureMismatch)?;

        // 1. Verb
        if !sql.starts_with("SELECT ") {
            return Err(UnsafeQueryError::NotSelect);
        }

        // 2. Terminators, comments, quotes
        if let Some(sequence) = FORBIDDEN_SEQUENCES.iter().find(|s| sql.contains(**s)) {
            return Err(UnsafeQueryError::ForbiddenSequence {
                sequence: sequence.to_string(),
            });
        }

        // 3. Forbidden verbs
        if let Some(found) = patterns.forbidden.find(sql) {
            return Err(UnsafeQueryError::ForbiddenKeyword {
                keyword: found.as_str().to_uppercase(),
            });
        }

        // 4. Identifier whitelist
        if let Some(found) = patterns
            .identifier
            .find_iter(sql)
            .find(|m| !is_whitelisted(m.as_str()))
        {
            return Err(UnsafeQueryError::DisallowedIdentifier {
                identifier: found.as_str().to_string(),
            });
        }

        // 5. Placeholders
        check_placeholders(&patterns.placeholder, query)?;

        // 6. Parameter kinds
        for operand in query.statement.operands() {
            check_operand(query, operand)?;
        }

        // 7. Field keys resolve
        let survey = self.registry.survey(&query.survey_id).ok_or_else(|| {
            UnsafeQueryError::UnknownSurvey {
                survey_id: query.survey_id.clone(),
            }
        })?;
        for param in query.params.iter().filter(|p| p.kind == ParamKind::FieldKey) {
            let resolved = param.value.as_str().and_then(|id| survey.field(id));
            if resolved.is_none() {
                return Err(UnsafeQueryError::UnresolvedField {
                    survey_id: query.survey_id.clone(),
                    field_id: match &param.value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    },
                });
            }
        }

        // 8. Scoped to its own survey
        if !is_scoped(query) {
            return Err(UnsafeQueryError::StructureMismatch);
        }

        // 9. Text agrees with structure
        if query.statement.render() != query.sql {
            return Err(UnsafeQueryError::StructureMismatch);
        }

        Ok(())
    }
}

fn check_placeholders(placeholder: &Regex, query: &RenderedQuery) -> Result<(), UnsafeQueryError> {
    let mismatch = |reason: String| UnsafeQueryError::PlaceholderMismatch { reason };

    for (position, param) in query.params.iter().enumerate() {
        if param.index != position + 1 {
            return Err(mismatch(format!(
                "parameter at position {} is numbered ${}",
                position + 1,
                param.index
            )));
        }
    }

    let mut used = BTreeSet::new();
    for capture in placeholder.captures_iter(&query.sql) {
        let index = capture[1]
            .parse::<usize>()
            .map_err(|_| mismatch(format!("unreadable placeholder ${}", &capture[1])))?;
        used.insert(index);
    }
    let bare = query.sql.matches('$').count();
    let numbered = placeholder.find_iter(&query.sql).count();
    if bare != numbered {
        return Err(mismatch("unnumbered '$' in text".to_string()));
    }

    let expected: BTreeSet<usize> = (1..=query.params.len()).collect();
    if used != expected {
        return Err(mismatch(format!(
            "text uses {:?}, {} parameters bound",
            used,
            query.params.len()
        )));
    }
    Ok(())
}

fn check_operand(query: &RenderedQuery, operand: &Operand) -> Result<(), UnsafeQueryError> {
    let expect = |index: usize, kind: ParamKind| match query.param(index) {
        Some(param) if param.kind == kind => Ok(()),
        Some(_) => Err(UnsafeQueryError::ParamKindMismatch { index }),
        None => Err(UnsafeQueryError::PlaceholderMismatch {
            reason: format!("${} is not bound", index),
        }),
    };

    match operand {
        Operand::Column { .. } => Ok(()),
        Operand::Param { index } => expect(*index, ParamKind::Literal),
        Operand::Field { key, .. } => expect(*key, ParamKind::FieldKey),
        Operand::OptionPosition { key, options } => {
            expect(*key, ParamKind::FieldKey)?;
            expect(*options, ParamKind::Literal)
        }
    }
}

/// True when a conjunct pins `survey_id` to the query's survey
fn is_scoped(query: &RenderedQuery) -> bool {
    query.statement.predicates.iter().any(|predicate| match predicate {
        Predicate::Compare {
            left: Operand::Column {
                column: SystemColumn::SurveyId,
            },
            op: Comparison::Eq,
            right: Operand::Param { index },
        } => query
            .param(*index)
            .map_or(false, |p| p.value.as_str() == Some(query.survey_id.as_str())),
        _ => false,
    })
}
