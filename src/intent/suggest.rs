//! Question suggestions
//!
//! Suggestions are built only from the survey's own fields, in declaration
//! order, so the same partial input always yields the same list.

use super::tokenizer::normalize;
use crate::schema::{Field, Survey};

/// Most suggestions returned
pub const MAX_SUGGESTIONS: usize = 5;

/// Inputs shorter than this get the generic templates
const MIN_PARTIAL_LEN: usize = 3;

/// Suggests complete questions for a partial one
pub fn suggest(partial: &str, survey: &Survey) -> Vec<String> {
    let normalized = normalize(partial);
    let text = normalized.text.as_str();

    let numeric: Vec<&Field> = survey
        .fields
        .iter()
        .filter(|f| f.field_type.is_numeric())
        .collect();
    let choice: Vec<&Field> = survey
        .fields
        .iter()
        .filter(|f| f.field_type.has_options())
        .collect();

    let mut out = Vec::new();

    if text.chars().count() < MIN_PARTIAL_LEN {
        if let (Some(n), Some(c)) = (numeric.first(), choice.first()) {
            out.push(format!("What is the average {} by {}?", phrase(n), phrase(c)));
        }
        if let Some(c) = choice.first() {
            out.push(format!("How many responses by {}?", phrase(c)));
        }
        if let Some(n) = numeric.first() {
            out.push(format!("What is the highest {}?", phrase(n)));
        }
        if let Some(c) = choice.first() {
            out.push(format!("Top 5 {}", phrase(c)));
        }
        out.push("How many responses this month?".to_string());
        out.truncate(MAX_SUGGESTIONS);
        return out;
    }

    if text.starts_with("how many") || text.starts_with("count") {
        out.push("How many responses this week?".to_string());
        for field in &choice {
            out.push(format!("How many responses by {}?", phrase(field)));
        }
    } else if text.starts_with("average") || text.starts_with("avg") || text.starts_with("mean") {
        for field in &numeric {
            match choice.first() {
                Some(group) => {
                    out.push(format!("What is the average {} by {}?", phrase(field), phrase(group)))
                }
                None => out.push(format!("What is the average {}?", phrase(field))),
            }
        }
    } else if text.starts_with("top") || text.starts_with("most") {
        for field in &choice {
            out.push(format!("Top 5 {}", phrase(field)));
        }
    }

    // field completion on the last word typed
    if let Some(last) = normalized.tokens.last() {
        for field in &survey.fields {
            let name = phrase(field);
            let hit = name
                .split(' ')
                .any(|word| word.starts_with(last.as_str()) && word != last.as_str());
            if hit {
                let prefix = &normalized.tokens[..normalized.tokens.len() - 1];
                let mut completed = prefix.join(" ");
                if !completed.is_empty() {
                    completed.push(' ');
                }
                completed.push_str(&name);
                out.push(completed);
            }
        }
    }

    let mut seen = std::collections::HashSet::new();
    out.retain(|s| seen.insert(s.clone()));
    out.truncate(MAX_SUGGESTIONS);
    out
}

/// Field as a readable phrase: label when short, id otherwise
fn phrase(field: &Field) -> String {
    let label = field.label.trim().trim_end_matches('?');
    if !label.is_empty() && label.split_whitespace().count() <= 3 {
        label.to_lowercase()
    } else {
        field.id.replace('_', " ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldOption, FieldType};

    fn survey() -> Survey {
        Survey::new("pulse", "Pulse", 1)
            .with_field(Field::new("satisfaction", "Satisfaction", FieldType::Rating))
            .with_field(
                Field::new("age_group", "What is your age bracket today?", FieldType::Select)
                    .with_options(vec![FieldOption::new("18-25", "18-25")]),
            )
            .with_field(Field::new("spend", "Monthly spend", FieldType::Number))
    }

    #[test]
    fn test_templates_for_short_input() {
        let s = suggest("", &survey());
        assert_eq!(
            s,
            vec![
                "What is the average satisfaction by age group?",
                "How many responses by age group?",
                "What is the highest satisfaction?",
                "Top 5 age group",
                "How many responses this month?",
            ]
        );
    }

    #[test]
    fn test_average_prefix() {
        let s = suggest("average", &survey());
        assert_eq!(s[0], "What is the average satisfaction by age group?");
        assert_eq!(s[1], "What is the average monthly spend by age group?");
    }

    #[test]
    fn test_field_completion() {
        let s = suggest("average sat", &survey());
        assert!(s.contains(&"average satisfaction".to_string()));
    }

    #[test]
    fn test_bounded_and_deterministic() {
        let a = suggest("how many", &survey());
        let b = suggest("how many", &survey());
        assert_eq!(a, b);
        assert!(a.len() <= MAX_SUGGESTIONS);
    }
}
