//! Fuzzy field matching
//!
//! A field is described by phrases: its id split on `_`, its label, and
//! its synonyms. A phrase scores the share of its tokens found among the
//! question's content tokens; a field scores its best phrase.
//!
//! Token similarity:
//! - equal, or equal after plural stripping: 1.0
//! - normalized Levenshtein similarity, counted only at or above 0.8
//!
//! Ties break on phrase length, then field id.

use super::tokenizer::{is_stop_word, phrase_tokens};
use crate::schema::Field;

/// Lowest Levenshtein similarity that counts as a match
pub const MIN_TOKEN_SIMILARITY: f64 = 0.8;

/// A field and how well it matched
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMatch<'a> {
    pub field: &'a Field,
    pub score: f64,
}

/// Levenshtein edit distance (Wagner-Fischer, two rows)
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a_len = a.chars().count();
    let b_len = b.chars().count();
    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    let (short, long) = if a_len < b_len { (a, b) } else { (b, a) };
    let short_chars: Vec<char> = short.chars().collect();

    let mut prev_row: Vec<usize> = (0..=short_chars.len()).collect();
    let mut curr_row = vec![0; short_chars.len() + 1];

    for (i, long_char) in long.chars().enumerate() {
        curr_row[0] = i + 1;
        for (j, &short_char) in short_chars.iter().enumerate() {
            let cost = usize::from(long_char != short_char);
            curr_row[j + 1] = (curr_row[j] + 1)
                .min(prev_row[j + 1] + 1)
                .min(prev_row[j] + cost);
        }
        std::mem::swap(&mut prev_row, &mut curr_row);
    }

    prev_row[short_chars.len()]
}

fn singular(token: &str) -> &str {
    if token.len() > 4 && token.ends_with("ies") {
        // "categories" and "category" share the stem "categor"
        &token[..token.len() - 3]
    } else if token.len() > 3 && token.ends_with('s') && !token.ends_with("ss") {
        &token[..token.len() - 1]
    } else {
        token
    }
}

fn stem(token: &str) -> &str {
    if token.len() > 3 && token.ends_with('y') {
        &token[..token.len() - 1]
    } else {
        singular(token)
    }
}

/// Similarity of two normalized tokens in [0, 1]
pub fn token_similarity(a: &str, b: &str) -> f64 {
    if a == b || stem(a) == stem(b) {
        return 1.0;
    }
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 0.0;
    }
    let similarity = 1.0 - levenshtein_distance(a, b) as f64 / max_len as f64;
    if similarity >= MIN_TOKEN_SIMILARITY {
        similarity
    } else {
        0.0
    }
}

/// Share of `phrase` tokens present in `content`
pub fn phrase_score(phrase: &[String], content: &[&str]) -> f64 {
    if phrase.is_empty() || content.is_empty() {
        return 0.0;
    }
    let total: f64 = phrase
        .iter()
        .map(|p| {
            content
                .iter()
                .map(|c| token_similarity(p, c))
                .fold(0.0, f64::max)
        })
        .sum();
    total / phrase.len() as f64
}

/// Matching phrases of a field, stop words removed
pub fn field_phrases(field: &Field) -> Vec<Vec<String>> {
    std::iter::once(field.id.as_str())
        .chain(std::iter::once(field.label.as_str()))
        .chain(field.synonyms.iter().map(String::as_str))
        .map(|text| {
            phrase_tokens(text)
                .into_iter()
                .filter(|t| !is_stop_word(t))
                .collect::<Vec<_>>()
        })
        .filter(|p| !p.is_empty())
        .collect()
}

/// Best phrase score of a field against content tokens
pub fn field_score(field: &Field, content: &[&str]) -> f64 {
    best_phrase(field, content).0
}

/// Best phrase score and that phrase's length
fn best_phrase(field: &Field, content: &[&str]) -> (f64, usize) {
    field_phrases(field)
        .iter()
        .map(|p| (phrase_score(p, content), p.len()))
        .fold((0.0, 0), |best, next| {
            if next.0 > best.0 || (next.0 == best.0 && next.1 > best.1) {
                next
            } else {
                best
            }
        })
}

/// Best field at or above `threshold`, skipping `exclude`.
///
/// Equal scores prefer the field whose winning phrase is longer
/// (`age group` over `age`), then the smaller id.
pub fn best_match<'a>(
    fields: &'a [Field],
    content: &[&str],
    threshold: f64,
    exclude: Option<&str>,
) -> Option<FieldMatch<'a>> {
    let mut best: Option<(FieldMatch<'a>, usize)> = None;

    for field in fields {
        if exclude == Some(field.id.as_str()) {
            continue;
        }
        let (score, phrase_len) = best_phrase(field, content);
        if score < threshold || score <= 0.0 {
            continue;
        }
        let better = match &best {
            None => true,
            Some((current, current_len)) => {
                score > current.score
                    || (score == current.score
                        && (phrase_len > *current_len
                            || (phrase_len == *current_len && field.id < current.field.id)))
            }
        };
        if better {
            best = Some((FieldMatch { field, score }, phrase_len));
        }
    }

    best.map(|(m, _)| m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldType;

    #[test]
    fn test_levenshtein_distance() {
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("", "abc"), 3);
        assert_eq!(levenshtein_distance("same", "same"), 0);
    }

    #[test]
    fn test_plural_insensitive() {
        assert_eq!(token_similarity("rating", "ratings"), 1.0);
        assert_eq!(token_similarity("category", "categories"), 1.0);
        assert_eq!(token_similarity("class", "class"), 1.0);
    }

    #[test]
    fn test_typo_tolerance() {
        // one edit in ten characters
        assert!(token_similarity("satisfaction", "satisfacton") >= 0.8);
        assert_eq!(token_similarity("age", "ago"), 0.0);
    }

    #[test]
    fn test_field_phrases_include_id_label_synonyms() {
        let field = Field::new("age_group", "What is your age?", FieldType::Select)
            .with_synonyms(["age bracket"]);
        let phrases = field_phrases(&field);
        assert_eq!(
            phrases,
            vec![
                vec!["age".to_string(), "group".to_string()],
                vec!["age".to_string()],
                vec!["age".to_string(), "bracket".to_string()],
            ]
        );
    }

    #[test]
    fn test_best_match_ties_break_on_id() {
        let fields = vec![
            Field::new("score_b", "Score", FieldType::Number),
            Field::new("score_a", "Score", FieldType::Number),
        ];
        let m = best_match(&fields, &["score"], 0.6, None).unwrap();
        assert_eq!(m.field.id, "score_a");
        assert_eq!(m.score, 1.0);
    }

    #[test]
    fn test_threshold_and_exclusion() {
        let fields = vec![
            Field::new("age_group", "Age group", FieldType::Select),
            Field::new("satisfaction", "Satisfaction", FieldType::Rating),
        ];
        assert!(best_match(&fields, &["weather"], 0.6, None).is_none());
        assert!(best_match(&fields, &["satisfaction"], 0.6, Some("satisfaction")).is_none());

        // "group" alone covers half of the id phrase
        let m = best_match(&fields, &["group"], 0.4, None).unwrap();
        assert_eq!(m.score, 0.5);
    }

    #[test]
    fn test_longer_phrase_wins_tie() {
        let fields = vec![
            Field::new("age", "Age", FieldType::Number),
            Field::new("age_group", "Age group", FieldType::Select),
        ];
        let m = best_match(&fields, &["age", "group"], 0.6, None).unwrap();
        assert_eq!(m.field.id, "age_group");
    }
}
