//! Question to intent
//!
//! Parsing never fails. Steps, in order:
//! 1. Normalize and tokenize
//! 2. Aggregation keywords, ranking words (`top`, `most`, `least`) and limit
//! 3. Relative time phrase
//! 4. Group marker (`by`, `per`, `across`, `for each`)
//! 5. Comparator filters, then bare option mentions
//! 6. Target and group-by fields from the remaining content tokens
//! 7. Confidence
//!
//! Each step marks the tokens it consumes so later steps never reuse them.

use serde_json::{json, Value};

use super::matcher::{best_match, FieldMatch};
use super::tokenizer::{as_number, is_stop_word, normalize, phrase_tokens};
use super::types::{
    Aggregation, FilterOperator, IntentFilter, QueryIntent, SortDirection, TimeWindow,
};
use crate::schema::{parse_date, Field, FieldRef, FieldType, Survey};

/// Default minimum fuzzy score for a field to be picked
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.6;

const AGGREGATION_WEIGHT: f64 = 0.4;
const FIELD_WEIGHT: f64 = 0.6;

/// Keywords per aggregation, checked in this order
const AGGREGATION_KEYWORDS: &[(Aggregation, &[&str])] = &[
    (Aggregation::Count, &["how many", "number of", "count"]),
    (Aggregation::Avg, &["average", "avg", "mean"]),
    (Aggregation::Sum, &["sum", "total"]),
    (Aggregation::Max, &["max", "maximum", "highest"]),
    (Aggregation::Min, &["min", "minimum", "lowest"]),
];

/// Words that close a filter's subject window
const BOUNDARY_WORDS: &[&str] = &["where", "with", "whose", "who", "and", "that", "when", "if"];

/// Parses questions against one survey
#[derive(Debug, Clone)]
pub struct IntentParser<'a> {
    survey: &'a Survey,
    threshold: f64,
}

/// Parse with the default match threshold
pub fn parse(question: &str, survey: &Survey) -> QueryIntent {
    IntentParser::new(survey).parse(question)
}

impl<'a> IntentParser<'a> {
    pub fn new(survey: &'a Survey) -> Self {
        Self {
            survey,
            threshold: DEFAULT_MATCH_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn survey(&self) -> &Survey {
        self.survey
    }

    /// Reads a question into an intent
    pub fn parse(&self, question: &str) -> QueryIntent {
        let normalized = normalize(question);
        if normalized.tokens.is_empty() {
            return QueryIntent::empty(question, normalized.text);
        }

        let mut scan = Scan::new(&normalized.tokens);

        let (keyword_aggregation, ranking) = scan.aggregation();
        let limit = scan.limit();
        let time_window = scan.time_window();
        let marker = scan.group_marker();

        let mut filters = Vec::new();
        let mut filter_scores = Vec::new();
        self.comparator_filters(&mut scan, marker, &mut filters, &mut filter_scores);
        self.option_mentions(&mut scan, &mut filters);

        let (mut target, mut group): (Option<FieldMatch>, Option<FieldMatch>) = match marker {
            Some((start, end)) => {
                let before = self.match_range(&scan, 0, start, None);
                let exclude = before.as_ref().map(|m| m.field.id.as_str());
                let after = self.match_range(&scan, end, scan.len(), exclude);
                // "top plans by satisfaction" ranks plans
                if ranking.is_some() {
                    (after, before)
                } else {
                    (before, after)
                }
            }
            None => {
                let best = self.match_range(&scan, 0, scan.len(), None);
                if ranking.is_some() {
                    (None, best)
                } else {
                    (best, None)
                }
            }
        };
        if ranking.is_some() && group.is_none() {
            group = target.take();
        }

        let aggregation = match (keyword_aggregation, ranking) {
            (Some(agg), _) => agg,
            (None, Some(_)) => Aggregation::Count,
            (None, None) => Aggregation::None,
        };

        let matched_any = target.is_some() || group.is_some() || !filters.is_empty();
        let certainty = if keyword_aggregation.is_some() || ranking.is_some() {
            1.0
        } else if matched_any {
            0.5
        } else {
            0.0
        };

        let mut field_scores: Vec<f64> = target.iter().chain(group.iter()).map(|m| m.score).collect();
        if field_scores.is_empty() {
            field_scores = filter_scores;
        }
        let field_score = if field_scores.is_empty() {
            0.0
        } else {
            field_scores.iter().sum::<f64>() / field_scores.len() as f64
        };

        let confidence =
            (AGGREGATION_WEIGHT * certainty + FIELD_WEIGHT * field_score).clamp(0.0, 1.0);

        QueryIntent {
            raw_text: question.to_string(),
            normalized_text: normalized.text,
            aggregation,
            target_field: target.map(|m| self.field_ref(m.field)),
            group_by_field: group.map(|m| self.field_ref(m.field)),
            filters,
            sort: ranking,
            limit,
            time_window,
            confidence,
        }
    }

    /// Best field in `[start, end)`, preferring tokens no filter used as its subject
    fn match_range(
        &self,
        scan: &Scan,
        start: usize,
        end: usize,
        exclude: Option<&str>,
    ) -> Option<FieldMatch<'a>> {
        let survey: &'a Survey = self.survey;
        let fields = &survey.fields;
        best_match(fields, &scan.free_content(start, end), self.threshold, exclude)
            .or_else(|| best_match(fields, &scan.content(start, end), self.threshold, exclude))
    }

    fn field_ref(&self, field: &Field) -> FieldRef {
        FieldRef::new(&self.survey.survey_id, &field.id)
    }

    fn comparator_filters(
        &self,
        scan: &mut Scan,
        marker: Option<(usize, usize)>,
        filters: &mut Vec<IntentFilter>,
        scores: &mut Vec<f64>,
    ) {
        let mut window_floor = 0;
        let mut i = 0;

        while i < scan.len() {
            if scan.used[i] {
                i += 1;
                continue;
            }
            let Some((operator, width)) = scan.comparator(i) else {
                i += 1;
                continue;
            };

            let mut floor = window_floor;
            if let Some((_, end)) = marker {
                if i >= end {
                    floor = floor.max(end);
                }
            }
            let subject_start = scan.subject_start(i, floor);
            let window = scan.content(subject_start, i);
            let Some(subject) = best_match(&self.survey.fields, &window, self.threshold, None)
            else {
                i += 1;
                continue;
            };

            let weak = scan.tokens[i] == "is";
            let Some((operator, value, consumed)) =
                read_value(subject.field, operator, weak, scan, i + width)
            else {
                i += 1;
                continue;
            };

            let end = i + width + consumed;
            scan.consume(i, end);
            scan.mark_subject(subject_start, i);
            filters.push(IntentFilter::new(
                self.field_ref(subject.field),
                operator,
                value,
            ));
            scores.push(subject.score);
            window_floor = end;
            i = end;
        }
    }

    fn option_mentions(&self, scan: &mut Scan, filters: &mut Vec<IntentFilter>) {
        for field in &self.survey.fields {
            if !field.field_type.is_ordinal() {
                continue;
            }
            if filters.iter().any(|f| f.field.field_id == field.id) {
                continue;
            }

            let mut mentioned = Vec::new();
            for option in &field.options {
                let candidates = [phrase_tokens(&option.value), phrase_tokens(&option.label)];
                for phrase in candidates.iter() {
                    if phrase.is_empty() || phrase.iter().all(|t| is_stop_word(t)) {
                        continue;
                    }
                    if let Some(at) = scan.find_phrase(phrase) {
                        scan.consume(at, at + phrase.len());
                        mentioned.push(Value::String(option.value.clone()));
                        break;
                    }
                }
            }

            match mentioned.len() {
                0 => {}
                1 => filters.push(IntentFilter::new(
                    self.field_ref(field),
                    FilterOperator::Eq,
                    mentioned.remove(0),
                )),
                _ => filters.push(IntentFilter::new(
                    self.field_ref(field),
                    FilterOperator::In,
                    Value::Array(mentioned),
                )),
            }
        }
    }
}

/// Token cursor with consumption marks
struct Scan<'t> {
    tokens: &'t [String],
    used: Vec<bool>,
    subject: Vec<bool>,
}

impl<'t> Scan<'t> {
    fn new(tokens: &'t [String]) -> Self {
        Self {
            tokens,
            used: vec![false; tokens.len()],
            subject: vec![false; tokens.len()],
        }
    }

    fn mark_subject(&mut self, start: usize, end: usize) {
        for flag in &mut self.subject[start..end.min(self.tokens.len())] {
            *flag = true;
        }
    }

    fn len(&self) -> usize {
        self.tokens.len()
    }

    fn token(&self, i: usize) -> Option<&str> {
        self.tokens.get(i).map(String::as_str)
    }

    fn free(&self, i: usize) -> bool {
        i < self.len() && !self.used[i]
    }

    fn consume(&mut self, start: usize, end: usize) {
        for flag in &mut self.used[start..end.min(self.tokens.len())] {
            *flag = true;
        }
    }

    /// Start index of a free phrase occurrence
    fn find_phrase(&self, phrase: &[String]) -> Option<usize> {
        if phrase.is_empty() || phrase.len() > self.len() {
            return None;
        }
        (0..=self.len() - phrase.len()).find(|&start| {
            phrase
                .iter()
                .enumerate()
                .all(|(k, p)| self.free(start + k) && self.tokens[start + k] == *p)
        })
    }

    /// Free, non-stop-word, non-numeric tokens in `[start, end)`
    fn content(&self, start: usize, end: usize) -> Vec<&str> {
        (start..end.min(self.len()))
            .filter(|&i| !self.used[i])
            .map(|i| self.tokens[i].as_str())
            .filter(|t| !is_stop_word(t) && as_number(t).is_none() && *t != "=")
            .collect()
    }

    /// Like `content`, without filter subjects
    fn free_content(&self, start: usize, end: usize) -> Vec<&str> {
        (start..end.min(self.len()))
            .filter(|&i| !self.subject[i])
            .filter(|&i| !self.used[i])
            .map(|i| self.tokens[i].as_str())
            .filter(|t| !is_stop_word(t) && as_number(t).is_none() && *t != "=")
            .collect()
    }

    fn aggregation(&mut self) -> (Option<Aggregation>, Option<SortDirection>) {
        let mut found = None;
        for (aggregation, keywords) in AGGREGATION_KEYWORDS {
            for keyword in keywords.iter() {
                let phrase: Vec<String> = keyword.split(' ').map(str::to_string).collect();
                while let Some(at) = self.find_phrase(&phrase) {
                    self.consume(at, at + phrase.len());
                    found.get_or_insert(*aggregation);
                }
            }
        }

        let mut ranking = None;
        for i in 0..self.len() {
            if !self.free(i) {
                continue;
            }
            let after_at = i > 0 && self.tokens[i - 1] == "at";
            let direction = match self.tokens[i].as_str() {
                "top" => Some(SortDirection::Desc),
                "most" if !after_at => Some(SortDirection::Desc),
                "bottom" | "fewest" => Some(SortDirection::Asc),
                "least" if !after_at => Some(SortDirection::Asc),
                _ => None,
            };
            if let Some(direction) = direction {
                self.used[i] = true;
                ranking.get_or_insert(direction);
            }
        }

        (found, ranking)
    }

    fn limit(&mut self) -> Option<u64> {
        for i in 0..self.len().saturating_sub(1) {
            if matches!(self.tokens[i].as_str(), "top" | "bottom" | "limit" | "first")
                && self.free(i + 1)
            {
                if let Ok(n) = self.tokens[i + 1].parse::<u64>() {
                    self.used[i] = true;
                    self.used[i + 1] = true;
                    return Some(n);
                }
            }
        }
        None
    }

    fn time_window(&mut self) -> Option<TimeWindow> {
        for window in TimeWindow::ALL {
            let phrase: Vec<String> = window.phrase().split(' ').map(str::to_string).collect();
            if let Some(at) = self.find_phrase(&phrase) {
                self.consume(at, at + phrase.len());
                return Some(window);
            }
        }
        None
    }

    /// `[start, end)` of the first group marker
    fn group_marker(&mut self) -> Option<(usize, usize)> {
        for i in 0..self.len() {
            if !self.free(i) {
                continue;
            }
            let width = match self.tokens[i].as_str() {
                "by" | "per" | "across" => 1,
                "for" if self.token(i + 1) == Some("each") => 2,
                _ => continue,
            };
            self.consume(i, i + width);
            return Some((i, i + width));
        }
        None
    }

    /// Comparator starting at `i` and its width in tokens
    fn comparator(&self, i: usize) -> Option<(FilterOperator, usize)> {
        let next = self.token(i + 1);
        match self.tokens[i].as_str() {
            "above" | "over" => Some((FilterOperator::Gt, 1)),
            "greater" | "more" | "higher" if next == Some("than") => Some((FilterOperator::Gt, 2)),
            "at" if next == Some("least") => Some((FilterOperator::Gte, 2)),
            "at" if next == Some("most") => Some((FilterOperator::Lte, 2)),
            "below" | "under" => Some((FilterOperator::Lt, 1)),
            "less" | "fewer" | "lower" if next == Some("than") => Some((FilterOperator::Lt, 2)),
            "between" => Some((FilterOperator::Between, 1)),
            "equal" | "equals" if next == Some("to") => Some((FilterOperator::Eq, 2)),
            "equal" | "equals" | "=" | "is" => Some((FilterOperator::Eq, 1)),
            "in" => Some((FilterOperator::In, 1)),
            _ => None,
        }
    }

    /// Start of the subject window that ends right before `i`
    fn subject_start(&self, i: usize, floor: usize) -> usize {
        let mut start = i;
        while start > floor {
            let prev = start - 1;
            if self.used[prev] || BOUNDARY_WORDS.contains(&self.tokens[prev].as_str()) {
                break;
            }
            start = prev;
        }
        start
    }
}

/// Reads the filter value after a comparator.
///
/// Returns the (possibly refined) operator, the value and the number of
/// tokens consumed. A weak comparator (`is`) only accepts values that are
/// unambiguous for the field type.
fn read_value(
    field: &Field,
    operator: FilterOperator,
    weak: bool,
    scan: &Scan,
    at: usize,
) -> Option<(FilterOperator, Value, usize)> {
    match operator {
        FilterOperator::Between => {
            let (low, low_width) = scalar_value(field, scan, at, false)?;
            if scan.token(at + low_width) != Some("and") {
                return None;
            }
            let (high, high_width) = scalar_value(field, scan, at + low_width + 1, false)?;
            let operator = if field.field_type == FieldType::Date {
                FilterOperator::DateRange
            } else {
                FilterOperator::Between
            };
            Some((operator, json!([low, high]), low_width + 1 + high_width))
        }
        FilterOperator::In => {
            let mut values = Vec::new();
            let mut cursor = at;
            while scan.free(cursor) {
                if matches!(scan.tokens[cursor].as_str(), "or" | "and") && !values.is_empty() {
                    cursor += 1;
                    continue;
                }
                match scalar_value(field, scan, cursor, true) {
                    Some((value, width)) => {
                        values.push(value);
                        cursor += width;
                    }
                    None => break,
                }
            }
            // a trailing conjunction belongs to the next clause
            while cursor > at && matches!(scan.tokens[cursor - 1].as_str(), "or" | "and") {
                cursor -= 1;
            }
            if values.is_empty() {
                None
            } else {
                Some((FilterOperator::In, Value::Array(values), cursor - at))
            }
        }
        _ => {
            let (value, width) = scalar_value(field, scan, at, operator == FilterOperator::Eq && !weak)?;
            Some((operator, value, width))
        }
    }
}

/// One value for a field at token `at`, with its width
fn scalar_value(field: &Field, scan: &Scan, at: usize, allow_text: bool) -> Option<(Value, usize)> {
    let token = scan.token(at)?;
    if !scan.free(at) {
        return None;
    }

    match field.field_type {
        FieldType::Number | FieldType::Rating => number_value(token).map(|v| (v, 1)),
        FieldType::Date => parse_date(token).map(|_| (Value::String(token.to_string()), 1)),
        FieldType::Select | FieldType::Radio | FieldType::Checkbox => {
            // longest option phrase first
            for width in (1..=3).rev() {
                if at + width > scan.len() || !(at..at + width).all(|k| scan.free(k)) {
                    continue;
                }
                let joined = scan.tokens[at..at + width].join(" ");
                if let Some(option) = field.find_option(&joined) {
                    return Some((Value::String(option.value.clone()), width));
                }
            }
            None
        }
        FieldType::Text => {
            if allow_text && !is_stop_word(token) {
                Some((Value::String(token.to_string()), 1))
            } else {
                None
            }
        }
    }
}

fn number_value(token: &str) -> Option<Value> {
    if let Ok(n) = token.parse::<i64>() {
        return Some(json!(n));
    }
    as_number(token).map(|n| json!(n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldOption, ValidationRules};

    fn survey() -> Survey {
        Survey::new("pulse", "Customer pulse", 1)
            .with_field(
                Field::new("satisfaction", "Overall satisfaction rating", FieldType::Rating)
                    .with_validation(ValidationRules {
                        min: Some(1.0),
                        max: Some(5.0),
                        ..Default::default()
                    }),
            )
            .with_field(
                Field::new("age_group", "Age group", FieldType::Select).with_options(vec![
                    FieldOption::new("18-25", "18-25"),
                    FieldOption::new("26-35", "26-35"),
                    FieldOption::new("36+", "36 and over"),
                ]),
            )
            .with_field(
                Field::new("plan", "Subscription plan", FieldType::Radio).with_options(vec![
                    FieldOption::new("basic", "Basic"),
                    FieldOption::new("pro", "Pro"),
                ]),
            )
            .with_field(Field::new("age", "Age in years", FieldType::Number))
            .with_field(Field::new("visited_on", "Visit date", FieldType::Date))
            .with_field(Field::new("comments", "Comments", FieldType::Text))
    }

    fn field(intent: &Option<FieldRef>) -> Option<&str> {
        intent.as_ref().map(|f| f.field_id.as_str())
    }

    #[test]
    fn test_average_by_group() {
        let survey = survey();
        let intent = parse("What is the average satisfaction rating by age group?", &survey);

        assert_eq!(intent.aggregation, Aggregation::Avg);
        assert_eq!(field(&intent.target_field), Some("satisfaction"));
        assert_eq!(field(&intent.group_by_field), Some("age_group"));
        assert!(intent.filters.is_empty());
        assert!(intent.confidence >= 0.6);
    }

    #[test]
    fn test_unrelated_question() {
        let survey = survey();
        let intent = parse("tell me a joke", &survey);

        assert_eq!(intent.aggregation, Aggregation::None);
        assert!(intent.target_field.is_none());
        assert!(intent.filters.is_empty());
        assert!(intent.confidence < 0.2);
    }

    #[test]
    fn test_empty_question() {
        let intent = parse("   ?! ", &survey());
        assert_eq!(intent.aggregation, Aggregation::None);
        assert_eq!(intent.confidence, 0.0);
    }

    #[test]
    fn test_count_with_comparator_filter() {
        let survey = survey();
        let intent = parse("How many responses where satisfaction is above 3?", &survey);

        assert_eq!(intent.aggregation, Aggregation::Count);
        assert_eq!(intent.filters.len(), 1);
        let filter = &intent.filters[0];
        assert_eq!(filter.field.field_id, "satisfaction");
        assert_eq!(filter.operator, FilterOperator::Gt);
        assert_eq!(filter.value, json!(3));
    }

    #[test]
    fn test_between_and_at_least() {
        let survey = survey();
        let intent = parse(
            "average satisfaction for customers with age between 20 and 30",
            &survey,
        );
        assert_eq!(intent.filters[0].operator, FilterOperator::Between);
        assert_eq!(intent.filters[0].value, json!([20, 30]));
        assert_eq!(field(&intent.target_field), Some("satisfaction"));

        let intent = parse("count responses with satisfaction at least 4", &survey);
        assert_eq!(intent.filters[0].operator, FilterOperator::Gte);
        assert!(intent.sort.is_none());
    }

    #[test]
    fn test_date_range() {
        let survey = survey();
        let intent = parse(
            "how many responses with visit date between 2024-01-01 and 2024-03-31",
            &survey,
        );
        assert_eq!(intent.filters[0].operator, FilterOperator::DateRange);
        assert_eq!(intent.filters[0].value, json!(["2024-01-01", "2024-03-31"]));
    }

    #[test]
    fn test_in_list_of_options() {
        let survey = survey();
        let intent = parse("average satisfaction where plan in basic or pro", &survey);
        let filter = &intent.filters[0];
        assert_eq!(filter.operator, FilterOperator::In);
        assert_eq!(filter.value, json!(["basic", "pro"]));
    }

    #[test]
    fn test_bare_option_mention() {
        let survey = survey();
        let intent = parse("average satisfaction of 18-25 respondents", &survey);
        assert_eq!(intent.filters.len(), 1);
        assert_eq!(intent.filters[0].field.field_id, "age_group");
        assert_eq!(intent.filters[0].operator, FilterOperator::Eq);
        assert_eq!(intent.filters[0].value, json!("18-25"));
        assert_eq!(field(&intent.target_field), Some("satisfaction"));
    }

    #[test]
    fn test_top_n_groups() {
        let survey = survey();
        let intent = parse("top 3 subscription plans", &survey);
        assert_eq!(intent.aggregation, Aggregation::Count);
        assert_eq!(intent.sort, Some(SortDirection::Desc));
        assert_eq!(intent.limit, Some(3));
        assert_eq!(field(&intent.group_by_field), Some("plan"));
        assert!(intent.target_field.is_none());
    }

    #[test]
    fn test_least_common() {
        let survey = survey();
        let intent = parse("least common age group", &survey);
        assert_eq!(intent.sort, Some(SortDirection::Asc));
        assert_eq!(field(&intent.group_by_field), Some("age_group"));
    }

    #[test]
    fn test_time_window() {
        let survey = survey();
        let intent = parse("how many responses last month", &survey);
        assert_eq!(intent.time_window, Some(TimeWindow::LastMonth));
        assert_eq!(intent.aggregation, Aggregation::Count);
    }

    #[test]
    fn test_implicit_listing_scores_half_certainty() {
        let survey = survey();
        let intent = parse("satisfaction per plan", &survey);
        assert_eq!(intent.aggregation, Aggregation::None);
        assert_eq!(field(&intent.group_by_field), Some("plan"));
        // 0.4 * 0.5 + 0.6 * 1.0
        assert!((intent.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_typo_still_matches() {
        let survey = survey();
        let intent = parse("mean satisfacton", &survey);
        assert_eq!(field(&intent.target_field), Some("satisfaction"));
    }

    #[test]
    fn test_deterministic() {
        let survey = survey();
        let q = "Top 5 plans by average satisfaction this year";
        let a = parse(q, &survey);
        let b = parse(q, &survey);
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn test_ranked_noun_is_the_group() {
        let survey = survey();
        let intent = parse("Top 5 plans by average satisfaction", &survey);
        assert_eq!(intent.aggregation, Aggregation::Avg);
        assert_eq!(field(&intent.group_by_field), Some("plan"));
        assert_eq!(field(&intent.target_field), Some("satisfaction"));
        assert_eq!(intent.sort, Some(SortDirection::Desc));
        assert_eq!(intent.limit, Some(5));

        let intent = parse("least common age group by satisfaction", &survey);
        assert_eq!(intent.sort, Some(SortDirection::Asc));
        assert_eq!(field(&intent.group_by_field), Some("age_group"));
    }
}
