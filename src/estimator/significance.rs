//! Significance tests between survey fields
//!
//! - Two-group comparison of a numeric field: Welch's t-test on weighted
//!   means, with Kish effective sizes standing in for n
//! - Independence of two categorical fields: Pearson's chi-square on the
//!   weighted contingency table, Yates-corrected for 2×2 tables
//!
//! Without a weight table every respondent weighs 1.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::coercion::{category, coerce, Coerced};
use super::errors::{EstimatorError, EstimatorResult};
use super::stats::{chi_square_survival, t_two_sided_p};
use super::weights::{kish_effective_size, WeightTable};
use crate::observability::{log_event_with_fields, Event};
use crate::response::Response;
use crate::schema::{Field, Survey};

pub const DEFAULT_SIGNIFICANCE_LEVEL: f64 = 0.05;
/// Fewest respondents per group for a t-test
pub const MIN_GROUP_SIZE: usize = 3;
/// Fewest answered pairs for a chi-square test
pub const MIN_CONTINGENCY_SIZE: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSummary {
    pub group: String,
    pub mean: f64,
    pub sample_size: usize,
    pub effective_sample_size: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TTestResult {
    pub target: String,
    pub group_by: String,
    /// Sorted by group value
    pub groups: [GroupSummary; 2],
    /// Infinite when both groups are constant and differ
    pub t_statistic: f64,
    pub degrees_of_freedom: f64,
    pub p_value: f64,
    pub significance_level: f64,
    pub significant: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChiSquareResult {
    pub row_field: String,
    pub column_field: String,
    pub statistic: f64,
    pub degrees_of_freedom: usize,
    pub p_value: f64,
    pub significance_level: f64,
    pub significant: bool,
    pub row_labels: Vec<String>,
    pub column_labels: Vec<String>,
    /// Weighted counts, rows × columns
    pub table: Vec<Vec<f64>>,
    pub sample_size: usize,
}

/// Runs significance tests over one survey's responses
#[derive(Debug, Clone)]
pub struct SignificanceTest<'a> {
    survey: &'a Survey,
    weights: Option<&'a WeightTable>,
    significance_level: f64,
}

impl<'a> SignificanceTest<'a> {
    pub fn new(survey: &'a Survey) -> Self {
        Self {
            survey,
            weights: None,
            significance_level: DEFAULT_SIGNIFICANCE_LEVEL,
        }
    }

    /// Weighs respondents by stratum; respondents without a weight are
    /// left out
    pub fn with_weights(mut self, weights: &'a WeightTable) -> Self {
        self.weights = Some(weights);
        self
    }

    pub fn with_significance_level(mut self, level: f64) -> Self {
        self.significance_level = level;
        self
    }

    /// Compares the mean of `target` between the two values of `group_by`
    pub fn t_test(
        &self,
        responses: &[Response],
        target: &str,
        group_by: &str,
    ) -> EstimatorResult<TTestResult> {
        self.check_level()?;
        let field = self.field(target)?;
        let group = self.field(group_by)?;

        let mut groups: BTreeMap<String, Vec<(f64, f64)>> = BTreeMap::new();
        for response in responses {
            let Some(key) = category(response.answer(&group.id)) else {
                continue;
            };
            let Coerced::Value(value) = coerce(field, response.answer(&field.id)) else {
                continue;
            };
            if let Some(weight) = self.weight(response) {
                groups.entry(key).or_default().push((value, weight));
            }
        }

        if groups.len() != 2 {
            return Err(EstimatorError::invalid_test(format!(
                "t-test needs exactly 2 groups of '{}', found {}",
                group.id,
                groups.len()
            )));
        }
        let mut summaries = Vec::with_capacity(2);
        for (key, members) in &groups {
            if members.len() < MIN_GROUP_SIZE {
                return Err(EstimatorError::insufficient(&field.id, None));
            }
            summaries.push((key.clone(), weighted_moments(members)));
        }

        let (a, b) = (&summaries[0].1, &summaries[1].1);
        let va = a.variance / a.effective;
        let vb = b.variance / b.effective;
        let se = (va + vb).sqrt();
        let diff = a.mean - b.mean;
        let t_statistic = if se > 0.0 {
            diff / se
        } else if diff == 0.0 {
            0.0
        } else {
            f64::INFINITY.copysign(diff)
        };
        let denominator = va * va / (a.effective - 1.0) + vb * vb / (b.effective - 1.0);
        let degrees_of_freedom = if denominator > 0.0 {
            (va + vb).powi(2) / denominator
        } else {
            a.effective + b.effective - 2.0
        };
        let p_value = if se > 0.0 || diff != 0.0 {
            t_two_sided_p(t_statistic, degrees_of_freedom)
        } else {
            1.0
        };

        let mut groups = summaries.into_iter().map(|(group, m)| GroupSummary {
            group,
            mean: m.mean,
            sample_size: m.size,
            effective_sample_size: m.effective,
        });
        let (Some(first), Some(second)) = (groups.next(), groups.next()) else {
            return Err(EstimatorError::invalid_test("t-test needs exactly 2 groups"));
        };

        self.log_test("t_test", &field.id, &group.id, p_value);
        Ok(TTestResult {
            target: field.id.clone(),
            group_by: group.id.clone(),
            groups: [first, second],
            t_statistic,
            degrees_of_freedom,
            p_value,
            significance_level: self.significance_level,
            significant: p_value < self.significance_level,
        })
    }

    /// Tests whether the answers to `row` and `column` are independent
    pub fn chi_square(
        &self,
        responses: &[Response],
        row: &str,
        column: &str,
    ) -> EstimatorResult<ChiSquareResult> {
        self.check_level()?;
        let row_field = self.field(row)?;
        let column_field = self.field(column)?;

        let mut cells: BTreeMap<(String, String), f64> = BTreeMap::new();
        let mut row_labels = BTreeSet::new();
        let mut column_labels = BTreeSet::new();
        let mut sample_size = 0;
        for response in responses {
            let (Some(r), Some(c)) = (
                category(response.answer(&row_field.id)),
                category(response.answer(&column_field.id)),
            ) else {
                continue;
            };
            let Some(weight) = self.weight(response) else {
                continue;
            };
            row_labels.insert(r.clone());
            column_labels.insert(c.clone());
            *cells.entry((r, c)).or_default() += weight;
            sample_size += 1;
        }

        if sample_size < MIN_CONTINGENCY_SIZE {
            return Err(EstimatorError::insufficient(&row_field.id, None));
        }
        if row_labels.len() < 2 || column_labels.len() < 2 {
            return Err(EstimatorError::invalid_test(format!(
                "chi-square needs at least 2 values each of '{}' and '{}'",
                row_field.id, column_field.id
            )));
        }

        let row_labels: Vec<String> = row_labels.into_iter().collect();
        let column_labels: Vec<String> = column_labels.into_iter().collect();
        let table: Vec<Vec<f64>> = row_labels
            .iter()
            .map(|r| {
                column_labels
                    .iter()
                    .map(|c| cells.get(&(r.clone(), c.clone())).copied().unwrap_or(0.0))
                    .collect()
            })
            .collect();

        let row_totals: Vec<f64> = table.iter().map(|row| row.iter().sum()).collect();
        let column_totals: Vec<f64> = (0..column_labels.len())
            .map(|j| table.iter().map(|row| row[j]).sum())
            .collect();
        let total: f64 = row_totals.iter().sum();
        let degrees_of_freedom = (row_labels.len() - 1) * (column_labels.len() - 1);

        let mut statistic = 0.0;
        for (i, row) in table.iter().enumerate() {
            for (j, observed) in row.iter().enumerate() {
                let expected = row_totals[i] * column_totals[j] / total;
                if expected <= 0.0 {
                    continue;
                }
                let mut deviation = (observed - expected).abs();
                if degrees_of_freedom == 1 {
                    deviation -= deviation.min(0.5);
                }
                statistic += deviation * deviation / expected;
            }
        }
        let p_value = chi_square_survival(statistic, degrees_of_freedom as f64);

        self.log_test("chi_square", &row_field.id, &column_field.id, p_value);
        Ok(ChiSquareResult {
            row_field: row_field.id.clone(),
            column_field: column_field.id.clone(),
            statistic,
            degrees_of_freedom,
            p_value,
            significance_level: self.significance_level,
            significant: p_value < self.significance_level,
            row_labels,
            column_labels,
            table,
            sample_size,
        })
    }

    fn weight(&self, response: &Response) -> Option<f64> {
        match self.weights {
            None => Some(1.0),
            Some(table) => {
                category(response.answer(&table.stratify_by)).and_then(|s| table.weight(&s))
            }
        }
    }

    fn check_level(&self) -> EstimatorResult<()> {
        if self.significance_level > 0.0 && self.significance_level < 1.0 {
            Ok(())
        } else {
            Err(EstimatorError::invalid_test(format!(
                "significance level {} is not in (0, 1)",
                self.significance_level
            )))
        }
    }

    fn field(&self, field_id: &str) -> EstimatorResult<&'a Field> {
        self.survey
            .field(field_id)
            .ok_or_else(|| EstimatorError::UnknownField {
                survey_id: self.survey.survey_id.clone(),
                field: field_id.to_string(),
            })
    }

    fn log_test(&self, test: &str, first: &str, second: &str, p_value: f64) {
        log_event_with_fields(
            Event::SignificanceTested,
            &[
                ("survey_id", self.survey.survey_id.as_str()),
                ("test", test),
                ("fields", &format!("{},{}", first, second)),
                ("p_value", &format!("{:.6}", p_value)),
            ],
        );
    }
}

struct Moments {
    mean: f64,
    /// Weighted variance scaled to the effective size
    variance: f64,
    size: usize,
    effective: f64,
}

fn weighted_moments(members: &[(f64, f64)]) -> Moments {
    let weights: Vec<f64> = members.iter().map(|(_, w)| *w).collect();
    let total: f64 = weights.iter().sum();
    let effective = kish_effective_size(&weights);
    let mean = members.iter().map(|(x, w)| w * x).sum::<f64>() / total;
    let spread = members
        .iter()
        .map(|(x, w)| w * (x - mean) * (x - mean))
        .sum::<f64>()
        / total;
    let variance = if effective > 1.0 {
        spread * effective / (effective - 1.0)
    } else {
        0.0
    };
    Moments {
        mean,
        variance,
        size: members.len(),
        effective,
    }
}
