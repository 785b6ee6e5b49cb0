//! Post-stratification weights
//!
//! A respondent in stratum `s` carries `w_s = P_s / (n_s / N)`, so the
//! weighted share of every stratum equals its population proportion.

use std::collections::BTreeMap;

use serde::Serialize;

use super::coercion::category;
use super::design::Strata;
use super::errors::{EstimatorError, EstimatorResult};
use crate::response::Response;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StratumWeight {
    pub proportion: f64,
    pub sample_size: usize,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightTable {
    pub stratify_by: String,
    /// Respondents in weighted strata
    pub sample_size: usize,
    pub strata: BTreeMap<String, StratumWeight>,
    /// Respondents with no stratum or a stratum without a proportion
    pub unweighted: usize,
}

impl WeightTable {
    /// Builds weights from per-stratum counts. `subject` names the field
    /// reported when a stratum with population mass has no respondents.
    pub fn from_counts(
        strata: &Strata,
        counts: &BTreeMap<String, usize>,
        unweighted: usize,
        subject: &str,
    ) -> EstimatorResult<Self> {
        let total: usize = strata
            .proportions
            .keys()
            .filter_map(|s| counts.get(s))
            .sum();
        if total == 0 {
            return Err(EstimatorError::insufficient(subject, None));
        }

        let mut table = BTreeMap::new();
        for (stratum, &proportion) in &strata.proportions {
            let n = counts.get(stratum).copied().unwrap_or(0);
            if n == 0 {
                if proportion > 0.0 {
                    return Err(EstimatorError::insufficient(subject, Some(stratum)));
                }
                continue;
            }
            let sample_fraction = n as f64 / total as f64;
            table.insert(
                stratum.clone(),
                StratumWeight {
                    proportion,
                    sample_size: n,
                    weight: proportion / sample_fraction,
                },
            );
        }

        Ok(Self {
            stratify_by: strata.field_id.clone(),
            sample_size: total,
            strata: table,
            unweighted,
        })
    }

    pub fn weight(&self, stratum: &str) -> Option<f64> {
        self.strata.get(stratum).map(|s| s.weight)
    }

    /// Checks that weights are finite and non-negative, that each
    /// stratum's weighted share equals its proportion and that the shares
    /// sum to 1, all within `tolerance`.
    pub fn check(&self, tolerance: f64) -> EstimatorResult<()> {
        let n = self.sample_size as f64;
        let mut total = 0.0;
        for (stratum, s) in &self.strata {
            if !s.weight.is_finite() || s.weight < 0.0 {
                return Err(EstimatorError::InvalidWeights {
                    reason: format!("stratum '{}' has weight {}", stratum, s.weight),
                });
            }
            let share = s.weight * s.sample_size as f64 / n;
            if (share - s.proportion).abs() > tolerance {
                return Err(EstimatorError::InvalidWeights {
                    reason: format!(
                        "stratum '{}' weighs {} against proportion {}",
                        stratum, share, s.proportion
                    ),
                });
            }
            total += share;
        }
        if (total - 1.0).abs() > tolerance {
            return Err(EstimatorError::InvalidWeights {
                reason: format!("weighted shares sum to {}", total),
            });
        }
        Ok(())
    }

    /// One weight per weighted respondent, strata in key order
    pub fn respondent_weights(&self) -> Vec<f64> {
        self.strata
            .values()
            .flat_map(|s| std::iter::repeat(s.weight).take(s.sample_size))
            .collect()
    }

    pub fn summary(&self) -> Option<WeightSummary> {
        WeightSummary::from_weights(&self.respondent_weights())
    }
}

/// Weights every respondent by the stratum it reports
pub fn post_stratification_weights(
    responses: &[&Response],
    strata: &Strata,
) -> EstimatorResult<WeightTable> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut unweighted = 0;
    let mut reported = false;

    for response in responses {
        let answer = response.answer(&strata.field_id);
        reported |= answer.is_some_and(|v| !v.is_null());
        match category(answer).filter(|s| strata.proportions.contains_key(s)) {
            Some(stratum) => *counts.entry(stratum).or_default() += 1,
            None => unweighted += 1,
        }
    }

    if !responses.is_empty() && !reported {
        return Err(EstimatorError::invalid_design(format!(
            "stratify field '{}' is absent from every response",
            strata.field_id
        )));
    }

    WeightTable::from_counts(strata, &counts, unweighted, &strata.field_id)
}

/// Kish effective sample size, `(Σw)² / Σw²`
pub fn kish_effective_size(weights: &[f64]) -> f64 {
    let sum: f64 = weights.iter().sum();
    let sum_sq: f64 = weights.iter().map(|w| w * w).sum();
    if sum_sq == 0.0 {
        return 0.0;
    }
    sum * sum / sum_sq
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightSummary {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    /// Coefficient of variation, population standard deviation over mean
    pub cv: f64,
}

impl WeightSummary {
    pub fn from_weights(weights: &[f64]) -> Option<Self> {
        if weights.is_empty() {
            return None;
        }
        let n = weights.len() as f64;
        let mean = weights.iter().sum::<f64>() / n;
        let variance = weights.iter().map(|w| (w - mean) * (w - mean)).sum::<f64>() / n;
        let min = weights.iter().copied().fold(f64::INFINITY, f64::min);
        let max = weights.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let cv = if mean != 0.0 { variance.sqrt() / mean } else { 0.0 };
        Some(Self { mean, min, max, cv })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::ResponseData;
    use serde_json::json;

    fn strata(pairs: &[(&str, f64)]) -> Strata {
        Strata {
            field_id: "region".into(),
            proportions: pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        }
    }

    fn responses(regions: &[Option<&str>]) -> Vec<Response> {
        regions
            .iter()
            .enumerate()
            .map(|(i, region)| {
                let mut data = ResponseData::new();
                if let Some(region) = region {
                    data.insert("region".into(), json!(region));
                }
                Response::new(format!("r{}", i), "pulse", data)
            })
            .collect()
    }

    #[test]
    fn test_weighted_shares_sum_to_one() {
        let set = responses(&[Some("north"), Some("north"), Some("north"), Some("south")]);
        let refs: Vec<&Response> = set.iter().collect();
        let table =
            post_stratification_weights(&refs, &strata(&[("north", 0.5), ("south", 0.5)])).unwrap();

        assert_eq!(table.sample_size, 4);
        assert!((table.weight("north").unwrap() - 0.5 / 0.75).abs() < 1e-12);
        assert!((table.weight("south").unwrap() - 2.0).abs() < 1e-12);
        table.check(1e-6).unwrap();

        let total: f64 = table
            .strata
            .values()
            .map(|s| s.weight * s.sample_size as f64 / table.sample_size as f64)
            .sum();
        assert!((total - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_unknown_strata_are_unweighted() {
        let set = responses(&[Some("north"), Some("east"), None]);
        let refs: Vec<&Response> = set.iter().collect();
        let table = post_stratification_weights(&refs, &strata(&[("north", 1.0)])).unwrap();
        assert_eq!(table.unweighted, 2);
        assert_eq!(table.sample_size, 1);
    }

    #[test]
    fn test_empty_stratum_with_mass_fails() {
        let set = responses(&[Some("north")]);
        let refs: Vec<&Response> = set.iter().collect();
        let err = post_stratification_weights(&refs, &strata(&[("north", 0.5), ("south", 0.5)]))
            .unwrap_err();
        assert_eq!(err, EstimatorError::insufficient("region", Some("south")));
    }

    #[test]
    fn test_absent_stratify_field_is_invalid_design() {
        let set = responses(&[None, None]);
        let refs: Vec<&Response> = set.iter().collect();
        let err = post_stratification_weights(&refs, &strata(&[("north", 1.0)])).unwrap_err();
        assert_eq!(err.code(), "ESTIMATE_INVALID_DESIGN");
    }

    #[test]
    fn test_check_catches_tampered_weight() {
        let set = responses(&[Some("north"), Some("south")]);
        let refs: Vec<&Response> = set.iter().collect();
        let mut table =
            post_stratification_weights(&refs, &strata(&[("north", 0.5), ("south", 0.5)])).unwrap();
        if let Some(s) = table.strata.get_mut("north") {
            s.weight = 3.0;
        }
        assert!(matches!(table.check(1e-6), Err(EstimatorError::InvalidWeights { .. })));
    }

    #[test]
    fn test_kish_and_summary() {
        assert_eq!(kish_effective_size(&[]), 0.0);
        assert!((kish_effective_size(&[1.0, 1.0, 1.0]) - 3.0).abs() < 1e-12);
        assert!(kish_effective_size(&[1.0, 3.0]) < 2.0);

        let summary = WeightSummary::from_weights(&[1.0, 3.0]).unwrap();
        assert_eq!(summary.mean, 2.0);
        assert_eq!(summary.min, 1.0);
        assert_eq!(summary.max, 3.0);
        assert!((summary.cv - 0.5).abs() < 1e-12);
        assert!(WeightSummary::from_weights(&[]).is_none());
    }
}
