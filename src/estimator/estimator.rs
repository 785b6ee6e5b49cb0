//! Design-based estimates of a survey field
//!
//! Unstratified: arithmetic mean, SE = s / √n.
//!
//! Stratified, per stratum `s` with population proportion `P_s`:
//! - mean = Σ P_s·m_s / Σ P_s
//! - variance = Σ P_s²·s²_s / n_s
//! - design effect = variance / (s² / N), 1 when the SRS variance is 0
//! - effective n = N / design effect
//!
//! A stratum with one respondent contributes zero within-stratum variance.

use std::collections::BTreeMap;

use serde::Serialize;

use super::coercion::{category, coerce, Coerced};
use super::design::{SamplingDesign, Strata};
use super::errors::{EstimatorError, EstimatorResult};
use super::stats::{mean, sample_variance, z_score};
use super::weights::{kish_effective_size, post_stratification_weights, WeightTable};
use crate::config::CoreConfig;
use crate::observability::{log_event_with_fields, Event};
use crate::response::Response;
use crate::schema::{Field, Survey};

pub const DEFAULT_CONFIDENCE_LEVEL: f64 = 0.95;
pub const DEFAULT_PROPORTION_TOLERANCE: f64 = 1e-3;
pub const DEFAULT_WEIGHT_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimationResult {
    pub mean: f64,
    /// `[low, high]`
    pub confidence_interval: (f64, f64),
    pub standard_error: f64,
    pub sample_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_sample_size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub design_effect: Option<f64>,
    pub confidence_level: f64,
    /// Answers that could not be used, plus respondents outside every
    /// weighted stratum
    pub excluded: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryEstimate {
    pub proportion: f64,
    pub weighted_count: f64,
    pub standard_error: f64,
    /// Clamped to `[0, 1]`
    pub confidence_interval: (f64, f64),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProportionEstimate {
    pub categories: BTreeMap<String, CategoryEstimate>,
    pub sample_size: usize,
    pub effective_sample_size: f64,
    pub confidence_level: f64,
    pub excluded: usize,
}

/// Estimates field statistics for one survey
#[derive(Debug, Clone)]
pub struct Estimator<'a> {
    survey: &'a Survey,
    confidence_level: f64,
    proportion_tolerance: f64,
    weight_tolerance: f64,
}

/// Estimate with default settings
pub fn estimate(
    responses: &[Response],
    survey: &Survey,
    target: &str,
    design: &SamplingDesign,
) -> EstimatorResult<EstimationResult> {
    Estimator::new(survey).estimate(responses, target, design)
}

impl<'a> Estimator<'a> {
    pub fn new(survey: &'a Survey) -> Self {
        Self {
            survey,
            confidence_level: DEFAULT_CONFIDENCE_LEVEL,
            proportion_tolerance: DEFAULT_PROPORTION_TOLERANCE,
            weight_tolerance: DEFAULT_WEIGHT_TOLERANCE,
        }
    }

    pub fn from_config(survey: &'a Survey, config: &CoreConfig) -> Self {
        Self {
            survey,
            confidence_level: config.confidence_level,
            proportion_tolerance: config.proportion_tolerance,
            weight_tolerance: config.weight_tolerance,
        }
    }

    /// Checked when estimating: levels outside (0, 1) fail there
    pub fn with_confidence_level(mut self, level: f64) -> Self {
        self.confidence_level = level;
        self
    }

    pub fn with_tolerances(mut self, proportion: f64, weight: f64) -> Self {
        self.proportion_tolerance = proportion;
        self.weight_tolerance = weight;
        self
    }

    pub fn estimate(
        &self,
        responses: &[Response],
        target: &str,
        design: &SamplingDesign,
    ) -> EstimatorResult<EstimationResult> {
        self.check_level()?;
        let refs: Vec<&Response> = responses.iter().collect();
        let field = self.field(target)?;
        let strata = design.strata(self.survey, self.proportion_tolerance)?;
        self.estimate_refs(&refs, field, strata.as_ref())
    }

    /// One estimate per value of `group_by`, keys sorted. Respondents
    /// without a group value are left out. Under a stratified design the
    /// weights come from the whole sample and each group is estimated as
    /// a domain of it, so a group need not cover every stratum.
    pub fn estimate_by_group(
        &self,
        responses: &[Response],
        target: &str,
        group_by: &str,
        design: &SamplingDesign,
    ) -> EstimatorResult<BTreeMap<String, EstimationResult>> {
        self.check_level()?;
        let field = self.field(target)?;
        let group = self.field(group_by)?;
        let strata = design.strata(self.survey, self.proportion_tolerance)?;

        if let Some(strata) = strata {
            return self.stratified_by_group(responses, field, group, &strata);
        }

        let mut groups: BTreeMap<String, Vec<&Response>> = BTreeMap::new();
        for response in responses {
            if let Some(key) = category(response.answer(&group.id)) {
                groups.entry(key).or_default().push(response);
            }
        }

        let mut results = BTreeMap::new();
        for (key, members) in groups {
            let result = self.simple(&members, field)?;
            results.insert(key, result);
        }
        Ok(results)
    }

    /// Weighted share of each answer category. Checkbox answers count
    /// once per selected option, so their shares need not sum to 1.
    pub fn estimate_proportions(
        &self,
        responses: &[Response],
        target: &str,
        design: &SamplingDesign,
    ) -> EstimatorResult<ProportionEstimate> {
        self.check_level()?;
        let field = self.field(target)?;
        let strata = design.strata(self.survey, self.proportion_tolerance)?;

        let mut excluded = 0;
        let mut answered: Vec<(&Response, Vec<String>)> = Vec::new();
        for response in responses {
            let categories: Vec<String> = match response.answer(&field.id) {
                None | Some(serde_json::Value::Null) => continue,
                Some(serde_json::Value::Array(items)) => {
                    items.iter().filter_map(|v| category(Some(v))).collect()
                }
                other => category(other).into_iter().collect(),
            };
            if categories.is_empty() {
                excluded += 1;
                continue;
            }
            answered.push((response, categories));
        }

        let (weighted, unweighted) = match &strata {
            None => (
                answered.into_iter().map(|(_, c)| (1.0, c)).collect::<Vec<_>>(),
                0,
            ),
            Some(strata) => {
                let members: Vec<&Response> = answered.iter().map(|(r, _)| *r).collect();
                let table = self.weights_for(&members, strata, &field.id)?;
                let mut out = Vec::with_capacity(answered.len());
                for (response, categories) in answered {
                    let weight = category(response.answer(&strata.field_id))
                        .and_then(|s| table.weight(&s));
                    if let Some(w) = weight {
                        out.push((w, categories));
                    }
                }
                (out, table.unweighted)
            }
        };
        excluded += unweighted;
        self.log_excluded(&field.id, excluded);

        if weighted.is_empty() {
            return Err(EstimatorError::insufficient(&field.id, None));
        }

        let weights: Vec<f64> = weighted.iter().map(|(w, _)| *w).collect();
        let total: f64 = weights.iter().sum();
        let n_eff = kish_effective_size(&weights);
        let z = z_score(self.confidence_level);

        let mut sums: BTreeMap<String, f64> = BTreeMap::new();
        for (w, categories) in &weighted {
            for c in categories {
                *sums.entry(c.clone()).or_default() += w;
            }
        }

        let categories = sums
            .into_iter()
            .map(|(key, weighted_count)| {
                let p = if total > 0.0 { weighted_count / total } else { 0.0 };
                let se = if n_eff > 0.0 {
                    (p * (1.0 - p) / n_eff).max(0.0).sqrt()
                } else {
                    0.0
                };
                let margin = z * se;
                let estimate = CategoryEstimate {
                    proportion: p,
                    weighted_count,
                    standard_error: se,
                    confidence_interval: ((p - margin).max(0.0), (p + margin).min(1.0)),
                };
                (key, estimate)
            })
            .collect();

        Ok(ProportionEstimate {
            categories,
            sample_size: weighted.len(),
            effective_sample_size: n_eff,
            confidence_level: self.confidence_level,
            excluded,
        })
    }

    /// Post-stratification weights for the design, `None` when unstratified
    pub fn weights(
        &self,
        responses: &[Response],
        design: &SamplingDesign,
    ) -> EstimatorResult<Option<WeightTable>> {
        let Some(strata) = design.strata(self.survey, self.proportion_tolerance)? else {
            return Ok(None);
        };
        let refs: Vec<&Response> = responses.iter().collect();
        let table = post_stratification_weights(&refs, &strata)?;
        table.check(self.weight_tolerance)?;
        Ok(Some(table))
    }

    fn check_level(&self) -> EstimatorResult<()> {
        if self.confidence_level > 0.0 && self.confidence_level < 1.0 {
            Ok(())
        } else {
            Err(EstimatorError::InvalidConfidenceLevel {
                level: self.confidence_level,
            })
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

    fn weights_for(
        &self,
        responses: &[&Response],
        strata: &Strata,
        subject: &str,
    ) -> EstimatorResult<WeightTable> {
        let table = post_stratification_weights(responses, strata).map_err(|err| match err {
            EstimatorError::InsufficientData { stratum, .. } => EstimatorError::InsufficientData {
                field: subject.to_string(),
                stratum,
            },
            other => other,
        })?;
        table.check(self.weight_tolerance)?;
        Ok(table)
    }

    fn estimate_refs(
        &self,
        responses: &[&Response],
        field: &Field,
        strata: Option<&Strata>,
    ) -> EstimatorResult<EstimationResult> {
        match strata {
            None => self.simple(responses, field),
            Some(strata) => self.stratified(responses, field, strata),
        }
    }

    fn simple(&self, responses: &[&Response], field: &Field) -> EstimatorResult<EstimationResult> {
        let mut values = Vec::new();
        let mut excluded = 0;
        for response in responses {
            match coerce(field, response.answer(&field.id)) {
                Coerced::Value(v) => values.push(v),
                Coerced::Excluded => excluded += 1,
                Coerced::Missing => {}
            }
        }
        self.log_excluded(&field.id, excluded);

        let m = mean(&values).ok_or_else(|| EstimatorError::insufficient(&field.id, None))?;
        let n = values.len();
        let se = (sample_variance(&values) / n as f64).sqrt();
        Ok(self.result(m, se, n, None, None, excluded))
    }

    fn stratified(
        &self,
        responses: &[&Response],
        field: &Field,
        strata: &Strata,
    ) -> EstimatorResult<EstimationResult> {
        let mut excluded = 0;
        let mut usable: Vec<(&Response, f64)> = Vec::new();
        for response in responses {
            match coerce(field, response.answer(&field.id)) {
                Coerced::Value(v) => usable.push((response, v)),
                Coerced::Excluded => excluded += 1,
                Coerced::Missing => {}
            }
        }

        let members: Vec<&Response> = usable.iter().map(|(r, _)| *r).collect();
        let table = self.weights_for(&members, strata, &field.id)?;
        excluded += table.unweighted;
        self.log_excluded(&field.id, excluded);

        let mut by_stratum: BTreeMap<String, Vec<(f64, bool)>> = BTreeMap::new();
        for (response, value) in &usable {
            if let Some(stratum) = weighted_stratum(response, strata, &table) {
                by_stratum.entry(stratum).or_default().push((*value, true));
            }
        }
        self.domain(&field.id, &by_stratum, &table, excluded)
    }

    fn stratified_by_group(
        &self,
        responses: &[Response],
        field: &Field,
        group: &Field,
        strata: &Strata,
    ) -> EstimatorResult<BTreeMap<String, EstimationResult>> {
        let mut excluded_total = 0;
        let mut excluded: BTreeMap<String, usize> = BTreeMap::new();
        let mut usable: Vec<(&Response, f64, Option<String>)> = Vec::new();
        for response in responses {
            let key = category(response.answer(&group.id));
            match coerce(field, response.answer(&field.id)) {
                Coerced::Value(v) => {
                    if let Some(key) = &key {
                        excluded.entry(key.clone()).or_default();
                    }
                    usable.push((response, v, key));
                }
                Coerced::Excluded => {
                    excluded_total += 1;
                    if let Some(key) = key {
                        *excluded.entry(key).or_default() += 1;
                    }
                }
                Coerced::Missing => {}
            }
        }

        let members: Vec<&Response> = usable.iter().map(|(r, _, _)| *r).collect();
        let table = self.weights_for(&members, strata, &field.id)?;
        excluded_total += table.unweighted;
        self.log_excluded(&field.id, excluded_total);

        let mut weighted: Vec<(String, f64, Option<String>)> = Vec::with_capacity(usable.len());
        for (response, value, key) in usable {
            match weighted_stratum(response, strata, &table) {
                Some(stratum) => weighted.push((stratum, value, key)),
                None => {
                    if let Some(key) = key {
                        *excluded.entry(key).or_default() += 1;
                    }
                }
            }
        }

        let mut results = BTreeMap::new();
        for (key, skipped) in excluded {
            let mut by_stratum: BTreeMap<String, Vec<(f64, bool)>> = BTreeMap::new();
            for (stratum, value, member) in &weighted {
                let inside = member.as_deref() == Some(key.as_str());
                by_stratum.entry(stratum.clone()).or_default().push((*value, inside));
            }
            let result = self.domain(&field.id, &by_stratum, &table, skipped)?;
            results.insert(key, result);
        }
        Ok(results)
    }

    /// Ratio estimate of the mean over the flagged values of a stratified
    /// sample. Unflagged values still count toward their stratum's size.
    ///
    /// - mean = Σ P_s·ȳ_s / Σ P_s·z̄_s, where `z` flags domain members
    /// - variance = Σ P_s²·s²_s(u) / n_s with u = z·(x − mean) / share
    ///
    /// For the whole sample both reduce to the plain stratified formulas.
    fn domain(
        &self,
        field_id: &str,
        by_stratum: &BTreeMap<String, Vec<(f64, bool)>>,
        table: &WeightTable,
        excluded: usize,
    ) -> EstimatorResult<EstimationResult> {
        let mut mass = 0.0;
        let mut total = 0.0;
        let mut share = 0.0;
        for (stratum, members) in by_stratum {
            let p = table.strata[stratum].proportion;
            let n_s = members.len() as f64;
            let inside = members.iter().filter(|(_, z)| *z);
            mass += p;
            total += p * inside.clone().map(|(x, _)| x).sum::<f64>() / n_s;
            share += p * inside.count() as f64 / n_s;
        }
        if mass <= 0.0 || share <= 0.0 {
            return Err(EstimatorError::insufficient(field_id, None));
        }
        let estimate = total / share;
        let share = share / mass;

        let mut variance = 0.0;
        let mut values = Vec::new();
        for (stratum, members) in by_stratum {
            let p = table.strata[stratum].proportion;
            let linearized: Vec<f64> = members
                .iter()
                .map(|(x, z)| if *z { (x - estimate) / share } else { 0.0 })
                .collect();
            variance += p * p * sample_variance(&linearized) / members.len() as f64;
            values.extend(members.iter().filter(|(_, z)| *z).map(|(x, _)| *x));
        }

        let n = values.len();
        let srs_variance = sample_variance(&values) / n as f64;
        let design_effect = if srs_variance > 0.0 {
            variance / srs_variance
        } else {
            1.0
        };
        let effective = if design_effect > 0.0 {
            n as f64 / design_effect
        } else {
            n as f64
        };

        Ok(self.result(
            estimate,
            variance.max(0.0).sqrt(),
            n,
            Some(effective),
            Some(design_effect),
            excluded,
        ))
    }

    fn result(
        &self,
        mean: f64,
        standard_error: f64,
        sample_size: usize,
        effective_sample_size: Option<f64>,
        design_effect: Option<f64>,
        excluded: usize,
    ) -> EstimationResult {
        let margin = z_score(self.confidence_level) * standard_error;
        EstimationResult {
            mean,
            confidence_interval: (mean - margin, mean + margin),
            standard_error,
            sample_size,
            effective_sample_size,
            design_effect,
            confidence_level: self.confidence_level,
            excluded,
        }
    }

    fn log_excluded(&self, field_id: &str, excluded: usize) {
        if excluded > 0 {
            log_event_with_fields(
                Event::ValuesExcluded,
                &[
                    ("survey_id", self.survey.survey_id.as_str()),
                    ("field", field_id),
                    ("excluded", &excluded.to_string()),
                ],
            );
        }
    }
}

/// Stratum of a respondent when it carries a weight
fn weighted_stratum(response: &Response, strata: &Strata, table: &WeightTable) -> Option<String> {
    category(response.answer(&strata.field_id)).filter(|s| table.strata.contains_key(s))
}
