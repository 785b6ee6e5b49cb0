//! Sampling designs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::errors::{EstimatorError, EstimatorResult};
use crate::schema::{FieldRef, Survey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplingMethod {
    /// Simple random sample, equal weights
    #[default]
    None,
    /// Post-stratified to known population proportions
    Stratified,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplingDesign {
    #[serde(default)]
    pub method: SamplingMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stratify_by: Option<FieldRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub population_proportions: Option<BTreeMap<String, f64>>,
}

/// Checked stratification of one survey
#[derive(Debug, Clone, PartialEq)]
pub struct Strata {
    pub field_id: String,
    /// Rescaled to sum to exactly 1
    pub proportions: BTreeMap<String, f64>,
}

impl SamplingDesign {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn stratified(stratify_by: FieldRef, proportions: BTreeMap<String, f64>) -> Self {
        Self {
            method: SamplingMethod::Stratified,
            stratify_by: Some(stratify_by),
            population_proportions: Some(proportions),
        }
    }

    /// Validates the design against a survey. `None` for an unstratified
    /// design; proportions must sum to 1 within `tolerance`.
    pub fn strata(&self, survey: &Survey, tolerance: f64) -> EstimatorResult<Option<Strata>> {
        if self.method == SamplingMethod::None {
            return Ok(None);
        }

        let field = self
            .stratify_by
            .as_ref()
            .ok_or_else(|| EstimatorError::invalid_design("stratified design needs stratifyBy"))?;
        if field.survey_id != survey.survey_id || survey.field(&field.field_id).is_none() {
            return Err(EstimatorError::invalid_design(format!(
                "stratify field '{}' is not declared by survey '{}'",
                field, survey.survey_id
            )));
        }

        let proportions = match &self.population_proportions {
            Some(p) if !p.is_empty() => p,
            _ => {
                return Err(EstimatorError::invalid_design(
                    "stratified design needs populationProportions",
                ))
            }
        };
        for (stratum, &p) in proportions {
            if !p.is_finite() || p < 0.0 {
                return Err(EstimatorError::invalid_design(format!(
                    "proportion for stratum '{}' must be finite and non-negative, got {}",
                    stratum, p
                )));
            }
        }
        let sum: f64 = proportions.values().sum();
        if (sum - 1.0).abs() > tolerance {
            return Err(EstimatorError::invalid_design(format!(
                "population proportions sum to {}, expected 1 within {}",
                sum, tolerance
            )));
        }

        Ok(Some(Strata {
            field_id: field.field_id.clone(),
            proportions: proportions
                .iter()
                .map(|(stratum, p)| (stratum.clone(), p / sum))
                .collect(),
        }))
    }
}
