//! Statistical estimation
//!
//! Point estimates, standard errors and confidence intervals for a survey
//! field, unstratified or post-stratified to known population
//! proportions, plus weighted significance tests between fields.
//!
//! # Invariants
//!
//! - Standard errors are finite and non-negative
//! - Stratified weights are finite and non-negative, and each stratum's
//!   weighted share equals its population proportion within tolerance
//! - Answers that do not coerce to a number are excluded and counted,
//!   never silently dropped

mod coercion;
mod design;
mod errors;
mod estimator;
mod significance;
mod stats;
mod weights;

pub use coercion::{coerce, Coerced};
pub use design::{SamplingDesign, SamplingMethod, Strata};
pub use errors::{EstimatorError, EstimatorResult};
pub use estimator::{
    estimate, CategoryEstimate, EstimationResult, Estimator, ProportionEstimate,
    DEFAULT_CONFIDENCE_LEVEL, DEFAULT_PROPORTION_TOLERANCE, DEFAULT_WEIGHT_TOLERANCE,
};
pub use significance::{
    ChiSquareResult, GroupSummary, SignificanceTest, TTestResult, DEFAULT_SIGNIFICANCE_LEVEL,
    MIN_CONTINGENCY_SIZE, MIN_GROUP_SIZE,
};
pub use stats::{chi_square_survival, inverse_normal_cdf, t_two_sided_p, z_score};
pub use weights::{
    kish_effective_size, post_stratification_weights, StratumWeight, WeightSummary, WeightTable,
};
