//! Core configuration
//!
//! Loaded from a JSON file. Every key is optional; missing keys take the
//! defaults below. A loaded configuration is always validated.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::observability::Severity;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Tunables for parsing, planning and estimation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CoreConfig {
    /// Minimum fuzzy score for a field to be picked
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f64,

    /// Intents below this confidence are flagged low-confidence
    #[serde(default = "default_low_confidence_threshold")]
    pub low_confidence_threshold: f64,

    /// Two-sided confidence level for intervals
    #[serde(default = "default_confidence_level")]
    pub confidence_level: f64,

    /// Allowed deviation of population proportions from a sum of 1
    #[serde(default = "default_proportion_tolerance")]
    pub proportion_tolerance: f64,

    /// Allowed deviation when checking per-stratum weight sums
    #[serde(default = "default_weight_tolerance")]
    pub weight_tolerance: f64,

    /// Largest row limit a plan may request
    #[serde(default = "default_max_limit")]
    pub max_limit: u64,

    #[serde(default = "default_log_level")]
    pub log_level: Severity,
}

fn default_match_threshold() -> f64 {
    0.6
}
fn default_low_confidence_threshold() -> f64 {
    0.6
}
fn default_confidence_level() -> f64 {
    0.95
}
fn default_proportion_tolerance() -> f64 {
    1e-3
}
fn default_weight_tolerance() -> f64 {
    1e-6
}
fn default_max_limit() -> u64 {
    1000
}
fn default_log_level() -> Severity {
    Severity::Info
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            match_threshold: default_match_threshold(),
            low_confidence_threshold: default_low_confidence_threshold(),
            confidence_level: default_confidence_level(),
            proportion_tolerance: default_proportion_tolerance(),
            weight_tolerance: default_weight_tolerance(),
            max_limit: default_max_limit(),
            log_level: default_log_level(),
        }
    }
}

impl CoreConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let config: CoreConfig = serde_json::from_str(&content)?;
        config.validate()?;

        Ok(config)
    }

    /// Validate ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        unit_interval("match_threshold", self.match_threshold)?;
        unit_interval("low_confidence_threshold", self.low_confidence_threshold)?;

        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(ConfigError::Invalid {
                key: "confidence_level",
                reason: format!("{} is not in (0, 1)", self.confidence_level),
            });
        }

        for (key, value) in [
            ("proportion_tolerance", self.proportion_tolerance),
            ("weight_tolerance", self.weight_tolerance),
        ] {
            if !(value.is_finite() && value > 0.0 && value < 1.0) {
                return Err(ConfigError::Invalid {
                    key,
                    reason: format!("{} is not in (0, 1)", value),
                });
            }
        }

        if self.max_limit == 0 {
            return Err(ConfigError::Invalid {
                key: "max_limit",
                reason: "must be > 0".to_string(),
            });
        }

        Ok(())
    }
}

fn unit_interval(key: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            key,
            reason: format!("{} is not in [0, 1]", value),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = CoreConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.match_threshold, 0.6);
        assert_eq!(config.confidence_level, 0.95);
        assert_eq!(config.max_limit, 1000);
    }

    #[test]
    fn test_partial_file_takes_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, json!({"confidence_level": 0.99, "log_level": "warn"}).to_string())
            .unwrap();

        let config = CoreConfig::load(&path).unwrap();
        assert_eq!(config.confidence_level, 0.99);
        assert_eq!(config.log_level, Severity::Warn);
        assert_eq!(config.low_confidence_threshold, 0.6);
    }

    #[test]
    fn test_out_of_range_rejected() {
        let config = CoreConfig {
            confidence_level: 1.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { key: "confidence_level", .. })
        ));

        let config = CoreConfig {
            max_limit: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_key_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, json!({"match_treshold": 0.5}).to_string()).unwrap();
        assert!(matches!(CoreConfig::load(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            CoreConfig::load(&dir.path().join("absent.json")),
            Err(ConfigError::Read { .. })
        ));
    }
}
