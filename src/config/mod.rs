//! Configuration loading and validation.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Merge defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Telemetry fields decoded when the CLI does not name any.
    #[serde(default = "default_fields")]
    pub fields: Vec<String>,

    /// Recording file extension searched for under the source folder.
    #[serde(default = "default_extension")]
    pub extension: String,
}

fn default_fields() -> Vec<String> {
    ["X", "Y", "velocity", "aim_punch_angle", "duck_amount", "is_airborne"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_extension() -> String {
    "json".to_string()
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            fields: default_fields(),
            extension: default_extension(),
        }
    }
}

/// Similarity scoring knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityConfig {
    /// Bin count for per-signal density histograms.
    #[serde(default = "default_bins")]
    pub bins: usize,

    /// Heatmap resolution per axis.
    #[serde(default = "default_heatmap_bins")]
    pub heatmap_bins: usize,

    /// Heatmap weight in the full-feature score.
    #[serde(default = "default_heatmap_weight")]
    pub heatmap_weight: f64,

    /// Default metric: "js", "wasserstein" or "full".
    #[serde(default = "default_metric")]
    pub metric: String,

    /// Velocity threshold separating standing from moving.
    #[serde(default = "default_standing_speed")]
    pub standing_speed_threshold: f64,
}

fn default_bins() -> usize {
    50
}

fn default_heatmap_bins() -> usize {
    50
}

fn default_heatmap_weight() -> f64 {
    0.8
}

fn default_metric() -> String {
    "js".to_string()
}

fn default_standing_speed() -> f64 {
    5.0
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            bins: default_bins(),
            heatmap_bins: default_heatmap_bins(),
            heatmap_weight: default_heatmap_weight(),
            metric: default_metric(),
            standing_speed_threshold: default_standing_speed(),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Players of interest for evaluate mode. An explicit configuration
    /// value, not a hardcoded roster.
    #[serde(default)]
    pub roster: Vec<String>,

    #[serde(default)]
    pub merge: MergeConfig,

    #[serde(default)]
    pub similarity: SimilarityConfig,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./cache")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            log_level: default_log_level(),
            roster: Vec::new(),
            merge: MergeConfig::default(),
            similarity: SimilarityConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.similarity.bins == 0 {
            return Err(ConfigError::ValidationError(
                "similarity.bins must be greater than 0".to_string(),
            ));
        }

        if self.similarity.heatmap_bins == 0 {
            return Err(ConfigError::ValidationError(
                "similarity.heatmap_bins must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.similarity.heatmap_weight) {
            return Err(ConfigError::ValidationError(
                "similarity.heatmap_weight must be within [0, 1]".to_string(),
            ));
        }

        if self.similarity.metric.parse::<crate::calculate::similarity::Metric>().is_err() {
            return Err(ConfigError::ValidationError(format!(
                "similarity.metric {:?} is not one of js, wasserstein, full",
                self.similarity.metric
            )));
        }

        if self.merge.fields.is_empty() {
            return Err(ConfigError::ValidationError(
                "merge.fields must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.cache_dir, PathBuf::from("./cache"));
        assert_eq!(config.log_level, "info");
        assert_eq!(config.similarity.bins, 50);
        assert_eq!(config.similarity.heatmap_weight, 0.8);
        assert!(config.roster.is_empty());
        assert!(config.merge.fields.contains(&"aim_punch_angle".to_string()));
    }

    #[test]
    fn test_config_validation_ok() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_bad_bins() {
        let mut config = AppConfig::default();
        config.similarity.bins = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_bad_weight() {
        let mut config = AppConfig::default();
        config.similarity.heatmap_weight = 1.5;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_bad_metric() {
        let mut config = AppConfig::default();
        config.similarity.metric = "euclidean".to_string();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string(&config).unwrap();

        // Should be parseable
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.cache_dir, parsed.cache_dir);
        assert_eq!(config.similarity.metric, parsed.similarity.metric);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: AppConfig = toml::from_str(
            r#"
            roster = ["ZywOo", "ropz"]

            [similarity]
            bins = 30
            "#,
        )
        .unwrap();
        assert_eq!(parsed.roster.len(), 2);
        assert_eq!(parsed.similarity.bins, 30);
        assert_eq!(parsed.similarity.heatmap_bins, 50);
        assert_eq!(parsed.cache_dir, PathBuf::from("./cache"));
    }
}
