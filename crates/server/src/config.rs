//! Service configuration

use anyhow::{Context, Result};
use chrono::NaiveDate;
use demand_lib::model::ModelParams;
use demand_lib::training::{default_split_date, TrainingConfig};
use serde::Deserialize;
use std::path::PathBuf;

/// Base name of the optional configuration file (`bikedemand.toml`)
pub const CONFIG_FILE: &str = "bikedemand";

/// Prefix of configuration environment variables
pub const ENV_PREFIX: &str = "BIKEDEMAND";

/// Service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Name reported in structured log events
    #[serde(default = "default_instance_name")]
    pub instance_name: String,

    /// Port for the prediction API and health/metrics endpoints
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Canonical hourly dataset used for (re)training
    #[serde(default = "default_dataset_path")]
    pub dataset_path: PathBuf,

    /// Directory holding the five artifact files
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: PathBuf,

    /// First day of the held-out partition
    #[serde(default = "default_split_date")]
    pub split_date: NaiveDate,

    #[serde(default = "default_n_estimators")]
    pub n_estimators: usize,

    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    #[serde(default = "default_min_samples_split")]
    pub min_samples_split: usize,

    #[serde(default = "default_min_samples_leaf")]
    pub min_samples_leaf: usize,

    #[serde(default = "default_max_bins")]
    pub max_bins: usize,
}

fn default_instance_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "bike-demand".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_dataset_path() -> PathBuf {
    TrainingConfig::default().dataset_path
}

fn default_artifacts_dir() -> PathBuf {
    TrainingConfig::default().artifacts_dir
}

fn default_n_estimators() -> usize {
    ModelParams::default().n_estimators
}

fn default_max_depth() -> usize {
    ModelParams::default().max_depth
}

fn default_learning_rate() -> f64 {
    ModelParams::default().learning_rate
}

fn default_min_samples_split() -> usize {
    ModelParams::default().min_samples_split
}

fn default_min_samples_leaf() -> usize {
    ModelParams::default().min_samples_leaf
}

fn default_max_bins() -> usize {
    ModelParams::default().max_bins
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            instance_name: default_instance_name(),
            api_port: default_api_port(),
            dataset_path: default_dataset_path(),
            artifacts_dir: default_artifacts_dir(),
            split_date: default_split_date(),
            n_estimators: default_n_estimators(),
            max_depth: default_max_depth(),
            learning_rate: default_learning_rate(),
            min_samples_split: default_min_samples_split(),
            min_samples_leaf: default_min_samples_leaf(),
            max_bins: default_max_bins(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from `bikedemand.toml` (if present) and environment
    pub fn load() -> Result<Self> {
        Self::load_from(config::File::with_name(CONFIG_FILE).required(false))
    }

    /// Load with an explicit file source; environment variables still win
    pub fn load_from<S>(file: S) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let config = config::Config::builder()
            .add_source(file)
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()
            .context("Failed to read configuration sources")?;

        config
            .try_deserialize()
            .context("Invalid service configuration")
    }

    pub fn model_params(&self) -> ModelParams {
        ModelParams {
            n_estimators: self.n_estimators,
            max_depth: self.max_depth,
            learning_rate: self.learning_rate,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            max_bins: self.max_bins,
        }
    }

    pub fn training_config(&self) -> TrainingConfig {
        TrainingConfig {
            dataset_path: self.dataset_path.clone(),
            artifacts_dir: self.artifacts_dir.clone(),
            split_date: self.split_date,
            model: self.model_params(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_training_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.api_port, 8080);
        assert_eq!(config.training_config(), TrainingConfig::default());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "api_port = 9191\n\
             artifacts_dir = \"/var/lib/bikedemand\"\n\
             split_date = \"2012-01-01\"\n\
             n_estimators = 50"
        )
        .unwrap();

        let config = ServiceConfig::load_from(config::File::from(file.path())).unwrap();
        assert_eq!(config.api_port, 9191);
        assert_eq!(config.artifacts_dir, PathBuf::from("/var/lib/bikedemand"));
        assert_eq!(config.split_date, NaiveDate::from_ymd_opt(2012, 1, 1).unwrap());

        let params = config.model_params();
        assert_eq!(params.n_estimators, 50);
        assert_eq!(params.max_depth, 6);
    }

    #[test]
    fn test_invalid_date_is_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "split_date = \"July 2012\"").unwrap();
        assert!(ServiceConfig::load_from(config::File::from(file.path())).is_err());
    }
}
