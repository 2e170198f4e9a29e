//! Configuration management for the fraud scorer and the training job

use crate::training::TrainingConfig;
use crate::types::alert::RiskThresholds;
use anyhow::{Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::path::Path;

/// Environment variable that overrides the configuration file path
pub const CONFIG_PATH_ENV: &str = "FUEL_FRAUD_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub models: ModelsConfig,
    pub detection: DetectionConfig,
    pub training: TrainingConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// Model artifact configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// JSON artifact written by `train_model`
    pub artifact_path: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            artifact_path: "model/fraud_model.json".to_string(),
        }
    }
}

/// Detection configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Amount difference (currency units) above which a rule verdict is high risk
    pub high_risk_difference: f64,
    /// Amount difference above which a rule verdict is medium risk
    pub medium_risk_difference: f64,
    /// Deviation percentage above which explanations cite the charge
    pub explain_deviation_pct: f64,
    /// Station local time offset from UTC, used for hour and weekday
    pub station_utc_offset_minutes: i32,
}

impl DetectionConfig {
    pub fn risk_thresholds(&self) -> RiskThresholds {
        RiskThresholds {
            medium: self.medium_risk_difference,
            high: self.high_risk_difference,
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            high_risk_difference: 10.0,
            medium_risk_difference: 5.0,
            explain_deviation_pct: 20.0,
            station_utc_offset_minutes: 0,
        }
    }
}

/// Batch pipeline configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum transactions scored concurrently
    pub workers: usize,
    /// Seconds between metrics summaries
    pub report_interval_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            report_interval_secs: 30,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `FUEL_FRAUD_CONFIG` or `config/config.toml`
    pub fn load() -> Result<Self> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from_path(path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let config = Config::builder()
            .add_source(File::from(path))
            .build()
            .with_context(|| format!("Failed to build configuration from {}", path.display()))?;

        let config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let d = &self.detection;
        if !(d.medium_risk_difference >= 0.0
            && d.high_risk_difference >= d.medium_risk_difference)
        {
            anyhow::bail!(
                "detection thresholds must satisfy 0 <= medium ({}) <= high ({})",
                d.medium_risk_difference,
                d.high_risk_difference
            );
        }
        if self.pipeline.workers == 0 {
            anyhow::bail!("pipeline.workers must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.models.artifact_path, "model/fraud_model.json");
        assert_eq!(config.detection.high_risk_difference, 10.0);
        assert_eq!(config.detection.medium_risk_difference, 5.0);
        assert_eq!(config.training.samples, 3000);
        assert_eq!(config.training.seed, 42);
        assert_eq!(config.training.contamination_grid, vec![0.10, 0.15, 0.20, 0.25]);
        assert_eq!(config.pipeline.workers, 4);
        assert!(!config.logging.is_json());
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[detection]\nhigh_risk_difference = 20.0\nstation_utc_offset_minutes = 120\n\n[logging]\nformat = \"json\""
        )
        .unwrap();

        let config = AppConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.detection.high_risk_difference, 20.0);
        assert_eq!(config.detection.medium_risk_difference, 5.0);
        assert_eq!(config.detection.station_utc_offset_minutes, 120);
        assert!(config.logging.is_json());
        assert_eq!(config.models.artifact_path, "model/fraud_model.json");
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[detection]\nhigh_risk_difference = 2.0\nmedium_risk_difference = 5.0"
        )
        .unwrap();

        assert!(AppConfig::load_from_path(file.path()).is_err());
    }

    #[test]
    fn test_shipped_config_matches_defaults() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/config.toml");
        let config = AppConfig::load_from_path(path).unwrap();
        let defaults = AppConfig::default();

        assert_eq!(config.models.artifact_path, defaults.models.artifact_path);
        assert_eq!(config.detection.risk_thresholds(), defaults.detection.risk_thresholds());
        assert_eq!(config.training.contamination_grid, defaults.training.contamination_grid);
    }
}
