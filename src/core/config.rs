use crate::core::optimizer::OptimizerConfig;
use crate::core::price::DateRange;
use crate::core::stats::SAMPLES_PER_YEAR;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding one `<SYMBOL>.csv` file per instrument.
    pub data_path: String,
    pub benchmark: String,
    pub symbols: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub start_capital: f64,
    /// Daily risk-free rate subtracted from the mean return.
    pub risk_free_rate: f64,
    pub samples_per_year: u32,
    pub optimizer: OptimizerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            data_path: "data".to_string(),
            benchmark: "SPY".to_string(),
            symbols: ["AAPL", "MSFT", "YHOO", "GOOG"]
                .into_iter()
                .map(String::from)
                .collect(),
            start_date: NaiveDate::from_ymd_opt(2010, 2, 1).unwrap_or_default(),
            end_date: NaiveDate::from_ymd_opt(2012, 2, 1).unwrap_or_default(),
            start_capital: 1.0,
            risk_free_rate: 0.0,
            samples_per_year: SAMPLES_PER_YEAR,
            optimizer: OptimizerConfig::default(),
        }
    }
}

impl AppConfig {
    /// Loads the config from the default location, falling back to the
    /// built-in defaults when no file exists there.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!(
                "No config at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("dev", "optfolio", "optfolio")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        config.optimizer_config().validate().with_context(|| {
            format!("Invalid optimizer settings in: {}", path.as_ref().display())
        })?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_path)
    }

    pub fn date_range(&self) -> Result<DateRange> {
        DateRange::new(self.start_date, self.end_date)
    }

    /// Solver settings combined with the statistics parameters of this config.
    pub fn optimizer_config(&self) -> OptimizerConfig {
        OptimizerConfig {
            daily_risk_free: self.risk_free_rate,
            samples_per_year: self.samples_per_year,
            ..self.optimizer
        }
    }
}
