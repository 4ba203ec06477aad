pub mod cli;
pub mod core;
pub mod providers;

pub use crate::core::config;

use crate::core::config::AppConfig;
use anyhow::Result;
use chrono::NaiveDate;
use providers::CsvPriceLoader;
use tracing::{debug, info};

pub enum AppCommand {
    /// Find the Sharpe-optimal allocation of the symbols
    Optimize { symbols: Vec<String> },
    /// Report statistics for a given allocation of the symbols
    Assess {
        symbols: Vec<String>,
        weights: Vec<f64>,
    },
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub data_path: Option<String>,
    pub benchmark: Option<String>,
}

impl ConfigOverrides {
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(start) = self.start_date {
            config.start_date = start;
        }
        if let Some(end) = self.end_date {
            config.end_date = end;
        }
        if let Some(path) = &self.data_path {
            config.data_path = path.clone();
        }
        if let Some(benchmark) = &self.benchmark {
            config.benchmark = benchmark.clone();
        }
    }
}

pub async fn run_command(
    command: AppCommand,
    config_path: Option<&str>,
    overrides: &ConfigOverrides,
) -> Result<()> {
    info!("optfolio starting...");

    let mut config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    overrides.apply(&mut config);
    debug!("Loaded config: {config:#?}");

    let loader = CsvPriceLoader::new(config.data_dir());

    match command {
        AppCommand::Optimize { symbols } => cli::optimize::run(&config, &loader, &symbols).await,
        AppCommand::Assess { symbols, weights } => {
            cli::assess::run(&config, &loader, &symbols, &weights).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_replace_only_given_values() {
        let mut config = AppConfig::default();
        let overrides = ConfigOverrides {
            start_date: NaiveDate::from_ymd_opt(2011, 1, 3),
            data_path: Some("/tmp/prices".to_string()),
            ..ConfigOverrides::default()
        };
        overrides.apply(&mut config);

        assert_eq!(config.start_date, NaiveDate::from_ymd_opt(2011, 1, 3).unwrap());
        assert_eq!(config.end_date, AppConfig::default().end_date);
        assert_eq!(config.data_path, "/tmp/prices");
        assert_eq!(config.benchmark, "SPY");
    }
}
