use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

use crate::core::price::{DateRange, PriceLoader, PriceSeries};

/// Loads daily prices from `<data_dir>/<SYMBOL>.csv` files in the layout
/// exported by Yahoo Finance (`Date,Open,High,Low,Close,Adj Close,Volume`).
pub struct CsvPriceLoader {
    data_dir: PathBuf,
}

impl CsvPriceLoader {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        CsvPriceLoader {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, symbol: &str) -> PathBuf {
        self.data_dir.join(format!("{symbol}.csv"))
    }
}

#[derive(Deserialize, Debug)]
struct PriceRow {
    #[serde(rename = "Date")]
    date: NaiveDate,
    #[serde(rename = "Close", default, deserialize_with = "csv::invalid_option")]
    close: Option<f64>,
    #[serde(rename = "Adj Close", default, deserialize_with = "csv::invalid_option")]
    adj_close: Option<f64>,
}

impl PriceRow {
    /// Adjusted close when the source has one, raw close otherwise.
    fn price(&self) -> Option<f64> {
        self.adj_close.or(self.close)
    }
}

fn parse_series(symbol: &str, content: &str, range: &DateRange) -> Result<PriceSeries> {
    let mut reader = csv::Reader::from_reader(content.as_bytes());
    let mut points = Vec::new();
    for (line, row) in reader.deserialize::<PriceRow>().enumerate() {
        // Header is line 1
        let row = row.with_context(|| format!("Invalid row {} for {symbol}", line + 2))?;
        if range.contains(&row.date) {
            points.push((row.date, row.price()));
        }
    }
    Ok(PriceSeries::new(symbol, points))
}

#[async_trait]
impl PriceLoader for CsvPriceLoader {
    #[instrument(
        name = "CsvPriceLoad",
        skip(self),
        fields(symbol = %symbol, range = %range)
    )]
    async fn load_series(&self, symbol: &str, range: &DateRange) -> Result<PriceSeries> {
        let path = self.path_for(symbol);
        if !path.is_file() {
            bail!(
                "No price file for {symbol} at {}. Verify that the symbol has a file in the data folder.",
                path.display()
            );
        }

        debug!("Reading prices from {}", path.display());
        let content = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read price file: {}", path.display()))?;

        let series = parse_series(symbol, &content, range)?;
        debug!(points = series.points.len(), "Loaded price series");
        Ok(series)
    }
}
