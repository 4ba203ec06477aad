//! Price data abstractions and core types

use crate::core::error::{AllocError, AllocResult};
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use tracing::debug;

/// Inclusive range of calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            anyhow::bail!("Invalid date range: {start} is after {end}");
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: &NaiveDate) -> bool {
        *date >= self.start && *date <= self.end
    }
}

impl Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// Raw daily closing prices of a single instrument, as read from storage.
///
/// `None` marks a trading date for which the source had no usable price.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    pub symbol: String,
    pub points: Vec<(NaiveDate, Option<f64>)>,
}

impl PriceSeries {
    pub fn new(symbol: &str, mut points: Vec<(NaiveDate, Option<f64>)>) -> Self {
        points.sort_by_key(|(date, _)| *date);
        Self {
            symbol: symbol.to_string(),
            points,
        }
    }
}

/// Dense matrix of prices: ascending dates crossed with ordered instruments.
///
/// Columns are stored per instrument, so `column(i)[t]` is the price of
/// instrument `i` on `dates()[t]`.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceMatrix {
    dates: Vec<NaiveDate>,
    symbols: Vec<String>,
    columns: Vec<Vec<f64>>,
}

impl PriceMatrix {
    pub fn new(
        dates: Vec<NaiveDate>,
        symbols: Vec<String>,
        columns: Vec<Vec<f64>>,
    ) -> AllocResult<Self> {
        if symbols.len() != columns.len() {
            return Err(AllocError::DimensionMismatch {
                expected: symbols.len(),
                actual: columns.len(),
            });
        }
        if columns.is_empty() {
            return Err(AllocError::InvalidPriceData(
                "price matrix has no instruments".to_string(),
            ));
        }
        if dates.is_empty() {
            return Err(AllocError::InvalidPriceData(
                "price matrix has no dates".to_string(),
            ));
        }
        if dates.windows(2).any(|w| w[0] >= w[1]) {
            return Err(AllocError::InvalidPriceData(
                "dates must be strictly ascending".to_string(),
            ));
        }
        for (symbol, column) in symbols.iter().zip(&columns) {
            if column.len() != dates.len() {
                return Err(AllocError::InvalidPriceData(format!(
                    "{symbol} has {} prices for {} dates",
                    column.len(),
                    dates.len()
                )));
            }
            if let Some(bad) = column.iter().find(|p| !p.is_finite() || **p < 0.0) {
                return Err(AllocError::InvalidPriceData(format!(
                    "{symbol} contains invalid price {bad}"
                )));
            }
        }

        Ok(Self {
            dates,
            symbols,
            columns,
        })
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn columns(&self) -> &[Vec<f64>] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Option<&[f64]> {
        self.columns.get(index).map(Vec::as_slice)
    }

    pub fn num_dates(&self) -> usize {
        self.dates.len()
    }

    pub fn num_instruments(&self) -> usize {
        self.columns.len()
    }
}

/// Benchmark and portfolio instruments aligned on the benchmark's calendar.
#[derive(Debug, Clone)]
pub struct PriceTable {
    pub benchmark: PriceMatrix,
    pub instruments: PriceMatrix,
}

impl PriceTable {
    /// Aligns instrument series to the dates on which the benchmark traded.
    ///
    /// Benchmark rows without a price are dropped. Gaps in an instrument are
    /// forward-filled, then back-filled for leading gaps.
    pub fn align(benchmark: &PriceSeries, instruments: &[PriceSeries]) -> AllocResult<Self> {
        let (dates, benchmark_prices): (Vec<NaiveDate>, Vec<f64>) = benchmark
            .points
            .iter()
            .filter_map(|(date, price)| price.map(|p| (*date, p)))
            .unzip();

        if dates.is_empty() {
            return Err(AllocError::InvalidPriceData(format!(
                "benchmark {} has no prices in range",
                benchmark.symbol
            )));
        }

        let mut columns = Vec::with_capacity(instruments.len());
        for series in instruments {
            let by_date: BTreeMap<NaiveDate, Option<f64>> = series.points.iter().cloned().collect();
            let raw: Vec<Option<f64>> = dates
                .iter()
                .map(|d| by_date.get(d).copied().flatten())
                .collect();
            let missing = raw.iter().filter(|p| p.is_none()).count();
            if missing > 0 {
                debug!(
                    "Filling {missing} missing prices for {} out of {}",
                    series.symbol,
                    raw.len()
                );
            }
            let column = fill_gaps(&raw).ok_or_else(|| {
                AllocError::InvalidPriceData(format!("{} has no prices in range", series.symbol))
            })?;
            columns.push(column);
        }

        Ok(Self {
            benchmark: PriceMatrix::new(
                dates.clone(),
                vec![benchmark.symbol.clone()],
                vec![benchmark_prices],
            )?,
            instruments: PriceMatrix::new(
                dates,
                instruments.iter().map(|s| s.symbol.clone()).collect(),
                columns,
            )?,
        })
    }
}

/// Forward-fills then back-fills missing values. Returns `None` when every
/// value is missing.
fn fill_gaps(raw: &[Option<f64>]) -> Option<Vec<f64>> {
    let first = raw.iter().find_map(|p| *p)?;
    let mut last = first;
    Some(
        raw.iter()
            .map(|p| {
                if let Some(v) = p {
                    last = *v;
                }
                last
            })
            .collect(),
    )
}

#[async_trait]
pub trait PriceLoader: Send + Sync {
    async fn load_series(&self, symbol: &str, range: &DateRange) -> Result<PriceSeries>;
}
