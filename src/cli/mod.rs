pub mod assess;
pub mod optimize;
pub mod report;
pub mod setup;
pub mod ui;

use crate::core::config::AppConfig;
use crate::core::price::{PriceLoader, PriceTable};
use anyhow::{Context, Result, bail};
use futures::future::join_all;
use std::collections::HashSet;
use tracing::debug;

/// Symbols given on the command line, or the configured ones when none are.
pub(crate) fn resolve_symbols(config: &AppConfig, symbols: &[String]) -> Vec<String> {
    if symbols.is_empty() {
        config.symbols.clone()
    } else {
        symbols.to_vec()
    }
}

/// Loads the benchmark and `symbols` concurrently and aligns them on the
/// benchmark's trading dates.
pub(crate) async fn load_prices(
    config: &AppConfig,
    loader: &(dyn PriceLoader + Send + Sync),
    symbols: &[String],
) -> Result<PriceTable> {
    if symbols.is_empty() {
        bail!("No symbols to load");
    }
    let mut seen = HashSet::new();
    if let Some(duplicate) = symbols.iter().find(|s| !seen.insert(s.as_str())) {
        bail!("Symbol {duplicate} is listed more than once");
    }

    let range = config.date_range()?;
    let pb = ui::new_progress_bar(symbols.len() as u64 + 1);
    pb.set_message("Loading prices...");

    let requested = std::iter::once(&config.benchmark).chain(symbols);
    let futures = requested.map(|symbol| {
        let pb_clone = pb.clone();
        async move {
            let result = loader.load_series(symbol, &range).await;
            pb_clone.inc(1);
            result
        }
    });
    let results = join_all(futures).await;
    pb.finish_and_clear();

    let mut series = results.into_iter().collect::<Result<Vec<_>>>()?;
    let benchmark = series.remove(0);
    debug!(
        benchmark = %benchmark.symbol,
        instruments = series.len(),
        "Loaded price series"
    );

    PriceTable::align(&benchmark, &series)
        .with_context(|| format!("Failed to align prices for {range}"))
}
