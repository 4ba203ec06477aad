use super::{load_prices, report, resolve_symbols, ui};
use crate::core::config::AppConfig;
use crate::core::price::PriceLoader;
use anyhow::{Result, bail};
use tracing::{info, warn};

/// Values a caller-supplied allocation over the configured window and prints
/// its statistics next to the benchmark.
pub async fn run(
    config: &AppConfig,
    loader: &(dyn PriceLoader + Send + Sync),
    symbols: &[String],
    weights: &[f64],
) -> Result<()> {
    let symbols = resolve_symbols(config, symbols);
    if weights.len() != symbols.len() {
        bail!(
            "Got {} weights for {} symbols",
            weights.len(),
            symbols.len()
        );
    }
    let total: f64 = weights.iter().sum();
    if (total - 1.0).abs() > 1e-6 {
        warn!(total, "Weights do not sum to one");
    }

    let range = config.date_range()?;
    info!(?symbols, ?weights, %range, "Assessing allocation");
    let table = load_prices(config, loader, &symbols).await?;
    let optimizer_config = config.optimizer_config();

    let reports = vec![
        report::summarize(
            "Allocation",
            &table.instruments,
            weights,
            config.start_capital,
            &optimizer_config,
        ),
        report::summarize(
            &format!("Benchmark ({})", config.benchmark),
            &table.benchmark,
            &[1.0],
            config.start_capital,
            &optimizer_config,
        ),
    ];

    println!(
        "\n{} {}\n",
        ui::style_text("Period:", ui::StyleType::Label),
        range
    );
    println!(
        "{}",
        report::allocation_table(table.instruments.symbols(), weights)
    );
    println!("{}", report::stats_table(&reports));
    report::print_errors(&reports);
    ui::print_separator();

    Ok(())
}
