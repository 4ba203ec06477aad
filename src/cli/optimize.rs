use super::{load_prices, report, resolve_symbols, ui};
use crate::core::config::AppConfig;
use crate::core::optimizer::optimize_detailed;
use crate::core::price::PriceLoader;
use anyhow::{Context, Result};
use tracing::info;

/// Finds the Sharpe-optimal allocation over the configured window and prints
/// it next to the equal-weight portfolio and the benchmark.
pub async fn run(
    config: &AppConfig,
    loader: &(dyn PriceLoader + Send + Sync),
    symbols: &[String],
) -> Result<()> {
    let symbols = resolve_symbols(config, symbols);
    let range = config.date_range()?;
    info!(?symbols, %range, "Optimizing allocation");

    let table = load_prices(config, loader, &symbols).await?;
    let optimizer_config = config.optimizer_config();

    let spinner = ui::new_spinner("Optimizing allocation...");
    let result = optimize_detailed(&table.instruments, &optimizer_config);
    spinner.finish_and_clear();
    let allocation = result.context("Failed to optimize allocation")?;
    info!(
        iterations = allocation.iterations,
        sharpe = ?allocation.stats.map(|s| s.sharpe_ratio),
        "Optimization finished"
    );

    let n = symbols.len();
    let reports = vec![
        report::summarize(
            "Optimized",
            &table.instruments,
            &allocation.weights,
            config.start_capital,
            &optimizer_config,
        ),
        report::summarize(
            "Equal weight",
            &table.instruments,
            &vec![1.0 / n as f64; n],
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
        "\n{} {}",
        ui::style_text("Period:", ui::StyleType::Label),
        range
    );
    println!(
        "{} {}",
        ui::style_text("Trading days:", ui::StyleType::Label),
        table.instruments.num_dates()
    );
    println!(
        "\n{}\n",
        ui::style_text("Optimal allocation", ui::StyleType::Title)
    );
    println!(
        "{}",
        report::allocation_table(table.instruments.symbols(), &allocation.weights)
    );
    println!(
        "{}",
        ui::style_text(
            &format!("Converged after {} iterations", allocation.iterations),
            ui::StyleType::Subtle
        )
    );
    println!(
        "\n{}\n",
        ui::style_text("Performance", ui::StyleType::Title)
    );
    println!("{}", report::stats_table(&reports));
    report::print_errors(&reports);
    ui::print_separator();

    Ok(())
}
