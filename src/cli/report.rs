//! Terminal report of allocations and their statistics.
use super::ui;
use crate::core::{AllocResult, OptimizerConfig, PortfolioStats, PriceMatrix, stats, valuate};
use comfy_table::Table;

/// Statistics of one portfolio over the report window.
#[derive(Debug)]
pub struct PortfolioReport {
    pub name: String,
    pub stats: AllocResult<PortfolioStats>,
    pub final_value: Option<f64>,
}

/// Values `weights` over `prices` and collects its statistics. Errors are
/// kept in the report so the remaining rows can still be shown.
pub fn summarize(
    name: &str,
    prices: &PriceMatrix,
    weights: &[f64],
    start_capital: f64,
    config: &OptimizerConfig,
) -> PortfolioReport {
    let values = valuate(prices, weights, start_capital);
    let final_value = values.as_ref().ok().and_then(|v| v.last().copied());
    let stats = values.and_then(|v| stats(&v, config.daily_risk_free, config.samples_per_year));
    PortfolioReport {
        name: name.to_string(),
        stats,
        final_value,
    }
}

pub fn allocation_table(symbols: &[String], weights: &[f64]) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Symbol"), ui::header_cell("Allocation")]);

    let mut rows: Vec<_> = symbols.iter().zip(weights).collect();
    rows.sort_by(|(_, a), (_, b)| b.total_cmp(a));
    for (symbol, weight) in rows {
        table.add_row(vec![
            comfy_table::Cell::new(symbol),
            ui::weight_cell(*weight),
        ]);
    }
    table
}

pub fn stats_table(reports: &[PortfolioReport]) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Portfolio"),
        ui::header_cell("Cumulative Return"),
        ui::header_cell("Avg Daily Return"),
        ui::header_cell("Volatility"),
        ui::header_cell("Sharpe Ratio"),
        ui::header_cell("Final Value"),
    ]);

    for report in reports {
        let mut row = vec![comfy_table::Cell::new(&report.name)];
        match &report.stats {
            Ok(s) => {
                row.push(ui::signed_cell(
                    s.cumulative_return,
                    format!("{:.2}%", s.cumulative_return * 100.0),
                ));
                row.push(ui::signed_cell(
                    s.average_daily_return,
                    format!("{:.4}%", s.average_daily_return * 100.0),
                ));
                row.push(ui::number_cell(format!(
                    "{:.4}%",
                    s.std_daily_return * 100.0
                )));
                row.push(ui::signed_cell(s.sharpe_ratio, format!("{:.4}", s.sharpe_ratio)));
            }
            Err(_) => {
                row.extend((0..4).map(|_| ui::na_cell(true)));
            }
        }
        row.push(match report.final_value {
            Some(v) => ui::number_cell(format!("{v:.2}")),
            None => ui::na_cell(false),
        });
        table.add_row(row);
    }
    table
}

/// Prints notes for reports whose statistics could not be computed.
pub fn print_errors(reports: &[PortfolioReport]) {
    for report in reports {
        if let Err(e) = &report.stats {
            println!(
                "{}",
                ui::style_text(&format!("{}: {e}", report.name), ui::StyleType::Error)
            );
        }
    }
}
