//! Return and risk statistics of a portfolio value series.
use crate::core::error::{AllocError, AllocResult};
use serde::Serialize;

/// Trading days per year used to annualize the Sharpe ratio.
pub const SAMPLES_PER_YEAR: u32 = 252;

/// Return volatility at or below this is rounding noise of a constant series.
const ZERO_VOLATILITY: f64 = 1e-14;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PortfolioStats {
    pub cumulative_return: f64,
    pub average_daily_return: f64,
    pub std_daily_return: f64,
    pub sharpe_ratio: f64,
}

/// Fractional change between consecutive values.
///
/// The first element is defined as exactly `0.0` so that the sequence has
/// one entry per date.
pub fn daily_returns(values: &[f64]) -> AllocResult<Vec<f64>> {
    let mut returns = Vec::with_capacity(values.len());
    if values.is_empty() {
        return Ok(returns);
    }
    returns.push(0.0);
    for w in values.windows(2) {
        if w[0] == 0.0 || !w[0].is_finite() {
            return Err(AllocError::InvalidPriceData(format!(
                "cannot compute return from value {}",
                w[0]
            )));
        }
        returns.push(w[1] / w[0] - 1.0);
    }
    Ok(returns)
}

/// Computes cumulative return, mean and sample standard deviation of the
/// daily returns, and the annualized Sharpe ratio.
///
/// The Sharpe numerator subtracts `daily_risk_free` from the mean return but
/// the volatility is taken over the raw returns.
pub fn stats(
    values: &[f64],
    daily_risk_free: f64,
    samples_per_year: u32,
) -> AllocResult<PortfolioStats> {
    let (first, last) = match (values.first(), values.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => {
            return Err(AllocError::InvalidPriceData(
                "portfolio value series is empty".to_string(),
            ));
        }
    };
    if first == 0.0 || !first.is_finite() {
        return Err(AllocError::InvalidPriceData(format!(
            "portfolio starts at value {first}"
        )));
    }

    let returns = daily_returns(values)?;
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let std = if returns.len() < 2 {
        0.0
    } else {
        (returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
    };

    if std <= ZERO_VOLATILITY {
        return Err(AllocError::UndefinedStatistic(format!(
            "Sharpe ratio is undefined for a zero-volatility series of {} values",
            values.len()
        )));
    }

    Ok(PortfolioStats {
        cumulative_return: last / first - 1.0,
        average_daily_return: mean,
        std_daily_return: std,
        sharpe_ratio: (mean - daily_risk_free) / std * f64::from(samples_per_year).sqrt(),
    })
}
