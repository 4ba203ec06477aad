//! Buy-and-hold valuation of a weighted portfolio over a price window.
use crate::core::error::{AllocError, AllocResult};
use crate::core::price::PriceMatrix;

/// Computes the daily value of `start_capital` split across the instruments
/// of `prices` according to `weights` and held without rebalancing.
///
/// Each column is normalized by its first-date price, so the weights are
/// fractions of capital rather than share counts. `weights` is positional
/// and must have one entry per column.
pub fn valuate(prices: &PriceMatrix, weights: &[f64], start_capital: f64) -> AllocResult<Vec<f64>> {
    if weights.len() != prices.num_instruments() {
        return Err(AllocError::DimensionMismatch {
            expected: prices.num_instruments(),
            actual: weights.len(),
        });
    }

    let mut values = vec![0.0; prices.num_dates()];
    for ((symbol, column), weight) in prices.symbols().iter().zip(prices.columns()).zip(weights) {
        let first = column[0];
        if !first.is_finite() || first <= 0.0 {
            return Err(AllocError::InvalidPriceData(format!(
                "{symbol} has first-date price {first}, cannot normalize"
            )));
        }
        let scale = weight * start_capital / first;
        for (value, price) in values.iter_mut().zip(column) {
            *value += price * scale;
        }
    }

    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn matrix(columns: Vec<Vec<f64>>) -> PriceMatrix {
        let start = NaiveDate::from_ymd_opt(2010, 2, 1).unwrap();
        let dates = start.iter_days().take(columns[0].len()).collect();
        let symbols = (0..columns.len()).map(|i| format!("S{i}")).collect();
        PriceMatrix::new(dates, symbols, columns).unwrap()
    }

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-12, "{actual:?} != {expected:?}");
        }
    }

    #[test]
    fn test_equal_weight_rising_and_flat() {
        let prices = matrix(vec![vec![100.0, 110.0, 121.0], vec![50.0, 50.0, 50.0]]);
        let values = valuate(&prices, &[0.5, 0.5], 1.0).unwrap();
        assert_close(&values, &[1.0, 1.05, 1.105]);
    }

    #[test]
    fn test_scales_with_start_capital() {
        let prices = matrix(vec![
            vec![20.0, 21.0, 19.5, 22.0],
            vec![3.0, 3.3, 3.1, 2.9],
            vec![700.0, 690.0, 710.0, 720.0],
        ]);
        let weights = [0.2, 0.3, 0.5];
        let unit = valuate(&prices, &weights, 1.0).unwrap();

        for capital in [0.5, 3.0, 10_000.0] {
            let scaled = valuate(&prices, &weights, capital).unwrap();
            let expected: Vec<f64> = unit.iter().map(|v| v * capital).collect();
            for (s, e) in scaled.iter().zip(&expected) {
                assert!((s - e).abs() <= 1e-9 * e.abs());
            }
        }
    }

    #[test]
    fn test_first_value_equals_capital() {
        let prices = matrix(vec![vec![5.0, 6.0], vec![80.0, 40.0]]);
        let values = valuate(&prices, &[0.7, 0.3], 250.0).unwrap();
        assert!((values[0] - 250.0).abs() < 1e-12);
        assert!((values[1] - (0.7 * 250.0 * 1.2 + 0.3 * 250.0 * 0.5)).abs() < 1e-9);
    }

    #[test]
    fn test_weight_length_mismatch() {
        let prices = matrix(vec![vec![1.0, 2.0], vec![1.0, 2.0]]);
        let result = valuate(&prices, &[1.0], 1.0);
        assert_eq!(
            result,
            Err(AllocError::DimensionMismatch {
                expected: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn test_zero_first_price_is_invalid() {
        let prices = matrix(vec![vec![0.0, 2.0], vec![1.0, 2.0]]);
        let result = valuate(&prices, &[0.5, 0.5], 1.0);
        assert!(matches!(result, Err(AllocError::InvalidPriceData(msg)) if msg.contains("S0")));
    }
}
