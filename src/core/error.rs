//! Error kinds raised by the valuation, statistics and optimization engine.

use thiserror::Error;

/// Errors surfaced by the allocation engine.
///
/// None of these are recovered from inside the engine; callers decide
/// whether to retry (for example with a different tolerance).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AllocError {
    #[error("Dimension mismatch: expected {expected} weights, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid price data: {0}")]
    InvalidPriceData(String),

    #[error("Undefined statistic: {0}")]
    UndefinedStatistic(String),

    #[error("Invalid optimizer settings: {0}")]
    InvalidConfig(String),

    #[error("Optimization failed: {message} (last iterate: {last_iterate:?})")]
    OptimizationFailed {
        last_iterate: Vec<f64>,
        message: String,
    },
}

pub type AllocResult<T> = std::result::Result<T, AllocError>;
