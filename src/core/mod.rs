//! Core valuation, statistics and allocation engine

pub mod config;
pub mod error;
pub mod log;
pub mod optimizer;
pub mod price;
pub mod stats;
pub mod valuation;

// Re-export main types for cleaner imports
pub use error::{AllocError, AllocResult};
pub use optimizer::{Allocation, OptimizerConfig, optimize, optimize_detailed, optimize_with};
pub use price::{DateRange, PriceLoader, PriceMatrix, PriceSeries, PriceTable};
pub use stats::{PortfolioStats, daily_returns, stats};
pub use valuation::valuate;
