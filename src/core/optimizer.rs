//! Sharpe-ratio maximization over the simplex of long-only weights.
//!
//! The search runs Nelder-Mead over the first `n - 1` weights; the last one
//! is `1 - sum(others)`, so every candidate satisfies the sum-to-one
//! equality exactly. The `[0, 1]` bounds are enforced by evaluating the
//! Euclidean projection of the candidate onto the simplex and adding a
//! quadratic penalty on the distance to it.
//!
//! Nelder-Mead can collapse early on the kinks the projection introduces,
//! so it is restarted from its best point until the cost stops improving.
//! The result is then refined by moving weight between pairs of
//! instruments, halving the transfer size whenever no move helps. The
//! allocation is only reported once no transfer of `step_tolerance` raises
//! the Sharpe ratio.
use crate::core::error::{AllocError, AllocResult};
use crate::core::price::PriceMatrix;
use crate::core::stats::{PortfolioStats, SAMPLES_PER_YEAR, stats};
use crate::core::valuation::valuate;
use argmin::core::{CostFunction, Executor, State, TerminationReason};
use argmin::solver::neldermead::NelderMead;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Cost assigned to candidates whose Sharpe ratio is undefined.
const UNDEFINED_COST: f64 = 1e10;

/// Upper bound on Nelder-Mead runs per search.
const MAX_RESTARTS: usize = 20;

/// Relative cost decrease below which a refinement move is rounding noise.
const MIN_RELATIVE_GAIN: f64 = 1e-15;

/// Tuning knobs of the allocation search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Iteration budget of each solver run, and of the refinement sweeps.
    pub max_iters: u64,
    /// Convergence threshold on the spread of costs across the simplex.
    pub sd_tolerance: f64,
    /// Weight of the squared distance between a candidate and the simplex.
    pub penalty: f64,
    /// Size of the initial simplex, as a fraction of the uniform weight.
    pub initial_step: f64,
    /// Smallest weight transfer tried while refining the solver's result.
    pub step_tolerance: f64,
    #[serde(skip)]
    pub daily_risk_free: f64,
    #[serde(skip)]
    pub samples_per_year: u32,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig {
            max_iters: 5000,
            sd_tolerance: 1e-10,
            penalty: 1000.0,
            initial_step: 0.5,
            step_tolerance: 1e-9,
            daily_risk_free: 0.0,
            samples_per_year: SAMPLES_PER_YEAR,
        }
    }
}

impl OptimizerConfig {
    /// Rejects settings under which the search would stop without looking.
    pub fn validate(&self) -> AllocResult<()> {
        if self.max_iters == 0 {
            return Err(AllocError::InvalidConfig(
                "max_iters must be at least 1".to_string(),
            ));
        }
        let positive = [
            ("sd_tolerance", self.sd_tolerance),
            ("penalty", self.penalty),
            ("initial_step", self.initial_step),
            ("step_tolerance", self.step_tolerance),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(AllocError::InvalidConfig(format!(
                    "{name} must be a positive number, got {value}"
                )));
            }
        }
        if self.samples_per_year == 0 {
            return Err(AllocError::InvalidConfig(
                "samples_per_year must be at least 1".to_string(),
            ));
        }
        if !self.daily_risk_free.is_finite() {
            return Err(AllocError::InvalidConfig(format!(
                "risk-free rate must be finite, got {}",
                self.daily_risk_free
            )));
        }
        Ok(())
    }
}

/// Result of a converged allocation search.
#[derive(Debug, Clone)]
pub struct Allocation {
    pub weights: Vec<f64>,
    /// `None` only for a single instrument whose Sharpe ratio is undefined.
    pub stats: Option<PortfolioStats>,
    /// Solver iterations across all runs plus refinement sweeps.
    pub iterations: u64,
    pub best_cost: f64,
}

/// Objective evaluated by the solver: negative Sharpe ratio of the
/// projected candidate plus the bound-violation penalty.
#[derive(Clone, Copy)]
struct SharpeObjective<'a> {
    prices: &'a PriceMatrix,
    config: &'a OptimizerConfig,
}

impl SharpeObjective<'_> {
    fn negative_sharpe(&self, weights: &[f64]) -> AllocResult<f64> {
        let values = valuate(self.prices, weights, 1.0)?;
        match stats(
            &values,
            self.config.daily_risk_free,
            self.config.samples_per_year,
        ) {
            Ok(s) => Ok(-s.sharpe_ratio),
            Err(AllocError::UndefinedStatistic(_)) => Ok(UNDEFINED_COST),
            Err(e) => Err(e),
        }
    }

    fn penalized_cost(&self, free: &[f64]) -> AllocResult<f64> {
        let raw = complete_weights(free);
        let weights = project_onto_simplex(&raw);
        let distance: f64 = raw
            .iter()
            .zip(&weights)
            .map(|(r, w)| (r - w).powi(2))
            .sum();
        let cost = self.negative_sharpe(&weights)? + self.config.penalty * distance;
        trace!(?weights, distance, cost, "Evaluated candidate");
        Ok(cost)
    }
}

impl CostFunction for SharpeObjective<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, free: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
        Ok(self.penalized_cost(free)?)
    }
}

/// Best point of one Nelder-Mead run.
struct SolverRun {
    free: Vec<f64>,
    cost: f64,
    iterations: u64,
}

/// Finds the long-only allocation with the highest Sharpe ratio using the
/// default solver settings.
pub fn optimize(prices: &PriceMatrix) -> AllocResult<Vec<f64>> {
    optimize_with(prices, &OptimizerConfig::default())
}

pub fn optimize_with(prices: &PriceMatrix, config: &OptimizerConfig) -> AllocResult<Vec<f64>> {
    optimize_detailed(prices, config).map(|allocation| allocation.weights)
}

/// Runs the allocation search and reports solver diagnostics alongside the
/// weights.
///
/// Returns [`AllocError::InvalidConfig`] for unusable settings, and
/// [`AllocError::OptimizationFailed`] when a solver run stops for any reason
/// other than convergence or the refinement exhausts its budget. The error
/// carries the best allocation seen so far.
pub fn optimize_detailed(
    prices: &PriceMatrix,
    config: &OptimizerConfig,
) -> AllocResult<Allocation> {
    config.validate()?;
    let n = prices.num_instruments();

    // The simplex of a single instrument is one point, whatever its returns
    if n == 1 {
        let values = valuate(prices, &[1.0], 1.0)?;
        let single_stats = match stats(&values, config.daily_risk_free, config.samples_per_year) {
            Ok(s) => Some(s),
            Err(AllocError::UndefinedStatistic(_)) => None,
            Err(e) => return Err(e),
        };
        return Ok(Allocation {
            weights: vec![1.0],
            best_cost: single_stats.map_or(UNDEFINED_COST, |s| -s.sharpe_ratio),
            stats: single_stats,
            iterations: 0,
        });
    }

    let uniform = vec![1.0 / n as f64; n];

    // Validates dimensions and prices before handing over to the solver
    let initial_values = valuate(prices, &uniform, 1.0)?;
    let initial_stats = stats(
        &initial_values,
        config.daily_risk_free,
        config.samples_per_year,
    )?;
    debug!(
        instruments = n,
        dates = prices.num_dates(),
        initial_sharpe = initial_stats.sharpe_ratio,
        "Starting allocation search"
    );

    let objective = SharpeObjective { prices, config };
    let mut free = uniform[..n - 1].to_vec();
    let mut best_cost = objective.penalized_cost(&free)?;
    let mut iterations = 0;
    for restart in 0..MAX_RESTARTS {
        let run = run_nelder_mead(objective, &free, config)?;
        iterations += run.iterations;
        let gain = best_cost - run.cost;
        debug!(restart, cost = run.cost, gain, "Solver run converged");
        if run.cost < best_cost {
            free = run.free;
            best_cost = run.cost;
        }
        if gain <= config.sd_tolerance {
            break;
        }
    }

    let start = normalize(&project_onto_simplex(&complete_weights(&free)));
    let (weights, best_cost, sweeps) = refine(&objective, start, config)?;
    iterations += sweeps;

    let weights = normalize(&weights);
    let values = valuate(prices, &weights, 1.0)?;
    let final_stats = stats(&values, config.daily_risk_free, config.samples_per_year)?;
    debug!(
        ?weights,
        iterations,
        best_cost,
        sharpe = final_stats.sharpe_ratio,
        "Allocation search converged"
    );

    Ok(Allocation {
        weights,
        stats: Some(final_stats),
        iterations,
        best_cost,
    })
}

/// One Nelder-Mead run over the free weights, starting from a simplex of
/// size `initial_step / n` around `start`.
fn run_nelder_mead(
    objective: SharpeObjective<'_>,
    start: &[f64],
    config: &OptimizerConfig,
) -> AllocResult<SolverRun> {
    let n = start.len() + 1;
    let step = config.initial_step / n as f64;
    let fallback = project_onto_simplex(&complete_weights(start));

    let mut simplex = Vec::with_capacity(n);
    simplex.push(start.to_vec());
    for i in 0..n - 1 {
        let mut vertex = start.to_vec();
        vertex[i] += step;
        simplex.push(vertex);
    }

    let solver = NelderMead::new(simplex)
        .with_sd_tolerance(config.sd_tolerance)
        .map_err(|e| AllocError::OptimizationFailed {
            last_iterate: fallback.clone(),
            message: e.to_string(),
        })?;

    let result = Executor::new(objective, solver)
        .configure(|state| state.max_iters(config.max_iters))
        .run()
        .map_err(|e| match e.downcast::<AllocError>() {
            Ok(alloc_error) => alloc_error,
            Err(e) => AllocError::OptimizationFailed {
                last_iterate: fallback.clone(),
                message: e.to_string(),
            },
        })?;

    let state = result.state();
    let free = state
        .get_best_param()
        .cloned()
        .unwrap_or_else(|| start.to_vec());
    let last_iterate = project_onto_simplex(&complete_weights(&free));

    match state.get_termination_reason() {
        Some(TerminationReason::SolverConverged) => Ok(SolverRun {
            free,
            cost: state.get_best_cost(),
            iterations: state.get_iter(),
        }),
        Some(TerminationReason::MaxItersReached) => Err(AllocError::OptimizationFailed {
            last_iterate,
            message: format!("did not converge within {} iterations", config.max_iters),
        }),
        other => Err(AllocError::OptimizationFailed {
            last_iterate,
            message: format!("solver stopped without converging: {other:?}"),
        }),
    }
}

/// Moves weight between pairs of instruments while that lowers the cost,
/// halving the transfer size after a sweep without improvement. Stops once
/// the transfer size drops below `step_tolerance`.
///
/// Returns the weights, their cost and the number of sweeps.
fn refine(
    objective: &SharpeObjective<'_>,
    mut weights: Vec<f64>,
    config: &OptimizerConfig,
) -> AllocResult<(Vec<f64>, f64, u64)> {
    let n = weights.len();
    let mut cost = objective.negative_sharpe(&weights)?;
    let mut step = config.initial_step / n as f64;
    let mut sweeps = 0;

    while step >= config.step_tolerance {
        if sweeps == config.max_iters {
            return Err(AllocError::OptimizationFailed {
                last_iterate: weights,
                message: format!(
                    "allocation still improving after {} refinement sweeps",
                    config.max_iters
                ),
            });
        }
        sweeps += 1;

        let mut improved = false;
        for from in 0..n {
            for to in 0..n {
                if from == to || weights[from] <= 0.0 {
                    continue;
                }
                let amount = step.min(weights[from]);
                let mut candidate = weights.clone();
                candidate[from] -= amount;
                candidate[to] += amount;

                let candidate_cost = objective.negative_sharpe(&candidate)?;
                if candidate_cost < cost - MIN_RELATIVE_GAIN * cost.abs().max(1.0) {
                    weights = candidate;
                    cost = candidate_cost;
                    improved = true;
                }
            }
        }
        if !improved {
            step /= 2.0;
        }
    }
    trace!(sweeps, cost, "Refinement finished");

    Ok((weights, cost, sweeps))
}

/// Appends the weight implied by the sum-to-one equality.
fn complete_weights(free: &[f64]) -> Vec<f64> {
    let mut weights = free.to_vec();
    weights.push(1.0 - free.iter().sum::<f64>());
    weights
}

/// Euclidean projection onto `{w : w_i >= 0, sum(w) = 1}`.
pub fn project_onto_simplex(v: &[f64]) -> Vec<f64> {
    let mut sorted = v.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));

    let mut cumulative = 0.0;
    let mut theta = 0.0;
    for (i, u) in sorted.iter().enumerate() {
        cumulative += u;
        let t = (cumulative - 1.0) / (i + 1) as f64;
        if u - t > 0.0 {
            theta = t;
        }
    }

    v.iter().map(|x| (x - theta).max(0.0)).collect()
}

fn normalize(weights: &[f64]) -> Vec<f64> {
    let total: f64 = weights.iter().sum();
    weights.iter().map(|w| w / total).collect()
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

    fn assert_on_simplex(weights: &[f64]) {
        let total: f64 = weights.iter().sum();
        assert!((total - 1.0).abs() < 1e-9, "weights sum to {total}");
        for w in weights {
            assert!((0.0..=1.0).contains(w), "weight {w} out of bounds");
        }
    }

    fn three_assets() -> PriceMatrix {
        matrix(vec![
            vec![10.0, 10.4, 10.1, 10.9, 11.2, 10.8, 11.5, 11.9, 11.6, 12.3],
            vec![50.0, 49.0, 51.5, 50.5, 52.0, 53.5, 52.5, 54.0, 55.5, 55.0],
            vec![8.0, 8.1, 7.6, 7.9, 7.4, 7.7, 7.2, 7.5, 7.1, 7.0],
        ])
    }

    /// Geometric random walk per instrument from a fixed seed.
    fn random_walk_market(seed: u64, instruments: usize, days: usize) -> PriceMatrix {
        let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let mut uniform = move || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 11) as f64 / (1u64 << 53) as f64
        };
        let columns = (0..instruments)
            .map(|i| {
                let drift = 0.0002 * (i as f64 - 1.0);
                let volatility = 0.01 + 0.004 * i as f64;
                let mut price = 50.0 + 10.0 * i as f64;
                (0..days)
                    .map(|_| {
                        let current = price;
                        price *= 1.0 + drift + volatility * (uniform() - 0.5) * 3.4;
                        current
                    })
                    .collect()
            })
            .collect();
        matrix(columns)
    }

    fn sharpe(prices: &PriceMatrix, weights: &[f64]) -> f64 {
        let values = valuate(prices, weights, 1.0).unwrap();
        stats(&values, 0.0, SAMPLES_PER_YEAR).unwrap().sharpe_ratio
    }

    /// Largest Sharpe gain from moving up to `amount` of weight from one
    /// instrument to another.
    fn best_transfer_gain(prices: &PriceMatrix, weights: &[f64], amount: f64) -> f64 {
        let base = sharpe(prices, weights);
        let mut best = f64::NEG_INFINITY;
        for from in 0..weights.len() {
            for to in 0..weights.len() {
                if from == to || weights[from] <= 0.0 {
                    continue;
                }
                let mut moved = weights.to_vec();
                let delta = amount.min(moved[from]);
                moved[from] -= delta;
                moved[to] += delta;
                best = best.max(sharpe(prices, &moved) - base);
            }
        }
        best
    }

    #[test]
    fn test_single_instrument_takes_everything() {
        let prices = matrix(vec![vec![10.0, 11.0, 10.5, 12.0]]);
        assert_eq!(optimize(&prices).unwrap(), vec![1.0]);

        let allocation = optimize_detailed(&prices, &OptimizerConfig::default()).unwrap();
        assert_eq!(allocation.weights, vec![1.0]);
        assert_eq!(allocation.iterations, 0);
        assert!(allocation.stats.is_some());
    }

    #[test]
    fn test_single_flat_instrument_is_still_allocated() {
        let flat = matrix(vec![vec![10.0, 10.0, 10.0]]);
        assert_eq!(optimize(&flat).unwrap(), vec![1.0]);

        let allocation = optimize_detailed(&flat, &OptimizerConfig::default()).unwrap();
        assert_eq!(allocation.weights, vec![1.0]);
        assert!(allocation.stats.is_none());
    }

    #[test]
    fn test_rising_beats_flat() {
        let prices = matrix(vec![vec![100.0, 110.0, 121.0], vec![50.0, 50.0, 50.0]]);
        let weights = optimize(&prices).unwrap();

        assert_on_simplex(&weights);
        assert!(weights[0] > 0.95, "weights: {weights:?}");
    }

    #[test]
    fn test_weights_stay_on_simplex() {
        let allocation = optimize_detailed(&three_assets(), &OptimizerConfig::default()).unwrap();
        assert_on_simplex(&allocation.weights);
        assert!(allocation.iterations > 0);
    }

    #[test]
    fn test_optimum_is_at_least_as_good_as_uniform() {
        let prices = three_assets();
        let config = OptimizerConfig::default();
        let allocation = optimize_detailed(&prices, &config).unwrap();

        let uniform = valuate(&prices, &[1.0 / 3.0; 3], 1.0).unwrap();
        let uniform_stats = stats(&uniform, 0.0, SAMPLES_PER_YEAR).unwrap();
        let optimized = allocation.stats.unwrap();
        assert!(optimized.sharpe_ratio >= uniform_stats.sharpe_ratio - 1e-9);
    }

    #[test]
    fn test_no_weight_transfer_improves_the_optimum() {
        for (seed, instruments) in [(0, 3), (7, 4), (21, 6), (28, 6), (3, 8)] {
            let prices = random_walk_market(seed, instruments, 250);
            let weights = optimize(&prices).unwrap();
            assert_on_simplex(&weights);

            let gain = best_transfer_gain(&prices, &weights, 0.01);
            assert!(
                gain < 1e-7,
                "seed {seed}, {instruments} instruments: transfer gains {gain}, weights {weights:?}"
            );
        }
    }

    #[test]
    fn test_optimum_beats_every_grid_allocation() {
        let prices = random_walk_market(11, 3, 250);
        let weights = optimize(&prices).unwrap();
        let optimized = sharpe(&prices, &weights);

        let steps = 50;
        let mut best_grid = f64::NEG_INFINITY;
        for i in 0..=steps {
            for j in 0..=steps - i {
                let w0 = i as f64 / steps as f64;
                let w1 = j as f64 / steps as f64;
                let grid = [w0, w1, (1.0 - w0 - w1).max(0.0)];
                best_grid = best_grid.max(sharpe(&prices, &grid));
            }
        }
        assert!(
            optimized >= best_grid - 1e-9,
            "optimized {optimized} below grid {best_grid} at {weights:?}"
        );
    }

    #[test]
    fn test_unusable_settings_are_rejected() {
        let prices = three_assets();
        let unusable = [
            OptimizerConfig {
                initial_step: 0.0,
                ..OptimizerConfig::default()
            },
            OptimizerConfig {
                penalty: -1.0,
                ..OptimizerConfig::default()
            },
            OptimizerConfig {
                max_iters: 0,
                ..OptimizerConfig::default()
            },
            OptimizerConfig {
                sd_tolerance: f64::NAN,
                ..OptimizerConfig::default()
            },
            OptimizerConfig {
                samples_per_year: 0,
                ..OptimizerConfig::default()
            },
        ];
        for config in unusable {
            assert!(
                matches!(
                    optimize_with(&prices, &config),
                    Err(AllocError::InvalidConfig(_))
                ),
                "accepted {config:?}"
            );
        }
        assert!(OptimizerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_iteration_budget_exhaustion_is_reported() {
        let config = OptimizerConfig {
            max_iters: 1,
            ..OptimizerConfig::default()
        };
        match optimize_with(&three_assets(), &config) {
            Err(AllocError::OptimizationFailed {
                last_iterate,
                message,
            }) => {
                assert_eq!(last_iterate.len(), 3);
                assert!(message.contains("1 iterations"));
            }
            other => panic!("expected OptimizationFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_flat_prices_are_undefined() {
        let prices = matrix(vec![vec![5.0, 5.0, 5.0], vec![7.0, 7.0, 7.0]]);
        assert!(matches!(
            optimize(&prices),
            Err(AllocError::UndefinedStatistic(_))
        ));
    }

    #[test]
    fn test_zero_first_price_is_rejected() {
        let prices = matrix(vec![vec![0.0, 1.0, 2.0], vec![7.0, 7.5, 7.2]]);
        assert!(matches!(
            optimize(&prices),
            Err(AllocError::InvalidPriceData(_))
        ));
    }

    #[test]
    fn test_projection_onto_simplex() {
        assert_eq!(project_onto_simplex(&[0.2, 0.8]), vec![0.2, 0.8]);
        assert_eq!(project_onto_simplex(&[1.5, -0.5]), vec![1.0, 0.0]);

        let projected = project_onto_simplex(&[0.6, 0.6, -0.2]);
        assert!((projected[0] - 0.5).abs() < 1e-12);
        assert!((projected[1] - 0.5).abs() < 1e-12);
        assert_eq!(projected[2], 0.0);
    }
}
