//! Monte Carlo sweep driver
//!
//! Repeats the single-run simulator across many independent runs and across a
//! range of risk percentages. Every run owns a generator seeded from
//! `(base seed, level index, run index)`, so a sweep is reproducible from its
//! base seed and gives identical results on one thread or many.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::config::{FailedRunPolicy, PnlMode, SimulationConfig};
use super::constraints::ConstraintSet;
use super::run::{RunResult, RunSimulator};
use super::sizing::{RiskBasis, RiskPolicy, RiskSizer};
use super::stats::{median_sorted, sorted};
use crate::error::{SimError, SimResult};

/// Execution settings for a batch of runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonteCarloSettings {
    /// Base seed. Drawn from the thread RNG (and logged) when absent.
    pub seed: Option<u64>,
    /// Spread runs over the rayon thread pool
    pub parallel: bool,
    /// Keep each run's full balance trajectory
    pub record_trajectories: bool,
    /// Keep every `RunResult` on its `SweepPoint`
    pub retain_runs: bool,
}

impl Default for MonteCarloSettings {
    fn default() -> Self {
        Self {
            seed: None,
            parallel: true,
            record_trajectories: false,
            retain_runs: false,
        }
    }
}

impl MonteCarloSettings {
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Default::default()
        }
    }

    fn base_seed(&self) -> u64 {
        match self.seed {
            Some(seed) => seed,
            None => {
                let seed = rand::thread_rng().gen();
                info!("No seed configured, using {}", seed);
                seed
            }
        }
    }
}

/// Inclusive range of risk percentages to sweep
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskRange {
    pub start: f64,
    pub end: f64,
    pub step: f64,
}

impl Default for RiskRange {
    fn default() -> Self {
        Self {
            start: 0.5,
            end: 20.0,
            step: 0.5,
        }
    }
}

impl RiskRange {
    /// Ascending risk levels from `start` to `end` inclusive
    pub fn levels(&self) -> SimResult<Vec<f64>> {
        if !(self.step.is_finite() && self.step > 0.0) {
            return Err(SimError::InvalidRiskRange(format!(
                "step must be positive, got {}",
                self.step
            )));
        }
        if !(self.start.is_finite() && self.start >= 0.0) {
            return Err(SimError::InvalidRiskRange(format!(
                "start must be non-negative, got {}",
                self.start
            )));
        }
        if !(self.end.is_finite() && self.end >= self.start) {
            return Err(SimError::InvalidRiskRange(format!(
                "end {} is below start {}",
                self.end, self.start
            )));
        }

        let count = ((self.end - self.start) / self.step + 1e-9).floor() as usize;
        Ok((0..=count)
            .map(|i| {
                let level = self.start + i as f64 * self.step;
                (level * 1e9).round() / 1e9
            })
            .collect())
    }
}

/// Aggregated outcome of all runs at one risk level
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepPoint {
    pub risk_pct: f64,
    /// Median final balance over the stats population, 0 when it is empty
    pub median_final: f64,
    /// Minimum final balance over the stats population, 0 when it is empty
    pub worst_final: f64,
    /// Size of the stats population (survivors, plus failures when included)
    pub samples: usize,
    /// Non-failed runs finishing at or above the target balance
    pub target_hits: usize,
    pub payout_hits: usize,
    pub fail_count: usize,
    pub simulations: usize,
    /// Individual runs, kept only when requested
    #[serde(skip)]
    pub runs: Vec<RunResult>,
}

impl SweepPoint {
    /// Aggregate one level's runs according to the config's failed-run policy
    pub fn aggregate(risk_pct: f64, runs: Vec<RunResult>, config: &SimulationConfig, retain: bool) -> Self {
        let include_failed = config.failed_runs == FailedRunPolicy::Include;
        let finals = sorted(
            runs.iter()
                .filter(|r| include_failed || !r.failed())
                .map(|r| r.final_balance),
        );

        if finals.is_empty() {
            warn!("Every run failed at {:.2}% risk, no final balance distribution", risk_pct);
        }

        let target_hits = match config.target_balance {
            Some(target) => runs
                .iter()
                .filter(|r| !r.failed() && r.final_balance >= target)
                .count(),
            None => 0,
        };

        Self {
            risk_pct,
            median_final: median_sorted(&finals).unwrap_or(0.0),
            worst_final: finals.first().copied().unwrap_or(0.0),
            samples: finals.len(),
            target_hits,
            payout_hits: runs.iter().filter(|r| r.payout_hit).count(),
            fail_count: runs.iter().filter(|r| r.failed()).count(),
            simulations: runs.len(),
            runs: if retain { runs } else { Vec::new() },
        }
    }

    /// False when no run fed the median/worst statistics (they are sentinels)
    pub fn has_samples(&self) -> bool {
        self.samples > 0
    }

    pub fn failure_rate(&self) -> f64 {
        if self.simulations == 0 {
            0.0
        } else {
            self.fail_count as f64 / self.simulations as f64
        }
    }

    pub fn target_hit_rate(&self) -> f64 {
        if self.simulations == 0 {
            0.0
        } else {
            self.target_hits as f64 / self.simulations as f64
        }
    }
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

/// Seed for one run, independent of execution order
fn run_seed(base: u64, level: usize, run: usize) -> u64 {
    splitmix64(splitmix64(base ^ splitmix64(level as u64)) ^ run as u64)
}

fn simulate_level(
    sim: &RunSimulator<'_>,
    simulations: usize,
    base_seed: u64,
    level: usize,
    parallel: bool,
) -> Vec<RunResult> {
    let one = |i: usize| {
        let mut rng = StdRng::seed_from_u64(run_seed(base_seed, level, i));
        sim.run(&mut rng)
    };
    if parallel {
        (0..simulations).into_par_iter().map(one).collect()
    } else {
        (0..simulations).map(one).collect()
    }
}

fn validate_request(config: &SimulationConfig, rules: &ConstraintSet) -> SimResult<()> {
    config.validate()?;
    rules.validate()?;
    // Without a schedule the daily baseline never resets
    if rules.has_daily_cap() && config.trades_per_day.is_none() {
        return Err(SimError::invalid(
            "trades_per_day",
            "required when a daily loss cap is active",
        ));
    }
    Ok(())
}

/// Run `config.simulations` independent runs at one fixed policy
pub fn run_single(
    config: &SimulationConfig,
    policy: &RiskPolicy,
    rules: &ConstraintSet,
    settings: &MonteCarloSettings,
) -> SimResult<Vec<RunResult>> {
    validate_request(config, rules)?;
    let sizer = policy.resolve(config)?;
    let base_seed = settings.base_seed();

    info!(
        "Simulating {} runs x {} trades with {} ({:.2}% of {} balance)",
        config.simulations, config.num_trades, policy, sizer.pct, sizer.basis
    );

    let sim = RunSimulator::new(config, sizer, rules, settings.record_trajectories);
    Ok(simulate_level(&sim, config.simulations, base_seed, 0, settings.parallel))
}

/// Like [`run_single`] but draws every outcome from the caller's generator, sequentially
pub fn run_single_with_rng<R: Rng + ?Sized>(
    config: &SimulationConfig,
    policy: &RiskPolicy,
    rules: &ConstraintSet,
    record_trajectories: bool,
    rng: &mut R,
) -> SimResult<Vec<RunResult>> {
    validate_request(config, rules)?;
    let sizer = policy.resolve(config)?;
    let sim = RunSimulator::new(config, sizer, rules, record_trajectories);
    Ok((0..config.simulations).map(|_| sim.run(rng)).collect())
}

/// Sweep fixed-fraction risk levels over `range`, one [`SweepPoint`] per level
/// in ascending risk order
pub fn run_sweep(
    config: &SimulationConfig,
    basis: RiskBasis,
    rules: &ConstraintSet,
    range: &RiskRange,
    settings: &MonteCarloSettings,
) -> SimResult<Vec<SweepPoint>> {
    validate_request(config, rules)?;
    if config.pnl_mode == PnlMode::FixedDollar {
        return Err(SimError::invalid(
            "pnl_mode",
            "fixed-dollar P&L ignores the risk percentage, sweep with risk_based",
        ));
    }
    let levels = range.levels()?;
    let sizers = levels
        .iter()
        .map(|&pct| RiskPolicy::fixed(basis, pct).resolve(config))
        .collect::<SimResult<Vec<_>>>()?;

    let base_seed = settings.base_seed();
    let total = levels.len();
    info!(
        "Sweeping {} risk levels ({:.2}% - {:.2}%, {} basis) x {} runs x {} trades, seed {}",
        total, range.start, range.end, basis, config.simulations, config.num_trades, base_seed
    );

    let completed = AtomicUsize::new(0);
    let started = Instant::now();

    let sweep_level = |(idx, (&pct, sizer)): (usize, (&f64, &RiskSizer))| {
        let sim = RunSimulator::new(config, *sizer, rules, settings.record_trajectories);
        let runs = simulate_level(&sim, config.simulations, base_seed, idx, settings.parallel);
        let point = SweepPoint::aggregate(pct, runs, config, settings.retain_runs);

        let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(
            "[{}/{}] risk {:.2}%: median ${:.2}, failed {}/{}",
            done, total, pct, point.median_final, point.fail_count, point.simulations
        );
        point
    };

    let points: Vec<SweepPoint> = if settings.parallel {
        levels
            .par_iter()
            .zip(sizers.par_iter())
            .enumerate()
            .map(sweep_level)
            .collect()
    } else {
        levels.iter().zip(sizers.iter()).enumerate().map(sweep_level).collect()
    };

    info!(
        "Sweep complete in {:.2}s",
        started.elapsed().as_secs_f64()
    );

    Ok(points)
}
