//! Simulation core
//!
//! Monte Carlo trade simulation for risk-per-trade sizing:
//! - Trade outcome generation (Bernoulli win/loss)
//! - Risk sizing policies (fixed, compounding, Kelly variants)
//! - Account constraints (trailing/static drawdown, daily loss cap, payout)
//! - Single-run simulation and multi-run sweeps over risk levels
//! - Optimal risk selection

mod config;
mod constraints;
mod edge;
mod monte_carlo;
mod optimizer;
mod outcome;
mod presets;
mod run;
mod sizing;
mod stats;

pub use config::{ConfigWarning, FailedRunPolicy, PnlMode, SimulationConfig, StoppingPolicy};
pub use constraints::{
    evaluate, AccountState, Assessment, ConstraintRule, ConstraintSet, FailureReason, PropFirmMode, Verdict,
};
pub use edge::Edge;
pub use monte_carlo::{run_single, run_single_with_rng, run_sweep, MonteCarloSettings, RiskRange, SweepPoint};
pub use optimizer::{select_optimal, Criterion, Selection};
pub use outcome::{draw, TradeOutcome};
pub use presets::{AccountPreset, PresetSpec};
pub use run::{RunResult, RunSimulator};
pub use sizing::{risk_amount, RiskBasis, RiskPolicy, RiskSizer};
pub use stats::{median_sorted, percentile_sorted, summarize, Summary};
