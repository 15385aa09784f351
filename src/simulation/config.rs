//! Simulation configuration
//!
//! One explicit struct built once by the caller and passed by reference
//! into the core. Nothing in the core reads configuration from anywhere else.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::edge::Edge;
use crate::error::{SimError, SimResult};

/// How a trade's signed P&L is derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PnlMode {
    /// Win pays `risk * avg_win/avg_loss`, loss costs `risk`
    #[default]
    RiskBased,
    /// Win pays `avg_win`, loss costs `avg_loss`, independent of sizing
    FixedDollar,
}

impl std::fmt::Display for PnlMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RiskBased => write!(f, "risk-based"),
            Self::FixedDollar => write!(f, "fixed-dollar"),
        }
    }
}

/// When a single run stops before its trade budget is exhausted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoppingPolicy {
    /// Trade the whole budget unless a constraint breach halts the run
    #[default]
    FullBudget,
    /// Also stop at the first crossing of the target balance
    StopAtTarget,
}

/// Whether failed runs contribute their final balance to distribution stats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailedRunPolicy {
    /// Failed runs only count toward the failure tally
    #[default]
    Exclude,
    /// Failed runs' terminal balances are included in median/min
    Include,
}

/// Non-fatal findings from [`SimulationConfig::validate`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ConfigWarning {
    /// Target is at or below the starting balance, time-to-target is trivially 0
    DegenerateTarget { target: f64, starting_balance: f64 },
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DegenerateTarget {
                target,
                starting_balance,
            } => write!(
                f,
                "target balance ${:.2} is not above starting balance ${:.2}",
                target, starting_balance
            ),
        }
    }
}

/// Scalar parameters for one sweep. Immutable while the sweep runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Account balance at the start of every run
    pub starting_balance: f64,
    /// Trade budget per run
    pub num_trades: usize,
    /// Trades per simulated day. Defines daily-loss resets and days-to-target.
    pub trades_per_day: Option<usize>,
    /// Probability of a winning trade (0.0 - 1.0)
    pub win_rate: f64,
    /// Average win in dollars
    pub avg_win: f64,
    /// Average loss in dollars (positive)
    pub avg_loss: f64,
    /// Round-turn commission charged on every trade
    pub commission: f64,
    /// Balance counted as "target reached"
    pub target_balance: Option<f64>,
    /// Independent runs per risk level
    pub simulations: usize,

    pub pnl_mode: PnlMode,
    pub stopping: StoppingPolicy,
    pub failed_runs: FailedRunPolicy,
    /// Kelly and preset policies size off the current balance instead of the start
    pub compounding: bool,
    /// Carve the commission out of the risk budget (net risk = max(risk - commission, 0))
    pub commission_in_risk: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            starting_balance: 2000.0,
            num_trades: 50,
            trades_per_day: None,
            win_rate: 0.48,
            avg_win: 363.0,
            avg_loss: 165.0,
            commission: 0.0,
            target_balance: Some(5000.0),
            simulations: 1000,
            pnl_mode: PnlMode::RiskBased,
            stopping: StoppingPolicy::FullBudget,
            failed_runs: FailedRunPolicy::Exclude,
            compounding: false,
            commission_in_risk: false,
        }
    }
}

impl SimulationConfig {
    /// Derive the trade budget from a daily schedule
    pub fn with_schedule(mut self, trades_per_day: usize, days: usize) -> SimResult<Self> {
        self.num_trades = trades_per_day.checked_mul(days).ok_or_else(|| {
            SimError::invalid(
                "days",
                format!("{} trades/day x {} days overflows the trade budget", trades_per_day, days),
            )
        })?;
        self.trades_per_day = Some(trades_per_day);
        Ok(self)
    }

    pub fn edge(&self) -> Edge {
        Edge::new(self.win_rate, self.avg_win, self.avg_loss)
    }

    /// Check every parameter before any simulation starts.
    ///
    /// Returns the non-fatal warnings on success.
    pub fn validate(&self) -> SimResult<Vec<ConfigWarning>> {
        if !(self.starting_balance.is_finite() && self.starting_balance > 0.0) {
            return Err(SimError::invalid(
                "starting_balance",
                format!("must be positive, got {}", self.starting_balance),
            ));
        }
        if !(0.0..=1.0).contains(&self.win_rate) {
            return Err(SimError::invalid(
                "win_rate",
                format!("must be within [0, 1], got {}", self.win_rate),
            ));
        }
        if !(self.avg_win.is_finite() && self.avg_win > 0.0) {
            return Err(SimError::invalid(
                "avg_win",
                format!("must be positive, got {}", self.avg_win),
            ));
        }
        // Zero loss makes the reward/risk ratio and the Kelly formula divide by zero
        if !(self.avg_loss.is_finite() && self.avg_loss > 0.0) {
            return Err(SimError::invalid(
                "avg_loss",
                format!("must be positive, got {}", self.avg_loss),
            ));
        }
        if !(self.commission.is_finite() && self.commission >= 0.0) {
            return Err(SimError::invalid(
                "commission",
                format!("must be non-negative, got {}", self.commission),
            ));
        }
        if self.simulations == 0 {
            return Err(SimError::invalid("simulations", "must be at least 1"));
        }
        if self.trades_per_day == Some(0) {
            return Err(SimError::invalid("trades_per_day", "must be at least 1"));
        }

        let mut warnings = Vec::new();
        if let Some(target) = self.target_balance {
            if !target.is_finite() {
                return Err(SimError::invalid(
                    "target_balance",
                    format!("must be finite, got {}", target),
                ));
            }
            if target <= self.starting_balance {
                warnings.push(ConfigWarning::DegenerateTarget {
                    target,
                    starting_balance: self.starting_balance,
                });
            }
        }

        for w in &warnings {
            warn!("{}", w);
        }

        Ok(warnings)
    }
}
