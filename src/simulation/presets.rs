//! Prop firm account presets

use serde::Serialize;

use super::config::{SimulationConfig, StoppingPolicy};
use super::constraints::{ConstraintRule, ConstraintSet};

/// Named account rule sets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AccountPreset {
    /// Elite Trader Funding Static: $2,000 static DD, $4,000 target
    EtfStatic,
    /// MyFundedFutures 30K Static Pro: $2,500 static DD, $4,200 target
    MffStaticPro,
    /// MyFundedFutures 30K Static Standard: $1,500 static DD, $2,500 target
    MffStaticStandard,
    /// Elite Trader Funding EOD: $2,000 trailing DD, $1,100 daily loss limit
    EtfEod,
    /// Apex 50K: $2,500 trailing DD that stops trailing at $50,100.
    ///
    /// Apex locks the liquidation threshold at starting balance + $100, so the
    /// floor freezes once the peak reaches $52,600. The Rithmic platform
    /// figure of $53,000 is the profit target, not the threshold lock.
    Apex50k,
}

/// Rules and balances for one preset
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresetSpec {
    pub starting_balance: f64,
    pub profit_target: f64,
    pub max_trades: usize,
    /// Set for presets whose limits reset daily
    pub trades_per_day: Option<usize>,
    pub rules: ConstraintSet,
}

impl AccountPreset {
    pub const ALL: [AccountPreset; 5] = [
        Self::EtfStatic,
        Self::MffStaticPro,
        Self::MffStaticStandard,
        Self::EtfEod,
        Self::Apex50k,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::EtfStatic => "etf-static",
            Self::MffStaticPro => "mff-static-pro",
            Self::MffStaticStandard => "mff-static-standard",
            Self::EtfEod => "etf-eod",
            Self::Apex50k => "apex-50k",
        }
    }

    pub fn spec(&self) -> PresetSpec {
        match self {
            Self::EtfStatic => PresetSpec {
                starting_balance: 50000.0,
                profit_target: 54000.0,
                max_trades: 300,
                trades_per_day: None,
                rules: ConstraintSet::new(vec![ConstraintRule::StaticDrawdown { limit: 2000.0 }]),
            },
            Self::MffStaticPro => PresetSpec {
                starting_balance: 30000.0,
                profit_target: 34200.0,
                max_trades: 300,
                trades_per_day: None,
                rules: ConstraintSet::new(vec![ConstraintRule::StaticDrawdown { limit: 2500.0 }]),
            },
            Self::MffStaticStandard => PresetSpec {
                starting_balance: 30000.0,
                profit_target: 32500.0,
                max_trades: 300,
                trades_per_day: None,
                rules: ConstraintSet::new(vec![ConstraintRule::StaticDrawdown { limit: 1500.0 }]),
            },
            Self::EtfEod => PresetSpec {
                starting_balance: 50000.0,
                profit_target: 53000.0,
                max_trades: 300,
                trades_per_day: Some(1),
                rules: ConstraintSet::new(vec![
                    ConstraintRule::trailing(2000.0),
                    ConstraintRule::DailyLossCap { limit: 1100.0 },
                ]),
            },
            Self::Apex50k => PresetSpec {
                starting_balance: 50000.0,
                profit_target: 53000.0,
                max_trades: 100,
                trades_per_day: None,
                rules: ConstraintSet::new(vec![ConstraintRule::TrailingDrawdown {
                    limit: 2500.0,
                    lock_at: Some(50100.0),
                }]),
            },
        }
    }

    /// Overlay the preset's balances and budget on `base`. Evaluation-style
    /// presets stop at the profit target.
    pub fn apply(&self, base: SimulationConfig) -> (SimulationConfig, ConstraintSet) {
        let spec = self.spec();
        let config = SimulationConfig {
            starting_balance: spec.starting_balance,
            target_balance: Some(spec.profit_target),
            num_trades: spec.max_trades,
            trades_per_day: spec.trades_per_day.or(base.trades_per_day),
            stopping: StoppingPolicy::StopAtTarget,
            ..base
        };
        (config, spec.rules)
    }
}

impl std::fmt::Display for AccountPreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for AccountPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let names: Vec<_> = Self::ALL.iter().map(|p| p.name()).collect();
                format!("unknown preset `{}` (expected one of: {})", s, names.join(", "))
            })
    }
}
