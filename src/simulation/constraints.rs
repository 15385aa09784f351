//! Account constraint rules (drawdown, daily loss, payout)
//!
//! Rules are checked after every trade. Any breach fails the run and halts it;
//! a payout hit is recorded but never halts.

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

/// Why a run failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Balance reached zero or below
    Ruin,
    TrailingDrawdown,
    StaticDrawdown,
    DailyLossCap,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ruin => write!(f, "ruin"),
            Self::TrailingDrawdown => write!(f, "trailing drawdown"),
            Self::StaticDrawdown => write!(f, "static drawdown"),
            Self::DailyLossCap => write!(f, "daily loss cap"),
        }
    }
}

/// A single account rule. Breaches compare strictly greater than the limit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConstraintRule {
    None,
    /// Shortfall below the running peak. With `lock_at`, the failure floor
    /// `peak - limit` stops trailing once it reaches that balance.
    TrailingDrawdown {
        limit: f64,
        #[serde(default)]
        lock_at: Option<f64>,
    },
    /// Funded-account style shortfall below the starting balance
    StaticDrawdown { limit: f64 },
    /// Loss accumulated since the last daily reset
    DailyLossCap { limit: f64 },
    /// Non-terminal payout milestone
    PayoutTarget { amount: f64 },
}

/// Outcome of checking one rule after a trade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Continue,
    Failed(FailureReason),
    PayoutHit,
}

/// Account state the rules are checked against
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccountState {
    pub balance: f64,
    pub peak: f64,
    pub starting_balance: f64,
    /// Loss since the last daily reset (positive = money lost)
    pub daily_loss: f64,
}

impl ConstraintRule {
    pub fn trailing(limit: f64) -> Self {
        Self::TrailingDrawdown {
            limit,
            lock_at: None,
        }
    }

    fn check(&self) -> SimResult<()> {
        let (name, value) = match *self {
            Self::None => return Ok(()),
            Self::TrailingDrawdown { limit, .. } => ("trailing_drawdown", limit),
            Self::StaticDrawdown { limit } => ("static_drawdown", limit),
            Self::DailyLossCap { limit } => ("daily_loss_cap", limit),
            Self::PayoutTarget { amount } => ("payout_target", amount),
        };
        if !(value.is_finite() && value >= 0.0) {
            return Err(SimError::invalid(name, format!("must be non-negative, got {}", value)));
        }
        Ok(())
    }
}

/// Check one rule against the account state
pub fn evaluate(rule: &ConstraintRule, state: &AccountState) -> Verdict {
    match *rule {
        ConstraintRule::None => Verdict::Continue,
        ConstraintRule::TrailingDrawdown { limit, lock_at } => {
            let trailed = (state.peak - state.balance) > limit;
            let below_lock = lock_at.map_or(true, |lock| state.balance < lock);
            if trailed && below_lock {
                Verdict::Failed(FailureReason::TrailingDrawdown)
            } else {
                Verdict::Continue
            }
        }
        ConstraintRule::StaticDrawdown { limit } => {
            if (state.starting_balance - state.balance) > limit {
                Verdict::Failed(FailureReason::StaticDrawdown)
            } else {
                Verdict::Continue
            }
        }
        ConstraintRule::DailyLossCap { limit } => {
            if state.daily_loss > limit {
                Verdict::Failed(FailureReason::DailyLossCap)
            } else {
                Verdict::Continue
            }
        }
        ConstraintRule::PayoutTarget { amount } => {
            if state.balance >= amount {
                Verdict::PayoutHit
            } else {
                Verdict::Continue
            }
        }
    }
}

/// Combined result of every active rule for one trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Assessment {
    /// First breached rule, in rule order
    pub breach: Option<FailureReason>,
    pub payout_hit: bool,
}

/// The set of rules active for a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConstraintSet {
    rules: Vec<ConstraintRule>,
}

impl ConstraintSet {
    pub fn new(rules: Vec<ConstraintRule>) -> Self {
        Self { rules }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn with(mut self, rule: ConstraintRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[ConstraintRule] {
        &self.rules
    }

    /// True when no rule other than `None` is configured
    pub fn is_unconstrained(&self) -> bool {
        self.rules.iter().all(|r| matches!(r, ConstraintRule::None))
    }

    /// True when a rule needs a daily reset boundary
    pub fn has_daily_cap(&self) -> bool {
        self.rules
            .iter()
            .any(|r| matches!(r, ConstraintRule::DailyLossCap { .. }))
    }

    pub fn validate(&self) -> SimResult<()> {
        self.rules.iter().try_for_each(ConstraintRule::check)
    }

    /// Evaluate all rules. Every rule is checked, payout is independent of breach.
    pub fn evaluate(&self, state: &AccountState) -> Assessment {
        let mut assessment = Assessment::default();
        for rule in &self.rules {
            match evaluate(rule, state) {
                Verdict::Continue => {}
                Verdict::Failed(reason) => {
                    assessment.breach.get_or_insert(reason);
                }
                Verdict::PayoutHit => assessment.payout_hit = true,
            }
        }
        assessment
    }
}

impl FromIterator<ConstraintRule> for ConstraintSet {
    fn from_iter<I: IntoIterator<Item = ConstraintRule>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Prop firm account phase, mapping one drawdown limit to a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropFirmMode {
    #[default]
    None,
    /// Evaluation phase: drawdown trails the peak
    Evaluation,
    /// Funded phase: drawdown measured from the starting balance
    Funded,
}

impl PropFirmMode {
    pub fn rule(self, drawdown_limit: f64) -> ConstraintRule {
        match self {
            Self::None => ConstraintRule::None,
            Self::Evaluation => ConstraintRule::trailing(drawdown_limit),
            Self::Funded => ConstraintRule::StaticDrawdown {
                limit: drawdown_limit,
            },
        }
    }
}

impl std::fmt::Display for PropFirmMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Evaluation => write!(f, "Evaluation"),
            Self::Funded => write!(f, "Funded"),
        }
    }
}
