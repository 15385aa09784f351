//! Risk sizing policies
//!
//! A [`RiskPolicy`] is resolved once per run request into a [`RiskSizer`],
//! a pure function from (current, starting) balance to dollars at risk.

use serde::{Deserialize, Serialize};

use super::config::SimulationConfig;
use super::edge::Edge;
use crate::error::{SimError, SimResult};

/// Which balance a risk percentage applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskBasis {
    /// Fixed fraction of the starting balance, constant across the run
    Starting,
    /// Fraction of the current balance, recomputed after every trade
    #[default]
    Current,
}

impl std::fmt::Display for RiskBasis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Starting => write!(f, "starting"),
            Self::Current => write!(f, "current"),
        }
    }
}

/// Risk-per-trade policy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RiskPolicy {
    FixedOfStarting { pct: f64 },
    /// Dynamic / compounding risk
    FixedOfCurrent { pct: f64 },
    FullKelly,
    HalfKelly,
    /// Kelly scaled by a user modifier in [0, 1]
    FractionalKelly { modifier: f64 },
    /// Kelly scaled by `fraction`, then clamped to [floor, cap] percent
    CappedKelly { fraction: f64, floor: f64, cap: f64 },
    PresetPercent { pct: f64 },
}

impl RiskPolicy {
    pub fn fixed(basis: RiskBasis, pct: f64) -> Self {
        match basis {
            RiskBasis::Starting => Self::FixedOfStarting { pct },
            RiskBasis::Current => Self::FixedOfCurrent { pct },
        }
    }

    /// Quarter Kelly kept between 0.5% and 2%
    pub fn prop_firm_safe() -> Self {
        Self::CappedKelly {
            fraction: 0.25,
            floor: 0.5,
            cap: 2.0,
        }
    }

    /// Risk percent for this policy given the strategy edge, floored at 0
    pub fn percent(&self, edge: &Edge) -> f64 {
        let kelly = || edge.raw_kelly() * 100.0;
        let pct = match *self {
            Self::FixedOfStarting { pct } | Self::FixedOfCurrent { pct } | Self::PresetPercent { pct } => pct,
            Self::FullKelly => kelly(),
            Self::HalfKelly => kelly() * 0.5,
            Self::FractionalKelly { modifier } => kelly() * modifier,
            Self::CappedKelly { fraction, floor, cap } => (kelly() * fraction).clamp(floor, cap),
        };
        pct.max(0.0)
    }

    /// Balance the percent is applied to. Fixed policies carry their own basis,
    /// the rest follow the config's compounding flag.
    pub fn basis(&self, compounding: bool) -> RiskBasis {
        match self {
            Self::FixedOfStarting { .. } => RiskBasis::Starting,
            Self::FixedOfCurrent { .. } => RiskBasis::Current,
            _ if compounding => RiskBasis::Current,
            _ => RiskBasis::Starting,
        }
    }

    fn check(&self) -> SimResult<()> {
        match *self {
            Self::FixedOfStarting { pct } | Self::FixedOfCurrent { pct } | Self::PresetPercent { pct } => {
                if !(pct.is_finite() && pct >= 0.0) {
                    return Err(SimError::invalid("risk_pct", format!("must be non-negative, got {}", pct)));
                }
            }
            Self::FractionalKelly { modifier } => {
                if !(0.0..=1.0).contains(&modifier) {
                    return Err(SimError::invalid(
                        "kelly_modifier",
                        format!("must be within [0, 1], got {}", modifier),
                    ));
                }
            }
            Self::CappedKelly { fraction, floor, cap } => {
                if !(fraction.is_finite() && fraction >= 0.0) {
                    return Err(SimError::invalid("kelly_fraction", format!("must be non-negative, got {}", fraction)));
                }
                if !(floor >= 0.0 && floor <= cap) {
                    return Err(SimError::invalid(
                        "kelly_cap",
                        format!("floor {} must be non-negative and not above cap {}", floor, cap),
                    ));
                }
            }
            Self::FullKelly | Self::HalfKelly => {}
        }
        Ok(())
    }

    /// Resolve into a sizing function for the given configuration
    pub fn resolve(&self, config: &SimulationConfig) -> SimResult<RiskSizer> {
        self.check()?;
        Ok(RiskSizer {
            pct: self.percent(&config.edge()),
            basis: self.basis(config.compounding),
            commission_deduction: if config.commission_in_risk {
                config.commission
            } else {
                0.0
            },
        })
    }
}

impl std::fmt::Display for RiskPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FixedOfStarting { pct } => write!(f, "Fixed {:.2}% of starting", pct),
            Self::FixedOfCurrent { pct } => write!(f, "Fixed {:.2}% of current", pct),
            Self::FullKelly => write!(f, "Full Kelly"),
            Self::HalfKelly => write!(f, "Half Kelly"),
            Self::FractionalKelly { modifier } => write!(f, "Kelly x{:.2}", modifier),
            Self::CappedKelly { fraction, floor, cap } => {
                write!(f, "Kelly x{:.2} capped [{:.2}%, {:.2}%]", fraction, floor, cap)
            }
            Self::PresetPercent { pct } => write!(f, "{:.2}% preset", pct),
        }
    }
}

/// Resolved sizing rule
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiskSizer {
    /// Risk percent per trade
    pub pct: f64,
    pub basis: RiskBasis,
    /// Commission carved out of the risk budget (0 when not applied)
    pub commission_deduction: f64,
}

impl RiskSizer {
    /// Gross dollars at risk on the next trade
    pub fn gross_risk(&self, current_balance: f64, starting_balance: f64) -> f64 {
        let equity = match self.basis {
            RiskBasis::Starting => starting_balance,
            RiskBasis::Current => current_balance,
        };
        (equity * self.pct / 100.0).max(0.0)
    }

    /// Dollars at risk after any commission deduction, never negative
    pub fn risk_amount(&self, current_balance: f64, starting_balance: f64) -> f64 {
        (self.gross_risk(current_balance, starting_balance) - self.commission_deduction).max(0.0)
    }
}

/// Dollars at risk for `policy` at the given balances
pub fn risk_amount(
    policy: &RiskPolicy,
    config: &SimulationConfig,
    current_balance: f64,
    starting_balance: f64,
) -> SimResult<f64> {
    Ok(policy
        .resolve(config)?
        .risk_amount(current_balance, starting_balance))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SimulationConfig {
        SimulationConfig {
            starting_balance: 2000.0,
            win_rate: 0.5,
            avg_win: 250.0,
            avg_loss: 125.0,
            commission: 4.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_kelly_variants() {
        let edge = config().edge();
        assert!((RiskPolicy::FullKelly.percent(&edge) - 25.0).abs() < 1e-9);
        assert!((RiskPolicy::HalfKelly.percent(&edge) - 12.5).abs() < 1e-9);
        assert!((RiskPolicy::FractionalKelly { modifier: 0.2 }.percent(&edge) - 5.0).abs() < 1e-9);
        // 25 * 0.25 = 6.25, capped at 2
        assert_eq!(RiskPolicy::prop_firm_safe().percent(&edge), 2.0);
    }

    #[test]
    fn test_negative_kelly_floors() {
        let edge = Edge::new(0.2, 100.0, 100.0);
        assert_eq!(RiskPolicy::FullKelly.percent(&edge), 0.0);
        assert_eq!(RiskPolicy::HalfKelly.percent(&edge), 0.0);
        // Safe mode keeps its floor even without an edge
        assert_eq!(RiskPolicy::prop_firm_safe().percent(&edge), 0.5);
    }

    #[test]
    fn test_fixed_of_starting_is_constant() {
        let sizer = RiskPolicy::FixedOfStarting { pct: 2.0 }.resolve(&config()).unwrap();
        assert_eq!(sizer.risk_amount(2000.0, 2000.0), 40.0);
        assert_eq!(sizer.risk_amount(3500.0, 2000.0), 40.0);
    }

    #[test]
    fn test_fixed_of_current_compounds() {
        let sizer = RiskPolicy::FixedOfCurrent { pct: 2.0 }.resolve(&config()).unwrap();
        assert_eq!(sizer.risk_amount(2000.0, 2000.0), 40.0);
        assert_eq!(sizer.risk_amount(3000.0, 2000.0), 60.0);
    }

    #[test]
    fn test_compounding_flag_moves_kelly_basis() {
        let mut cfg = config();
        let fixed = RiskPolicy::HalfKelly.resolve(&cfg).unwrap();
        assert_eq!(fixed.basis, RiskBasis::Starting);

        cfg.compounding = true;
        let dynamic = RiskPolicy::HalfKelly.resolve(&cfg).unwrap();
        assert_eq!(dynamic.basis, RiskBasis::Current);
        assert!((dynamic.risk_amount(4000.0, 2000.0) - 500.0).abs() < 1e-9);
    }

    #[test]
    fn test_commission_in_risk() {
        let mut cfg = config();
        cfg.commission_in_risk = true;
        let amount = risk_amount(&RiskPolicy::PresetPercent { pct: 1.0 }, &cfg, 2000.0, 2000.0).unwrap();
        assert_eq!(amount, 16.0);

        let tiny = risk_amount(&RiskPolicy::PresetPercent { pct: 0.1 }, &cfg, 2000.0, 2000.0).unwrap();
        assert_eq!(tiny, 0.0);
    }

    #[test]
    fn test_invalid_policies_rejected() {
        let cfg = config();
        assert!(RiskPolicy::FixedOfCurrent { pct: -1.0 }.resolve(&cfg).is_err());
        assert!(RiskPolicy::FractionalKelly { modifier: 1.5 }.resolve(&cfg).is_err());
        assert!(RiskPolicy::CappedKelly { fraction: 1.0, floor: 3.0, cap: 2.0 }
            .resolve(&cfg)
            .is_err());
    }
}
