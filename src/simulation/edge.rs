//! Win-rate / payoff arithmetic shared by sizing and reporting

use serde::{Deserialize, Serialize};

/// Statistical edge of a strategy: win probability and fixed payoff magnitudes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Probability of a winning trade (0.0 - 1.0)
    pub win_rate: f64,
    /// Average winning trade in dollars
    pub avg_win: f64,
    /// Average losing trade in dollars (positive magnitude)
    pub avg_loss: f64,
}

impl Edge {
    pub fn new(win_rate: f64, avg_win: f64, avg_loss: f64) -> Self {
        Self {
            win_rate,
            avg_win,
            avg_loss,
        }
    }

    /// Reward/risk ratio (avg_win / avg_loss)
    ///
    /// Callers must have rejected `avg_loss <= 0` beforehand.
    pub fn reward_risk(&self) -> f64 {
        self.avg_win / self.avg_loss
    }

    /// Raw Kelly fraction `p - (1-p)/R`, may be negative
    pub fn raw_kelly(&self) -> f64 {
        self.win_rate - (1.0 - self.win_rate) / self.reward_risk()
    }

    /// Kelly fraction floored at zero
    pub fn kelly_fraction(&self) -> f64 {
        self.raw_kelly().max(0.0)
    }

    /// Kelly percent before any modifier, floored at zero
    pub fn kelly_percent(&self) -> f64 {
        self.kelly_fraction() * 100.0
    }

    /// Expected dollar P&L per trade after a round-turn commission
    pub fn net_expectancy(&self, commission: f64) -> f64 {
        let net_win = self.avg_win - commission;
        let net_loss = self.avg_loss + commission;
        self.win_rate * net_win - (1.0 - self.win_rate) * net_loss
    }

    /// Forward estimate of trades needed to move `distance` dollars at the
    /// net expectancy. `None` when the edge does not make money.
    pub fn estimated_trades_to(&self, distance: f64, commission: f64) -> Option<f64> {
        let expectancy = self.net_expectancy(commission);
        if expectancy > 0.0 {
            Some(distance.max(0.0) / expectancy)
        } else {
            None
        }
    }
}
