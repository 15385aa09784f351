//! Trade outcome generator

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Result of a single atomic trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeOutcome {
    Win,
    Loss,
}

impl TradeOutcome {
    pub fn is_win(self) -> bool {
        matches!(self, Self::Win)
    }
}

/// Draw one Bernoulli outcome. Win iff a uniform [0, 1) draw is strictly below
/// `win_probability`, so 0.0 never wins and 1.0 always does.
pub fn draw<R: Rng + ?Sized>(rng: &mut R, win_probability: f64) -> TradeOutcome {
    if rng.gen::<f64>() < win_probability {
        TradeOutcome::Win
    } else {
        TradeOutcome::Loss
    }
}
