//! Single-run simulator: one equity curve from start to termination

use rand::Rng;
use serde::Serialize;

use super::config::{PnlMode, SimulationConfig, StoppingPolicy};
use super::constraints::{AccountState, ConstraintSet, FailureReason};
use super::outcome::{draw, TradeOutcome};
use super::sizing::RiskSizer;

/// Terminal state of one simulated run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunResult {
    pub final_balance: f64,
    /// Highest balance reached, starting balance included
    pub peak: f64,
    /// Lowest balance reached, starting balance included
    pub trough: f64,
    pub max_win_streak: usize,
    pub max_loss_streak: usize,
    /// Set when a constraint breach or ruin halted the run
    pub failure: Option<FailureReason>,
    pub payout_hit: bool,
    /// Trade index of the first payout-target hit
    pub payout_trade: Option<usize>,
    /// Trades taken until the target balance was first reached
    pub trades_to_target: Option<usize>,
    pub trades_executed: usize,
    /// Balance after every trade, starting with the initial balance.
    /// Empty when trajectories are not recorded.
    pub trajectory: Vec<f64>,
}

impl RunResult {
    pub fn failed(&self) -> bool {
        self.failure.is_some()
    }

    pub fn reached_target(&self) -> bool {
        self.trades_to_target.is_some()
    }
}

/// Mutable per-run state
#[derive(Debug)]
struct RunState {
    balance: f64,
    peak: f64,
    trough: f64,
    win_streak: usize,
    loss_streak: usize,
    max_win_streak: usize,
    max_loss_streak: usize,
    day_start_balance: f64,
    trades: usize,
}

impl RunState {
    fn new(starting_balance: f64) -> Self {
        Self {
            balance: starting_balance,
            peak: starting_balance,
            trough: starting_balance,
            win_streak: 0,
            loss_streak: 0,
            max_win_streak: 0,
            max_loss_streak: 0,
            day_start_balance: starting_balance,
            trades: 0,
        }
    }

    fn apply(&mut self, outcome: TradeOutcome, net_pnl: f64) {
        self.balance += net_pnl;
        self.peak = self.peak.max(self.balance);
        self.trough = self.trough.min(self.balance);
        self.trades += 1;

        match outcome {
            TradeOutcome::Win => {
                self.win_streak += 1;
                self.loss_streak = 0;
                self.max_win_streak = self.max_win_streak.max(self.win_streak);
            }
            TradeOutcome::Loss => {
                self.loss_streak += 1;
                self.win_streak = 0;
                self.max_loss_streak = self.max_loss_streak.max(self.loss_streak);
            }
        }
    }
}

/// Composes sizing, outcome draws and constraint checks into equity curves.
///
/// Holds only shared references and resolved values, so one simulator can be
/// used from many threads at once.
#[derive(Debug, Clone, Copy)]
pub struct RunSimulator<'a> {
    config: &'a SimulationConfig,
    sizer: RiskSizer,
    rules: &'a ConstraintSet,
    record_trajectory: bool,
    reward_risk: f64,
}

impl<'a> RunSimulator<'a> {
    pub fn new(
        config: &'a SimulationConfig,
        sizer: RiskSizer,
        rules: &'a ConstraintSet,
        record_trajectory: bool,
    ) -> Self {
        Self {
            config,
            sizer,
            rules,
            record_trajectory,
            reward_risk: config.edge().reward_risk(),
        }
    }

    pub fn sizer(&self) -> &RiskSizer {
        &self.sizer
    }

    /// Signed P&L of a trade before commission
    fn trade_pnl(&self, outcome: TradeOutcome, risk: f64) -> f64 {
        match (self.config.pnl_mode, outcome) {
            (PnlMode::RiskBased, TradeOutcome::Win) => risk * self.reward_risk,
            (PnlMode::RiskBased, TradeOutcome::Loss) => -risk,
            (PnlMode::FixedDollar, TradeOutcome::Win) => self.config.avg_win,
            (PnlMode::FixedDollar, TradeOutcome::Loss) => -self.config.avg_loss,
        }
    }

    /// Simulate one run with the given randomness source
    pub fn run<R: Rng + ?Sized>(&self, rng: &mut R) -> RunResult {
        let cfg = self.config;
        let start = cfg.starting_balance;
        let mut state = RunState::new(start);

        let mut trajectory = Vec::new();
        if self.record_trajectory {
            trajectory.reserve(cfg.num_trades + 1);
            trajectory.push(start);
        }

        let mut failure = None;
        let mut payout_trade = None;
        let mut trades_to_target = match cfg.target_balance {
            Some(target) if start >= target => Some(0),
            _ => None,
        };

        while state.trades < cfg.num_trades {
            if cfg.stopping == StoppingPolicy::StopAtTarget && trades_to_target.is_some() {
                break;
            }
            if let Some(per_day) = cfg.trades_per_day {
                if state.trades > 0 && state.trades % per_day == 0 {
                    state.day_start_balance = state.balance;
                }
            }

            let risk = self.sizer.risk_amount(state.balance, start);
            let outcome = draw(rng, cfg.win_rate);
            let net = self.trade_pnl(outcome, risk) - cfg.commission;
            state.apply(outcome, net);

            if self.record_trajectory {
                trajectory.push(state.balance);
            }

            if trades_to_target.is_none() {
                if let Some(target) = cfg.target_balance {
                    if state.balance >= target {
                        trades_to_target = Some(state.trades);
                    }
                }
            }

            let assessment = self.rules.evaluate(&AccountState {
                balance: state.balance,
                peak: state.peak,
                starting_balance: start,
                daily_loss: state.day_start_balance - state.balance,
            });
            if assessment.payout_hit && payout_trade.is_none() {
                payout_trade = Some(state.trades);
            }

            let breach = assessment
                .breach
                .or((state.balance <= 0.0).then_some(FailureReason::Ruin));
            if breach.is_some() {
                failure = breach;
                break;
            }
        }

        RunResult {
            final_balance: state.balance,
            peak: state.peak,
            trough: state.trough,
            max_win_streak: state.max_win_streak,
            max_loss_streak: state.max_loss_streak,
            failure,
            payout_hit: payout_trade.is_some(),
            payout_trade,
            trades_to_target,
            trades_executed: state.trades,
            trajectory,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::constraints::ConstraintRule;
    use crate::simulation::sizing::RiskPolicy;
    use crate::simulation::presets::AccountPreset;
    use rand::rngs::StdRng;
    use rand::{RngCore, SeedableRng};

    /// Replays a fixed win/loss sequence, cycling when exhausted
    struct Scripted {
        wins: Vec<bool>,
        next: usize,
    }

    impl Scripted {
        fn new(wins: &[bool]) -> Self {
            Self {
                wins: wins.to_vec(),
                next: 0,
            }
        }
    }

    impl RngCore for Scripted {
        fn next_u32(&mut self) -> u32 {
            self.next_u64() as u32
        }

        // 0 maps to a uniform draw of 0.0 (win), MAX to just below 1.0 (loss)
        fn next_u64(&mut self) -> u64 {
            let win = self.wins[self.next % self.wins.len()];
            self.next += 1;
            if win {
                0
            } else {
                u64::MAX
            }
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            for chunk in dest.chunks_mut(8) {
                let bytes = self.next_u64().to_le_bytes();
                chunk.copy_from_slice(&bytes[..chunk.len()]);
            }
        }

        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
            self.fill_bytes(dest);
            Ok(())
        }
    }

    fn config(win_rate: f64, num_trades: usize) -> SimulationConfig {
        SimulationConfig {
            starting_balance: 2000.0,
            num_trades,
            win_rate,
            avg_win: 250.0,
            avg_loss: 125.0,
            target_balance: None,
            ..Default::default()
        }
    }

    fn simulate(cfg: &SimulationConfig, policy: RiskPolicy, rules: &ConstraintSet, seed: u64) -> RunResult {
        let sizer = policy.resolve(cfg).unwrap();
        let mut rng = StdRng::seed_from_u64(seed);
        RunSimulator::new(cfg, sizer, rules, true).run(&mut rng)
    }

    #[test]
    fn test_zero_trades_keeps_balance() {
        let cfg = config(0.5, 0);
        let result = simulate(&cfg, RiskPolicy::FixedOfCurrent { pct: 5.0 }, &ConstraintSet::none(), 1);
        assert_eq!(result.final_balance, 2000.0);
        assert_eq!(result.trajectory, vec![2000.0]);
        assert!(!result.failed());
    }

    #[test]
    fn test_all_losses_decrease_by_fixed_amount() {
        let cfg = config(0.0, 10);
        let result = simulate(&cfg, RiskPolicy::FixedOfStarting { pct: 2.0 }, &ConstraintSet::none(), 3);
        assert_eq!(result.trajectory.len(), 11);
        for pair in result.trajectory.windows(2) {
            assert!((pair[0] - pair[1] - 40.0).abs() < 1e-9);
        }
        assert_eq!(result.max_loss_streak, 10);
        assert_eq!(result.max_win_streak, 0);
        assert_eq!(result.trough, result.final_balance);
    }

    #[test]
    fn test_all_losses_breach_drawdown_deterministically() {
        // 40 per loss, limit 100: shortfall 120 > 100 after the third loss
        let cfg = config(0.0, 10);
        let rules = ConstraintSet::new(vec![ConstraintRule::trailing(100.0)]);
        for seed in 0..5 {
            let result = simulate(&cfg, RiskPolicy::FixedOfStarting { pct: 2.0 }, &rules, seed);
            assert_eq!(result.failure, Some(FailureReason::TrailingDrawdown));
            assert_eq!(result.trades_executed, 3);
            assert_eq!(result.trajectory.len(), 4);
        }
    }

    #[test]
    fn test_all_wins_never_breach() {
        let cfg = config(1.0, 25);
        let rules = ConstraintSet::new(vec![
            ConstraintRule::trailing(0.0),
            ConstraintRule::StaticDrawdown { limit: 0.0 },
        ]);
        let result = simulate(&cfg, RiskPolicy::FixedOfCurrent { pct: 3.0 }, &rules, 9);
        assert!(!result.failed());
        for pair in result.trajectory.windows(2) {
            assert!(pair[1] > pair[0]);
        }
        assert_eq!(result.peak, result.final_balance);
        assert_eq!(result.trough, 2000.0);
        assert_eq!(result.max_win_streak, 25);
    }

    #[test]
    fn test_risk_based_win_pays_reward_risk() {
        let cfg = config(1.0, 1);
        let result = simulate(&cfg, RiskPolicy::FixedOfStarting { pct: 1.0 }, &ConstraintSet::none(), 0);
        // risk 20 * RR 2
        assert_eq!(result.final_balance, 2040.0);
    }

    #[test]
    fn test_fixed_dollar_mode_with_commission() {
        let mut cfg = config(0.0, 2);
        cfg.pnl_mode = PnlMode::FixedDollar;
        cfg.commission = 4.0;
        let result = simulate(&cfg, RiskPolicy::FixedOfStarting { pct: 0.0 }, &ConstraintSet::none(), 0);
        assert_eq!(result.trajectory, vec![2000.0, 1871.0, 1742.0]);
    }

    #[test]
    fn test_ruin_halts_run() {
        let mut cfg = config(0.0, 100);
        cfg.pnl_mode = PnlMode::FixedDollar;
        let result = simulate(&cfg, RiskPolicy::FullKelly, &ConstraintSet::none(), 0);
        assert_eq!(result.failure, Some(FailureReason::Ruin));
        // 2000 / 125 = 16 losses to reach exactly zero
        assert_eq!(result.trades_executed, 16);
        assert_eq!(result.final_balance, 0.0);
    }

    #[test]
    fn test_daily_loss_cap_resets_each_day() {
        let mut cfg = config(0.0, 6);
        cfg.pnl_mode = PnlMode::FixedDollar;
        cfg.trades_per_day = Some(2);
        // Two losses a day = 250, under the cap
        let rules = ConstraintSet::new(vec![ConstraintRule::DailyLossCap { limit: 260.0 }]);
        let result = simulate(&cfg, RiskPolicy::FullKelly, &rules, 0);
        assert!(!result.failed());

        cfg.trades_per_day = Some(3);
        let result = simulate(&cfg, RiskPolicy::FullKelly, &rules, 0);
        assert_eq!(result.failure, Some(FailureReason::DailyLossCap));
        assert_eq!(result.trades_executed, 3);
    }

    #[test]
    fn test_stop_at_target() {
        let mut cfg = config(1.0, 50);
        cfg.pnl_mode = PnlMode::FixedDollar;
        cfg.target_balance = Some(3000.0);

        let full = simulate(&cfg, RiskPolicy::FullKelly, &ConstraintSet::none(), 0);
        assert_eq!(full.trades_to_target, Some(4));
        assert_eq!(full.trades_executed, 50);

        cfg.stopping = StoppingPolicy::StopAtTarget;
        let stopped = simulate(&cfg, RiskPolicy::FullKelly, &ConstraintSet::none(), 0);
        assert_eq!(stopped.trades_to_target, Some(4));
        assert_eq!(stopped.trades_executed, 4);
        assert_eq!(stopped.final_balance, 3000.0);
    }

    #[test]
    fn test_payout_is_not_terminal() {
        let mut cfg = config(1.0, 10);
        cfg.pnl_mode = PnlMode::FixedDollar;
        let rules = ConstraintSet::new(vec![ConstraintRule::PayoutTarget { amount: 2500.0 }]);
        let result = simulate(&cfg, RiskPolicy::FullKelly, &rules, 0);
        assert!(result.payout_hit);
        assert_eq!(result.payout_trade, Some(2));
        assert_eq!(result.trades_executed, 10);
    }

    #[test]
    fn test_trajectory_within_peak_and_trough() {
        let cfg = config(0.45, 200);
        for seed in 0..20 {
            let result = simulate(&cfg, RiskPolicy::FixedOfCurrent { pct: 4.0 }, &ConstraintSet::none(), seed);
            assert_eq!(result.trajectory.len(), result.trades_executed + 1);
            for &b in &result.trajectory {
                assert!(result.trough <= b && b <= result.peak);
            }
        }
    }

    #[test]
    fn test_fixed_of_current_resizes_every_trade() {
        let cfg = config(0.0, 5);
        let result = simulate(&cfg, RiskPolicy::FixedOfCurrent { pct: 10.0 }, &ConstraintSet::none(), 2);
        let expected = [2000.0, 1800.0, 1620.0, 1458.0, 1312.2, 1180.98];
        assert_eq!(result.trajectory.len(), expected.len());
        for (got, want) in result.trajectory.iter().zip(expected) {
            assert!((got - want).abs() < 1e-9, "{} vs {}", got, want);
        }
        let steps: Vec<f64> = result.trajectory.windows(2).map(|w| w[0] - w[1]).collect();
        for pair in steps.windows(2) {
            assert!((pair[1] / pair[0] - 0.9).abs() < 1e-9);
        }
    }

    fn apex_config() -> (SimulationConfig, ConstraintSet) {
        let base = SimulationConfig {
            pnl_mode: PnlMode::FixedDollar,
            win_rate: 0.5,
            avg_win: 2700.0,
            avg_loss: 2600.0,
            ..Default::default()
        };
        AccountPreset::Apex50k.apply(base)
    }

    fn scripted_run(cfg: &SimulationConfig, rules: &ConstraintSet, wins: &[bool]) -> RunResult {
        let sizer = RiskPolicy::FullKelly.resolve(cfg).unwrap();
        RunSimulator::new(cfg, sizer, rules, true).run(&mut Scripted::new(wins))
    }

    #[test]
    fn test_apex_locked_floor_survives_deep_pullback() {
        let (cfg, rules) = apex_config();
        // Peak 52700, then a 2600 pullback to 50100: past the 2500 trail, not below the lock
        let result = scripted_run(&cfg, &rules, &[true, false, true, true]);
        assert!(!result.failed());
        assert_eq!(result.trajectory, vec![50000.0, 52700.0, 50100.0, 52800.0, 55500.0]);
        assert_eq!(result.trades_to_target, Some(4));
        assert_eq!(result.trades_executed, 4);
        assert_eq!(result.final_balance, 55500.0);

        let unlocked = ConstraintSet::new(vec![ConstraintRule::trailing(2500.0)]);
        let result = scripted_run(&cfg, &unlocked, &[true, false, true, true]);
        assert_eq!(result.failure, Some(FailureReason::TrailingDrawdown));
        assert_eq!(result.trades_executed, 2);
    }

    #[test]
    fn test_apex_fails_below_lock() {
        let (cfg, rules) = apex_config();
        let result = scripted_run(&cfg, &rules, &[true, false, false]);
        assert_eq!(result.failure, Some(FailureReason::TrailingDrawdown));
        assert_eq!(result.trades_executed, 3);
        assert_eq!(result.final_balance, 47500.0);
    }
}
