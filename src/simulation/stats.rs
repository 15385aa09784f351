//! Distribution statistics over run results

use serde::Serialize;

use super::config::FailedRunPolicy;
use super::run::RunResult;

/// Median of an ascending-sorted slice, averaging the middle pair for even lengths
pub fn median_sorted(sorted: &[f64]) -> Option<f64> {
    let n = sorted.len();
    if n == 0 {
        return None;
    }
    Some(if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    })
}

/// Nearest-rank percentile (0-100) of an ascending-sorted slice
pub fn percentile_sorted(sorted: &[f64], pct: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let idx = ((sorted.len() as f64 * pct / 100.0) as usize).min(sorted.len() - 1);
    Some(sorted[idx])
}

pub(crate) fn sorted(values: impl IntoIterator<Item = f64>) -> Vec<f64> {
    let mut v: Vec<f64> = values.into_iter().collect();
    v.sort_by(|a, b| a.total_cmp(b));
    v
}

/// Summary of final balances across runs.
///
/// Balance statistics cover the sample population chosen by the
/// [`FailedRunPolicy`]. With no samples they are 0 and `samples == 0`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub runs: usize,
    /// Runs feeding the balance statistics
    pub samples: usize,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub failures: usize,
    /// Runs that crossed the target balance at some point
    pub reached_target: usize,
    pub avg_trades_to_target: Option<f64>,
    #[serde(skip)]
    sorted_finals: Vec<f64>,
}

impl Summary {
    /// False when mean/median/min/max are sentinels
    pub fn has_samples(&self) -> bool {
        self.samples > 0
    }

    /// Percent of sampled runs finishing strictly above `threshold`
    pub fn pct_above(&self, threshold: f64) -> f64 {
        self.pct_where(|b| b > threshold)
    }

    /// Percent of sampled runs finishing strictly below `threshold`
    pub fn pct_below(&self, threshold: f64) -> f64 {
        self.pct_where(|b| b < threshold)
    }

    fn pct_where(&self, pred: impl Fn(f64) -> bool) -> f64 {
        if self.samples == 0 {
            return 0.0;
        }
        let n = self.sorted_finals.iter().filter(|&&b| pred(b)).count();
        n as f64 / self.samples as f64 * 100.0
    }

    pub fn failure_rate(&self) -> f64 {
        if self.runs == 0 {
            0.0
        } else {
            self.failures as f64 / self.runs as f64
        }
    }

    pub fn target_rate(&self) -> f64 {
        if self.runs == 0 {
            0.0
        } else {
            self.reached_target as f64 / self.runs as f64
        }
    }

    pub fn avg_days_to_target(&self, trades_per_day: usize) -> Option<f64> {
        self.avg_trades_to_target
            .map(|t| t / trades_per_day.max(1) as f64)
    }

    pub fn percentile(&self, pct: f64) -> Option<f64> {
        percentile_sorted(&self.sorted_finals, pct)
    }
}

/// Summarize the final balances of `results`. Failed runs only feed the
/// failure count unless `failed_runs` is [`FailedRunPolicy::Include`].
pub fn summarize(results: &[RunResult], failed_runs: FailedRunPolicy) -> Summary {
    let include_failed = failed_runs == FailedRunPolicy::Include;
    let finals = sorted(
        results
            .iter()
            .filter(|r| include_failed || !r.failed())
            .map(|r| r.final_balance),
    );
    let samples = finals.len();

    let to_target: Vec<usize> = results.iter().filter_map(|r| r.trades_to_target).collect();
    let avg_trades_to_target = if to_target.is_empty() {
        None
    } else {
        Some(to_target.iter().sum::<usize>() as f64 / to_target.len() as f64)
    };

    Summary {
        runs: results.len(),
        samples,
        mean: if samples == 0 {
            0.0
        } else {
            finals.iter().sum::<f64>() / samples as f64
        },
        median: median_sorted(&finals).unwrap_or(0.0),
        min: finals.first().copied().unwrap_or(0.0),
        max: finals.last().copied().unwrap_or(0.0),
        failures: results.iter().filter(|r| r.failed()).count(),
        reached_target: to_target.len(),
        avg_trades_to_target,
        sorted_finals: finals,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::constraints::FailureReason;

    fn result(final_balance: f64, failure: Option<FailureReason>, to_target: Option<usize>) -> RunResult {
        RunResult {
            final_balance,
            peak: final_balance.max(2000.0),
            trough: final_balance.min(2000.0),
            max_win_streak: 0,
            max_loss_streak: 0,
            failure,
            payout_hit: false,
            payout_trade: None,
            trades_to_target: to_target,
            trades_executed: 0,
            trajectory: Vec::new(),
        }
    }

    #[test]
    fn test_median_even_and_odd() {
        assert_eq!(median_sorted(&[1.0, 2.0, 3.0]), Some(2.0));
        assert_eq!(median_sorted(&[1.0, 2.0, 3.0, 10.0]), Some(2.5));
        assert_eq!(median_sorted(&[]), None);
    }

    fn mixed() -> Vec<RunResult> {
        vec![
            result(1000.0, Some(FailureReason::StaticDrawdown), None),
            result(6000.0, None, Some(10)),
            result(3000.0, None, None),
            result(5000.0, None, Some(20)),
        ]
    }

    #[test]
    fn test_summarize_excludes_failed_runs() {
        let s = summarize(&mixed(), FailedRunPolicy::Exclude);
        assert_eq!(s.runs, 4);
        assert_eq!(s.samples, 3);
        assert!((s.mean - 14000.0 / 3.0).abs() < 1e-9);
        assert_eq!(s.median, 5000.0);
        assert_eq!(s.min, 3000.0);
        assert_eq!(s.max, 6000.0);
        assert_eq!(s.failures, 1);
        assert_eq!(s.reached_target, 2);
        assert_eq!(s.avg_trades_to_target, Some(15.0));
        assert_eq!(s.avg_days_to_target(5), Some(3.0));
        assert!((s.pct_above(5000.0) - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(s.pct_below(2000.0), 0.0);
        assert_eq!(s.failure_rate(), 0.25);
    }

    #[test]
    fn test_summarize_includes_failed_runs_on_request() {
        let s = summarize(&mixed(), FailedRunPolicy::Include);
        assert_eq!(s.samples, 4);
        assert_eq!(s.mean, 3750.0);
        assert_eq!(s.median, 4000.0);
        assert_eq!(s.min, 1000.0);
        assert_eq!(s.pct_above(5000.0), 25.0);
        assert_eq!(s.pct_below(2000.0), 25.0);
        assert_eq!(s.failures, 1);
    }

    #[test]
    fn test_all_failed_runs_leave_no_samples() {
        let results: Vec<RunResult> = (0..5)
            .map(|_| result(1880.0, Some(FailureReason::StaticDrawdown), None))
            .collect();
        let s = summarize(&results, FailedRunPolicy::Exclude);
        assert_eq!(s.runs, 5);
        assert!(!s.has_samples());
        assert_eq!(s.median, 0.0);
        assert_eq!(s.min, 0.0);
        assert_eq!(s.mean, 0.0);
        assert_eq!(s.failure_rate(), 1.0);
        assert!(s.percentile(5.0).is_none());
    }

    #[test]
    fn test_summarize_empty() {
        let s = summarize(&[], FailedRunPolicy::Exclude);
        assert_eq!(s.runs, 0);
        assert_eq!(s.median, 0.0);
        assert_eq!(s.pct_above(0.0), 0.0);
        assert!(s.avg_trades_to_target.is_none());
    }

    #[test]
    fn test_summarize_is_idempotent() {
        let results = vec![result(2500.0, None, None), result(1500.0, None, None)];
        assert_eq!(
            summarize(&results, FailedRunPolicy::Exclude),
            summarize(&results, FailedRunPolicy::Exclude)
        );
    }

    #[test]
    fn test_percentile() {
        let results: Vec<RunResult> = (1..=100).map(|i| result(i as f64, None, None)).collect();
        let s = summarize(&results, FailedRunPolicy::Exclude);
        assert_eq!(s.percentile(5.0), Some(6.0));
        assert_eq!(s.percentile(100.0), Some(100.0));
    }
}
