//! Console tables, sizing recommendation and file export for the CLI

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::simulation::{
    ConstraintSet, Edge, RiskPolicy, RiskSizer, Selection, SimulationConfig, Summary, SweepPoint,
};

/// Position sizing derived from a chosen risk percent
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub risk_pct: f64,
    /// Dollars at risk on the first trade
    pub risk_dollars: f64,
    /// Micro contracts at the given tick value
    pub micros: f64,
    /// Mini contracts (10 micros)
    pub minis: f64,
    pub target_hit_pct: f64,
    pub failure_pct: f64,
}

impl Recommendation {
    fn new(risk_pct: f64, risk_dollars: f64, tick_value: f64, target_hit_pct: f64, failure_pct: f64) -> Self {
        let micros = if tick_value > 0.0 {
            risk_dollars / tick_value
        } else {
            0.0
        };
        Self {
            risk_pct,
            risk_dollars,
            micros,
            minis: micros / 10.0,
            target_hit_pct,
            failure_pct,
        }
    }

    pub fn from_selection(selection: &Selection<'_>, config: &SimulationConfig, tick_value: f64) -> Self {
        let point = selection.point;
        Self::new(
            point.risk_pct,
            config.starting_balance * point.risk_pct / 100.0,
            tick_value,
            point.target_hit_rate() * 100.0,
            point.failure_rate() * 100.0,
        )
    }

    pub fn from_summary(sizer: &RiskSizer, config: &SimulationConfig, summary: &Summary, tick_value: f64) -> Self {
        let start = config.starting_balance;
        Self::new(
            sizer.pct,
            sizer.risk_amount(start, start),
            tick_value,
            summary.target_rate() * 100.0,
            summary.failure_rate() * 100.0,
        )
    }
}

fn banner(title: &str) {
    println!("\n{}", "=".repeat(70));
    println!("{}", title);
    println!("{}", "=".repeat(70));
}

pub fn print_config(config: &SimulationConfig, rules: &ConstraintSet) {
    banner("SIMULATION SETTINGS");
    println!("Starting Balance: ${:.2}", config.starting_balance);
    println!(
        "Win Rate: {:.1}% | Avg Win: ${:.2} | Avg Loss: ${:.2} | R:R {:.2}",
        config.win_rate * 100.0,
        config.avg_win,
        config.avg_loss,
        config.edge().reward_risk()
    );
    println!("Commission: ${:.2} per trade", config.commission);
    match config.trades_per_day {
        Some(per_day) => println!(
            "Trades: {} ({} per day, {} days)",
            config.num_trades,
            per_day,
            config.num_trades / per_day.max(1)
        ),
        None => println!("Trades: {}", config.num_trades),
    }
    if let Some(target) = config.target_balance {
        println!("Target Balance: ${:.2}", target);
    }
    println!("P&L Mode: {} | Simulations: {}", config.pnl_mode, config.simulations);
    if rules.is_unconstrained() {
        println!("Rules: none");
    } else {
        for rule in rules.rules() {
            println!("Rule: {:?}", rule);
        }
    }
}

pub fn print_sweep_table(points: &[SweepPoint]) {
    banner("OPTIMIZATION TABLE");
    println!(
        "  {:>7} {:>14} {:>14} {:>8} {:>8} {:>8}",
        "Risk %", "Median Final", "Worst Final", "Targets", "Payouts", "Failed"
    );
    println!("  {}", "-".repeat(64));
    for p in points {
        if p.has_samples() {
            println!(
                "  {:>6.2}% {:>14.2} {:>14.2} {:>8} {:>8} {:>8}",
                p.risk_pct, p.median_final, p.worst_final, p.target_hits, p.payout_hits, p.fail_count
            );
        } else {
            println!(
                "  {:>6.2}% {:>14} {:>14} {:>8} {:>8} {:>8}",
                p.risk_pct, "no survivors", "-", p.target_hits, p.payout_hits, p.fail_count
            );
        }
    }
}

pub fn print_recommendation(rec: &Recommendation, tick_value: f64, show_failure: bool) {
    banner("RECOMMENDED POSITION SIZING");
    println!("  Optimal Risk %:   {:.2}%", rec.risk_pct);
    println!("  Risk Per Trade:   ${:.2}", rec.risk_dollars);
    println!(
        "  Contracts (${:.2}/tick): {:.0} micros or {:.1} minis",
        tick_value, rec.micros, rec.minis
    );
    println!("  % Chance of Reaching Target: {:.2}%", rec.target_hit_pct);
    if show_failure {
        println!("  % Risk of Failure:           {:.2}%", rec.failure_pct);
    }
}

pub fn print_summary(policy: &RiskPolicy, config: &SimulationConfig, summary: &Summary) {
    banner(&format!(
        "SIMULATION RESULTS: {} ({} runs, {} in stats)",
        policy, summary.runs, summary.samples
    ));
    if summary.has_samples() {
        println!("  Mean Final Balance:   ${:.2}", summary.mean);
        println!("  Median Final Balance: ${:.2}", summary.median);
        println!("  Max Final Balance:    ${:.2}", summary.max);
        println!("  Min Final Balance:    ${:.2}", summary.min);
        if let Some(p5) = summary.percentile(5.0) {
            println!("  5th Percentile:       ${:.2}", p5);
        }
        println!(
            "  % Below Starting:     {:.2}%",
            summary.pct_below(config.starting_balance)
        );
    } else {
        println!("  No surviving runs, final balance statistics unavailable");
    }
    if let Some(target) = config.target_balance {
        if summary.has_samples() {
            println!("  % Above ${:.0}:  {:.2}%", target, summary.pct_above(target));
        }
        println!(
            "  % Reached Target:     {:.2}%",
            summary.target_rate() * 100.0
        );
    }
    println!("  % Failed / Ruined:    {:.2}%", summary.failure_rate() * 100.0);

    if let Some(avg) = summary.avg_trades_to_target {
        match config.trades_per_day {
            Some(per_day) => println!(
                "  Avg Trades to Target: {:.1} (~{:.1} days)",
                avg,
                summary.avg_days_to_target(per_day).unwrap_or(0.0)
            ),
            None => println!("  Avg Trades to Target: {:.1}", avg),
        }
    } else if config.target_balance.is_some() {
        println!("  Target balance not reached in any simulation");
    }
}

/// Forward (non-simulated) estimate from the edge alone
pub fn print_forward_estimate(config: &SimulationConfig) {
    let edge = config.edge();
    banner("FORWARD ESTIMATE");
    println!(
        "  Avg P&L per Trade (net): ${:.2}",
        edge.net_expectancy(config.commission)
    );
    let Some(target) = config.target_balance else {
        return;
    };
    match edge.estimated_trades_to(target - config.starting_balance, config.commission) {
        Some(trades) => match config.trades_per_day {
            Some(per_day) => println!(
                "  Est. Trades to Target: {:.1} (~{:.1} days)",
                trades,
                trades / per_day.max(1) as f64
            ),
            None => println!("  Est. Trades to Target: {:.1}", trades),
        },
        None => println!("  Average P&L per trade is not positive, target is not reachable on expectancy"),
    }
}

pub fn print_kelly(edge: &Edge) {
    banner("KELLY SIZING");
    println!(
        "  Win Rate: {:.1}% | R:R {:.2}",
        edge.win_rate * 100.0,
        edge.reward_risk()
    );
    println!("  Raw Kelly: {:.2}%", edge.raw_kelly() * 100.0);
    for policy in [
        RiskPolicy::FullKelly,
        RiskPolicy::HalfKelly,
        RiskPolicy::FractionalKelly { modifier: 0.25 },
        RiskPolicy::prop_firm_safe(),
    ] {
        println!("  {:<36} {:>6.2}%", policy.to_string(), policy.percent(edge));
    }
}

/// Write the optimization table as CSV
pub fn write_sweep_csv(path: &Path, points: &[SweepPoint]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create CSV file: {:?}", path))?;
    for point in points {
        writer
            .serialize(point)
            .with_context(|| "Failed to write CSV row")?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {:?}", path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::{select_optimal, Criterion};

    fn point(risk_pct: f64, median_final: f64) -> SweepPoint {
        SweepPoint {
            risk_pct,
            median_final,
            worst_final: 1000.0,
            samples: 90,
            target_hits: 45,
            payout_hits: 0,
            fail_count: 10,
            simulations: 100,
            runs: Vec::new(),
        }
    }

    #[test]
    fn test_recommendation_contracts() {
        let config = SimulationConfig::default();
        let points = vec![point(2.5, 3000.0)];
        let sel = select_optimal(&points, Criterion::MedianFinal, None).unwrap();
        let rec = Recommendation::from_selection(&sel, &config, 5.0);
        assert_eq!(rec.risk_dollars, 50.0);
        assert_eq!(rec.micros, 10.0);
        assert_eq!(rec.minis, 1.0);
        assert!((rec.target_hit_pct - 45.0).abs() < 1e-9);
        assert!((rec.failure_pct - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_tick_value() {
        let config = SimulationConfig::default();
        let points = vec![point(1.0, 3000.0)];
        let sel = select_optimal(&points, Criterion::MedianFinal, None).unwrap();
        let rec = Recommendation::from_selection(&sel, &config, 0.0);
        assert_eq!(rec.micros, 0.0);
    }

    #[test]
    fn test_csv_export_skips_runs() {
        let dir = std::env::temp_dir().join(format!("yetisim-report-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("sweep.csv");

        write_sweep_csv(&path, &[point(1.0, 2100.0), point(1.5, 2200.0)]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "risk_pct,median_final,worst_final,samples,target_hits,payout_hits,fail_count,simulations"
        );
        assert_eq!(lines.count(), 2);

        std::fs::remove_dir_all(&dir).ok();
    }
}
