use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use yetisim::report::{self, Recommendation};
use yetisim::simulation::{
    run_single, run_sweep, select_optimal, summarize, AccountPreset, ConstraintRule, ConstraintSet,
    Criterion, MonteCarloSettings, PnlMode, PropFirmMode, RiskBasis, RiskPolicy, RiskRange,
    SimulationConfig, StoppingPolicy, FailedRunPolicy, SweepPoint,
};

#[derive(Parser, Debug)]
#[command(name = "yetisim")]
#[command(about = "Monte Carlo risk-per-trade simulator for prop firm and personal accounts")]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Print verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Base RNG seed (random and logged when omitted)
    #[arg(long, global = true, env = "YETISIM_SEED")]
    seed: Option<u64>,

    /// Run on a single thread
    #[arg(long, global = true)]
    sequential: bool,

    /// JSON file with a base simulation config; flags override its fields
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sweep risk percentages and pick the optimal one
    Sweep {
        #[command(flatten)]
        strategy: StrategyArgs,

        #[command(flatten)]
        rules: RulesArgs,

        /// Lowest risk % to test
        #[arg(long, default_value = "0.5")]
        risk_start: f64,

        /// Highest risk % to test
        #[arg(long, default_value = "20.0")]
        risk_end: f64,

        /// Risk % increment
        #[arg(long, default_value = "0.5")]
        risk_step: f64,

        /// Balance each risk % applies to
        #[arg(long, value_enum, default_value = "current")]
        basis: BasisArg,

        /// What the optimal level maximizes
        #[arg(long, value_enum, default_value = "median")]
        criterion: CriterionArg,

        /// Only consider levels whose failure rate is below this percent
        #[arg(long)]
        max_failure_rate: Option<f64>,

        /// Dollar value per tick for the contracts estimate
        #[arg(long, default_value = "5.0")]
        tick_value: f64,

        /// Export the optimization table as CSV
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Export config, table and recommendation as JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// Simulate one risk policy
    Single {
        #[command(flatten)]
        strategy: StrategyArgs,

        #[command(flatten)]
        rules: RulesArgs,

        /// Risk model
        #[arg(long, value_enum, default_value = "fixed-current")]
        risk: RiskModelArg,

        /// Risk % for fixed and preset models
        #[arg(long, default_value = "2.0")]
        risk_pct: f64,

        /// Kelly multiplier for the fractional model (0-1)
        #[arg(long, default_value = "0.25")]
        kelly_modifier: f64,

        /// Dollar value per tick for the contracts estimate
        #[arg(long, default_value = "5.0")]
        tick_value: f64,

        /// Export every run (with trajectory) as JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// Print Kelly sizing for the strategy edge
    Kelly {
        #[command(flatten)]
        strategy: StrategyArgs,
    },

    /// List account presets
    Presets,
}

#[derive(clap::Args, Debug)]
struct StrategyArgs {
    /// Starting account balance
    #[arg(short, long)]
    balance: Option<f64>,

    /// Trades per simulation
    #[arg(short, long)]
    trades: Option<usize>,

    /// Trades per day (enables daily loss resets and days-to-target)
    #[arg(long)]
    trades_per_day: Option<usize>,

    /// Trading days; trades = trades-per-day x days
    #[arg(long, requires = "trades_per_day")]
    days: Option<usize>,

    /// Win rate in percent
    #[arg(short, long)]
    win_rate: Option<f64>,

    /// Average win ($)
    #[arg(long)]
    avg_win: Option<f64>,

    /// Average loss ($, positive)
    #[arg(long)]
    avg_loss: Option<f64>,

    /// Round-turn commission per trade ($)
    #[arg(long)]
    commission: Option<f64>,

    /// Target balance
    #[arg(long, conflicts_with = "no_target")]
    target: Option<f64>,

    /// Run without a target balance
    #[arg(long)]
    no_target: bool,

    /// Simulations per risk level
    #[arg(short, long)]
    simulations: Option<usize>,

    /// How trade P&L is derived
    #[arg(long, value_enum)]
    pnl_mode: Option<PnlModeArg>,

    /// Stop each run at the first target crossing
    #[arg(long)]
    stop_at_target: bool,

    /// Include failed runs in median/worst balance
    #[arg(long)]
    include_failed: bool,

    /// Kelly and preset risk follow the current balance
    #[arg(long)]
    compounding: bool,

    /// Deduct commission from the risk budget
    #[arg(long)]
    commission_in_risk: bool,
}

#[derive(clap::Args, Debug)]
struct RulesArgs {
    /// Account preset (etf-static, mff-static-pro, mff-static-standard, etf-eod, apex-50k)
    #[arg(long)]
    preset: Option<AccountPreset>,

    /// Prop firm mode: evaluation trails the drawdown, funded keeps it static
    #[arg(long, value_enum, default_value = "none")]
    prop_mode: PropModeArg,

    /// Max drawdown ($) for the prop firm mode
    #[arg(long)]
    drawdown: Option<f64>,

    /// Balance at which a trailing drawdown stops trailing
    #[arg(long)]
    lock_at: Option<f64>,

    /// Daily loss limit ($)
    #[arg(long)]
    daily_loss_cap: Option<f64>,

    /// Balance at which a payout is counted (does not stop the run)
    #[arg(long)]
    payout: Option<f64>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum BasisArg {
    Starting,
    Current,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CriterionArg {
    Median,
    Worst,
    TargetRate,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PnlModeArg {
    RiskBased,
    FixedDollar,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum PropModeArg {
    None,
    Evaluation,
    Funded,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum RiskModelArg {
    FixedStarting,
    FixedCurrent,
    FullKelly,
    HalfKelly,
    FractionalKelly,
    PropFirmSafe,
    Preset,
}

impl From<BasisArg> for RiskBasis {
    fn from(arg: BasisArg) -> Self {
        match arg {
            BasisArg::Starting => RiskBasis::Starting,
            BasisArg::Current => RiskBasis::Current,
        }
    }
}

impl From<CriterionArg> for Criterion {
    fn from(arg: CriterionArg) -> Self {
        match arg {
            CriterionArg::Median => Criterion::MedianFinal,
            CriterionArg::Worst => Criterion::WorstFinal,
            CriterionArg::TargetRate => Criterion::TargetHitRate,
        }
    }
}

impl From<PnlModeArg> for PnlMode {
    fn from(arg: PnlModeArg) -> Self {
        match arg {
            PnlModeArg::RiskBased => PnlMode::RiskBased,
            PnlModeArg::FixedDollar => PnlMode::FixedDollar,
        }
    }
}

impl From<PropModeArg> for PropFirmMode {
    fn from(arg: PropModeArg) -> Self {
        match arg {
            PropModeArg::None => PropFirmMode::None,
            PropModeArg::Evaluation => PropFirmMode::Evaluation,
            PropModeArg::Funded => PropFirmMode::Funded,
        }
    }
}

impl RiskModelArg {
    fn policy(self, risk_pct: f64, kelly_modifier: f64) -> RiskPolicy {
        match self {
            Self::FixedStarting => RiskPolicy::FixedOfStarting { pct: risk_pct },
            Self::FixedCurrent => RiskPolicy::FixedOfCurrent { pct: risk_pct },
            Self::FullKelly => RiskPolicy::FullKelly,
            Self::HalfKelly => RiskPolicy::HalfKelly,
            Self::FractionalKelly => RiskPolicy::FractionalKelly {
                modifier: kelly_modifier,
            },
            Self::PropFirmSafe => RiskPolicy::prop_firm_safe(),
            Self::Preset => RiskPolicy::PresetPercent { pct: risk_pct },
        }
    }
}

impl StrategyArgs {
    fn apply(&self, mut config: SimulationConfig) -> Result<SimulationConfig> {
        if let Some(balance) = self.balance {
            config.starting_balance = balance;
        }
        if let Some(trades) = self.trades {
            config.num_trades = trades;
        }
        match (self.trades_per_day, self.days) {
            (Some(per_day), Some(days)) => {
                config = config
                    .with_schedule(per_day, days)
                    .context("Invalid trading schedule")?
            }
            (Some(per_day), None) => config.trades_per_day = Some(per_day),
            _ => {}
        }
        if let Some(win_rate) = self.win_rate {
            config.win_rate = win_rate / 100.0;
        }
        if let Some(avg_win) = self.avg_win {
            config.avg_win = avg_win;
        }
        if let Some(avg_loss) = self.avg_loss {
            config.avg_loss = avg_loss;
        }
        if let Some(commission) = self.commission {
            config.commission = commission;
        }
        if self.no_target {
            config.target_balance = None;
        } else if let Some(target) = self.target {
            config.target_balance = Some(target);
        }
        if let Some(simulations) = self.simulations {
            config.simulations = simulations;
        }
        if let Some(mode) = self.pnl_mode {
            config.pnl_mode = mode.into();
        }
        if self.stop_at_target {
            config.stopping = StoppingPolicy::StopAtTarget;
        }
        if self.include_failed {
            config.failed_runs = FailedRunPolicy::Include;
        }
        config.compounding |= self.compounding;
        config.commission_in_risk |= self.commission_in_risk;
        Ok(config)
    }
}

impl RulesArgs {
    fn rules(&self, config: SimulationConfig) -> Result<(SimulationConfig, ConstraintSet)> {
        let (config, mut rules) = match self.preset {
            Some(preset) => {
                info!("Using account preset {}", preset);
                preset.apply(config)
            }
            None => (config, ConstraintSet::none()),
        };

        match (self.prop_mode, self.drawdown) {
            (PropModeArg::None, Some(_)) => bail!("--drawdown requires --prop-mode evaluation or funded"),
            (PropModeArg::None, None) => {}
            (_, None) => bail!("--prop-mode needs a --drawdown limit"),
            (mode, Some(limit)) => {
                let rule = match (PropFirmMode::from(mode).rule(limit), self.lock_at) {
                    (ConstraintRule::TrailingDrawdown { limit, .. }, Some(lock)) => {
                        ConstraintRule::TrailingDrawdown {
                            limit,
                            lock_at: Some(lock),
                        }
                    }
                    (rule, _) => rule,
                };
                rules = rules.with(rule);
            }
        }

        if let Some(limit) = self.daily_loss_cap {
            rules = rules.with(ConstraintRule::DailyLossCap { limit });
        }
        if let Some(amount) = self.payout {
            rules = rules.with(ConstraintRule::PayoutTarget { amount });
        }
        Ok((config, rules))
    }
}

#[derive(Serialize)]
struct SweepReport<'a> {
    config: &'a SimulationConfig,
    rules: &'a ConstraintSet,
    seed: Option<u64>,
    points: &'a [SweepPoint],
    recommendation: Option<&'a Recommendation>,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let default_directive = if args.verbose { "yetisim=debug" } else { "yetisim=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive)),
        )
        .init();

    let settings = MonteCarloSettings {
        seed: args.seed,
        parallel: !args.sequential,
        ..Default::default()
    };

    match args.command {
        Commands::Sweep {
            strategy, rules,
            risk_start, risk_end, risk_step,
            basis, criterion, max_failure_rate,
            tick_value, csv, json,
        } => {
            let (config, rules) = build_config(args.config.as_deref(), &strategy, &rules)?;
            let range = RiskRange {
                start: risk_start,
                end: risk_end,
                step: risk_step,
            };
            run_sweep_command(
                &config, &rules, &range, basis.into(), criterion.into(),
                max_failure_rate, tick_value, &settings, csv, json,
            )?;
        }
        Commands::Single {
            strategy, rules,
            risk, risk_pct, kelly_modifier,
            tick_value, json,
        } => {
            let (config, rules) = build_config(args.config.as_deref(), &strategy, &rules)?;
            let settings = MonteCarloSettings {
                record_trajectories: json.is_some(),
                ..settings
            };
            let policy = risk.policy(risk_pct, kelly_modifier);
            run_single_command(&config, &rules, &policy, tick_value, &settings, json)?;
        }
        Commands::Kelly { strategy } => {
            let config = strategy.apply(load_config(args.config.as_deref())?)?;
            config.validate().context("Invalid strategy parameters")?;
            report::print_kelly(&config.edge());
            report::print_forward_estimate(&config);
        }
        Commands::Presets => print_presets(),
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<SimulationConfig> {
    let Some(path) = path else {
        return Ok(SimulationConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;
    let config = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;
    info!("Loaded config from {:?}", path);
    Ok(config)
}

fn build_config(
    path: Option<&Path>,
    strategy: &StrategyArgs,
    rules: &RulesArgs,
) -> Result<(SimulationConfig, ConstraintSet)> {
    let (config, rules) = rules.rules(load_config(path)?)?;
    Ok((strategy.apply(config)?, rules))
}

#[allow(clippy::too_many_arguments)]
fn run_sweep_command(
    config: &SimulationConfig,
    rules: &ConstraintSet,
    range: &RiskRange,
    basis: RiskBasis,
    criterion: Criterion,
    max_failure_rate: Option<f64>,
    tick_value: f64,
    settings: &MonteCarloSettings,
    csv: Option<PathBuf>,
    json: Option<PathBuf>,
) -> Result<()> {
    info!("=== SWEEP MODE ===");
    report::print_config(config, rules);

    let points = run_sweep(config, basis, rules, range, settings).context("Sweep failed")?;
    report::print_sweep_table(&points);

    let threshold = max_failure_rate.map(|pct| pct / 100.0);
    let recommendation = match select_optimal(&points, criterion, threshold) {
        Some(selection) => {
            if !selection.within_threshold {
                warn!(
                    "No risk level kept the failure rate below {:.1}%, using the unconstrained optimum",
                    max_failure_rate.unwrap_or(0.0)
                );
            }
            if !selection.point.has_samples() {
                warn!("Optimal level has no surviving runs, median is a placeholder");
            }
            info!(
                "Optimal risk by {}: {:.2}%",
                criterion, selection.point.risk_pct
            );
            let rec = Recommendation::from_selection(&selection, config, tick_value);
            report::print_recommendation(&rec, tick_value, !rules.is_unconstrained());
            Some(rec)
        }
        None => {
            warn!("Sweep produced no risk levels");
            None
        }
    };

    if let Some(path) = csv {
        report::write_sweep_csv(&path, &points)?;
        info!("Wrote optimization table to {:?}", path);
    }
    if let Some(path) = json {
        let out = SweepReport {
            config,
            rules,
            seed: settings.seed,
            points: &points,
            recommendation: recommendation.as_ref(),
        };
        report::write_json(&path, &out)?;
        info!("Wrote sweep report to {:?}", path);
    }

    Ok(())
}

fn run_single_command(
    config: &SimulationConfig,
    rules: &ConstraintSet,
    policy: &RiskPolicy,
    tick_value: f64,
    settings: &MonteCarloSettings,
    json: Option<PathBuf>,
) -> Result<()> {
    info!("=== SINGLE MODE ===");
    report::print_config(config, rules);

    let runs = run_single(config, policy, rules, settings).context("Simulation failed")?;
    let summary = summarize(&runs, config.failed_runs);
    let sizer = policy.resolve(config)?;

    report::print_summary(policy, config, &summary);
    let rec = Recommendation::from_summary(&sizer, config, &summary, tick_value);
    report::print_recommendation(&rec, tick_value, !rules.is_unconstrained());
    report::print_forward_estimate(config);

    if let Some(path) = json {
        report::write_json(&path, &runs)?;
        info!("Wrote {} runs to {:?}", runs.len(), path);
    }

    Ok(())
}

fn print_presets() {
    println!("\n{}", "=".repeat(70));
    println!("ACCOUNT PRESETS");
    println!("{}", "=".repeat(70));
    for preset in AccountPreset::ALL {
        let spec = preset.spec();
        println!(
            "  {:<22} start ${:>9.0}  target ${:>9.0}  trades {:>4}",
            preset.name(),
            spec.starting_balance,
            spec.profit_target,
            spec.max_trades
        );
        for rule in spec.rules.rules() {
            println!("  {:<22}   {:?}", "", rule);
        }
    }
}
