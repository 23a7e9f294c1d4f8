//! TickReplay CLI: single runs, batch runs, and strategy listing.
//!
//! Commands:
//! - `run` replays a tick file against one TOML engine config
//! - `batch` replays the same data against every `[[runs]]` entry of a batch file
//! - `strategies` lists the built-in strategy names

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use tickreplay_core::domain::Tick;
use tickreplay_core::strategy::{IndicatorFrame, StrategyRegistry};
use tickreplay_core::EngineConfig;
use tickreplay_runner::{
    dataset_hash, load_batch, load_frame, load_ticks, run_batch, run_single,
    save_artifacts, BatchOutcome, BatchSpec, RunSummary,
};

#[derive(Parser)]
#[command(name = "tickreplay", about = "TickReplay: event-driven tick backtesting")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a tick file against a single engine config.
    Run {
        /// Path to a TOML engine config.
        #[arg(long)]
        config: PathBuf,

        /// Tick CSV: timestamp,price,bid,ask[,volume].
        #[arg(long)]
        ticks: PathBuf,

        /// Indicator bar CSV: timestamp followed by indicator columns.
        #[arg(long)]
        bars: PathBuf,

        /// Run label, used as the artifact directory name.
        #[arg(long, default_value = "run")]
        label: String,

        /// Output directory for artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,

        /// Print the run summary as JSON instead of a table.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Replay the same data against every run in a batch file.
    Batch {
        /// TOML file of `[[runs]]` tables.
        #[arg(long)]
        batch_file: PathBuf,

        #[arg(long)]
        ticks: PathBuf,

        #[arg(long)]
        bars: PathBuf,

        #[arg(long, default_value = "results")]
        output_dir: PathBuf,

        /// Run one config at a time instead of across all cores.
        #[arg(long, default_value_t = false)]
        sequential: bool,
    },
    /// List the built-in strategy names.
    Strategies,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            config,
            ticks,
            bars,
            label,
            output_dir,
            json,
        } => run_cmd(&config, &ticks, &bars, label, &output_dir, json),
        Commands::Batch {
            batch_file,
            ticks,
            bars,
            output_dir,
            sequential,
        } => batch_cmd(&batch_file, &ticks, &bars, &output_dir, !sequential),
        Commands::Strategies => {
            for name in StrategyRegistry::builtin().names() {
                println!("{name}");
            }
            Ok(())
        }
    }
}

fn load_data(ticks: &Path, bars: &Path) -> Result<(Vec<Tick>, IndicatorFrame)> {
    let ticks = load_ticks(ticks).with_context(|| format!("loading ticks from {}", ticks.display()))?;
    let frame = load_frame(bars).with_context(|| format!("loading bars from {}", bars.display()))?;
    info!(ticks = ticks.len(), bars = frame.len(), "data loaded");
    Ok((ticks, frame))
}

fn persist(
    outcome: &BatchOutcome,
    config: &EngineConfig,
    data_hash: &str,
    output_dir: &Path,
) -> Result<RunSummary> {
    let summary = RunSummary::new(
        &outcome.label,
        &outcome.fingerprint,
        data_hash,
        config,
        &outcome.result,
        &outcome.metrics,
    )?;
    let run_dir = output_dir.join(&outcome.label);
    save_artifacts(&run_dir, &summary, &outcome.result)
        .with_context(|| format!("writing artifacts to {}", run_dir.display()))?;
    Ok(summary)
}

fn run_cmd(
    config_path: &Path,
    ticks: &Path,
    bars: &Path,
    label: String,
    output_dir: &Path,
    json: bool,
) -> Result<()> {
    let config = EngineConfig::from_file(config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;
    let (ticks, frame) = load_data(ticks, bars)?;
    let spec = BatchSpec { label, config };

    let outcome = run_single(&spec, &ticks, &frame, &StrategyRegistry::builtin())?;
    let summary = persist(&outcome, &spec.config, &dataset_hash(&ticks), output_dir)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
        println!("Artifacts saved to: {}", output_dir.join(&spec.label).display());
    }
    Ok(())
}

fn batch_cmd(
    batch_file: &Path,
    ticks: &Path,
    bars: &Path,
    output_dir: &Path,
    parallel: bool,
) -> Result<()> {
    let specs = load_batch(batch_file)
        .with_context(|| format!("loading batch file {}", batch_file.display()))?;
    let (ticks, frame) = load_data(ticks, bars)?;
    let data_hash = dataset_hash(&ticks);

    let outcomes = run_batch(&specs, &ticks, &frame, &StrategyRegistry::builtin(), parallel)?;

    let mut summaries = Vec::with_capacity(outcomes.len());
    for (spec, outcome) in specs.iter().zip(&outcomes) {
        summaries.push(persist(outcome, &spec.config, &data_hash, output_dir)?);
    }
    // Best objective first; runs without one sort last.
    summaries.sort_by(|a, b| {
        let key = |s: &RunSummary| s.metrics.objective.unwrap_or(f64::NEG_INFINITY);
        key(b).total_cmp(&key(a))
    });

    println!(
        "{:<24} {:>16} {:>7} {:>10} {:>9} {:>9}",
        "label", "fingerprint", "trades", "pnl", "win%", "objective"
    );
    for s in &summaries {
        println!(
            "{:<24} {:>16} {:>7} {:>10.2} {:>9} {:>9}",
            s.label,
            s.fingerprint,
            s.metrics.trade_count,
            s.metrics.total_pnl,
            fmt_opt(s.metrics.win_rate.map(|w| w * 100.0), 1),
            fmt_opt(s.metrics.objective, 3),
        );
    }
    println!("Artifacts saved under: {}", output_dir.display());
    Ok(())
}

fn fmt_opt(v: Option<f64>, digits: usize) -> String {
    v.map_or_else(|| "-".to_string(), |v| format!("{v:.digits$}"))
}

fn print_summary(s: &RunSummary) {
    let m = &s.metrics;
    println!("=== {} ({}) ===", s.label, s.fingerprint);
    println!("Dataset:        {}", &s.dataset_hash[..16.min(s.dataset_hash.len())]);
    println!("Ticks:          {}", s.ticks_processed);
    if let tickreplay_core::StopReason::BalanceExhausted { at } = s.stop_reason {
        println!("Stopped early:  balance exhausted at {at}");
    }
    println!("Initial:        {:.2}", s.initial_balance);
    println!("Final equity:   {:.2}", s.final_equity);
    println!("Return:         {:.2}%", m.total_return * 100.0);
    println!("Max drawdown:   {:.2}%", m.max_drawdown * 100.0);
    println!("Trades:         {}", m.trade_count);
    println!("Win rate:       {}", fmt_opt(m.win_rate.map(|w| w * 100.0), 1));
    println!("Profit factor:  {}", fmt_opt(m.profit_factor, 2));
    println!("Objective:      {}", fmt_opt(m.objective, 3));
    println!(
        "Orders:         {} submitted, {} filled, {} expired",
        s.orders_submitted, s.orders_filled, s.orders_expired
    );
    println!("Margin calls:   {}", s.liquidations);
}
