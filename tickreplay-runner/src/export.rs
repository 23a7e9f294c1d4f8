//! Run artifacts: trade tape and equity curve as CSV, a JSON summary, and a
//! Markdown report.
//!
//! The summary carries a `schema_version`; summaries written by a newer
//! version are rejected on load.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tickreplay_core::domain::{EquityPoint, TradeRecord};
use tickreplay_core::engine::EngineConfig;
use tickreplay_core::{RunResult, StopReason};

use crate::metrics::PerformanceMetrics;

pub const SCHEMA_VERSION: u32 = 1;

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to flush csv writer: {0}")]
    Flush(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported schema version {found} (max supported: {SCHEMA_VERSION})")]
    SchemaVersion { found: u32 },
}

/// Everything about a run except the per-tick and per-trade series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub schema_version: u32,
    pub label: String,
    pub fingerprint: String,
    pub dataset_hash: String,
    pub config: serde_json::Value,
    pub stop_reason: StopReason,
    pub ticks_processed: usize,
    pub initial_balance: f64,
    pub final_balance: f64,
    pub final_equity: f64,
    pub orders_submitted: usize,
    pub orders_filled: usize,
    pub orders_expired: usize,
    pub liquidations: usize,
    pub signals: usize,
    pub quote_gaps: usize,
    pub open_positions: usize,
    pub metrics: PerformanceMetrics,
}

impl RunSummary {
    pub fn new(
        label: &str,
        fingerprint: &str,
        dataset_hash: &str,
        config: &EngineConfig,
        result: &RunResult,
        metrics: &PerformanceMetrics,
    ) -> Result<Self, ExportError> {
        Ok(Self {
            schema_version: SCHEMA_VERSION,
            label: label.to_string(),
            fingerprint: fingerprint.to_string(),
            dataset_hash: dataset_hash.to_string(),
            config: serde_json::to_value(config)?,
            stop_reason: result.stop_reason,
            ticks_processed: result.ticks_processed,
            initial_balance: result.initial_balance,
            final_balance: result.final_balance,
            final_equity: result.final_equity,
            orders_submitted: result.orders_submitted,
            orders_filled: result.orders_filled,
            orders_expired: result.orders_expired,
            liquidations: result.liquidations,
            signals: result.signals,
            quote_gaps: result.quote_gaps,
            open_positions: result.open_positions,
            metrics: metrics.clone(),
        })
    }
}

// ─── JSON ───────────────────────────────────────────────────────────

pub fn export_summary_json(summary: &RunSummary) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(summary)?)
}

pub fn import_summary_json(json: &str) -> Result<RunSummary, ExportError> {
    let summary: RunSummary = serde_json::from_str(json)?;
    if summary.schema_version > SCHEMA_VERSION {
        return Err(ExportError::SchemaVersion {
            found: summary.schema_version,
        });
    }
    Ok(summary)
}

// ─── CSV ────────────────────────────────────────────────────────────

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String, ExportError> {
    let data = wtr.into_inner().map_err(|e| ExportError::Flush(e.to_string()))?;
    String::from_utf8(data).map_err(|e| ExportError::Flush(e.to_string()))
}

/// Trade tape, one row per closed position in close order.
pub fn export_trades_csv(trades: &[TradeRecord]) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "position_id",
        "direction",
        "size",
        "entry_time",
        "entry_price",
        "take_profit",
        "stop_loss",
        "close_time",
        "close_price",
        "close_reason",
        "gross_pnl",
        "fees",
        "realized_pnl",
    ])?;

    for t in trades {
        wtr.write_record([
            &t.position_id.0.to_string(),
            t.direction.as_str(),
            &t.size.to_string(),
            &t.entry_time.format(TIME_FORMAT).to_string(),
            &format!("{:.6}", t.entry_price),
            &format!("{:.6}", t.take_profit),
            &format!("{:.6}", t.stop_loss),
            &t.close_time.format(TIME_FORMAT).to_string(),
            &format!("{:.6}", t.close_price),
            t.close_reason.as_str(),
            &format!("{:.6}", t.gross_pnl),
            &format!("{:.6}", t.fees),
            &format!("{:.6}", t.realized_pnl),
        ])?;
    }
    finish(wtr)
}

pub fn export_equity_csv(curve: &[EquityPoint]) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["timestamp", "balance", "equity"])?;
    for p in curve {
        wtr.write_record([
            &p.timestamp.format(TIME_FORMAT).to_string(),
            &format!("{:.6}", p.balance),
            &format!("{:.6}", p.equity),
        ])?;
    }
    finish(wtr)
}

// ─── Markdown ───────────────────────────────────────────────────────

fn opt(v: Option<f64>, digits: usize) -> String {
    v.map_or_else(|| "n/a".to_string(), |v| format!("{v:.digits$}"))
}

pub fn generate_report(summary: &RunSummary) -> String {
    let m = &summary.metrics;
    let mut md = String::with_capacity(1024);

    md.push_str(&format!("# Backtest Report: {}\n\n", summary.label));
    md.push_str("| Field | Value |\n| --- | --- |\n");
    md.push_str(&format!("| Fingerprint | {} |\n", summary.fingerprint));
    md.push_str(&format!("| Dataset Hash | {} |\n", summary.dataset_hash));
    md.push_str(&format!("| Ticks | {} |\n", summary.ticks_processed));
    match summary.stop_reason {
        StopReason::Completed => md.push_str("| Stop | completed |\n"),
        StopReason::BalanceExhausted { at } => {
            md.push_str(&format!("| Stop | **balance exhausted at {at}** |\n"));
        }
    }
    md.push_str(&format!("| Initial Balance | {:.2} |\n", summary.initial_balance));
    md.push_str(&format!("| Final Equity | {:.2} |\n\n", summary.final_equity));

    md.push_str("## Performance\n\n| Metric | Value |\n| --- | --- |\n");
    md.push_str(&format!("| Trades | {} |\n", m.trade_count));
    md.push_str(&format!("| Total PnL | {:.2} |\n", m.total_pnl));
    md.push_str(&format!("| Total Return | {:.2}% |\n", m.total_return * 100.0));
    md.push_str(&format!("| Max Drawdown | {:.2}% |\n", m.max_drawdown * 100.0));
    md.push_str(&format!("| Win Rate | {} |\n", opt(m.win_rate.map(|w| w * 100.0), 1)));
    md.push_str(&format!("| Mean PnL | {} |\n", opt(m.mean_pnl, 3)));
    md.push_str(&format!("| Profit Factor | {} |\n", opt(m.profit_factor, 2)));
    md.push_str(&format!("| Trade Sharpe | {} |\n", opt(m.trade_sharpe, 3)));
    md.push_str(&format!("| Objective | {} |\n", opt(m.objective, 3)));
    md.push_str(&format!("| Avg Holding (min) | {} |\n\n", opt(m.avg_holding_minutes, 1)));

    md.push_str("## Activity\n\n| Event | Count |\n| --- | --- |\n");
    for (name, count) in [
        ("Signals", summary.signals),
        ("Orders submitted", summary.orders_submitted),
        ("Orders filled", summary.orders_filled),
        ("Orders expired", summary.orders_expired),
        ("Take profit", m.take_profits),
        ("Stop loss", m.stop_losses),
        ("Margin call", m.margin_calls),
        ("Session end", m.session_ends),
        ("Quote gaps", summary.quote_gaps),
    ] {
        md.push_str(&format!("| {name} | {count} |\n"));
    }
    md
}

// ─── Artifact bundle ────────────────────────────────────────────────

fn write(path: PathBuf, contents: &str) -> Result<(), ExportError> {
    std::fs::write(&path, contents).map_err(|source| ExportError::Io { path, source })
}

/// Write `summary.json`, `trades.csv`, `equity.csv` and `report.md` into
/// `run_dir`, creating it if needed.
pub fn save_artifacts(
    run_dir: &Path,
    summary: &RunSummary,
    result: &RunResult,
) -> Result<PathBuf, ExportError> {
    std::fs::create_dir_all(run_dir).map_err(|source| ExportError::Io {
        path: run_dir.to_path_buf(),
        source,
    })?;
    write(run_dir.join("summary.json"), &export_summary_json(summary)?)?;
    write(run_dir.join("trades.csv"), &export_trades_csv(&result.trades)?)?;
    write(run_dir.join("equity.csv"), &export_equity_csv(&result.equity_curve)?)?;
    write(run_dir.join("report.md"), &generate_report(summary))?;
    Ok(run_dir.to_path_buf())
}

pub fn load_summary(run_dir: &Path) -> Result<RunSummary, ExportError> {
    let path = run_dir.join("summary.json");
    let json = std::fs::read_to_string(&path).map_err(|source| ExportError::Io { path, source })?;
    import_summary_json(&json)
}
