//! Performance metrics computed from a run's trade log and equity curve.
//!
//! Ratio-style statistics are `None` when their denominator is degenerate
//! (no trades, a single trade, zero variance, no losing trades) rather than
//! a division by zero.

use serde::{Deserialize, Serialize};
use tickreplay_core::domain::{CloseReason, TradeRecord};
use tickreplay_core::engine::EngineConfig;
use tickreplay_core::RunResult;

/// Aggregate performance metrics for a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub trade_count: usize,
    pub total_pnl: f64,
    pub total_return: f64,
    pub max_drawdown: f64,
    pub win_rate: Option<f64>,
    pub mean_pnl: Option<f64>,
    pub profit_factor: Option<f64>,
    /// Mean over sample standard deviation of per-trade realized PnL.
    pub trade_sharpe: Option<f64>,
    pub avg_holding_minutes: Option<f64>,
    /// Win rate over the break-even probability plus mean PnL over the
    /// break-even expected PnL. Above 2.0 beats break-even on both terms.
    pub objective: Option<f64>,
    pub take_profits: usize,
    pub stop_losses: usize,
    pub margin_calls: usize,
    pub session_ends: usize,
}

impl PerformanceMetrics {
    pub fn compute(result: &RunResult, config: &EngineConfig) -> Self {
        let trades = &result.trades;
        let equity: Vec<f64> = result.equity_curve.iter().map(|p| p.equity).collect();
        let win_rate = win_rate(trades);
        let mean_pnl = mean_pnl(trades);
        let count = |reason: CloseReason| trades.iter().filter(|t| t.close_reason == reason).count();

        Self {
            trade_count: trades.len(),
            total_pnl: result.total_realized_pnl(),
            total_return: total_return(result.initial_balance, result.final_equity),
            max_drawdown: max_drawdown(&equity),
            win_rate,
            mean_pnl,
            profit_factor: profit_factor(trades),
            trade_sharpe: trade_sharpe(trades),
            avg_holding_minutes: avg_holding_minutes(trades),
            objective: objective_score(win_rate, mean_pnl, config.tp, config.sl, config.cost),
            take_profits: count(CloseReason::TakeProfit),
            stop_losses: count(CloseReason::StopLoss),
            margin_calls: count(CloseReason::MarginCall),
            session_ends: count(CloseReason::SessionEnd),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

pub fn total_return(initial: f64, final_equity: f64) -> f64 {
    if initial <= 0.0 {
        return 0.0;
    }
    (final_equity - initial) / initial
}

/// Maximum drawdown as a negative fraction (e.g., -0.15 = 15% drawdown).
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let Some(&first) = equity_curve.first() else {
        return 0.0;
    };
    let mut peak = first;
    let mut max_dd = 0.0_f64;
    for &eq in equity_curve {
        peak = peak.max(eq);
        if peak > 0.0 {
            max_dd = max_dd.min((eq - peak) / peak);
        }
    }
    max_dd
}

pub fn win_rate(trades: &[TradeRecord]) -> Option<f64> {
    if trades.is_empty() {
        return None;
    }
    let winners = trades.iter().filter(|t| t.is_winner()).count();
    Some(winners as f64 / trades.len() as f64)
}

pub fn mean_pnl(trades: &[TradeRecord]) -> Option<f64> {
    if trades.is_empty() {
        return None;
    }
    Some(trades.iter().map(|t| t.realized_pnl).sum::<f64>() / trades.len() as f64)
}

/// Gross profits over gross losses. `None` without any losing trade.
pub fn profit_factor(trades: &[TradeRecord]) -> Option<f64> {
    let (profit, loss) = trades.iter().fold((0.0, 0.0), |(p, l), t| {
        if t.realized_pnl > 0.0 {
            (p + t.realized_pnl, l)
        } else {
            (p, l - t.realized_pnl)
        }
    });
    (loss > 1e-12).then(|| profit / loss)
}

pub fn trade_sharpe(trades: &[TradeRecord]) -> Option<f64> {
    if trades.len() < 2 {
        return None;
    }
    let pnl: Vec<f64> = trades.iter().map(|t| t.realized_pnl).collect();
    let mean = pnl.iter().sum::<f64>() / pnl.len() as f64;
    let var = pnl.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (pnl.len() - 1) as f64;
    let sd = var.sqrt();
    (sd > 1e-12).then(|| mean / sd)
}

pub fn avg_holding_minutes(trades: &[TradeRecord]) -> Option<f64> {
    if trades.is_empty() {
        return None;
    }
    let total: i64 = trades.iter().map(|t| t.holding_minutes()).sum();
    Some(total as f64 / trades.len() as f64)
}

/// Break-even objective for a TP/SL bracket.
///
/// `p = (sl + 2 * cost) / (sl + tp)` is the win probability at which the
/// bracket breaks even, and `tp * p` the matching expected PnL.
pub fn objective_score(
    win_rate: Option<f64>,
    mean_pnl: Option<f64>,
    tp: f64,
    sl: f64,
    cost: f64,
) -> Option<f64> {
    let (win_rate, mean_pnl) = (win_rate?, mean_pnl?);
    let break_even = (sl + 2.0 * cost) / (sl + tp);
    let expected = tp * break_even;
    if !(break_even > 0.0 && expected > 0.0) {
        return None;
    }
    Some(win_rate / break_even + mean_pnl / expected)
}
