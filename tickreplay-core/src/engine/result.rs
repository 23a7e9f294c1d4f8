//! Outcome of a completed (or early-stopped) run.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::{EquityPoint, TradeRecord};

/// Why the tick loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StopReason {
    /// Every tick was processed.
    Completed,
    /// Flat and unable to margin a single unit.
    BalanceExhausted { at: NaiveDateTime },
}

impl StopReason {
    pub fn is_early(&self) -> bool {
        matches!(self, Self::BalanceExhausted { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub trades: Vec<TradeRecord>,
    pub equity_curve: Vec<EquityPoint>,
    pub initial_balance: f64,
    pub final_balance: f64,
    pub final_equity: f64,
    pub ticks_processed: usize,
    pub stop_reason: StopReason,
    pub orders_submitted: usize,
    pub orders_filled: usize,
    pub orders_expired: usize,
    pub liquidations: usize,
    /// Non-zero signals emitted by the aggregator.
    pub signals: usize,
    /// Ticks with no resolvable quote.
    pub quote_gaps: usize,
    /// Positions still open when the data ran out.
    pub open_positions: usize,
}

impl RunResult {
    pub fn total_realized_pnl(&self) -> f64 {
        self.trades.iter().map(|t| t.realized_pnl).sum()
    }

    pub fn stopped_early(&self) -> bool {
        self.stop_reason.is_early()
    }
}
