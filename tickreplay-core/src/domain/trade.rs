//! Closed-trade records, and the per-tick equity point.

use super::ids::PositionId;
use super::order::Direction;
use super::position::{CloseReason, Position};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// An owned snapshot of a position taken at close time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub position_id: PositionId,
    pub direction: Direction,
    pub size: u64,

    pub entry_time: NaiveDateTime,
    pub entry_price: f64,
    pub take_profit: f64,
    pub stop_loss: f64,

    pub close_time: NaiveDateTime,
    pub close_price: f64,
    pub close_reason: CloseReason,

    /// `sign * (close - entry) * size`.
    pub gross_pnl: f64,
    /// Round-trip slippage plus per-trade cost.
    pub fees: f64,
    pub realized_pnl: f64,
}

impl TradeRecord {
    pub fn from_position(
        position: &Position,
        close_time: NaiveDateTime,
        close_price: f64,
        close_reason: CloseReason,
        gross_pnl: f64,
        fees: f64,
        realized_pnl: f64,
    ) -> Self {
        Self {
            position_id: position.id,
            direction: position.direction,
            size: position.size,
            entry_time: position.opened_at,
            entry_price: position.entry_price,
            take_profit: position.take_profit,
            stop_loss: position.stop_loss,
            close_time,
            close_price,
            close_reason,
            gross_pnl,
            fees,
            realized_pnl,
        }
    }

    pub fn is_winner(&self) -> bool {
        self.realized_pnl > 0.0
    }

    pub fn holding_minutes(&self) -> i64 {
        (self.close_time - self.entry_time).num_minutes()
    }
}

/// Account snapshot recorded at the end of every processed tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: NaiveDateTime,
    pub balance: f64,
    pub equity: f64,
}
