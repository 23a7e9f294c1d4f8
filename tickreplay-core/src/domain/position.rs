//! Open positions with fixed take-profit / stop-loss levels.

use super::ids::PositionId;
use super::order::Direction;
use super::tick::Quote;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    TakeProfit,
    StopLoss,
    /// Forced out to restore margin sufficiency.
    MarginCall,
    /// Flattened at the session cutoff.
    SessionEnd,
}

impl CloseReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TakeProfit => "take_profit",
            Self::StopLoss => "stop_loss",
            Self::MarginCall => "margin_call",
            Self::SessionEnd => "session_end",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionStatus {
    Open,
    Closed(CloseReason),
}

/// A position opened by a fill.
///
/// `take_profit` and `stop_loss` are set once in [`Position::open`] and there
/// is no API to move them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub opened_at: NaiveDateTime,
    pub direction: Direction,
    pub entry_price: f64,
    pub size: u64,
    pub take_profit: f64,
    pub stop_loss: f64,
    pub status: PositionStatus,
}

impl Position {
    /// Open at `entry_price` with exits `tp_distance` / `sl_distance` away,
    /// on the side matching `direction`.
    pub fn open(
        id: PositionId,
        opened_at: NaiveDateTime,
        direction: Direction,
        entry_price: f64,
        size: u64,
        tp_distance: f64,
        sl_distance: f64,
    ) -> Self {
        let sign = direction.sign();
        Self {
            id,
            opened_at,
            direction,
            entry_price,
            size,
            take_profit: entry_price + sign * tp_distance,
            stop_loss: entry_price - sign * sl_distance,
            status: PositionStatus::Open,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }

    /// Longs exit into the bid, shorts into the ask.
    pub fn exit_price(&self, quote: Quote) -> f64 {
        match self.direction {
            Direction::Long => quote.bid,
            Direction::Short => quote.ask,
        }
    }

    /// Gross PnL if marked at `price`, before any fees.
    pub fn pnl_at(&self, price: f64) -> f64 {
        self.direction.sign() * (price - self.entry_price) * self.size as f64
    }

    /// Which exit level, if any, the quote has reached.
    pub fn exit_trigger(&self, quote: Quote) -> Option<CloseReason> {
        let px = self.exit_price(quote);
        let (hit_tp, hit_sl) = match self.direction {
            Direction::Long => (px >= self.take_profit, px <= self.stop_loss),
            Direction::Short => (px <= self.take_profit, px >= self.stop_loss),
        };
        if hit_tp {
            Some(CloseReason::TakeProfit)
        } else if hit_sl {
            Some(CloseReason::StopLoss)
        } else {
            None
        }
    }
}
