//! Direction and resting limit orders.

use super::ids::OrderId;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1 for long, -1 for short.
    pub fn sign(self) -> f64 {
        match self {
            Self::Long => 1.0,
            Self::Short => -1.0,
        }
    }

    /// Map an aggregated vote to a direction. Zero means no trade.
    pub fn from_vote(vote: i8) -> Option<Self> {
        match vote.signum() {
            1 => Some(Self::Long),
            -1 => Some(Self::Short),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Long => "long",
            Self::Short => "short",
        }
    }
}

/// A resting limit order awaiting a fill or its timeout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOrder {
    pub id: OrderId,
    pub submitted_at: NaiveDateTime,
    pub direction: Direction,
    pub limit_price: f64,
    pub expires_at: NaiveDateTime,
}

impl PendingOrder {
    pub fn is_expired(&self, at: NaiveDateTime) -> bool {
        at >= self.expires_at
    }

    /// Longs fill once the ask trades at or through the limit, shorts once
    /// the bid does.
    pub fn is_marketable(&self, bid: f64, ask: f64) -> bool {
        match self.direction {
            Direction::Long => ask >= self.limit_price,
            Direction::Short => bid <= self.limit_price,
        }
    }
}
