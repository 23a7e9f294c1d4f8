//! Ticks: one quote/trade update, the unit of simulation time.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A single market update for the simulated instrument.
///
/// `bid`/`ask` may be absent for a step; non-finite values are treated the
/// same as absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub timestamp: NaiveDateTime,
    pub price: f64,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub volume: f64,
}

impl Tick {
    pub fn new(timestamp: NaiveDateTime, price: f64, bid: f64, ask: f64) -> Self {
        Self {
            timestamp,
            price,
            bid: Some(bid),
            ask: Some(ask),
            volume: 0.0,
        }
    }

    /// A tick carrying only a last price, no book.
    pub fn last_only(timestamp: NaiveDateTime, price: f64) -> Self {
        Self {
            timestamp,
            price,
            bid: None,
            ask: None,
            volume: 0.0,
        }
    }

    pub fn valid_bid(&self) -> Option<f64> {
        self.bid.filter(|b| b.is_finite())
    }

    pub fn valid_ask(&self) -> Option<f64> {
        self.ask.filter(|a| a.is_finite())
    }
}

/// Resolved best bid/ask used for fills and exits at one step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub bid: f64,
    pub ask: f64,
}

impl Quote {
    pub fn new(bid: f64, ask: f64) -> Self {
        Self { bid, ask }
    }

    /// Degenerate quote with both sides at `price`.
    pub fn flat(price: f64) -> Self {
        Self {
            bid: price,
            ask: price,
        }
    }
}
