//! Execution quote resolution with one-step lookahead.
//!
//! A decision made at tick `i` executes against the bid/ask of tick `i + 1`.
//! Each side falls back independently: next tick, then this tick, then the
//! last value resolved on an earlier step.

use crate::domain::{Quote, Tick};

#[derive(Debug, Clone, Default)]
pub struct QuoteTracker {
    last_bid: Option<f64>,
    last_ask: Option<f64>,
    gaps: usize,
}

impl QuoteTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the quote for the step at `current`.
    ///
    /// A one-sided quote mirrors the known side. Returns `None` only when
    /// neither side has ever been seen.
    pub fn resolve(&mut self, current: &Tick, next: Option<&Tick>) -> Option<Quote> {
        let bid = next
            .and_then(Tick::valid_bid)
            .or_else(|| current.valid_bid())
            .or(self.last_bid);
        let ask = next
            .and_then(Tick::valid_ask)
            .or_else(|| current.valid_ask())
            .or(self.last_ask);

        if bid.is_some() {
            self.last_bid = bid;
        }
        if ask.is_some() {
            self.last_ask = ask;
        }

        match (bid, ask) {
            (Some(b), Some(a)) => Some(Quote::new(b, a)),
            (Some(b), None) => Some(Quote::new(b, b)),
            (None, Some(a)) => Some(Quote::new(a, a)),
            (None, None) => {
                self.gaps += 1;
                None
            }
        }
    }

    /// The most recently resolved quote, mirrored if one-sided.
    pub fn last(&self) -> Option<Quote> {
        match (self.last_bid, self.last_ask) {
            (Some(b), Some(a)) => Some(Quote::new(b, a)),
            (Some(b), None) => Some(Quote::new(b, b)),
            (None, Some(a)) => Some(Quote::new(a, a)),
            (None, None) => None,
        }
    }

    /// Steps that had no resolvable quote.
    pub fn gaps(&self) -> usize {
        self.gaps
    }
}
