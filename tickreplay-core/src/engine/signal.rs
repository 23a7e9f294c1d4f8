//! Vote aggregation across the configured strategies.

use chrono::NaiveDateTime;
use tracing::trace;

use super::config::TradingMode;
use crate::strategy::{clamp_vote, IndicatorWindow, Strategy};

/// Sums strategy votes into at most one unit signal per bar.
pub struct SignalAggregator {
    strategies: Vec<Box<dyn Strategy>>,
    min_signals: u32,
    mode: TradingMode,
    last_bar: Option<NaiveDateTime>,
    evaluations: usize,
}

impl std::fmt::Debug for SignalAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.strategies.iter().map(|s| s.name()).collect();
        f.debug_struct("SignalAggregator")
            .field("strategies", &names)
            .field("min_signals", &self.min_signals)
            .field("mode", &self.mode)
            .field("last_bar", &self.last_bar)
            .finish()
    }
}

impl SignalAggregator {
    pub fn new(strategies: Vec<Box<dyn Strategy>>, min_signals: u32, mode: TradingMode) -> Self {
        Self {
            strategies,
            min_signals,
            mode,
            last_bar: None,
            evaluations: 0,
        }
    }

    /// Signal in {-1, 0, 1} for the latest bar of `window`.
    ///
    /// Each bar is voted on once; asking again for the same bar yields 0.
    pub fn signal(&mut self, window: &IndicatorWindow<'_>) -> i8 {
        let bar = window.bar_time();
        if self.last_bar == Some(bar) {
            return 0;
        }
        self.last_bar = Some(bar);
        self.evaluations += 1;

        let sum: i32 = self
            .strategies
            .iter()
            .map(|s| i32::from(clamp_vote(s.vote(window))))
            .sum();
        if sum.unsigned_abs() < self.min_signals {
            trace!(%bar, sum, "votes below min_signals");
            return 0;
        }
        self.mode.clip(sum)
    }

    /// Number of bars actually voted on.
    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    pub fn strategy_names(&self) -> impl Iterator<Item = &str> {
        self.strategies.iter().map(|s| s.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::IndicatorFrame;
    use chrono::{Duration, NaiveDate};

    struct Fixed(i8);

    impl Strategy for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }
        fn lookback(&self) -> usize {
            1
        }
        fn vote(&self, _window: &IndicatorWindow<'_>) -> i8 {
            self.0
        }
    }

    fn agg(votes: &[i8], min_signals: u32, mode: TradingMode) -> SignalAggregator {
        let strategies = votes
            .iter()
            .map(|&v| Box::new(Fixed(v)) as Box<dyn Strategy>)
            .collect();
        SignalAggregator::new(strategies, min_signals, mode)
    }

    fn frame(bars: usize) -> IndicatorFrame {
        let start = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(9, 15, 0)
            .unwrap();
        IndicatorFrame::new((0..bars).map(|i| start + Duration::minutes(i as i64)).collect())
            .unwrap()
    }

    #[test]
    fn below_min_signals_is_silent() {
        let f = frame(1);
        let mut a = agg(&[1, -1, 1], 2, TradingMode::Hedged);
        assert_eq!(a.signal(&f.tail(20).unwrap()), 0);
    }

    #[test]
    fn opposing_votes_cancel() {
        let f = frame(1);
        let mut a = agg(&[1, 1, -1, -1], 1, TradingMode::Hedged);
        assert_eq!(a.signal(&f.tail(20).unwrap()), 0);
    }

    #[test]
    fn side_restriction_clips() {
        let f = frame(1);
        let w = f.tail(20).unwrap();
        assert_eq!(agg(&[-1, -1], 2, TradingMode::LongOnly).signal(&w), 0);
        assert_eq!(agg(&[-1, -1], 2, TradingMode::ShortOnly).signal(&w), -1);
        assert_eq!(agg(&[1, 1, 1], 2, TradingMode::Hedged).signal(&w), 1);
    }

    #[test]
    fn out_of_range_votes_are_clamped() {
        let f = frame(1);
        let mut a = agg(&[5], 2, TradingMode::Hedged);
        assert_eq!(a.signal(&f.tail(20).unwrap()), 0);
    }

    #[test]
    fn same_bar_is_voted_once() {
        let f = frame(2);
        let mut a = agg(&[1, 1], 2, TradingMode::LongOnly);
        let w = f.tail(20).unwrap();
        assert_eq!(a.signal(&w), 1);
        assert_eq!(a.signal(&w), 0);
        assert_eq!(a.evaluations(), 1);

        // An earlier bar is a different bar.
        let older = f.window_at(f.timestamps()[1], Duration::minutes(1), 20).unwrap();
        assert_eq!(a.signal(&older), 1);
    }
}
