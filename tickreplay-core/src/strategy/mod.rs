//! Strategy capability: pure functions from an indicator window to a vote.
//!
//! Strategies never see account, order, or position state. They receive a
//! read-only [`IndicatorWindow`] over bars precomputed by the indicator
//! subsystem and return a directional vote in {-1, 0, 1}.

pub mod registry;
pub mod rules;
pub mod window;

pub use registry::{RegistryError, StrategyRegistry};
pub use window::{FrameError, IndicatorFrame, IndicatorWindow};

/// A rule-based directional vote.
///
/// Implementations must be side-effect free and must vote 0 when the window
/// is shorter than [`Strategy::lookback`] or a required column is missing.
pub trait Strategy: Send + Sync {
    /// Registry name (e.g. "macd").
    fn name(&self) -> &str;

    /// Number of trailing bars the rule reads.
    fn lookback(&self) -> usize;

    /// Vote on the latest bar of `window`.
    fn vote(&self, window: &IndicatorWindow<'_>) -> i8;
}

/// Clamp an arbitrary vote to {-1, 0, 1} by sign.
pub fn clamp_vote(vote: i8) -> i8 {
    vote.signum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_vote_keeps_sign() {
        assert_eq!(clamp_vote(5), 1);
        assert_eq!(clamp_vote(-2), -1);
        assert_eq!(clamp_vote(0), 0);
    }

    /// Strategies are shared across batch worker threads.
    #[allow(dead_code)]
    fn strategy_objects_are_send_sync() {
        fn require<T: Send + Sync + ?Sized>() {}
        require::<dyn Strategy>();
        require::<StrategyRegistry>();
    }
}
