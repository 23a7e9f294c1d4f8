//! Name to strategy constructor table.
//!
//! `StrategyRegistry::builtin()` knows the standard rule set; callers can add
//! their own constructors with [`StrategyRegistry::register`].

use std::collections::BTreeMap;

use super::rules::{
    AdxTrend, BandBreakout, BollingerMomentum, LineCross, MaMomentum, RsiStack, Slope, Spread,
    Threshold, ZeroCross,
};
use super::Strategy;

// ─── Error type ──────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RegistryError {
    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),
}

type Constructor = Box<dyn Fn() -> Box<dyn Strategy> + Send + Sync>;

// ─── Registry ────────────────────────────────────────────────────────

#[derive(Default)]
pub struct StrategyRegistry {
    constructors: BTreeMap<String, Constructor>,
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("strategies", &self.constructors.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl StrategyRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry pre-populated with every built-in strategy.
    pub fn builtin() -> Self {
        let mut r = Self::empty();

        r.register("rsi", RsiStack::default);
        r.register("bollinger", || {
            BandBreakout::new("bollinger", "upper_band", "lower_band")
        });
        r.register("macd", || ZeroCross::new("macd", "macd_hist"));
        r.register("vwap", || LineCross::new("vwap", "close", "vwap"));
        r.register("ma5", || LineCross::new("ma5", "ma5", "ma20"));
        r.register("ma20", || LineCross::new("ma20", "ma20", "ma50"));
        r.register("ppo", || ZeroCross::new("ppo", "ppo"));
        r.register("roc", || ZeroCross::new("roc", "roc"));
        r.register("tsi", || ZeroCross::new("tsi", "tsi"));
        r.register("atr", || Spread::new("atr", "close", "atr"));
        r.register("adx", AdxTrend::default);
        r.register("cci", || Threshold::trend("cci", "cci", 100.0, -100.0));
        r.register("momentum", MaMomentum::default);
        r.register("volume_ma", || {
            LineCross::new("volume_ma", "volume_ma5", "volume_ma10")
        });
        r.register("momentum_bollinger", BollingerMomentum::default);
        r.register("stochastic", || Spread::new("stochastic", "stoch_k", "stoch_d"));
        r.register("williams_r", || {
            Threshold::contrarian("williams_r", "williams_r", -20.0, -80.0)
        });
        r.register("psar", || Spread::new("psar", "close", "psar"));
        r.register("obv", || Slope::new("obv", "obv"));
        r.register("donchian", || {
            BandBreakout::new("donchian", "donchian_hband", "donchian_lband")
        });
        r.register("keltner", || {
            BandBreakout::new("keltner", "keltner_hband", "keltner_lband")
        });
        r.register("ultimate_oscillator", || {
            Threshold::trend("ultimate_oscillator", "uo", 50.0, 50.0)
        });
        r.register("force_index", || ZeroCross::new("force_index", "force_index"));
        r.register("vortex", || Spread::new("vortex", "vi_plus", "vi_minus"));

        r
    }

    /// Add or replace a constructor under `name`.
    pub fn register<S, F>(&mut self, name: impl Into<String>, ctor: F)
    where
        S: Strategy + 'static,
        F: Fn() -> S + Send + Sync + 'static,
    {
        let ctor: Constructor = Box::new(move || -> Box<dyn Strategy> { Box::new(ctor()) });
        self.constructors.insert(name.into(), ctor);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    pub fn create(&self, name: &str) -> Result<Box<dyn Strategy>, RegistryError> {
        self.constructors
            .get(name)
            .map(|ctor| ctor())
            .ok_or_else(|| RegistryError::UnknownStrategy(name.to_string()))
    }

    /// Instantiate every named strategy, failing on the first unknown name.
    pub fn create_all<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> Result<Vec<Box<dyn Strategy>>, RegistryError> {
        names.iter().map(|n| self.create(n.as_ref())).collect()
    }
}
