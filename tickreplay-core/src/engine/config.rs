//! Engine configuration.
//!
//! [`RawEngineConfig`] is the all-optional form read from TOML. It is turned
//! into a validated [`EngineConfig`] by [`EngineConfig::from_raw`], which is
//! the only way to build one. Every rule violation is reported before any tick
//! is processed.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::session::SessionWindow;

pub const DEFAULT_INITIAL_BALANCE: f64 = 10_000.0;
pub const DEFAULT_COST: f64 = 0.07;
pub const DEFAULT_MAX_POS: usize = 5;
pub const DEFAULT_MARGIN: f64 = 0.25;
pub const DEFAULT_MIN_SIGNALS: u32 = 2;
pub const DEFAULT_TIMEOUT_MINUTES: i64 = 30;
pub const DEFAULT_INTERVAL_MINUTES: i64 = 1;
pub const DEFAULT_WINDOW: usize = 20;

const MARGIN_RANGE: (f64, f64) = (0.2, 1.0);

// ─── Error type ──────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required field '{0}'")]
    Missing(&'static str),

    #[error("'{field}' must be {requirement}, got {value}")]
    OutOfRange {
        field: &'static str,
        requirement: &'static str,
        value: f64,
    },

    #[error("one_way mode requires 'side' (long or short)")]
    MissingSide,

    #[error("invalid session: {0}")]
    Session(&'static str),

    #[error("read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

fn out_of_range(field: &'static str, requirement: &'static str, value: f64) -> ConfigError {
    ConfigError::OutOfRange {
        field,
        requirement,
        value,
    }
}

// ─── Modes ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionMode {
    /// A single net direction, fixed by `side`.
    #[default]
    OneWay,
    /// Long and short positions may coexist.
    Hedged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Long,
    Short,
}

/// Which directions the signal aggregator may emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradingMode {
    LongOnly,
    ShortOnly,
    Hedged,
}

impl TradingMode {
    /// Reduce a summed vote to a unit signal permitted by this mode.
    pub fn clip(self, sum: i32) -> i8 {
        match self {
            Self::LongOnly => i8::from(sum > 0),
            Self::ShortOnly => -i8::from(sum < 0),
            Self::Hedged => sum.signum() as i8,
        }
    }
}

/// Units per fill.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionSizing {
    /// Always this many units.
    Fixed(u64),
    /// This fraction of the balance, converted to units at the margin rate.
    Fraction(f64),
}

impl Default for PositionSizing {
    fn default() -> Self {
        Self::Fixed(1)
    }
}

// ─── Raw form ────────────────────────────────────────────────────────

/// Deserialized configuration before defaults and validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawEngineConfig {
    pub initial_balance: Option<f64>,
    pub cost: Option<f64>,
    pub slippage: Option<f64>,
    pub tp: Option<f64>,
    pub sl: Option<f64>,
    pub max_pos: Option<usize>,
    pub position_size: Option<PositionSizing>,
    pub margin: Option<f64>,
    pub min_signals: Option<u32>,
    pub mode: Option<PositionMode>,
    pub side: Option<Side>,
    /// Minutes a pending order stays valid.
    pub timeout: Option<i64>,
    /// Bar size in minutes.
    pub interval: Option<i64>,
    /// Trailing bars handed to strategies.
    pub window: Option<usize>,
    pub strategies: Option<Vec<String>>,
    pub session: Option<SessionWindow>,
}

// ─── Validated form ──────────────────────────────────────────────────

/// Immutable, validated configuration for one engine instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineConfig {
    pub initial_balance: f64,
    pub cost: f64,
    pub slippage: f64,
    pub tp: f64,
    pub sl: f64,
    pub max_pos: usize,
    pub position_size: PositionSizing,
    pub margin: f64,
    pub min_signals: u32,
    pub mode: PositionMode,
    pub side: Option<Side>,
    pub timeout: i64,
    pub interval: i64,
    pub window: usize,
    pub strategies: Vec<String>,
    pub session: SessionWindow,
}

impl EngineConfig {
    pub fn from_raw(raw: RawEngineConfig) -> Result<Self, ConfigError> {
        let tp = raw.tp.ok_or(ConfigError::Missing("tp"))?;
        let sl = raw.sl.ok_or(ConfigError::Missing("sl"))?;
        let mode = raw.mode.unwrap_or_default();
        if mode == PositionMode::OneWay && raw.side.is_none() {
            return Err(ConfigError::MissingSide);
        }

        let config = Self {
            initial_balance: raw.initial_balance.unwrap_or(DEFAULT_INITIAL_BALANCE),
            cost: raw.cost.unwrap_or(DEFAULT_COST),
            slippage: raw.slippage.unwrap_or(0.0),
            tp,
            sl,
            max_pos: raw.max_pos.unwrap_or(DEFAULT_MAX_POS),
            position_size: raw.position_size.unwrap_or_default(),
            margin: raw.margin.unwrap_or(DEFAULT_MARGIN),
            min_signals: raw.min_signals.unwrap_or(DEFAULT_MIN_SIGNALS),
            mode,
            side: raw.side,
            timeout: raw.timeout.unwrap_or(DEFAULT_TIMEOUT_MINUTES),
            interval: raw.interval.unwrap_or(DEFAULT_INTERVAL_MINUTES),
            window: raw.window.unwrap_or(DEFAULT_WINDOW),
            strategies: raw.strategies.unwrap_or_default(),
            session: raw.session.unwrap_or_default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let raw: RawEngineConfig = toml::from_str(content)?;
        Self::from_raw(raw)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.initial_balance > 0.0) {
            return Err(out_of_range("initial_balance", "> 0", self.initial_balance));
        }
        if !(self.tp > 0.0) {
            return Err(out_of_range("tp", "> 0", self.tp));
        }
        if !(self.sl > 0.0) {
            return Err(out_of_range("sl", "> 0", self.sl));
        }
        if !(self.cost >= 0.0) {
            return Err(out_of_range("cost", ">= 0", self.cost));
        }
        if !(self.slippage >= 0.0) {
            return Err(out_of_range("slippage", ">= 0", self.slippage));
        }
        let (lo, hi) = MARGIN_RANGE;
        if !(lo..=hi).contains(&self.margin) {
            return Err(out_of_range("margin", "within [0.2, 1.0]", self.margin));
        }
        if self.max_pos == 0 {
            return Err(out_of_range("max_pos", ">= 1", 0.0));
        }
        match self.position_size {
            PositionSizing::Fixed(0) => {
                return Err(out_of_range("position_size.fixed", ">= 1", 0.0));
            }
            PositionSizing::Fraction(f) if !(f > 0.0 && f <= 1.0) => {
                return Err(out_of_range("position_size.fraction", "within (0, 1]", f));
            }
            _ => {}
        }
        if self.min_signals == 0 {
            return Err(out_of_range("min_signals", ">= 1", 0.0));
        }
        if self.timeout < 1 {
            return Err(out_of_range("timeout", ">= 1 minute", self.timeout as f64));
        }
        if self.interval < 1 {
            return Err(out_of_range("interval", ">= 1 minute", self.interval as f64));
        }
        if self.window == 0 {
            return Err(out_of_range("window", ">= 1 bar", 0.0));
        }
        self.session.validate()
    }

    pub fn trading_mode(&self) -> TradingMode {
        match (self.mode, self.side) {
            (PositionMode::Hedged, _) => TradingMode::Hedged,
            (PositionMode::OneWay, Some(Side::Short)) => TradingMode::ShortOnly,
            (PositionMode::OneWay, _) => TradingMode::LongOnly,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::minutes(self.timeout)
    }

    pub fn interval(&self) -> Duration {
        Duration::minutes(self.interval)
    }

    /// Stable JSON encoding, used for run fingerprints.
    pub fn to_canonical_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl TryFrom<RawEngineConfig> for EngineConfig {
    type Error = ConfigError;

    fn try_from(raw: RawEngineConfig) -> Result<Self, Self::Error> {
        Self::from_raw(raw)
    }
}
