//! Intraday trading session window.

use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use super::config::ConfigError;

const fn hm(hour: u32, min: u32) -> NaiveTime {
    match NaiveTime::from_hms_opt(hour, min, 0) {
        Some(t) => t,
        None => panic!("invalid session time"),
    }
}

pub const DEFAULT_OPEN: NaiveTime = hm(9, 15);
pub const DEFAULT_CLOSE: NaiveTime = hm(14, 30);
pub const DEFAULT_FLATTEN_AT: NaiveTime = hm(14, 29);

/// Times of day bounding the tradable part of a session.
///
/// Ticks in `[open, close]` run the full pipeline. From `flatten_at` on, every
/// position is closed and every pending order is dropped on each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionWindow {
    pub open: NaiveTime,
    pub close: NaiveTime,
    pub flatten_at: NaiveTime,
    /// No new orders after this time, if set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_entry: Option<NaiveTime>,
}

impl Default for SessionWindow {
    fn default() -> Self {
        Self {
            open: DEFAULT_OPEN,
            close: DEFAULT_CLOSE,
            flatten_at: DEFAULT_FLATTEN_AT,
            last_entry: None,
        }
    }
}

impl SessionWindow {
    /// Inclusive on both ends.
    pub fn contains(&self, at: NaiveDateTime) -> bool {
        let t = at.time();
        t >= self.open && t <= self.close
    }

    pub fn is_flatten(&self, at: NaiveDateTime) -> bool {
        at.time() >= self.flatten_at
    }

    pub fn accepts_entries(&self, at: NaiveDateTime) -> bool {
        self.last_entry.map_or(true, |cutoff| at.time() <= cutoff)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.open >= self.close {
            return Err(ConfigError::Session("open must be before close"));
        }
        if self.flatten_at < self.open || self.flatten_at > self.close {
            return Err(ConfigError::Session("flatten_at must lie within [open, close]"));
        }
        if let Some(cutoff) = self.last_entry {
            if cutoff < self.open || cutoff > self.flatten_at {
                return Err(ConfigError::Session(
                    "last_entry must lie within [open, flatten_at]",
                ));
            }
        }
        Ok(())
    }
}
