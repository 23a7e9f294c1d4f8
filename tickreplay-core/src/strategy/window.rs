//! Precomputed indicator bars and the trailing window handed to strategies.
//!
//! Bars are labelled with their open time. A bar becomes visible to a
//! decision at time `t` only once it is complete, i.e. `bar_time + interval <= t`.
//! This keeps a still-forming bar out of every vote.

use chrono::{Duration, NaiveDateTime};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum FrameError {
    #[error("column '{name}' has {got} values, frame has {expected} bars")]
    LengthMismatch {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("bar timestamps must be strictly ascending (bar {0})")]
    Unsorted(usize),
}

/// Column-oriented table of indicator values, one row per bar.
#[derive(Debug, Clone, Default)]
pub struct IndicatorFrame {
    timestamps: Vec<NaiveDateTime>,
    columns: BTreeMap<String, Vec<f64>>,
}

impl IndicatorFrame {
    pub fn new(timestamps: Vec<NaiveDateTime>) -> Result<Self, FrameError> {
        if let Some(i) = timestamps.windows(2).position(|w| w[0] >= w[1]) {
            return Err(FrameError::Unsorted(i + 1));
        }
        Ok(Self {
            timestamps,
            columns: BTreeMap::new(),
        })
    }

    /// Insert or replace a named column.
    pub fn insert_column(
        &mut self,
        name: impl Into<String>,
        values: Vec<f64>,
    ) -> Result<(), FrameError> {
        let name = name.into();
        if values.len() != self.timestamps.len() {
            return Err(FrameError::LengthMismatch {
                name,
                expected: self.timestamps.len(),
                got: values.len(),
            });
        }
        self.columns.insert(name, values);
        Ok(())
    }

    pub fn with_column(
        mut self,
        name: impl Into<String>,
        values: Vec<f64>,
    ) -> Result<Self, FrameError> {
        self.insert_column(name, values)?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// The last `len` bars complete at `at`, or `None` if no bar is complete yet.
    pub fn window_at(
        &self,
        at: NaiveDateTime,
        interval: Duration,
        len: usize,
    ) -> Option<IndicatorWindow<'_>> {
        let end = self.timestamps.partition_point(|&t| t + interval <= at);
        self.window_ending(end, len)
    }

    /// The last `len` bars of the whole frame.
    pub fn tail(&self, len: usize) -> Option<IndicatorWindow<'_>> {
        self.window_ending(self.timestamps.len(), len)
    }

    fn window_ending(&self, end: usize, len: usize) -> Option<IndicatorWindow<'_>> {
        if end == 0 || len == 0 {
            return None;
        }
        Some(IndicatorWindow {
            frame: self,
            start: end.saturating_sub(len),
            end,
        })
    }
}

/// Zero-copy view over a contiguous run of bars ending at the decision bar.
///
/// Always holds at least one bar.
#[derive(Debug, Clone, Copy)]
pub struct IndicatorWindow<'a> {
    frame: &'a IndicatorFrame,
    start: usize,
    end: usize,
}

impl<'a> IndicatorWindow<'a> {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Open time of the latest bar in the window. Identifies the decision bar.
    pub fn bar_time(&self) -> NaiveDateTime {
        self.frame.timestamps[self.end - 1]
    }

    pub fn column(&self, name: &str) -> Option<&'a [f64]> {
        self.frame
            .columns
            .get(name)
            .map(|values| &values[self.start..self.end])
    }

    /// Value `back` bars before the latest one. `None` when out of range or not finite.
    pub fn value(&self, name: &str, back: usize) -> Option<f64> {
        let column = self.column(name)?;
        let idx = column.len().checked_sub(back + 1)?;
        Some(column[idx]).filter(|v| v.is_finite())
    }

    pub fn last(&self, name: &str) -> Option<f64> {
        self.value(name, 0)
    }

    pub fn prev(&self, name: &str) -> Option<f64> {
        self.value(name, 1)
    }
}
