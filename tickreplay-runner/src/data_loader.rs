//! CSV loading for tick streams and precomputed indicator frames.
//!
//! Tick files carry `timestamp,price,bid,ask[,volume]`. Empty bid/ask cells
//! are gaps the engine recovers from. Frame files carry a `timestamp` column
//! followed by one column per indicator; empty cells load as NaN, which
//! strategies treat as missing.

use chrono::NaiveDateTime;
use serde::Deserialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use tickreplay_core::domain::Tick;
use tickreplay_core::strategy::{FrameError, IndicatorFrame};

const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("row {row}: {reason}")]
    InvalidRow { row: usize, reason: String },

    #[error("row {row}: timestamp goes backwards")]
    Unsorted { row: usize },

    #[error("frame: {0}")]
    Frame(#[from] FrameError),

    #[error("no rows")]
    Empty,
}

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

fn open(path: &Path) -> Result<std::fs::File, LoadError> {
    std::fs::File::open(path).map_err(|source| LoadError::Open {
        path: path.to_path_buf(),
        source,
    })
}

// ─── Ticks ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct TickRow {
    timestamp: String,
    price: f64,
    bid: Option<f64>,
    ask: Option<f64>,
    #[serde(default)]
    volume: Option<f64>,
}

pub fn load_ticks(path: &Path) -> Result<Vec<Tick>, LoadError> {
    let ticks = read_ticks(open(path)?)?;
    info!(path = %path.display(), ticks = ticks.len(), "loaded ticks");
    Ok(ticks)
}

/// Parse a tick CSV. Timestamps must not go backwards.
pub fn read_ticks<R: Read>(reader: R) -> Result<Vec<Tick>, LoadError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut ticks: Vec<Tick> = Vec::new();

    for (i, row) in rdr.deserialize::<TickRow>().enumerate() {
        let row = row?;
        let line = i + 2;
        let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| LoadError::InvalidRow {
            row: line,
            reason: format!("bad timestamp '{}'", row.timestamp),
        })?;
        if !(row.price.is_finite() && row.price > 0.0) {
            return Err(LoadError::InvalidRow {
                row: line,
                reason: format!("price must be positive, got {}", row.price),
            });
        }
        if ticks.last().is_some_and(|prev| timestamp < prev.timestamp) {
            return Err(LoadError::Unsorted { row: line });
        }
        ticks.push(Tick {
            timestamp,
            price: row.price,
            bid: row.bid,
            ask: row.ask,
            volume: row.volume.unwrap_or(0.0),
        });
    }

    if ticks.is_empty() {
        return Err(LoadError::Empty);
    }
    Ok(ticks)
}

// ─── Indicator frames ────────────────────────────────────────────────

pub fn load_frame(path: &Path) -> Result<IndicatorFrame, LoadError> {
    let frame = read_frame(open(path)?)?;
    info!(
        path = %path.display(),
        bars = frame.len(),
        columns = frame.column_names().count(),
        "loaded indicator frame"
    );
    Ok(frame)
}

/// Parse an indicator CSV whose first column is the bar timestamp.
pub fn read_frame<R: Read>(reader: R) -> Result<IndicatorFrame, LoadError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let names: Vec<String> = rdr.headers()?.iter().skip(1).map(str::to_string).collect();

    let mut stamps = Vec::new();
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); names.len()];

    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        let line = i + 2;
        let raw_ts = record.get(0).unwrap_or_default();
        let ts = parse_timestamp(raw_ts).ok_or_else(|| LoadError::InvalidRow {
            row: line,
            reason: format!("bad timestamp '{raw_ts}'"),
        })?;
        stamps.push(ts);

        for (col, values) in columns.iter_mut().enumerate() {
            let cell = record.get(col + 1).unwrap_or_default();
            let value = if cell.is_empty() {
                f64::NAN
            } else {
                cell.parse::<f64>().map_err(|e| LoadError::InvalidRow {
                    row: line,
                    reason: format!("column '{}': {e}", names[col]),
                })?
            };
            values.push(value);
        }
    }

    if stamps.is_empty() {
        return Err(LoadError::Empty);
    }
    let mut frame = IndicatorFrame::new(stamps)?;
    for (name, values) in names.into_iter().zip(columns) {
        frame.insert_column(name, values)?;
    }
    Ok(frame)
}

/// BLAKE3 digest over every tick, for tying results to their input data.
pub fn dataset_hash(ticks: &[Tick]) -> String {
    let mut hasher = blake3::Hasher::new();
    for t in ticks {
        hasher.update(t.timestamp.to_string().as_bytes());
        hasher.update(&t.price.to_le_bytes());
        hasher.update(&t.bid.unwrap_or(f64::NAN).to_le_bytes());
        hasher.update(&t.ask.unwrap_or(f64::NAN).to_le_bytes());
        hasher.update(&t.volume.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_timestamp_styles() {
        assert!(parse_timestamp("2024-03-04T10:00:00").is_some());
        assert!(parse_timestamp("2024-03-04 10:00:00.250").is_some());
        assert!(parse_timestamp("04/03/2024").is_none());
    }

    #[test]
    fn empty_quote_cells_become_gaps() {
        let csv = "timestamp,price,bid,ask,volume\n\
                   2024-03-04T10:00:00,100.0,99.9,100.1,5\n\
                   2024-03-04T10:00:01,100.1,,,\n";
        let ticks = read_ticks(csv.as_bytes()).unwrap();
        assert_eq!(ticks.len(), 2);
        assert_eq!(ticks[0].bid, Some(99.9));
        assert_eq!(ticks[0].volume, 5.0);
        assert_eq!(ticks[1].bid, None);
        assert_eq!(ticks[1].ask, None);
        assert_eq!(ticks[1].volume, 0.0);
    }

    #[test]
    fn backwards_timestamps_are_rejected() {
        let csv = "timestamp,price,bid,ask\n\
                   2024-03-04T10:00:01,100.0,99.9,100.1\n\
                   2024-03-04T10:00:00,100.0,99.9,100.1\n";
        assert!(matches!(read_ticks(csv.as_bytes()), Err(LoadError::Unsorted { row: 3 })));
    }

    #[test]
    fn non_positive_price_is_rejected() {
        let csv = "timestamp,price,bid,ask\n2024-03-04T10:00:00,0,,\n";
        assert!(matches!(
            read_ticks(csv.as_bytes()),
            Err(LoadError::InvalidRow { row: 2, .. })
        ));
    }

    #[test]
    fn frame_columns_load_with_nan_for_blanks() {
        let csv = "timestamp,close,macd_hist\n\
                   2024-03-04 09:58:00,100.0,\n\
                   2024-03-04 09:59:00,100.5,0.2\n";
        let frame = read_frame(csv.as_bytes()).unwrap();
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.column_names().collect::<Vec<_>>(), vec!["close", "macd_hist"]);
        let w = frame.tail(2).unwrap();
        assert_eq!(w.prev("macd_hist"), None);
        assert_eq!(w.last("macd_hist"), Some(0.2));
    }

    #[test]
    fn dataset_hash_is_stable_and_sensitive() {
        let csv = "timestamp,price,bid,ask\n2024-03-04T10:00:00,100.0,99.9,100.1\n";
        let a = read_ticks(csv.as_bytes()).unwrap();
        let mut b = a.clone();
        assert_eq!(dataset_hash(&a), dataset_hash(&b));
        b[0].price = 100.5;
        assert_ne!(dataset_hash(&a), dataset_hash(&b));
    }
}
