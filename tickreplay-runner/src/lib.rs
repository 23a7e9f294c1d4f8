//! TickReplay Runner: everything around a single engine run.
//!
//! This crate builds on `tickreplay-core` to provide:
//! - CSV loading for ticks and precomputed indicator bars
//! - Performance metrics with explicit degenerate cases
//! - Parallel batch runs with content-hashed config fingerprints
//! - Artifact export (CSV tapes, JSON summary, Markdown report)

pub mod batch;
pub mod data_loader;
pub mod export;
pub mod metrics;

pub use batch::{
    config_fingerprint, load_batch, parse_batch, run_batch, run_single, BatchError, BatchOutcome,
    BatchSpec,
};
pub use data_loader::{dataset_hash, load_frame, load_ticks, read_frame, read_ticks, LoadError};
pub use export::{load_summary, save_artifacts, ExportError, RunSummary, SCHEMA_VERSION};
pub use metrics::PerformanceMetrics;
