//! Batch runs: many engine configurations over one dataset, in parallel.
//!
//! Each run owns its engine state; the tick slice, indicator frame and
//! strategy registry are shared read-only. Outcomes come back in input order,
//! so a parallel batch is indistinguishable from a sequential one.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use tickreplay_core::domain::Tick;
use tickreplay_core::engine::{ConfigError, EngineConfig, RawEngineConfig};
use tickreplay_core::strategy::{IndicatorFrame, RegistryError, StrategyRegistry};
use tickreplay_core::{BacktestEngine, RunResult};

use crate::metrics::PerformanceMetrics;

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("failed to read batch file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid batch file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("run '{label}': {source}")]
    Config {
        label: String,
        #[source]
        source: ConfigError,
    },

    #[error("batch file defines no runs")]
    Empty,

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("failed to encode config for fingerprinting: {0}")]
    Fingerprint(#[from] serde_json::Error),
}

/// One labelled configuration in a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSpec {
    pub label: String,
    pub config: EngineConfig,
}

#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub label: String,
    pub fingerprint: String,
    pub result: RunResult,
    pub metrics: PerformanceMetrics,
}

/// Content hash of a configuration; identical configs share a fingerprint.
pub fn config_fingerprint(config: &EngineConfig) -> Result<String, serde_json::Error> {
    let hash = blake3::hash(config.to_canonical_json()?.as_bytes());
    Ok(hash.to_hex()[..16].to_string())
}

// ─── Batch file ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawBatchFile {
    #[serde(default)]
    runs: Vec<RawBatchRun>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawBatchRun {
    label: String,
    #[serde(default)]
    config: RawEngineConfig,
}

/// Parse a batch file of `[[runs]]` tables, each with a `label` and a
/// `[runs.config]` table using the single-run configuration keys.
pub fn parse_batch(content: &str) -> Result<Vec<BatchSpec>, BatchError> {
    let raw: RawBatchFile = toml::from_str(content)?;
    if raw.runs.is_empty() {
        return Err(BatchError::Empty);
    }
    raw.runs
        .into_iter()
        .map(|run| {
            let config = EngineConfig::from_raw(run.config).map_err(|source| BatchError::Config {
                label: run.label.clone(),
                source,
            })?;
            Ok(BatchSpec {
                label: run.label,
                config,
            })
        })
        .collect()
}

pub fn load_batch(path: &Path) -> Result<Vec<BatchSpec>, BatchError> {
    let content = std::fs::read_to_string(path).map_err(|source| BatchError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_batch(&content)
}

// ─── Execution ──────────────────────────────────────────────────────

pub fn run_single(
    spec: &BatchSpec,
    ticks: &[Tick],
    frame: &IndicatorFrame,
    registry: &StrategyRegistry,
) -> Result<BatchOutcome, BatchError> {
    let fingerprint = config_fingerprint(&spec.config)?;
    debug!(label = %spec.label, %fingerprint, "starting run");
    let engine = BacktestEngine::from_config(spec.config.clone(), registry)?;
    let result = engine.run(ticks, frame);
    let metrics = PerformanceMetrics::compute(&result, &spec.config);
    Ok(BatchOutcome {
        label: spec.label.clone(),
        fingerprint,
        result,
        metrics,
    })
}

/// Run every spec over the same data. Strategy names are resolved before any
/// run starts, so an unknown name fails the whole batch up front.
pub fn run_batch(
    specs: &[BatchSpec],
    ticks: &[Tick],
    frame: &IndicatorFrame,
    registry: &StrategyRegistry,
    parallel: bool,
) -> Result<Vec<BatchOutcome>, BatchError> {
    for spec in specs {
        if let Some(unknown) = spec.config.strategies.iter().find(|n| !registry.contains(n)) {
            return Err(RegistryError::UnknownStrategy(unknown.clone()).into());
        }
    }

    info!(runs = specs.len(), ticks = ticks.len(), parallel, "running batch");
    let outcomes = if parallel {
        specs
            .par_iter()
            .map(|spec| run_single(spec, ticks, frame, registry))
            .collect::<Result<Vec<_>, _>>()?
    } else {
        specs
            .iter()
            .map(|spec| run_single(spec, ticks, frame, registry))
            .collect::<Result<Vec<_>, _>>()?
    };
    Ok(outcomes)
}
