//! TickReplay Core: tick domain types, strategy votes, and the backtest engine.
//!
//! - Domain types (ticks, quotes, pending orders, positions, trade records)
//! - Strategy capability, indicator windows, and the name registry
//! - Tick-driven engine: pending order book, position ledger, account, session loop

pub mod domain;
pub mod engine;
pub mod strategy;

pub use engine::{BacktestEngine, EngineConfig, RunResult, StopReason};
