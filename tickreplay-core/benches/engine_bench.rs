//! Criterion benchmarks for the tick loop.
//!
//! Benchmarks:
//! 1. Full replay over a synthetic trading day at several tick densities
//! 2. Pending order book step with many resting orders

use chrono::{Duration, NaiveDate, NaiveDateTime};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use tickreplay_core::domain::{Direction, Quote, Tick};
use tickreplay_core::engine::{
    BacktestEngine, EngineConfig, PendingOrderBook, PositionMode, RawEngineConfig,
};
use tickreplay_core::strategy::{IndicatorFrame, StrategyRegistry};

// ── Helpers ──────────────────────────────────────────────────────────

fn session_start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 4)
        .unwrap()
        .and_hms_opt(9, 15, 0)
        .unwrap()
}

fn make_ticks(n: usize) -> Vec<Tick> {
    let step_ms = (5 * 3600 * 1000 / n as i64).max(1);
    (0..n)
        .map(|i| {
            let price = 100.0 + (i as f64 * 0.01).sin() * 2.0;
            let at = session_start() + Duration::milliseconds(step_ms * i as i64);
            Tick::new(at, price, price - 0.05, price + 0.05)
        })
        .collect()
}

fn make_frame() -> IndicatorFrame {
    let bars = 360;
    let start = session_start() - Duration::minutes(30);
    let stamps = (0..bars).map(|i| start + Duration::minutes(i as i64)).collect();
    let wave = |phase: f64| -> Vec<f64> {
        (0..bars)
            .map(|i| (i as f64 * 0.2 + phase).sin())
            .collect()
    };
    IndicatorFrame::new(stamps)
        .and_then(|f| f.with_column("macd_hist", wave(0.0)))
        .and_then(|f| f.with_column("ppo", wave(0.3)))
        .and_then(|f| f.with_column("roc", wave(0.6)))
        .unwrap()
}

fn make_config() -> EngineConfig {
    EngineConfig::from_raw(RawEngineConfig {
        tp: Some(0.5),
        sl: Some(0.3),
        mode: Some(PositionMode::Hedged),
        min_signals: Some(1),
        strategies: Some(vec!["macd".into(), "ppo".into(), "roc".into()]),
        ..Default::default()
    })
    .unwrap()
}

// ── 1. Replay ────────────────────────────────────────────────────────

fn bench_replay(c: &mut Criterion) {
    let registry = StrategyRegistry::builtin();
    let config = make_config();
    let frame = make_frame();

    let mut group = c.benchmark_group("replay");
    for n in [10_000usize, 100_000] {
        let ticks = make_ticks(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &ticks, |b, ticks| {
            b.iter(|| {
                let engine = BacktestEngine::from_config(config.clone(), &registry).unwrap();
                black_box(engine.run(ticks, &frame))
            })
        });
    }
    group.finish();
}

// ── 2. Pending book ──────────────────────────────────────────────────

fn bench_pending_step(c: &mut Criterion) {
    c.bench_function("pending_step_500_orders", |b| {
        b.iter(|| {
            let mut book = PendingOrderBook::new();
            for i in 0..500 {
                let direction = if i % 2 == 0 { Direction::Long } else { Direction::Short };
                book.submit(direction, 100.0, session_start(), Duration::minutes(30));
            }
            let quote = Quote::new(99.0, 99.5);
            black_box(book.step(session_start() + Duration::minutes(1), Some(quote), 5))
        })
    });
}

criterion_group!(benches, bench_replay, bench_pending_step);
criterion_main!(benches);
