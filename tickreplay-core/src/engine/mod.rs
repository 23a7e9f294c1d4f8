//! Tick-driven backtest engine.
//!
//! Each tick runs, in order:
//!
//! 0. Day rollover. The first tick of a new date closes whatever the previous
//!    session left open and expires its resting orders.
//! 1. Session gate. Steps 2-6 only run inside the session window.
//! 2. Take-profit / stop-loss exits.
//! 3. Buying power.
//! 4. Pending order expiry and fills.
//! 5. Signal aggregation and order submission.
//! 6. Forced liquidation on margin shortfall.
//! 7. Session-end flatten.
//! 8. Balance / equity snapshot.
//! 9. Early stop when flat and unable to margin one unit.
//!
//! Exits and fills execute against the next tick's quote (one-step lookahead).

pub mod account;
pub mod config;
pub mod ledger;
pub mod pending;
pub mod quote;
pub mod result;
pub mod session;
pub mod signal;

pub use account::AccountState;
pub use config::{
    ConfigError, EngineConfig, PositionMode, PositionSizing, RawEngineConfig, Side, TradingMode,
};
pub use ledger::{FeeModel, PositionLedger};
pub use pending::{PendingOrderBook, StepOutcome};
pub use quote::QuoteTracker;
pub use result::{RunResult, StopReason};
pub use session::SessionWindow;
pub use signal::SignalAggregator;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, info, warn};

use crate::domain::{Direction, EquityPoint, Quote, Tick};
use crate::strategy::{IndicatorFrame, RegistryError, Strategy, StrategyRegistry};

/// One independent simulation. Owns all of its state; nothing is shared
/// between instances.
#[derive(Debug)]
pub struct BacktestEngine {
    config: EngineConfig,
    account: AccountState,
    ledger: PositionLedger,
    book: PendingOrderBook,
    signals: SignalAggregator,
    quotes: QuoteTracker,
    ticks_processed: usize,
    signals_emitted: usize,
    session_day: Option<NaiveDate>,
    stopped: Option<NaiveDateTime>,
}

impl BacktestEngine {
    pub fn new(config: EngineConfig, strategies: Vec<Box<dyn Strategy>>) -> Self {
        let signals =
            SignalAggregator::new(strategies, config.min_signals, config.trading_mode());
        Self {
            account: AccountState::new(config.initial_balance),
            ledger: PositionLedger::new(&config),
            book: PendingOrderBook::new(),
            signals,
            quotes: QuoteTracker::new(),
            ticks_processed: 0,
            signals_emitted: 0,
            session_day: None,
            stopped: None,
            config,
        }
    }

    /// Build with the strategies named in `config.strategies`.
    pub fn from_config(
        config: EngineConfig,
        registry: &StrategyRegistry,
    ) -> Result<Self, RegistryError> {
        let strategies = registry.create_all(&config.strategies)?;
        Ok(Self::new(config, strategies))
    }

    /// Process `ticks[index]`, peeking at `ticks[index + 1]` for the execution
    /// quote. Returns the tick's equity snapshot, or `None` if the engine has
    /// stopped or `index` is out of range.
    pub fn process_tick(
        &mut self,
        index: usize,
        ticks: &[Tick],
        frame: &IndicatorFrame,
    ) -> Option<EquityPoint> {
        if self.stopped.is_some() {
            return None;
        }
        let tick = ticks.get(index)?;
        let (at, price) = (tick.timestamp, tick.price);
        self.roll_session(at, price);
        let quote = self.quotes.resolve(tick, ticks.get(index + 1));
        let session = self.config.session;

        if session.contains(at) {
            if quote.is_none() {
                warn!(%at, "no usable quote, skipping exit and fill checks");
            }
            self.trade_step(at, price, quote, frame);
        }

        if session.is_flatten(at) {
            let flat = quote.unwrap_or_else(|| Quote::flat(price));
            let closed = self.ledger.close_all(flat, at, &mut self.account);
            let dropped = self.book.expire_all();
            if closed > 0 || !dropped.is_empty() {
                info!(%at, closed, dropped = dropped.len(), "session end, flattened");
            }
        }

        let point = self
            .account
            .record(at, self.ledger.unrealized_pnl(price));
        self.ticks_processed += 1;

        if self.ledger.is_empty() && !self.account.covers_one_unit(price, self.config.margin) {
            warn!(%at, balance = self.account.balance(), "balance exhausted, stopping");
            self.stopped = Some(at);
        }
        Some(point)
    }

    /// A date change ends the previous session even if its data stopped
    /// before the cutoff. Leftovers close at the last known quote.
    fn roll_session(&mut self, at: NaiveDateTime, price: f64) {
        let day = at.date();
        let rolled = self.session_day.is_some_and(|prev| prev != day);
        self.session_day = Some(day);
        if !rolled {
            return;
        }
        let last = self.quotes.last().unwrap_or_else(|| Quote::flat(price));
        let closed = self.ledger.close_all(last, at, &mut self.account);
        let dropped = self.book.expire_all();
        if closed > 0 || !dropped.is_empty() {
            info!(%at, closed, dropped = dropped.len(), "new session day, flattened leftovers");
        }
    }

    /// Steps 2 to 6 of the per-tick pipeline.
    fn trade_step(
        &mut self,
        at: NaiveDateTime,
        price: f64,
        quote: Option<Quote>,
        frame: &IndicatorFrame,
    ) {
        if let Some(q) = quote {
            self.ledger.check_exits(q, at, &mut self.account);
        }

        let buying_power = self.ledger.buying_power(self.account.balance(), price);

        let size = self.ledger.position_size(self.account.balance(), price);
        let capacity = if size == 0 {
            0
        } else {
            self.config.max_pos.saturating_sub(self.ledger.len())
        };
        let outcome = self.book.step(at, quote, capacity);
        for order in &outcome.filled {
            self.ledger.open(order.direction, price, size, at);
        }
        if !outcome.expired.is_empty() {
            debug!(%at, expired = outcome.expired.len(), "orders expired");
        }

        if buying_power >= 1
            && self.ledger.len() < self.config.max_pos
            && self.config.session.accepts_entries(at)
        {
            self.maybe_submit(at, price, frame);
        }

        if !self.ledger.is_empty() {
            let q = quote.unwrap_or_else(|| Quote::flat(price));
            self.ledger
                .force_liquidate(price, q, at, &mut self.account);
        }
    }

    fn maybe_submit(&mut self, at: NaiveDateTime, price: f64, frame: &IndicatorFrame) {
        let Some(window) = frame.window_at(at, self.config.interval(), self.config.window)
        else {
            return;
        };
        let Some(direction) = Direction::from_vote(self.signals.signal(&window)) else {
            return;
        };
        let id = self
            .book
            .submit(direction, price, at, self.config.timeout());
        self.signals_emitted += 1;
        debug!(%id, %at, direction = direction.as_str(), limit = price, "order submitted");
    }

    /// Replay every tick, stopping early on balance exhaustion.
    pub fn run(mut self, ticks: &[Tick], frame: &IndicatorFrame) -> RunResult {
        info!(
            ticks = ticks.len(),
            bars = frame.len(),
            strategies = ?self.signals.strategy_names().collect::<Vec<_>>(),
            "backtest started"
        );
        for index in 0..ticks.len() {
            self.process_tick(index, ticks, frame);
            if self.is_stopped() {
                break;
            }
        }
        let result = self.finish();
        info!(
            trades = result.trades.len(),
            final_balance = result.final_balance,
            stopped_early = result.stopped_early(),
            "backtest finished"
        );
        result
    }

    /// Consume the engine into its result.
    pub fn finish(self) -> RunResult {
        let stop_reason = match self.stopped {
            Some(at) => StopReason::BalanceExhausted { at },
            None => StopReason::Completed,
        };
        let final_balance = self.account.balance();
        let final_equity = self
            .account
            .equity_curve()
            .last()
            .map_or(final_balance, |p| p.equity);
        RunResult {
            initial_balance: self.account.initial_balance(),
            final_balance,
            final_equity,
            ticks_processed: self.ticks_processed,
            stop_reason,
            orders_submitted: self.book.submitted_count(),
            orders_filled: self.book.filled_count(),
            orders_expired: self.book.expired_count(),
            liquidations: self.ledger.liquidations(),
            signals: self.signals_emitted,
            quote_gaps: self.quotes.gaps(),
            open_positions: self.ledger.len(),
            trades: self.ledger.into_history(),
            equity_curve: self.account.into_equity_curve(),
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.is_some()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn account(&self) -> &AccountState {
        &self.account
    }

    pub fn ledger(&self) -> &PositionLedger {
        &self.ledger
    }

    pub fn pending(&self) -> &PendingOrderBook {
        &self.book
    }

    pub fn aggregator(&self) -> &SignalAggregator {
        &self.signals
    }
}
