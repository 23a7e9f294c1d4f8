//! Open positions, exits, margin enforcement, and the closed-trade log.
//!
//! Every close goes through [`PositionLedger::close`], so all exit paths apply
//! the same fee model and move the balance by exactly the recorded realized PnL.

use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::account::AccountState;
use super::config::{EngineConfig, PositionSizing};
use crate::domain::{
    CloseReason, Direction, IdGen, Position, PositionId, PositionStatus, Quote, TradeRecord,
};

/// Fees charged once per closed position, independent of size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeeModel {
    pub cost: f64,
    /// Per side; charged twice per round trip.
    pub slippage: f64,
}

impl FeeModel {
    pub fn new(cost: f64, slippage: f64) -> Self {
        Self { cost, slippage }
    }

    pub fn per_trade(&self) -> f64 {
        self.slippage * 2.0 + self.cost
    }
}

#[derive(Debug, Clone)]
pub struct PositionLedger {
    open: BTreeMap<PositionId, Position>,
    history: Vec<TradeRecord>,
    ids: IdGen,
    fees: FeeModel,
    margin: f64,
    tp: f64,
    sl: f64,
    sizing: PositionSizing,
    liquidations: usize,
}

impl PositionLedger {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            open: BTreeMap::new(),
            history: Vec::new(),
            ids: IdGen::default(),
            fees: FeeModel::new(config.cost, config.slippage),
            margin: config.margin,
            tp: config.tp,
            sl: config.sl,
            sizing: config.position_size,
            liquidations: 0,
        }
    }

    // ─── Opening ─────────────────────────────────────────────────────

    pub fn open(
        &mut self,
        direction: Direction,
        entry_price: f64,
        size: u64,
        at: NaiveDateTime,
    ) -> PositionId {
        let id = self.ids.next_position_id();
        let position = Position::open(id, at, direction, entry_price, size, self.tp, self.sl);
        debug!(
            %id,
            direction = direction.as_str(),
            entry_price,
            size,
            tp = position.take_profit,
            sl = position.stop_loss,
            "position opened"
        );
        self.open.insert(id, position);
        id
    }

    /// Units for the next fill at `price`.
    ///
    /// Proportional sizing floors to whole units, but never below one unit
    /// while the balance can margin one. Zero means nothing can be opened.
    pub fn position_size(&self, balance: f64, price: f64) -> u64 {
        match self.sizing {
            PositionSizing::Fixed(units) => units,
            PositionSizing::Fraction(fraction) => {
                let unit_margin = price * self.margin;
                if !(unit_margin > 0.0) {
                    return 0;
                }
                let units = (balance * fraction / unit_margin).floor();
                if units >= 1.0 {
                    units as u64
                } else if balance >= unit_margin {
                    1
                } else {
                    0
                }
            }
        }
    }

    // ─── Closing ─────────────────────────────────────────────────────

    /// Close one open position at `quote`. Returns `None` if `id` is not open.
    pub fn close(
        &mut self,
        id: PositionId,
        quote: Quote,
        at: NaiveDateTime,
        reason: CloseReason,
        account: &mut AccountState,
    ) -> Option<&TradeRecord> {
        let mut position = self.open.remove(&id)?;
        let price = position.exit_price(quote);
        let gross = position.pnl_at(price);
        let fees = self.fees.per_trade();
        let realized = gross - fees;

        account.apply_close(realized, fees);
        position.status = PositionStatus::Closed(reason);
        debug!(%id, reason = reason.as_str(), price, realized, "position closed");

        self.history.push(TradeRecord::from_position(
            &position, at, price, reason, gross, fees, realized,
        ));
        self.history.last()
    }

    /// Close every position whose take-profit or stop-loss the quote reaches.
    pub fn check_exits(
        &mut self,
        quote: Quote,
        at: NaiveDateTime,
        account: &mut AccountState,
    ) -> usize {
        let hits: Vec<(PositionId, CloseReason)> = self
            .open
            .values()
            .filter_map(|p| p.exit_trigger(quote).map(|reason| (p.id, reason)))
            .collect();
        for &(id, reason) in &hits {
            self.close(id, quote, at, reason, account);
        }
        hits.len()
    }

    /// While equity is below the margin requirement at `price`, close the
    /// position with the lowest mark at `quote`. Ties go to the oldest.
    pub fn force_liquidate(
        &mut self,
        price: f64,
        quote: Quote,
        at: NaiveDateTime,
        account: &mut AccountState,
    ) -> usize {
        let mut closed = 0;
        while !self.open.is_empty() && !self.meets_margin(account.balance(), price) {
            let worst = self
                .open
                .values()
                .map(|p| (p.id, p.pnl_at(p.exit_price(quote))))
                .fold(None, |worst: Option<(PositionId, f64)>, (id, pnl)| match worst {
                    Some((_, w)) if w <= pnl => worst,
                    _ => Some((id, pnl)),
                });
            let Some((id, mark)) = worst else {
                break;
            };
            warn!(
                %id,
                mark,
                equity = self.equity(account.balance(), price),
                required = self.margin_requirement(price),
                "margin shortfall, liquidating"
            );
            self.close(id, quote, at, CloseReason::MarginCall, account);
            closed += 1;
        }
        self.liquidations += closed;
        closed
    }

    /// Close everything, oldest first.
    pub fn close_all(
        &mut self,
        quote: Quote,
        at: NaiveDateTime,
        account: &mut AccountState,
    ) -> usize {
        let ids: Vec<PositionId> = self.open.keys().copied().collect();
        for &id in &ids {
            self.close(id, quote, at, CloseReason::SessionEnd, account);
        }
        ids.len()
    }

    // ─── Valuation ───────────────────────────────────────────────────

    /// Sum of gross marks at `price`. Fees apply only on close.
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.open.values().map(|p| p.pnl_at(price)).sum()
    }

    pub fn equity(&self, balance: f64, price: f64) -> f64 {
        balance + self.unrealized_pnl(price)
    }

    pub fn margin_requirement(&self, price: f64) -> f64 {
        self.margin * price * self.open.len() as f64
    }

    pub fn meets_margin(&self, balance: f64, price: f64) -> bool {
        self.equity(balance, price) >= self.margin_requirement(price)
    }

    /// Additional whole units that could be margined at `price`. May be negative.
    pub fn buying_power(&self, balance: f64, price: f64) -> i64 {
        let unit_margin = price * self.margin;
        if !(unit_margin > 0.0) {
            return 0;
        }
        let free = self.equity(balance, price) - self.margin_requirement(price);
        (free / unit_margin).floor() as i64
    }

    // ─── Accessors ───────────────────────────────────────────────────

    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }

    /// Open positions in ledger (insertion) order.
    pub fn open_positions(&self) -> impl Iterator<Item = &Position> {
        self.open.values()
    }

    pub fn history(&self) -> &[TradeRecord] {
        &self.history
    }

    pub fn into_history(self) -> Vec<TradeRecord> {
        self.history
    }

    pub fn liquidations(&self) -> usize {
        self.liquidations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::{RawEngineConfig, Side};
    use chrono::NaiveDate;

    fn at(min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(10, min, 0)
            .unwrap()
    }

    fn config(raw: RawEngineConfig) -> EngineConfig {
        EngineConfig::from_raw(RawEngineConfig {
            tp: Some(2.0),
            sl: Some(1.0),
            side: Some(Side::Long),
            cost: raw.cost.or(Some(0.1)),
            slippage: raw.slippage.or(Some(0.05)),
            ..raw
        })
        .unwrap()
    }

    fn ledger() -> PositionLedger {
        PositionLedger::new(&config(RawEngineConfig::default()))
    }

    #[test]
    fn take_profit_close_applies_fees_once() {
        let mut l = ledger();
        let mut acct = AccountState::new(10_000.0);
        l.open(Direction::Long, 100.4, 1, at(0));

        assert_eq!(l.check_exits(Quote::new(101.0, 101.2), at(1), &mut acct), 0);
        assert_eq!(l.check_exits(Quote::new(102.5, 102.7), at(2), &mut acct), 1);

        let trade = &l.history()[0];
        assert_eq!(trade.close_reason, CloseReason::TakeProfit);
        assert_eq!(trade.close_price, 102.5);
        assert!((trade.realized_pnl - 1.9).abs() < 1e-9);
        assert_eq!(acct.balance(), 10_000.0 + trade.realized_pnl);
        assert!(l.is_empty());
    }

    #[test]
    fn short_stops_out_on_ask() {
        let mut l = ledger();
        let mut acct = AccountState::new(10_000.0);
        l.open(Direction::Short, 100.0, 2, at(0));
        l.check_exits(Quote::new(100.5, 101.0), at(1), &mut acct);

        let trade = &l.history()[0];
        assert_eq!(trade.close_reason, CloseReason::StopLoss);
        assert_eq!(trade.close_price, 101.0);
        assert!((trade.gross_pnl - -2.0).abs() < 1e-12);
        assert!((trade.realized_pnl - (-2.0 - 0.2)).abs() < 1e-12);
    }

    #[test]
    fn unrealized_excludes_fees() {
        let mut l = ledger();
        l.open(Direction::Long, 100.0, 2, at(0));
        l.open(Direction::Short, 100.0, 1, at(0));
        assert_eq!(l.unrealized_pnl(101.0), 2.0 - 1.0);
    }

    #[test]
    fn liquidates_worst_first_until_margin_is_met() {
        // Margin 1.0 at price 100: each position needs 100 of equity.
        let cfg = config(RawEngineConfig {
            margin: Some(1.0),
            cost: Some(0.0),
            slippage: Some(0.0),
            ..Default::default()
        });
        let mut l = PositionLedger::new(&cfg);
        let mut acct = AccountState::new(180.0);

        // Marks at price 100: -5, -1, +3.
        let a = l.open(Direction::Long, 105.0, 1, at(0));
        let b = l.open(Direction::Long, 101.0, 1, at(0));
        let c = l.open(Direction::Long, 97.0, 1, at(0));
        assert!(!l.meets_margin(acct.balance(), 100.0));

        let closed = l.force_liquidate(100.0, Quote::new(100.0, 100.0), at(1), &mut acct);
        assert_eq!(closed, 2);
        let order: Vec<_> = l.history().iter().map(|t| t.position_id).collect();
        assert_eq!(order, vec![a, b]);
        assert!(l.history().iter().all(|t| t.close_reason == CloseReason::MarginCall));
        assert_eq!(l.open_positions().map(|p| p.id).collect::<Vec<_>>(), vec![c]);
        assert!(l.meets_margin(acct.balance(), 100.0));
        assert_eq!(l.liquidations(), 2);
    }

    #[test]
    fn liquidation_ties_close_oldest_first() {
        let cfg = config(RawEngineConfig {
            margin: Some(1.0),
            ..Default::default()
        });
        let mut l = PositionLedger::new(&cfg);
        let mut acct = AccountState::new(150.0);
        let first = l.open(Direction::Long, 100.0, 1, at(0));
        l.open(Direction::Long, 100.0, 1, at(0));

        l.force_liquidate(100.0, Quote::new(100.0, 100.0), at(1), &mut acct);
        assert_eq!(l.history()[0].position_id, first);
    }

    #[test]
    fn close_all_flattens_in_ledger_order() {
        let mut l = ledger();
        let mut acct = AccountState::new(10_000.0);
        let a = l.open(Direction::Long, 100.0, 1, at(0));
        let b = l.open(Direction::Short, 100.0, 1, at(1));

        assert_eq!(l.close_all(Quote::new(99.5, 100.5), at(29), &mut acct), 2);
        assert!(l.is_empty());
        let ids: Vec<_> = l.history().iter().map(|t| t.position_id).collect();
        assert_eq!(ids, vec![a, b]);
        let expected: f64 = l.history().iter().map(|t| t.realized_pnl).sum();
        assert!((acct.balance() - (10_000.0 + expected)).abs() < 1e-9);
    }

    #[test]
    fn buying_power_floors_free_equity() {
        let mut l = ledger();
        // 10000 / (100 * 0.25) = 400 units.
        assert_eq!(l.buying_power(10_000.0, 100.0), 400);
        l.open(Direction::Long, 100.0, 1, at(0));
        assert_eq!(l.buying_power(10_000.0, 100.0), 399);
        assert!(l.buying_power(10.0, 100.0) < 0);
    }

    #[test]
    fn proportional_sizing_floors_to_one_unit() {
        let l = PositionLedger::new(&config(RawEngineConfig {
            position_size: Some(PositionSizing::Fraction(0.1)),
            ..Default::default()
        }));
        assert_eq!(l.position_size(10_000.0, 100.0), 40);
        assert_eq!(l.position_size(30.0, 100.0), 1);
        assert_eq!(l.position_size(20.0, 100.0), 0);
    }
}
