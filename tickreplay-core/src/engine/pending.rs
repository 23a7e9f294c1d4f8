//! Resting limit orders awaiting a fill or their timeout.

use chrono::{Duration, NaiveDateTime};

use crate::domain::{Direction, IdGen, OrderId, PendingOrder, Quote};

/// What one [`PendingOrderBook::step`] did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepOutcome {
    /// Orders to turn into positions, in submission order.
    pub filled: Vec<PendingOrder>,
    pub expired: Vec<OrderId>,
}

#[derive(Debug, Clone, Default)]
pub struct PendingOrderBook {
    orders: Vec<PendingOrder>,
    ids: IdGen,
    submitted: usize,
    filled: usize,
    expired: usize,
}

impl PendingOrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a new limit order. Several orders may rest at once.
    pub fn submit(
        &mut self,
        direction: Direction,
        limit_price: f64,
        submitted_at: NaiveDateTime,
        timeout: Duration,
    ) -> OrderId {
        let id = self.ids.next_order_id();
        self.orders.push(PendingOrder {
            id,
            submitted_at,
            direction,
            limit_price,
            expires_at: submitted_at + timeout,
        });
        self.submitted += 1;
        id
    }

    /// Expire or fill every resting order at `at`.
    ///
    /// Expiry is checked first, so an order that times out on the tick that
    /// would fill it is dropped. At most `capacity` orders fill; marketable
    /// orders beyond that keep resting. Without a quote only expiry runs.
    pub fn step(&mut self, at: NaiveDateTime, quote: Option<Quote>, capacity: usize) -> StepOutcome {
        let mut outcome = StepOutcome::default();
        let mut keep = Vec::with_capacity(self.orders.len());

        for order in self.orders.drain(..) {
            if order.is_expired(at) {
                outcome.expired.push(order.id);
            } else if outcome.filled.len() < capacity
                && quote.is_some_and(|q| order.is_marketable(q.bid, q.ask))
            {
                outcome.filled.push(order);
            } else {
                keep.push(order);
            }
        }

        self.orders = keep;
        self.filled += outcome.filled.len();
        self.expired += outcome.expired.len();
        outcome
    }

    /// Drop every resting order, counting each as expired.
    pub fn expire_all(&mut self) -> Vec<OrderId> {
        let ids: Vec<OrderId> = self.orders.drain(..).map(|o| o.id).collect();
        self.expired += ids.len();
        ids
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn orders(&self) -> &[PendingOrder] {
        &self.orders
    }

    pub fn submitted_count(&self) -> usize {
        self.submitted
    }

    pub fn filled_count(&self) -> usize {
        self.filled
    }

    pub fn expired_count(&self) -> usize {
        self.expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn t(min: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
            + Duration::minutes(min)
    }

    fn book_with(direction: Direction, limit: f64) -> PendingOrderBook {
        let mut book = PendingOrderBook::new();
        book.submit(direction, limit, t(0), Duration::minutes(30));
        book
    }

    #[test]
    fn long_fills_when_ask_reaches_limit() {
        let mut book = book_with(Direction::Long, 100.0);
        let out = book.step(t(1), Some(Quote::new(99.8, 99.9)), 5);
        assert!(out.filled.is_empty());

        let out = book.step(t(2), Some(Quote::new(100.2, 100.4)), 5);
        assert_eq!(out.filled.len(), 1);
        assert!(book.is_empty());
        assert_eq!(book.filled_count(), 1);
    }

    #[test]
    fn expiry_wins_over_fill_on_the_timeout_tick() {
        let mut book = book_with(Direction::Long, 100.0);
        let out = book.step(t(30), Some(Quote::new(100.2, 100.4)), 5);
        assert!(out.filled.is_empty());
        assert_eq!(out.expired, vec![OrderId(1)]);
        assert_eq!(book.expired_count(), 1);
    }

    #[test]
    fn fills_beyond_capacity_keep_resting() {
        let mut book = PendingOrderBook::new();
        for _ in 0..3 {
            book.submit(Direction::Short, 100.0, t(0), Duration::minutes(30));
        }
        let out = book.step(t(1), Some(Quote::new(99.0, 99.2)), 2);
        let ids: Vec<_> = out.filled.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![OrderId(1), OrderId(2)]);
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn no_quote_means_expiry_only() {
        let mut book = book_with(Direction::Long, 100.0);
        book.submit(Direction::Long, 100.0, t(20), Duration::minutes(30));
        let out = book.step(t(31), None, 5);
        assert!(out.filled.is_empty());
        assert_eq!(out.expired, vec![OrderId(1)]);
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn expire_all_clears_the_book() {
        let mut book = book_with(Direction::Long, 100.0);
        book.submit(Direction::Short, 100.0, t(1), Duration::minutes(30));
        assert_eq!(book.expire_all(), vec![OrderId(1), OrderId(2)]);
        assert!(book.is_empty());
        assert_eq!(book.submitted_count(), 2);
        assert_eq!(book.expired_count(), 2);
    }
}
