//! Account balance and the per-tick equity curve.

use chrono::NaiveDateTime;

use crate::domain::EquityPoint;

#[derive(Debug, Clone)]
pub struct AccountState {
    initial_balance: f64,
    balance: f64,
    realized_pnl: f64,
    fees_paid: f64,
    equity_curve: Vec<EquityPoint>,
}

impl AccountState {
    pub fn new(initial_balance: f64) -> Self {
        Self {
            initial_balance,
            balance: initial_balance,
            realized_pnl: 0.0,
            fees_paid: 0.0,
            equity_curve: Vec::new(),
        }
    }

    /// Book a closed position. `realized` is already net of `fees`.
    pub fn apply_close(&mut self, realized: f64, fees: f64) {
        self.balance += realized;
        self.realized_pnl += realized;
        self.fees_paid += fees;
    }

    pub fn equity(&self, unrealized: f64) -> f64 {
        self.balance + unrealized
    }

    /// Append the end-of-tick snapshot and return it.
    pub fn record(&mut self, timestamp: NaiveDateTime, unrealized: f64) -> EquityPoint {
        let point = EquityPoint {
            timestamp,
            balance: self.balance,
            equity: self.equity(unrealized),
        };
        self.equity_curve.push(point);
        point
    }

    /// Whether the balance covers the margin on a single unit at `price`.
    pub fn covers_one_unit(&self, price: f64, margin: f64) -> bool {
        self.balance >= price * margin
    }

    pub fn initial_balance(&self) -> f64 {
        self.initial_balance
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    pub fn fees_paid(&self) -> f64 {
        self.fees_paid
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    pub fn into_equity_curve(self) -> Vec<EquityPoint> {
        self.equity_curve
    }
}
