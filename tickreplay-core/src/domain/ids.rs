use serde::{Deserialize, Serialize};
use std::fmt;

/// Pending order ID. Monotonically increasing within one engine instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "O{}", self.0)
    }
}

/// Position ID. Ordering by ID is ledger insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PositionId(pub u64);

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Sequential ID source. Each engine instance owns its own generator.
#[derive(Debug, Clone, Default)]
pub struct IdGen {
    next_order: u64,
    next_position: u64,
}

impl IdGen {
    pub fn next_order_id(&mut self) -> OrderId {
        self.next_order += 1;
        OrderId(self.next_order)
    }

    pub fn next_position_id(&mut self) -> PositionId {
        self.next_position += 1;
        PositionId(self.next_position)
    }
}
