//! Domain types for tick replay: quotes, orders, positions, trade records.

pub mod ids;
pub mod order;
pub mod position;
pub mod tick;
pub mod trade;

pub use ids::{IdGen, OrderId, PositionId};
pub use order::{Direction, PendingOrder};
pub use position::{CloseReason, Position, PositionStatus};
pub use tick::{Quote, Tick};
pub use trade::{EquityPoint, TradeRecord};
