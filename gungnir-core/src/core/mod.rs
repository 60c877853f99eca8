//! Core vocabulary of the execution pipeline
//!
//! Copyable ids and enums, the fixed-point money layer, instrument identity
//! and the shared error taxonomy. Everything above this module speaks these
//! types.

pub mod errors;
pub mod money;
pub mod symbol;
pub mod types;

pub use errors::{CoreError, CoreResult};
pub use money::{PriceScale, CENTS_PER_UNIT};
pub use symbol::{AssetClass, Symbol};
pub use types::{OrderId, OrderStatus, OrderType, Side, StrategyId, TimeInForce};
