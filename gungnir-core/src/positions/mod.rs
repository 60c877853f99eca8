//! Position and P&L accounting.

pub mod manager;
pub mod position;

pub use manager::{GrossExposure, PositionListener, PositionManager};
pub use position::{Position, PositionSnapshot, TradeOutcome};
