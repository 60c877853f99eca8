//! Core order vocabulary
//!
//! Single-byte enums and copyable id newtypes shared by every layer of the
//! pipeline. The order status transition table lives here so that both the
//! order record and journal replay validate against a single source of truth.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Client order id. Process-unique and monotonic, assigned by the order
/// manager at creation time.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct OrderId(pub u64);

impl OrderId {
    #[inline(always)]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[inline(always)]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the algorithm (execution algo or strategy) that owns an
/// order. Assigned by the dispatcher when an algorithm is registered.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct StrategyId(pub u64);

impl StrategyId {
    #[inline(always)]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[inline(always)]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Side {
    Buy = 0,
    Sell = 1,
}

impl Side {
    /// +1 for buys, -1 for sells. Used for signed position deltas.
    #[inline(always)]
    pub const fn sign(&self) -> i64 {
        match self {
            Side::Buy => 1,
            Side::Sell => -1,
        }
    }

    #[inline(always)]
    pub const fn opposite(&self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum OrderType {
    Market = 0,
    Limit = 1,
    Stop = 2,
    StopLimit = 3,
}

/// Time-in-force. Serialized to venues by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum TimeInForce {
    /// Valid for the trading day.
    Day = 0,
    /// Good-til-cancelled.
    Gtc = 1,
    /// Immediate-or-cancel.
    Ioc = 2,
    /// Fill-or-kill.
    Fok = 3,
    /// Good-til-date.
    Gtd = 4,
    /// At-the-open.
    Opg = 5,
    /// At-the-close.
    Cls = 6,
}

/// Order lifecycle status.
///
/// Status only ever advances along the permitted transitions below; anything
/// else is an [`IllegalTransition`](crate::core::errors::CoreError) and
/// leaves the order unchanged.
///
/// ```text
/// PENDING         -> SUBMITTED | REJECTED
/// SUBMITTED       -> ACCEPTED | REJECTED | CANCELLED
/// ACCEPTED        -> PARTIALLY_FILLED | FILLED | CANCELLED | EXPIRED
/// PARTIALLY_FILLED-> PARTIALLY_FILLED | FILLED | CANCELLED | EXPIRED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum OrderStatus {
    Pending = 0,
    Submitted = 1,
    Accepted = 2,
    PartiallyFilled = 3,
    Filled = 4,
    Cancelled = 5,
    Rejected = 6,
    Expired = 7,
}

impl OrderStatus {
    /// Terminal statuses admit no further transitions.
    #[inline(always)]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Rejected | OrderStatus::Expired
        )
    }

    /// Active statuses are live at the venue and may still receive fills.
    #[inline(always)]
    pub const fn is_active(&self) -> bool {
        matches!(
            self,
            OrderStatus::Submitted | OrderStatus::Accepted | OrderStatus::PartiallyFilled
        )
    }

    /// The permitted-transition table.
    pub const fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match (self, next) {
            (Pending, Submitted) | (Pending, Rejected) => true,
            (Submitted, Accepted) | (Submitted, Rejected) | (Submitted, Cancelled) => true,
            (Accepted, PartiallyFilled)
            | (Accepted, Filled)
            | (Accepted, Cancelled)
            | (Accepted, Expired) => true,
            (PartiallyFilled, PartiallyFilled)
            | (PartiallyFilled, Filled)
            | (PartiallyFilled, Cancelled)
            | (PartiallyFilled, Expired) => true,
            _ => false,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Submitted => "SUBMITTED",
            OrderStatus::Accepted => "ACCEPTED",
            OrderStatus::PartiallyFilled => "PARTIALLY_FILLED",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Rejected => "REJECTED",
            OrderStatus::Expired => "EXPIRED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
