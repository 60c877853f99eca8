//! Market data records
//!
//! `Quote` and `Trade` are copyable, fixed-size records so they can be
//! written into pre-allocated ring slots and cached per symbol without heap
//! traffic. All price fields of a record share one `PriceScale`.

use crate::core::money::{self, PriceScale};
use crate::core::{OrderId, Side, Symbol};
use serde::{Deserialize, Serialize};

/// Top-of-book quote.
///
/// Producers must filter crossed books (`ask < bid`) before publishing;
/// venues may transiently emit them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: Symbol,
    pub bid_price: i64,
    pub ask_price: i64,
    pub bid_size: i64,
    pub ask_size: i64,
    /// Venue timestamp, monotonic nanos.
    pub exchange_ts_ns: u64,
    /// Local ingest timestamp, monotonic nanos.
    pub received_ts_ns: u64,
    /// Per-symbol venue sequence number.
    pub sequence: u64,
    pub scale: PriceScale,
}

impl Quote {
    /// Mid price, integer division.
    #[inline(always)]
    pub fn mid(&self) -> i64 {
        money::mid_price(self.bid_price, self.ask_price)
    }

    #[inline(always)]
    pub fn spread(&self) -> i64 {
        self.ask_price - self.bid_price
    }

    #[inline(always)]
    pub fn is_crossed(&self) -> bool {
        self.ask_price < self.bid_price
    }

    /// Best price on the opposite side of `side`: the ask for a buyer, the
    /// bid for a seller.
    #[inline(always)]
    pub fn opposite_price(&self, side: Side) -> i64 {
        match side {
            Side::Buy => self.ask_price,
            Side::Sell => self.bid_price,
        }
    }

    /// Displayed size on the opposite side of `side`.
    #[inline(always)]
    pub fn opposite_size(&self, side: Side) -> i64 {
        match side {
            Side::Buy => self.ask_size,
            Side::Sell => self.bid_size,
        }
    }
}

/// An execution (own fill or public tape print).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    /// Process-local trade id.
    pub trade_id: u64,
    /// Venue-assigned execution id. Fill application is idempotent on this.
    pub exchange_trade_id: u64,
    /// Owning order, zero for public tape prints.
    pub client_order_id: OrderId,
    pub exchange_order_id: u64,
    pub symbol: Symbol,
    pub side: Side,
    pub price: i64,
    pub quantity: i64,
    pub scale: PriceScale,
    /// Commission charged for this fill, in cents.
    pub commission_cents: i64,
    pub executed_ts_ns: u64,
    pub received_ts_ns: u64,
    pub is_maker: bool,
}

impl Trade {
    /// `price * quantity / scale`, in whole quote-currency units.
    #[inline(always)]
    pub fn notional(&self) -> i64 {
        money::notional(self.price, self.quantity, self.scale)
    }

    #[inline(always)]
    pub fn notional_cents(&self) -> i64 {
        money::notional_cents(self.price, self.quantity, self.scale)
    }

    /// Quantity signed by side: positive for buys, negative for sells.
    #[inline(always)]
    pub fn signed_quantity(&self) -> i64 {
        self.side.sign() * self.quantity
    }
}
