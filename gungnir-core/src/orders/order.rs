//! Order record
//!
//! A mutable, pool-reusable record owned by the order manager. All mutation
//! goes through the transition methods; an attempted illegal transition
//! fails without touching the record.
//!
//! Record invariants, held after every successful mutation:
//! - `filled_quantity + remaining_quantity == quantity`
//! - `average_fill_price` is the quantity-weighted mean of applied fills
//! - `status` only moves along the permitted table in
//!   [`OrderStatus::can_transition_to`]

use crate::core::errors::{CoreError, CoreResult};
use crate::core::money::{self, PriceScale};
use crate::core::{OrderId, OrderStatus, OrderType, Side, StrategyId, Symbol, TimeInForce};
use crate::data::Trade;
use crate::pool::Recycle;
use serde::{Deserialize, Serialize};

/// Result of applying a fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillOutcome {
    /// Quantity remains.
    Partial,
    /// Order is now fully filled.
    Filled,
    /// Same `exchange_trade_id` seen before; nothing changed.
    Duplicate,
}

/// Mutable order record. Created blank by the pool and initialized through
/// [`Order::init`].
#[derive(Debug, Clone)]
pub struct Order {
    pub id: OrderId,
    pub exchange_order_id: Option<u64>,
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    pub time_in_force: TimeInForce,
    pub status: OrderStatus,
    /// Limit price at `scale`; zero for market orders.
    pub price: i64,
    pub stop_price: i64,
    pub scale: PriceScale,
    pub quantity: i64,
    pub filled_quantity: i64,
    pub remaining_quantity: i64,
    pub average_fill_price: i64,
    pub last_fill_price: i64,
    pub last_fill_quantity: i64,
    pub created_ts_ns: u64,
    pub submitted_ts_ns: u64,
    pub accepted_ts_ns: u64,
    pub updated_ts_ns: u64,
    pub strategy_id: Option<StrategyId>,
    /// created -> submitted
    pub submit_latency_ns: u64,
    /// submitted -> accepted
    pub ack_latency_ns: u64,
    /// submitted -> fully filled
    pub fill_latency_ns: u64,
    pub reject_reason: Option<String>,
    /// Exchange trade ids already applied, for idempotent re-delivery.
    applied_trades: Vec<u64>,
}

impl Default for Order {
    fn default() -> Self {
        Self {
            id: OrderId::default(),
            exchange_order_id: None,
            // Placeholder identity; overwritten by `init` before use.
            symbol: Symbol::new("X", "X").expect("static symbol"),
            side: Side::Buy,
            order_type: OrderType::Limit,
            time_in_force: TimeInForce::Day,
            status: OrderStatus::Pending,
            price: 0,
            stop_price: 0,
            scale: PriceScale::CENTS,
            quantity: 0,
            filled_quantity: 0,
            remaining_quantity: 0,
            average_fill_price: 0,
            last_fill_price: 0,
            last_fill_quantity: 0,
            created_ts_ns: 0,
            submitted_ts_ns: 0,
            accepted_ts_ns: 0,
            updated_ts_ns: 0,
            strategy_id: None,
            submit_latency_ns: 0,
            ack_latency_ns: 0,
            fill_latency_ns: 0,
            reject_reason: None,
            applied_trades: Vec::new(),
        }
    }
}

impl Recycle for Order {
    fn recycle(&mut self) {
        let applied = std::mem::take(&mut self.applied_trades);
        *self = Order::default();
        self.applied_trades = applied;
        self.applied_trades.clear();
    }
}

impl Order {
    /// Initialize a blank (pooled) record as a fresh PENDING order.
    #[allow(clippy::too_many_arguments)]
    pub fn init(
        &mut self,
        id: OrderId,
        symbol: Symbol,
        side: Side,
        order_type: OrderType,
        time_in_force: TimeInForce,
        quantity: i64,
        price: i64,
        scale: PriceScale,
        strategy_id: Option<StrategyId>,
        now_ns: u64,
    ) {
        self.id = id;
        self.exchange_order_id = None;
        self.symbol = symbol;
        self.side = side;
        self.order_type = order_type;
        self.time_in_force = time_in_force;
        self.status = OrderStatus::Pending;
        self.price = price;
        self.stop_price = 0;
        self.scale = scale;
        self.quantity = quantity;
        self.filled_quantity = 0;
        self.remaining_quantity = quantity;
        self.average_fill_price = 0;
        self.last_fill_price = 0;
        self.last_fill_quantity = 0;
        self.created_ts_ns = now_ns;
        self.submitted_ts_ns = 0;
        self.accepted_ts_ns = 0;
        self.updated_ts_ns = now_ns;
        self.strategy_id = strategy_id;
        self.submit_latency_ns = 0;
        self.ack_latency_ns = 0;
        self.fill_latency_ns = 0;
        self.reject_reason = None;
        self.applied_trades.clear();
    }

    fn transition(&mut self, next: OrderStatus, now_ns: u64) -> CoreResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::IllegalTransition {
                entity: "order",
                from: self.status.as_str(),
                to: next.as_str(),
            });
        }
        self.status = next;
        self.updated_ts_ns = now_ns;
        Ok(())
    }

    pub fn mark_submitted(&mut self, now_ns: u64) -> CoreResult<()> {
        self.transition(OrderStatus::Submitted, now_ns)?;
        self.submitted_ts_ns = now_ns;
        self.submit_latency_ns = now_ns.saturating_sub(self.created_ts_ns);
        Ok(())
    }

    pub fn mark_accepted(&mut self, exchange_order_id: u64, now_ns: u64) -> CoreResult<()> {
        self.transition(OrderStatus::Accepted, now_ns)?;
        self.exchange_order_id = Some(exchange_order_id);
        self.accepted_ts_ns = now_ns;
        self.ack_latency_ns = now_ns.saturating_sub(self.submitted_ts_ns);
        Ok(())
    }

    /// Apply a fill. Re-delivery of an already-applied `exchange_trade_id`
    /// is a no-op reported as [`FillOutcome::Duplicate`].
    pub fn apply_fill(&mut self, trade: &Trade, now_ns: u64) -> CoreResult<FillOutcome> {
        if self.applied_trades.contains(&trade.exchange_trade_id) {
            return Ok(FillOutcome::Duplicate);
        }
        if trade.quantity <= 0 {
            return Err(CoreError::InvalidInput(format!(
                "fill quantity must be positive, got {}",
                trade.quantity
            )));
        }
        if trade.price <= 0 {
            return Err(CoreError::InvalidInput(format!(
                "fill price must be positive, got {}",
                trade.price
            )));
        }
        if trade.quantity > self.remaining_quantity {
            return Err(CoreError::InvalidInput(format!(
                "fill quantity {} exceeds remaining {}",
                trade.quantity, self.remaining_quantity
            )));
        }

        let next = if trade.quantity == self.remaining_quantity {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
        self.transition(next, now_ns)?;

        // Quantity-weighted mean of all applied fills.
        let prev_notional = self.average_fill_price as i128 * self.filled_quantity as i128;
        let fill_notional = trade.price as i128 * trade.quantity as i128;
        let filled = self.filled_quantity + trade.quantity;
        self.average_fill_price = ((prev_notional + fill_notional) / filled as i128) as i64;
        self.filled_quantity = filled;
        self.remaining_quantity = self.quantity - filled;
        self.last_fill_price = trade.price;
        self.last_fill_quantity = trade.quantity;
        self.applied_trades.push(trade.exchange_trade_id);

        debug_assert_eq!(self.filled_quantity + self.remaining_quantity, self.quantity);

        if next == OrderStatus::Filled {
            self.fill_latency_ns = now_ns.saturating_sub(self.submitted_ts_ns);
            Ok(FillOutcome::Filled)
        } else {
            Ok(FillOutcome::Partial)
        }
    }

    pub fn mark_cancelled(&mut self, now_ns: u64) -> CoreResult<()> {
        self.transition(OrderStatus::Cancelled, now_ns)
    }

    pub fn mark_expired(&mut self, now_ns: u64) -> CoreResult<()> {
        self.transition(OrderStatus::Expired, now_ns)
    }

    pub fn mark_rejected(&mut self, reason: &str, now_ns: u64) -> CoreResult<()> {
        self.transition(OrderStatus::Rejected, now_ns)?;
        self.reject_reason = Some(reason.to_string());
        Ok(())
    }

    #[inline(always)]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    #[inline(always)]
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// `price * quantity / scale` in whole quote-currency units.
    pub fn notional(&self) -> i64 {
        money::notional(self.price, self.quantity, self.scale)
    }

    pub fn notional_cents(&self) -> i64 {
        money::notional_cents(self.price, self.quantity, self.scale)
    }

    /// Read-only copy handed to listeners, journal and external observers.
    pub fn snapshot(&self) -> OrderSnapshot {
        OrderSnapshot {
            id: self.id,
            exchange_order_id: self.exchange_order_id,
            symbol: self.symbol,
            side: self.side,
            order_type: self.order_type,
            time_in_force: self.time_in_force,
            status: self.status,
            price: self.price,
            stop_price: self.stop_price,
            scale: self.scale,
            quantity: self.quantity,
            filled_quantity: self.filled_quantity,
            remaining_quantity: self.remaining_quantity,
            average_fill_price: self.average_fill_price,
            last_fill_price: self.last_fill_price,
            last_fill_quantity: self.last_fill_quantity,
            created_ts_ns: self.created_ts_ns,
            submitted_ts_ns: self.submitted_ts_ns,
            accepted_ts_ns: self.accepted_ts_ns,
            updated_ts_ns: self.updated_ts_ns,
            strategy_id: self.strategy_id,
            submit_latency_ns: self.submit_latency_ns,
            ack_latency_ns: self.ack_latency_ns,
            fill_latency_ns: self.fill_latency_ns,
            reject_reason: self.reject_reason.clone(),
        }
    }
}

/// Immutable copy of an order's state. This is the wire record journaled on
/// every transition and the view external observers receive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub id: OrderId,
    pub exchange_order_id: Option<u64>,
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    pub time_in_force: TimeInForce,
    pub status: OrderStatus,
    pub price: i64,
    pub stop_price: i64,
    pub scale: PriceScale,
    pub quantity: i64,
    pub filled_quantity: i64,
    pub remaining_quantity: i64,
    pub average_fill_price: i64,
    pub last_fill_price: i64,
    pub last_fill_quantity: i64,
    pub created_ts_ns: u64,
    pub submitted_ts_ns: u64,
    pub accepted_ts_ns: u64,
    pub updated_ts_ns: u64,
    pub strategy_id: Option<StrategyId>,
    pub submit_latency_ns: u64,
    pub ack_latency_ns: u64,
    pub fill_latency_ns: u64,
    pub reject_reason: Option<String>,
}

impl OrderSnapshot {
    #[inline(always)]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    #[inline(always)]
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}
