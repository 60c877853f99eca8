//! Trading events
//!
//! Every cross-component state change flows through the ring as one of
//! these variants. Events are cheap to clone: market data records are
//! `Copy` and rejection reasons are shared `Arc<str>`s.

use crate::core::money::PriceScale;
use crate::core::{OrderId, OrderType, Side, StrategyId, Symbol, TimeInForce};
use crate::data::{Quote, Trade};
use std::sync::Arc;

/// Intent to create a child order, as carried by a `NewOrder` event.
///
/// The order record itself is owned by the order manager; the request only
/// carries the fields needed to route and risk-check it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderRequest {
    pub order_id: OrderId,
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    pub time_in_force: TimeInForce,
    pub quantity: i64,
    /// Limit price at `scale`; zero for market orders.
    pub price: i64,
    /// Stop trigger price at `scale`; zero when unused.
    pub stop_price: i64,
    pub scale: PriceScale,
    pub strategy_id: Option<StrategyId>,
}

/// Back-pressure policy for a publication.
///
/// Market data is disposable: when the producer would lap the slowest
/// consumer it keeps going and the lapped consumer accounts the skipped
/// span as dropped. Order commands are not disposable: the producer waits
/// a bounded interval and then fails the publication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishPolicy {
    Block,
    DropOldest,
}

/// Event variants sequenced by the ring.
#[derive(Debug, Clone)]
pub enum TradingEvent {
    NewOrder(OrderRequest),
    CancelOrder {
        order_id: OrderId,
    },
    ModifyOrder {
        order_id: OrderId,
        new_quantity: i64,
        new_price: i64,
    },
    OrderAccepted {
        order_id: OrderId,
        exchange_order_id: u64,
        ts_ns: u64,
    },
    /// Own fill.
    OrderFilled(Trade),
    OrderRejected {
        order_id: OrderId,
        reason: Arc<str>,
    },
    OrderCancelled {
        order_id: OrderId,
        ts_ns: u64,
    },
    QuoteUpdate(Quote),
    /// Public tape print.
    TradeUpdate(Trade),
    Heartbeat {
        ts_ns: u64,
    },
    Timer {
        now_ns: u64,
    },
}

impl TradingEvent {
    /// Stable name for logging and metrics.
    pub const fn kind(&self) -> &'static str {
        match self {
            TradingEvent::NewOrder(_) => "new_order",
            TradingEvent::CancelOrder { .. } => "cancel_order",
            TradingEvent::ModifyOrder { .. } => "modify_order",
            TradingEvent::OrderAccepted { .. } => "order_accepted",
            TradingEvent::OrderFilled(_) => "order_filled",
            TradingEvent::OrderRejected { .. } => "order_rejected",
            TradingEvent::OrderCancelled { .. } => "order_cancelled",
            TradingEvent::QuoteUpdate(_) => "quote_update",
            TradingEvent::TradeUpdate(_) => "trade_update",
            TradingEvent::Heartbeat { .. } => "heartbeat",
            TradingEvent::Timer { .. } => "timer",
        }
    }

    /// Per-source back-pressure policy.
    pub const fn publish_policy(&self) -> PublishPolicy {
        match self {
            TradingEvent::QuoteUpdate(_)
            | TradingEvent::TradeUpdate(_)
            | TradingEvent::Heartbeat { .. }
            | TradingEvent::Timer { .. } => PublishPolicy::DropOldest,
            _ => PublishPolicy::Block,
        }
    }
}

/// A published event with its ring sequence and producer ingest timestamp.
#[derive(Debug, Clone)]
pub struct EventEnvelope {
    pub sequence: u64,
    pub ingest_ts_ns: u64,
    pub event: TradingEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_market_data_drops_orders_block() {
        let quote_ev = TradingEvent::Heartbeat { ts_ns: 0 };
        assert_eq!(quote_ev.publish_policy(), PublishPolicy::DropOldest);

        let cancel = TradingEvent::CancelOrder {
            order_id: OrderId::new(1),
        };
        assert_eq!(cancel.publish_policy(), PublishPolicy::Block);
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(
            TradingEvent::CancelOrder {
                order_id: OrderId::new(1)
            }
            .kind(),
            "cancel_order"
        );
        assert_eq!(TradingEvent::Timer { now_ns: 1 }.kind(), "timer");
    }
}
