//! Algorithm context
//!
//! The capability surface an algorithm sees: cached quotes, the engine
//! clock, child order submission and cancellation, historical volume for
//! schedule construction, and fill callbacks. The engine implementation
//! routes every submission through the order manager and then the ring, so
//! algorithms never touch a venue directly.

use gungnir_core::core::errors::CoreResult;
use gungnir_core::core::money::PriceScale;
use gungnir_core::core::{OrderId, OrderType, Side, StrategyId, Symbol, TimeInForce};
use gungnir_core::data::{Quote, Trade};
use gungnir_core::event::{EventRing, OrderRequest, TradingEvent};
use gungnir_core::orders::OrderManager;
use gungnir_core::time::Clock;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

/// Child order intent as produced by an algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildOrder {
    pub symbol: Symbol,
    pub side: Side,
    pub quantity: i64,
    pub price: i64,
    pub scale: PriceScale,
    pub time_in_force: TimeInForce,
    pub strategy_id: StrategyId,
}

/// Provider of historical per-bucket volume, used by VWAP scheduling.
pub type VolumeProvider = Box<dyn Fn(&Symbol, usize) -> Option<Vec<i64>> + Send + Sync>;

/// Capabilities exposed to algorithms.
pub trait AlgoContext: Send + Sync {
    /// Latest validated quote for a symbol.
    fn quote(&self, symbol: &Symbol) -> Option<Quote>;

    fn now_ns(&self) -> u64;

    /// Create and route a child order. Returns the client order id.
    fn submit_order(&self, child: ChildOrder) -> CoreResult<OrderId>;

    /// Best-effort cancel of an in-flight child order.
    fn cancel_order(&self, order_id: OrderId) -> CoreResult<()>;

    /// Historical volume profile, one value per bucket, or `None` when the
    /// venue has no history for the symbol.
    fn historical_volume(&self, symbol: &Symbol, buckets: usize) -> Option<Vec<i64>>;

    /// Register an observer invoked for every own fill.
    fn register_fill_callback(&self, callback: Box<dyn Fn(&Trade) + Send + Sync>);
}

/// Production context backed by the order manager and the event ring.
pub struct EngineContext {
    ring: Arc<EventRing>,
    orders: Arc<OrderManager>,
    quotes: DashMap<Symbol, Quote>,
    clock: Arc<dyn Clock>,
    volume_provider: RwLock<Option<VolumeProvider>>,
    fill_callbacks: RwLock<Arc<Vec<Arc<dyn Fn(&Trade) + Send + Sync>>>>,
}

impl EngineContext {
    pub fn new(ring: Arc<EventRing>, orders: Arc<OrderManager>, clock: Arc<dyn Clock>) -> Self {
        Self {
            ring,
            orders,
            quotes: DashMap::new(),
            clock,
            volume_provider: RwLock::new(None),
            fill_callbacks: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// Install the venue-backed volume source.
    pub fn set_volume_provider(&self, provider: VolumeProvider) {
        *self.volume_provider.write() = Some(provider);
    }

    /// Refresh the per-symbol quote cache. Called by the dispatcher for
    /// every quote it forwards.
    pub fn update_quote(&self, quote: &Quote) {
        self.quotes.insert(quote.symbol, *quote);
    }

    /// Fan a fill out to the registered callbacks.
    pub fn dispatch_fill(&self, trade: &Trade) {
        let callbacks = Arc::clone(&self.fill_callbacks.read());
        for callback in callbacks.iter() {
            callback(trade);
        }
    }
}

impl AlgoContext for EngineContext {
    fn quote(&self, symbol: &Symbol) -> Option<Quote> {
        self.quotes.get(symbol).map(|q| *q)
    }

    fn now_ns(&self) -> u64 {
        self.clock.now_ns()
    }

    fn submit_order(&self, child: ChildOrder) -> CoreResult<OrderId> {
        let snapshot = self.orders.create(
            child.symbol,
            child.side,
            OrderType::Limit,
            child.time_in_force,
            child.quantity,
            child.price,
            child.scale,
            Some(child.strategy_id),
        )?;
        let request = OrderRequest {
            order_id: snapshot.id,
            symbol: snapshot.symbol,
            side: snapshot.side,
            order_type: snapshot.order_type,
            time_in_force: snapshot.time_in_force,
            quantity: snapshot.quantity,
            price: snapshot.price,
            stop_price: snapshot.stop_price,
            scale: snapshot.scale,
            strategy_id: snapshot.strategy_id,
        };
        self.ring.publish(TradingEvent::NewOrder(request))?;
        debug!(order_id = %snapshot.id, strategy = %child.strategy_id, "child order routed");
        Ok(snapshot.id)
    }

    fn cancel_order(&self, order_id: OrderId) -> CoreResult<()> {
        self.ring.publish(TradingEvent::CancelOrder { order_id })?;
        Ok(())
    }

    fn historical_volume(&self, symbol: &Symbol, buckets: usize) -> Option<Vec<i64>> {
        self.volume_provider
            .read()
            .as_ref()
            .and_then(|provider| provider(symbol, buckets))
    }

    fn register_fill_callback(&self, callback: Box<dyn Fn(&Trade) + Send + Sync>) {
        let mut guard = self.fill_callbacks.write();
        let mut next = (**guard).clone();
        next.push(Arc::from(callback));
        *guard = Arc::new(next);
    }
}
