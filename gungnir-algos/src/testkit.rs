//! Deterministic test doubles
//!
//! `RecordingContext` captures everything an algorithm does against the
//! context; `SimVenue` is an in-process venue that acknowledges and
//! optionally fills orders straight back into the ring. Both are used by
//! the integration suite and are handy for strategy development.

use crate::context::{AlgoContext, ChildOrder};
use gungnir_core::core::errors::CoreResult;
use gungnir_core::core::money::PriceScale;
use gungnir_core::core::{OrderId, Symbol};
use gungnir_core::data::{Quote, Trade};
use gungnir_core::event::{EventRing, TradingEvent};
use gungnir_core::orders::OrderSnapshot;
use gungnir_core::time::{Clock, ManualClock};
use gungnir_core::venue::{VenueAdapter, VenueError};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Build a well-formed quote for tests.
#[allow(clippy::too_many_arguments)]
pub fn quote(
    symbol: Symbol,
    bid: i64,
    ask: i64,
    bid_size: i64,
    ask_size: i64,
    sequence: u64,
    ts_ns: u64,
    scale: PriceScale,
) -> Quote {
    Quote {
        symbol,
        bid_price: bid,
        ask_price: ask,
        bid_size,
        ask_size,
        exchange_ts_ns: ts_ns,
        received_ts_ns: ts_ns,
        sequence,
        scale,
    }
}

/// Context double driven by a manual clock, recording submissions and
/// cancels instead of routing them.
pub struct RecordingContext {
    clock: Arc<ManualClock>,
    quotes: DashMap<Symbol, Quote>,
    volume: Mutex<Option<Vec<i64>>>,
    submissions: Mutex<Vec<ChildOrder>>,
    cancellations: Mutex<Vec<OrderId>>,
    callbacks: RwLock<Vec<Arc<dyn Fn(&Trade) + Send + Sync>>>,
    next_order_id: AtomicU64,
}

impl RecordingContext {
    pub fn new(start_ns: u64) -> Self {
        Self {
            clock: Arc::new(ManualClock::new(start_ns)),
            quotes: DashMap::new(),
            volume: Mutex::new(None),
            submissions: Mutex::new(Vec::new()),
            cancellations: Mutex::new(Vec::new()),
            callbacks: RwLock::new(Vec::new()),
            next_order_id: AtomicU64::new(1),
        }
    }

    pub fn clock(&self) -> &Arc<ManualClock> {
        &self.clock
    }

    pub fn advance(&self, delta_ns: u64) {
        self.clock.advance(delta_ns);
    }

    pub fn set_quote(&self, quote: Quote) {
        self.quotes.insert(quote.symbol, quote);
    }

    pub fn set_volume_profile(&self, profile: Vec<i64>) {
        *self.volume.lock() = Some(profile);
    }

    pub fn submissions(&self) -> Vec<ChildOrder> {
        self.submissions.lock().clone()
    }

    pub fn last_submission(&self) -> Option<ChildOrder> {
        self.submissions.lock().last().copied()
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.lock().len()
    }

    pub fn cancellations(&self) -> Vec<OrderId> {
        self.cancellations.lock().clone()
    }

    /// Feed a fill to registered callbacks, as the dispatcher would.
    pub fn emit_fill(&self, trade: &Trade) {
        for callback in self.callbacks.read().iter() {
            callback(trade);
        }
    }
}

impl AlgoContext for RecordingContext {
    fn quote(&self, symbol: &Symbol) -> Option<Quote> {
        self.quotes.get(symbol).map(|q| *q)
    }

    fn now_ns(&self) -> u64 {
        self.clock.now_ns()
    }

    fn submit_order(&self, child: ChildOrder) -> CoreResult<OrderId> {
        self.submissions.lock().push(child);
        Ok(OrderId::new(self.next_order_id.fetch_add(1, Ordering::Relaxed)))
    }

    fn cancel_order(&self, order_id: OrderId) -> CoreResult<()> {
        self.cancellations.lock().push(order_id);
        Ok(())
    }

    fn historical_volume(&self, _symbol: &Symbol, buckets: usize) -> Option<Vec<i64>> {
        self.volume
            .lock()
            .clone()
            .filter(|profile| profile.len() == buckets)
    }

    fn register_fill_callback(&self, callback: Box<dyn Fn(&Trade) + Send + Sync>) {
        self.callbacks.write().push(Arc::from(callback));
    }
}

/// In-process venue. Accepted orders are acknowledged into the attached
/// ring; with auto-fill on, a full fill at the order's limit price follows
/// immediately.
pub struct SimVenue {
    ring: Mutex<Option<Arc<EventRing>>>,
    clock: Arc<dyn Clock>,
    auto_fill: AtomicBool,
    forced_error: Mutex<Option<VenueError>>,
    next_exchange_order_id: AtomicU64,
    next_exchange_trade_id: AtomicU64,
    submitted: Mutex<Vec<OrderSnapshot>>,
    cancelled: Mutex<Vec<OrderId>>,
}

impl SimVenue {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            ring: Mutex::new(None),
            clock,
            auto_fill: AtomicBool::new(true),
            forced_error: Mutex::new(None),
            next_exchange_order_id: AtomicU64::new(1),
            next_exchange_trade_id: AtomicU64::new(1),
            submitted: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
        }
    }

    /// Wire the venue to the engine's ring. Must happen before trading.
    pub fn attach(&self, ring: Arc<EventRing>) {
        *self.ring.lock() = Some(ring);
    }

    pub fn set_auto_fill(&self, enabled: bool) {
        self.auto_fill.store(enabled, Ordering::Release);
    }

    /// Make every submit fail with `error` until cleared with `None`.
    pub fn force_error(&self, error: Option<VenueError>) {
        *self.forced_error.lock() = error;
    }

    pub fn submitted(&self) -> Vec<OrderSnapshot> {
        self.submitted.lock().clone()
    }

    pub fn cancelled(&self) -> Vec<OrderId> {
        self.cancelled.lock().clone()
    }

    fn publish(&self, event: TradingEvent) {
        if let Some(ring) = self.ring.lock().as_ref() {
            let _ = ring.publish(event);
        }
    }

    /// Deliver a fill for an accepted order, e.g. to simulate partials.
    pub fn fill(&self, order: &OrderSnapshot, quantity: i64, price: i64) {
        let now = self.clock.now_ns();
        let exchange_trade_id = self.next_exchange_trade_id.fetch_add(1, Ordering::Relaxed);
        self.publish(TradingEvent::OrderFilled(Trade {
            trade_id: exchange_trade_id,
            exchange_trade_id,
            client_order_id: order.id,
            exchange_order_id: order.exchange_order_id.unwrap_or(0),
            symbol: order.symbol,
            side: order.side,
            price,
            quantity,
            scale: order.scale,
            commission_cents: 0,
            executed_ts_ns: now,
            received_ts_ns: now,
            is_maker: false,
        }));
    }
}

impl VenueAdapter for SimVenue {
    fn name(&self) -> &str {
        "sim"
    }

    fn submit_order(&self, order: &OrderSnapshot) -> Result<(), VenueError> {
        if let Some(error) = self.forced_error.lock().clone() {
            return Err(error);
        }
        self.submitted.lock().push(order.clone());

        let exchange_order_id = self.next_exchange_order_id.fetch_add(1, Ordering::Relaxed);
        self.publish(TradingEvent::OrderAccepted {
            order_id: order.id,
            exchange_order_id,
            ts_ns: self.clock.now_ns(),
        });

        if self.auto_fill.load(Ordering::Acquire) {
            let mut accepted = order.clone();
            accepted.exchange_order_id = Some(exchange_order_id);
            self.fill(&accepted, order.quantity, order.price.max(1));
        }
        Ok(())
    }

    fn cancel_order(&self, order: &OrderSnapshot) -> Result<(), VenueError> {
        self.cancelled.lock().push(order.id);
        self.publish(TradingEvent::OrderCancelled {
            order_id: order.id,
            ts_ns: self.clock.now_ns(),
        });
        Ok(())
    }

    fn modify_order(&self, _order: &OrderSnapshot) -> Result<(), VenueError> {
        Ok(())
    }

    fn open_orders(&self) -> Result<Vec<OrderSnapshot>, VenueError> {
        Ok(Vec::new())
    }

    fn cancel_all(&self, _symbol: Option<&Symbol>) -> Result<(), VenueError> {
        Ok(())
    }

    fn subscribe_quotes(&self, _symbols: &[Symbol]) -> Result<(), VenueError> {
        Ok(())
    }

    fn unsubscribe_quotes(&self, _symbols: &[Symbol]) -> Result<(), VenueError> {
        Ok(())
    }

    fn subscribe_trades(&self, _symbols: &[Symbol]) -> Result<(), VenueError> {
        Ok(())
    }

    fn unsubscribe_trades(&self, _symbols: &[Symbol]) -> Result<(), VenueError> {
        Ok(())
    }
}
