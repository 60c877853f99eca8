//! Order manager
//!
//! Owns every order record, keyed by client order id in a shard-partitioned
//! concurrent map. External code only ever sees [`OrderSnapshot`] copies.
//! Listeners are held in a copy-on-write list and invoked synchronously in
//! registration order; a listener panic is caught and logged and never
//! aborts the remaining notifications.

use crate::core::errors::{CoreError, CoreResult};
use crate::core::money::PriceScale;
use crate::core::{OrderId, OrderStatus, OrderType, Side, StrategyId, Symbol, TimeInForce};
use crate::data::Trade;
use crate::orders::order::{FillOutcome, Order, OrderSnapshot};
use crate::pool::{PoolStats, RecordPool};
use crate::time::Clock;
use crate::venue::OrderUpdate;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Observer of order state changes. Receives the post-transition snapshot
/// and the pre-transition status.
pub trait OrderListener: Send + Sync {
    fn on_order(&self, order: &OrderSnapshot, prev_status: OrderStatus);
}

pub struct OrderManager {
    orders: DashMap<OrderId, Order>,
    pool: RecordPool<Order>,
    next_id: AtomicU64,
    listeners: RwLock<Arc<Vec<Arc<dyn OrderListener>>>>,
    clock: Arc<dyn Clock>,
}

impl OrderManager {
    pub fn new(pool_capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            orders: DashMap::new(),
            pool: RecordPool::new(pool_capacity),
            next_id: AtomicU64::new(1),
            listeners: RwLock::new(Arc::new(Vec::new())),
            clock,
        }
    }

    /// Create and track a new PENDING order, returning its snapshot.
    ///
    /// Fails with `InvalidInput` on non-positive quantity or a negative
    /// limit price; no record is created in that case.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        &self,
        symbol: Symbol,
        side: Side,
        order_type: OrderType,
        time_in_force: TimeInForce,
        quantity: i64,
        price: i64,
        scale: PriceScale,
        strategy_id: Option<StrategyId>,
    ) -> CoreResult<OrderSnapshot> {
        if quantity <= 0 {
            return Err(CoreError::InvalidInput(format!(
                "order quantity must be positive, got {quantity}"
            )));
        }
        if price < 0 {
            return Err(CoreError::InvalidInput(format!(
                "order price must not be negative, got {price}"
            )));
        }
        if order_type == OrderType::Limit && price == 0 {
            return Err(CoreError::InvalidInput(
                "limit order requires a price".to_string(),
            ));
        }

        let id = OrderId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let now = self.clock.now_ns();
        let mut order = self.pool.acquire();
        order.init(
            id,
            symbol,
            side,
            order_type,
            time_in_force,
            quantity,
            price,
            scale,
            strategy_id,
            now,
        );
        let snapshot = order.snapshot();
        self.orders.insert(id, order);
        debug!(order_id = %id, %symbol, %side, quantity, price, "order created");
        self.notify(&snapshot, OrderStatus::Pending);
        Ok(snapshot)
    }

    pub fn get(&self, id: OrderId) -> Option<OrderSnapshot> {
        self.orders.get(&id).map(|o| o.snapshot())
    }

    /// Secondary lookup by exchange order id. Linear scan over the shards;
    /// acceptable at current order counts.
    pub fn find_by_exchange_id(&self, exchange_order_id: u64) -> Option<OrderSnapshot> {
        self.orders
            .iter()
            .find(|o| o.exchange_order_id == Some(exchange_order_id))
            .map(|o| o.snapshot())
    }

    /// Run a transition under the record's shard lock, then notify.
    fn mutate<F>(&self, id: OrderId, f: F) -> CoreResult<OrderSnapshot>
    where
        F: FnOnce(&mut Order, u64) -> CoreResult<()>,
    {
        let now = self.clock.now_ns();
        let (prev, snapshot) = {
            let mut entry = self
                .orders
                .get_mut(&id)
                .ok_or_else(|| CoreError::InvalidInput(format!("unknown order {id}")))?;
            let prev = entry.status;
            if let Err(err) = f(&mut entry, now) {
                drop(entry);
                match &err {
                    CoreError::IllegalTransition { from, to, .. } => {
                        warn!(order_id = %id, from, to, "illegal order transition ignored");
                    }
                    _ => warn!(order_id = %id, error = %err, "order mutation rejected"),
                }
                return Err(err);
            }
            (prev, entry.snapshot())
        };
        self.notify(&snapshot, prev);
        Ok(snapshot)
    }

    pub fn mark_submitted(&self, id: OrderId) -> CoreResult<OrderSnapshot> {
        self.mutate(id, |o, now| o.mark_submitted(now))
    }

    pub fn mark_accepted(&self, id: OrderId, exchange_order_id: u64) -> CoreResult<OrderSnapshot> {
        self.mutate(id, |o, now| o.mark_accepted(exchange_order_id, now))
    }

    pub fn mark_cancelled(&self, id: OrderId) -> CoreResult<OrderSnapshot> {
        self.mutate(id, |o, now| o.mark_cancelled(now))
    }

    pub fn mark_expired(&self, id: OrderId) -> CoreResult<OrderSnapshot> {
        self.mutate(id, |o, now| o.mark_expired(now))
    }

    pub fn reject(&self, id: OrderId, reason: &str) -> CoreResult<OrderSnapshot> {
        self.mutate(id, |o, now| o.mark_rejected(reason, now))
    }

    /// Apply a fill to the owning order. Duplicate deliveries are reported,
    /// not applied.
    pub fn apply_fill(&self, trade: &Trade) -> CoreResult<(OrderSnapshot, FillOutcome)> {
        let mut outcome = FillOutcome::Duplicate;
        let snapshot = self.mutate(trade.client_order_id, |o, now| {
            outcome = o.apply_fill(trade, now)?;
            Ok(())
        })?;
        if outcome == FillOutcome::Duplicate {
            debug!(
                order_id = %trade.client_order_id,
                exchange_trade_id = trade.exchange_trade_id,
                "duplicate fill ignored"
            );
        }
        Ok((snapshot, outcome))
    }

    /// Merge a venue order update into the stored record.
    pub fn apply_update(&self, update: &OrderUpdate) -> CoreResult<OrderSnapshot> {
        match update.new_status {
            OrderStatus::Accepted => {
                self.mark_accepted(update.order_id, update.exchange_order_id.unwrap_or(0))
            }
            OrderStatus::Cancelled => self.mark_cancelled(update.order_id),
            OrderStatus::Expired => self.mark_expired(update.order_id),
            OrderStatus::Rejected => self.reject(update.order_id, "rejected by venue"),
            other => Err(CoreError::InvalidInput(format!(
                "venue update cannot set status {other}"
            ))),
        }
    }

    pub fn active_orders(&self) -> Vec<OrderSnapshot> {
        self.orders
            .iter()
            .filter(|o| o.is_active() || o.status == OrderStatus::Pending)
            .map(|o| o.snapshot())
            .collect()
    }

    pub fn orders_for_strategy(&self, strategy_id: StrategyId) -> Vec<OrderSnapshot> {
        self.orders
            .iter()
            .filter(|o| o.strategy_id == Some(strategy_id))
            .map(|o| o.snapshot())
            .collect()
    }

    /// Remove every terminal order, return the records to the pool and
    /// report how many were purged.
    pub fn purge_terminal(&self) -> usize {
        let terminal: Vec<OrderId> = self
            .orders
            .iter()
            .filter(|o| o.is_terminal())
            .map(|o| o.id)
            .collect();
        let mut purged = 0;
        for id in terminal {
            if let Some((_, order)) = self.orders.remove(&id) {
                self.pool.release(order);
                purged += 1;
            }
        }
        debug!(purged, "terminal orders purged");
        purged
    }

    pub fn register_listener(&self, listener: Arc<dyn OrderListener>) {
        let mut guard = self.listeners.write();
        let mut next = (**guard).clone();
        next.push(listener);
        *guard = Arc::new(next);
    }

    fn notify(&self, snapshot: &OrderSnapshot, prev_status: OrderStatus) {
        let listeners = Arc::clone(&self.listeners.read());
        for listener in listeners.iter() {
            if catch_unwind(AssertUnwindSafe(|| listener.on_order(snapshot, prev_status))).is_err()
            {
                error!(order_id = %snapshot.id, "order listener panicked");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }
}
