//! Algorithm dispatcher
//!
//! Owns the registry of live algorithms and is the last handler on the
//! ring: quotes fan out to every RUNNING algorithm trading the symbol,
//! fills route to the owning algorithm by strategy id, timer ticks reach
//! everyone. Management operations (start/pause/resume/cancel, hot config
//! update, snapshots) go through here and are journaled as strategy
//! records.

use crate::algorithm::{AlgoSnapshot, Algorithm};
use crate::context::{AlgoContext, EngineContext};
use crate::state::AlgoState;
use gungnir_core::core::errors::{CoreError, CoreResult};
use gungnir_core::core::StrategyId;
use gungnir_core::event::{EventEnvelope, EventHandler, EventRing, TradingEvent};
use gungnir_core::journal::{Journal, JournalRecord, StrategyRecord};
use gungnir_core::orders::OrderManager;
use gungnir_core::time::Clock;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct AlgoDispatcher {
    algos: DashMap<StrategyId, Mutex<Box<dyn Algorithm>>>,
    next_id: AtomicU64,
    ctx: Arc<EngineContext>,
    orders: Arc<OrderManager>,
    journal: Arc<dyn Journal>,
    clock: Arc<dyn Clock>,
}

impl AlgoDispatcher {
    pub fn new(
        ctx: Arc<EngineContext>,
        orders: Arc<OrderManager>,
        journal: Arc<dyn Journal>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            algos: DashMap::new(),
            next_id: AtomicU64::new(1),
            ctx,
            orders,
            journal,
            clock,
        }
    }

    /// Ids are handed out before construction so an algorithm can stamp its
    /// child orders.
    pub fn allocate_id(&self) -> StrategyId {
        StrategyId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Initialize and admit an algorithm. `config` is journaled with the
    /// strategy record for replay.
    pub fn register(
        &self,
        mut algo: Box<dyn Algorithm>,
        config: serde_json::Value,
    ) -> CoreResult<StrategyId> {
        let id = algo.id();
        if self.algos.contains_key(&id) {
            return Err(CoreError::InvalidInput(format!(
                "algorithm id {id} already registered"
            )));
        }
        algo.initialize(&*self.ctx)?;
        self.journal.append(JournalRecord::Strategy(StrategyRecord {
            id,
            name: algo.name().to_string(),
            config,
            deleted: false,
            updated_ts_ns: self.clock.now_ns(),
        }));
        info!(id = %id, name = algo.name(), "algorithm registered");
        self.algos.insert(id, Mutex::new(algo));
        Ok(id)
    }

    fn with_algo<R>(
        &self,
        id: StrategyId,
        f: impl FnOnce(&mut Box<dyn Algorithm>) -> CoreResult<R>,
    ) -> CoreResult<R> {
        let entry = self
            .algos
            .get(&id)
            .ok_or_else(|| CoreError::InvalidInput(format!("unknown algorithm {id}")))?;
        let mut algo = entry.lock();
        f(&mut algo)
    }

    pub fn start(&self, id: StrategyId) -> CoreResult<()> {
        let now = self.clock.now_ns();
        self.with_algo(id, |a| a.start(now))
    }

    pub fn pause(&self, id: StrategyId) -> CoreResult<()> {
        let now = self.clock.now_ns();
        self.with_algo(id, |a| a.pause(now))
    }

    pub fn resume(&self, id: StrategyId) -> CoreResult<()> {
        let now = self.clock.now_ns();
        self.with_algo(id, |a| a.resume(now))
    }

    /// Advisory cancel: the algorithm moves to CANCELLED immediately and
    /// its in-flight children are cancelled best-effort, without waiting
    /// for terminal confirmations.
    pub fn cancel(&self, id: StrategyId) -> CoreResult<()> {
        let now = self.clock.now_ns();
        self.with_algo(id, |a| a.cancel(now))?;
        for order in self.orders.orders_for_strategy(id) {
            if order.is_active() {
                if let Err(err) = self.ctx.cancel_order(order.id) {
                    warn!(order_id = %order.id, error = %err, "child cancel failed");
                }
            }
        }
        Ok(())
    }

    /// Mark an algorithm FAILED after a fatal error. Its in-flight children
    /// are cancelled the same way `cancel` does it.
    pub fn fail(&self, id: StrategyId, reason: &str) -> CoreResult<()> {
        let now = self.clock.now_ns();
        self.with_algo(id, |a| a.fail(reason, now))?;
        warn!(id = %id, reason, "algorithm failed");
        for order in self.orders.orders_for_strategy(id) {
            if order.is_active() {
                if let Err(err) = self.ctx.cancel_order(order.id) {
                    warn!(order_id = %order.id, error = %err, "child cancel failed");
                }
            }
        }
        Ok(())
    }

    /// Hot parameter update. The new config is journaled so replay sees the
    /// latest definition.
    pub fn update_config(&self, id: StrategyId, config: serde_json::Value) -> CoreResult<()> {
        self.with_algo(id, |a| a.update_config(&config))?;
        let name = self.with_algo(id, |a| Ok(a.name()))?;
        self.journal.append(JournalRecord::Strategy(StrategyRecord {
            id,
            name: name.to_string(),
            config,
            deleted: false,
            updated_ts_ns: self.clock.now_ns(),
        }));
        Ok(())
    }

    /// Drop a terminal algorithm and journal its tombstone.
    pub fn remove(&self, id: StrategyId) -> CoreResult<()> {
        let (name, state) = self.with_algo(id, |a| Ok((a.name(), a.state())))?;
        if !state.is_terminal() {
            return Err(CoreError::InvalidInput(format!(
                "algorithm {id} is {state}, cancel it before removal"
            )));
        }
        self.algos.remove(&id);
        self.journal.append(JournalRecord::Strategy(StrategyRecord {
            id,
            name: name.to_string(),
            config: serde_json::Value::Null,
            deleted: true,
            updated_ts_ns: self.clock.now_ns(),
        }));
        info!(id = %id, "algorithm removed");
        Ok(())
    }

    pub fn snapshot(&self, id: StrategyId) -> Option<AlgoSnapshot> {
        self.algos.get(&id).map(|entry| entry.lock().snapshot())
    }

    pub fn snapshots(&self) -> Vec<AlgoSnapshot> {
        self.algos
            .iter()
            .map(|entry| entry.value().lock().snapshot())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.algos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.algos.is_empty()
    }

    pub fn context(&self) -> &Arc<EngineContext> {
        &self.ctx
    }

    /// Ring-side event fan-out.
    pub fn handle_event(&self, envelope: &EventEnvelope) {
        match &envelope.event {
            TradingEvent::QuoteUpdate(quote) => {
                self.ctx.update_quote(quote);
                for entry in self.algos.iter() {
                    let mut algo = entry.value().lock();
                    if algo.state() == AlgoState::Running && algo.handles(&quote.symbol) {
                        algo.on_quote(quote, &*self.ctx);
                    }
                }
            }
            TradingEvent::OrderFilled(trade) => {
                self.ctx.dispatch_fill(trade);
                let owner = self
                    .orders
                    .get(trade.client_order_id)
                    .and_then(|o| o.strategy_id);
                if let Some(strategy_id) = owner {
                    if let Some(entry) = self.algos.get(&strategy_id) {
                        entry.lock().on_fill(trade);
                    } else {
                        debug!(
                            strategy = %strategy_id,
                            order_id = %trade.client_order_id,
                            "fill for unregistered algorithm"
                        );
                    }
                }
            }
            TradingEvent::Timer { now_ns } => {
                for entry in self.algos.iter() {
                    entry.value().lock().on_timer(*now_ns, &*self.ctx);
                }
            }
            _ => {}
        }
    }
}

/// Adapter placing the dispatcher at the tail of the handler chain.
pub struct DispatchHandler {
    dispatcher: Arc<AlgoDispatcher>,
}

impl DispatchHandler {
    pub fn new(dispatcher: Arc<AlgoDispatcher>) -> Self {
        Self { dispatcher }
    }
}

impl EventHandler for DispatchHandler {
    fn name(&self) -> &'static str {
        "algo-dispatcher"
    }

    fn on_event(&mut self, event: &EventEnvelope) -> anyhow::Result<()> {
        self.dispatcher.handle_event(event);
        Ok(())
    }
}

/// Publishes a `Timer` event into the ring at a fixed cadence, so timer
/// ticks share the pipeline's linearization point with quotes and fills.
pub struct TimerDriver {
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl TimerDriver {
    pub fn start(
        ring: Arc<EventRing>,
        clock: Arc<dyn Clock>,
        interval: Duration,
    ) -> CoreResult<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let handle = thread::Builder::new()
            .name("algo-timer".to_string())
            .spawn(move || {
                while flag.load(Ordering::Acquire) {
                    thread::sleep(interval);
                    if !flag.load(Ordering::Acquire) {
                        break;
                    }
                    let now_ns = clock.now_ns();
                    if let Err(err) = ring.publish(TradingEvent::Timer { now_ns }) {
                        warn!(error = %err, "timer publish failed");
                    }
                }
            })
            .map_err(|e| CoreError::Internal(format!("failed to spawn timer thread: {e}")))?;
        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for TimerDriver {
    fn drop(&mut self) {
        self.stop();
    }
}
