//! Engine assembly
//!
//! Wires the full pipeline: venue adapters and algorithms publish into the
//! ring; the handler chain consumes every event in dependency order
//!
//! ```text
//! risk-audit -> order-flow -> positions -> metrics -> algo-dispatcher
//! ```
//!
//! The risk handler vets `NewOrder` intents and rejects through the order
//! manager, so the order-flow handler (which runs after it) only routes
//! orders still PENDING. Fills settle into orders, then positions, then
//! stats, then the owning algorithm. Every status transition is journaled
//! with an audit record.

use crate::context::EngineContext;
use crate::dispatcher::{AlgoDispatcher, DispatchHandler, TimerDriver};
use gungnir_core::config::EngineConfig;
use gungnir_core::core::errors::{CoreError, CoreResult};
use gungnir_core::core::OrderStatus;
use gungnir_core::data::QuoteValidator;
use gungnir_core::event::{EventEnvelope, EventHandler, EventRing, TradingEvent};
use gungnir_core::journal::{AuditRecord, Journal, JournalRecord};
use gungnir_core::metrics::CoreMetrics;
use gungnir_core::orders::{FillOutcome, OrderManager, OrderSnapshot};
use gungnir_core::positions::PositionManager;
use gungnir_core::risk::{CheckResult, CircuitBreaker, RiskEngine, RiskStats};
use gungnir_core::time::Clock;
use gungnir_core::venue::{submit_with_retry, RetryPolicy, VenueAdapter};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// The assembled execution core.
pub struct TradingEngine {
    config: EngineConfig,
    ring: Arc<EventRing>,
    orders: Arc<OrderManager>,
    positions: Arc<PositionManager>,
    risk: Arc<RiskEngine>,
    metrics: Arc<CoreMetrics>,
    journal: Arc<dyn Journal>,
    validator: Arc<QuoteValidator>,
    dispatcher: Arc<AlgoDispatcher>,
    clock: Arc<dyn Clock>,
    timer: Mutex<Option<TimerDriver>>,
}

impl TradingEngine {
    pub fn new(
        config: EngineConfig,
        venue: Arc<dyn VenueAdapter>,
        journal: Arc<dyn Journal>,
        clock: Arc<dyn Clock>,
    ) -> CoreResult<Self> {
        let ring = EventRing::new(
            config.ring.capacity,
            config.ring.publish_wait(),
            Arc::clone(&clock),
        )?;
        let orders = Arc::new(OrderManager::new(config.order_pool, Arc::clone(&clock)));
        let positions = Arc::new(PositionManager::new());
        let breaker = CircuitBreaker::new(
            config.risk.breaker_threshold,
            config.risk.breaker_cooldown_ns(),
            Arc::clone(&clock),
        );
        let risk = Arc::new(RiskEngine::new(
            config.risk.limits.clone(),
            breaker,
            Arc::clone(&positions),
        ));
        let metrics = Arc::new(CoreMetrics::new());
        let validator = Arc::new(QuoteValidator::new());

        let ctx = Arc::new(EngineContext::new(
            Arc::clone(&ring),
            Arc::clone(&orders),
            Arc::clone(&clock),
        ));
        let dispatcher = Arc::new(AlgoDispatcher::new(
            ctx,
            Arc::clone(&orders),
            Arc::clone(&journal),
            Arc::clone(&clock),
        ));

        ring.register_handler(Box::new(RiskAuditHandler {
            risk: Arc::clone(&risk),
            orders: Arc::clone(&orders),
            journal: Arc::clone(&journal),
            metrics: Arc::clone(&metrics),
        }))?;
        ring.register_handler(Box::new(OrderFlowHandler {
            orders: Arc::clone(&orders),
            venue,
            journal: Arc::clone(&journal),
            metrics: Arc::clone(&metrics),
            retry: RetryPolicy::default(),
        }))?;
        ring.register_handler(Box::new(PositionFlowHandler {
            positions: Arc::clone(&positions),
            journal: Arc::clone(&journal),
        }))?;
        ring.register_handler(Box::new(MetricsHandler {
            metrics: Arc::clone(&metrics),
            clock: Arc::clone(&clock),
        }))?;
        ring.register_handler(Box::new(DispatchHandler::new(Arc::clone(&dispatcher))))?;

        Ok(Self {
            config,
            ring,
            orders,
            positions,
            risk,
            metrics,
            journal,
            validator,
            dispatcher,
            clock,
            timer: Mutex::new(None),
        })
    }

    /// Start the consumer threads and the timer.
    pub fn start(&self) -> CoreResult<()> {
        self.ring.start()?;
        *self.timer.lock() = Some(TimerDriver::start(
            Arc::clone(&self.ring),
            Arc::clone(&self.clock),
            Duration::from_secs(1),
        )?);
        info!("trading engine started");
        Ok(())
    }

    /// Clean shutdown: stop the timer, drain the ring, join the consumers.
    /// `Ok(())` maps to process exit code zero.
    pub fn shutdown(&self) -> CoreResult<()> {
        if let Some(mut timer) = self.timer.lock().take() {
            timer.stop();
        }
        self.ring.shutdown(self.config.ring.drain_wait())?;
        info!("trading engine stopped");
        Ok(())
    }

    /// Validated market data entry point for venue adapters. Invalid
    /// quotes are counted and dropped before they reach the ring.
    pub fn ingest_quote(&self, quote: gungnir_core::data::Quote) -> CoreResult<()> {
        if self.validator.validate(&quote).is_err() {
            return Ok(());
        }
        self.ring.publish(TradingEvent::QuoteUpdate(quote))?;
        Ok(())
    }

    pub fn risk_snapshot(&self) -> RiskStats {
        self.risk.stats()
    }

    pub fn ring(&self) -> &Arc<EventRing> {
        &self.ring
    }

    pub fn orders(&self) -> &Arc<OrderManager> {
        &self.orders
    }

    pub fn positions(&self) -> &Arc<PositionManager> {
        &self.positions
    }

    pub fn risk(&self) -> &Arc<RiskEngine> {
        &self.risk
    }

    pub fn metrics(&self) -> &Arc<CoreMetrics> {
        &self.metrics
    }

    pub fn dispatcher(&self) -> &Arc<AlgoDispatcher> {
        &self.dispatcher
    }

    pub fn journal(&self) -> &Arc<dyn Journal> {
        &self.journal
    }

    pub fn validator(&self) -> &Arc<QuoteValidator> {
        &self.validator
    }
}

fn audit(journal: &dyn Journal, snap: &OrderSnapshot, prev: OrderStatus, reason: Option<String>) {
    journal.append(JournalRecord::Audit(AuditRecord {
        order_id: snap.id,
        prev_status: prev,
        new_status: snap.status,
        ts_ns: snap.updated_ts_ns,
        reason,
    }));
    journal.append(JournalRecord::Order(snap.clone()));
}

/// First in the chain: pre-trade gates on `NewOrder`, post-trade
/// accounting and the global limit sweep on fills.
struct RiskAuditHandler {
    risk: Arc<RiskEngine>,
    orders: Arc<OrderManager>,
    journal: Arc<dyn Journal>,
    metrics: Arc<CoreMetrics>,
}

impl EventHandler for RiskAuditHandler {
    fn name(&self) -> &'static str {
        "risk-audit"
    }

    fn on_event(&mut self, event: &EventEnvelope) -> anyhow::Result<()> {
        match &event.event {
            TradingEvent::NewOrder(request) => {
                if let CheckResult::Rejected { rule, reason } =
                    self.risk.check_pre_trade(request)
                {
                    self.metrics.inc_risk_rejections();
                    let text = format!("{}: {reason}", rule.name());
                    match self.orders.reject(request.order_id, &text) {
                        Ok(snap) => {
                            audit(&*self.journal, &snap, OrderStatus::Pending, Some(text))
                        }
                        Err(err) => {
                            warn!(order_id = %request.order_id, error = %err, "risk reject bookkeeping failed")
                        }
                    }
                }
            }
            TradingEvent::OrderFilled(trade) => {
                self.risk.record_fill(trade.notional_cents());
                self.risk.check_global_limits();
            }
            _ => {}
        }
        Ok(())
    }
}

/// Second in the chain: routes vetted intents to the venue and merges
/// venue-side lifecycle events into the order records.
struct OrderFlowHandler {
    orders: Arc<OrderManager>,
    venue: Arc<dyn VenueAdapter>,
    journal: Arc<dyn Journal>,
    metrics: Arc<CoreMetrics>,
    retry: RetryPolicy,
}

impl EventHandler for OrderFlowHandler {
    fn name(&self) -> &'static str {
        "order-flow"
    }

    fn on_event(&mut self, event: &EventEnvelope) -> anyhow::Result<()> {
        match &event.event {
            TradingEvent::NewOrder(request) => {
                let Some(snap) = self.orders.get(request.order_id) else {
                    warn!(order_id = %request.order_id, "intent for unknown order");
                    return Ok(());
                };
                // Anything not PENDING was already dealt with upstream
                // (risk reject) and must not reach the venue.
                if snap.status != OrderStatus::Pending {
                    return Ok(());
                }
                let snap = self.orders.mark_submitted(request.order_id)?;
                self.metrics.inc_orders_submitted();
                audit(&*self.journal, &snap, OrderStatus::Pending, None);

                if let Err(err) = submit_with_retry(&*self.venue, &snap, self.retry.clone()) {
                    let text = format!("venue submit failed: {err}");
                    let snap = self.orders.reject(request.order_id, &text)?;
                    audit(&*self.journal, &snap, OrderStatus::Submitted, Some(text));
                }
            }
            TradingEvent::CancelOrder { order_id } => {
                if let Some(snap) = self.orders.get(*order_id) {
                    if snap.is_active() {
                        self.venue.cancel_order(&snap).map_err(CoreError::Venue)?;
                    }
                }
            }
            TradingEvent::ModifyOrder { order_id, .. } => {
                if let Some(snap) = self.orders.get(*order_id) {
                    self.venue.modify_order(&snap).map_err(CoreError::Venue)?;
                }
            }
            TradingEvent::OrderAccepted {
                order_id,
                exchange_order_id,
                ..
            } => {
                let snap = self.orders.mark_accepted(*order_id, *exchange_order_id)?;
                audit(&*self.journal, &snap, OrderStatus::Submitted, None);
            }
            TradingEvent::OrderFilled(trade) => {
                let (snap, outcome) = self.orders.apply_fill(trade)?;
                if outcome != FillOutcome::Duplicate {
                    let prev = if snap.filled_quantity == trade.quantity {
                        OrderStatus::Accepted
                    } else {
                        OrderStatus::PartiallyFilled
                    };
                    audit(&*self.journal, &snap, prev, None);
                    self.journal.append(JournalRecord::Trade(*trade));
                }
            }
            TradingEvent::OrderCancelled { order_id, .. } => {
                let prev = self
                    .orders
                    .get(*order_id)
                    .map(|s| s.status)
                    .unwrap_or(OrderStatus::Accepted);
                let snap = self.orders.mark_cancelled(*order_id)?;
                audit(&*self.journal, &snap, prev, None);
            }
            TradingEvent::OrderRejected { order_id, reason } => {
                let prev = self
                    .orders
                    .get(*order_id)
                    .map(|s| s.status)
                    .unwrap_or(OrderStatus::Submitted);
                let snap = self.orders.reject(*order_id, reason)?;
                audit(&*self.journal, &snap, prev, Some(reason.to_string()));
            }
            _ => {}
        }
        Ok(())
    }
}

/// Third in the chain: fills settle into positions, quotes refresh the
/// mark.
struct PositionFlowHandler {
    positions: Arc<PositionManager>,
    journal: Arc<dyn Journal>,
}

impl EventHandler for PositionFlowHandler {
    fn name(&self) -> &'static str {
        "positions"
    }

    fn on_event(&mut self, event: &EventEnvelope) -> anyhow::Result<()> {
        match &event.event {
            TradingEvent::OrderFilled(trade) => {
                let snap = self.positions.apply(trade)?;
                self.journal.append(JournalRecord::Position(snap));
                debug!(
                    symbol = %snap.symbol,
                    quantity = snap.quantity,
                    realized = snap.realized_pnl,
                    "position updated"
                );
            }
            TradingEvent::QuoteUpdate(quote) => {
                self.positions.mark_to_market(quote.symbol, quote.mid());
            }
            _ => {}
        }
        Ok(())
    }
}

/// Fourth in the chain: counters and publish-to-handle latency.
struct MetricsHandler {
    metrics: Arc<CoreMetrics>,
    clock: Arc<dyn Clock>,
}

impl EventHandler for MetricsHandler {
    fn name(&self) -> &'static str {
        "metrics"
    }

    fn on_event(&mut self, event: &EventEnvelope) -> anyhow::Result<()> {
        match &event.event {
            TradingEvent::QuoteUpdate(_) => self.metrics.inc_quotes(),
            TradingEvent::TradeUpdate(_) => self.metrics.inc_market_trades(),
            TradingEvent::OrderFilled(_) => self.metrics.inc_fills(),
            TradingEvent::NewOrder(_) => self.metrics.inc_orders_created(),
            TradingEvent::OrderAccepted { .. } => self.metrics.inc_orders_accepted(),
            TradingEvent::OrderRejected { .. } => self.metrics.inc_orders_rejected(),
            TradingEvent::OrderCancelled { .. } => self.metrics.inc_orders_cancelled(),
            TradingEvent::Timer { .. } => self.metrics.inc_timer_ticks(),
            _ => {}
        }
        self.metrics
            .handle_latency
            .record(self.clock.now_ns().saturating_sub(event.ingest_ts_ns));
        Ok(())
    }
}
