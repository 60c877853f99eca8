//! Pre-trade and post-trade risk
//!
//! `check_pre_trade` evaluates the rule chain in a fixed order and stops at
//! the first rejection, so a given order always fails with a deterministic
//! rule name. Approvals and rejections feed the circuit breaker; repeated
//! rejections trip it and everything fails fast until the cooldown.

use crate::core::errors::CoreError;
use crate::core::money;
use crate::event::OrderRequest;
use crate::positions::PositionManager;
use crate::risk::breaker::{BreakerState, CircuitBreaker};
use crate::risk::limits::RiskLimits;
use crossbeam_utils::CachePadded;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Rules in evaluation order. The discriminant indexes the rejection
/// counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RiskRule {
    EngineDisabled = 0,
    CircuitBreaker = 1,
    MaxOrdersPerDay = 2,
    MaxOrderSize = 3,
    MaxOrderNotional = 4,
    MaxPositionSize = 5,
    MaxDailyNotional = 6,
    MaxDailyLoss = 7,
    NetExposure = 8,
    PositionDrawdown = 9,
}

pub const RISK_RULE_COUNT: usize = 10;

impl RiskRule {
    /// Stable name surfaced in rejections and stats.
    pub const fn name(&self) -> &'static str {
        match self {
            RiskRule::EngineDisabled => "EngineDisabled",
            RiskRule::CircuitBreaker => "CircuitBreaker",
            RiskRule::MaxOrdersPerDay => "MaxOrdersPerDay",
            RiskRule::MaxOrderSize => "MaxOrderSize",
            RiskRule::MaxOrderNotional => "MaxOrderNotional",
            RiskRule::MaxPositionSize => "MaxPositionSize",
            RiskRule::MaxDailyNotional => "MaxDailyNotional",
            RiskRule::MaxDailyLoss => "MaxDailyLoss",
            RiskRule::NetExposure => "NetExposure",
            RiskRule::PositionDrawdown => "PositionDrawdown",
        }
    }
}

/// Outcome of a pre-trade check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckResult {
    Approved,
    Rejected { rule: RiskRule, reason: String },
}

impl CheckResult {
    #[inline(always)]
    pub fn is_approved(&self) -> bool {
        matches!(self, CheckResult::Approved)
    }

    /// Fold into the core error taxonomy for callers that propagate with
    /// `?` instead of branching on the verdict.
    pub fn into_result(self) -> Result<(), CoreError> {
        match self {
            CheckResult::Approved => Ok(()),
            CheckResult::Rejected { rule, reason } => Err(CoreError::RiskRejected {
                rule: rule.name(),
                reason,
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RiskStats {
    pub approved: u64,
    pub rejected: u64,
    pub rejections_by_rule: [u64; RISK_RULE_COUNT],
    pub orders_today: u64,
    pub daily_notional_cents: i64,
    pub breaker_state: BreakerState,
    pub enabled: bool,
}

pub struct RiskEngine {
    limits: RwLock<RiskLimits>,
    enabled: AtomicBool,
    breaker: CircuitBreaker,
    positions: Arc<PositionManager>,
    orders_today: AtomicU64,
    daily_notional_cents: AtomicI64,
    approved: CachePadded<AtomicU64>,
    rejections: [CachePadded<AtomicU64>; RISK_RULE_COUNT],
}

impl RiskEngine {
    pub fn new(limits: RiskLimits, breaker: CircuitBreaker, positions: Arc<PositionManager>) -> Self {
        Self {
            limits: RwLock::new(limits),
            enabled: AtomicBool::new(true),
            breaker,
            positions,
            orders_today: AtomicU64::new(0),
            daily_notional_cents: AtomicI64::new(0),
            approved: CachePadded::new(AtomicU64::new(0)),
            rejections: std::array::from_fn(|_| CachePadded::new(AtomicU64::new(0))),
        }
    }

    /// Evaluate the rule chain. On approval the daily order counter
    /// advances and the breaker records a success; on rejection the breaker
    /// records a failure.
    pub fn check_pre_trade(&self, request: &OrderRequest) -> CheckResult {
        match self.evaluate(request) {
            Ok(()) => {
                self.orders_today.fetch_add(1, Ordering::AcqRel);
                self.approved.fetch_add(1, Ordering::Relaxed);
                self.breaker.record_success();
                CheckResult::Approved
            }
            Err((rule, reason)) => {
                self.rejections[rule as usize].fetch_add(1, Ordering::Relaxed);
                self.breaker.record_failure(&reason);
                debug!(order_id = %request.order_id, rule = rule.name(), reason, "pre-trade reject");
                CheckResult::Rejected { rule, reason }
            }
        }
    }

    fn evaluate(&self, request: &OrderRequest) -> Result<(), (RiskRule, String)> {
        let limits = self.limits.read().clone();

        if !self.enabled.load(Ordering::Acquire) {
            return Err((
                RiskRule::EngineDisabled,
                "risk engine disabled".to_string(),
            ));
        }

        if let Err(CoreError::CircuitBreakerTripped { reason }) = self.breaker.check_allowed() {
            return Err((
                RiskRule::CircuitBreaker,
                format!("circuit breaker open: {reason}"),
            ));
        }

        let today = self.orders_today.load(Ordering::Acquire);
        if today >= limits.max_orders_per_day {
            return Err((
                RiskRule::MaxOrdersPerDay,
                format!("{today} orders already submitted today"),
            ));
        }

        if request.quantity > limits.max_order_size {
            return Err((
                RiskRule::MaxOrderSize,
                format!(
                    "order size {} exceeds limit {}",
                    request.quantity, limits.max_order_size
                ),
            ));
        }

        let notional_cents = money::notional_cents(request.price, request.quantity, request.scale);
        if notional_cents > limits.max_order_notional_cents {
            return Err((
                RiskRule::MaxOrderNotional,
                format!(
                    "order notional {}c exceeds limit {}c",
                    notional_cents, limits.max_order_notional_cents
                ),
            ));
        }

        let current = self
            .positions
            .snapshot(request.symbol)
            .map(|s| s.quantity)
            .unwrap_or(0);
        let projected = current + request.side.sign() * request.quantity;
        if projected.abs() > limits.max_position_size {
            return Err((
                RiskRule::MaxPositionSize,
                format!(
                    "projected position {} exceeds limit {}",
                    projected, limits.max_position_size
                ),
            ));
        }

        let traded = self.daily_notional_cents.load(Ordering::Acquire);
        if traded + notional_cents > limits.max_daily_notional_cents {
            return Err((
                RiskRule::MaxDailyNotional,
                format!(
                    "daily notional {}c would exceed limit {}c",
                    traded + notional_cents,
                    limits.max_daily_notional_cents
                ),
            ));
        }

        let pnl_cents = self.positions.total_pnl_cents();
        if pnl_cents < -limits.max_daily_loss_cents {
            return Err((
                RiskRule::MaxDailyLoss,
                format!(
                    "daily pnl {}c breaches loss limit {}c",
                    pnl_cents, limits.max_daily_loss_cents
                ),
            ));
        }

        Ok(())
    }

    /// Post-trade accounting: fills add to the daily traded notional.
    pub fn record_fill(&self, notional_cents: i64) {
        self.daily_notional_cents
            .fetch_add(notional_cents, Ordering::AcqRel);
    }

    /// Sweep the global limits. Disables trading and trips the breaker on a
    /// breach; returns whether trading is still enabled.
    pub fn check_global_limits(&self) -> bool {
        let limits = self.limits.read().clone();

        let pnl_cents = self.positions.total_pnl_cents();
        if pnl_cents < -limits.max_daily_loss_cents {
            self.shut_off(RiskRule::MaxDailyLoss, &format!("daily pnl {pnl_cents}c"));
            return false;
        }

        let net = self.positions.net_exposure_cents();
        if net.abs() > limits.max_net_exposure_cents {
            self.shut_off(RiskRule::NetExposure, &format!("net exposure {net}c"));
            return false;
        }

        for snap in self.positions.snapshots() {
            let drawdown_cents = money::to_cents(snap.max_drawdown, snap.scale);
            if drawdown_cents > limits.max_position_drawdown_cents {
                self.shut_off(
                    RiskRule::PositionDrawdown,
                    &format!("{} drawdown {}c", snap.symbol, drawdown_cents),
                );
                return false;
            }
            let unrealized_cents = snap.unrealized_pnl_cents();
            if unrealized_cents < -limits.max_position_unrealized_loss_cents {
                self.shut_off(
                    RiskRule::PositionDrawdown,
                    &format!("{} unrealized {}c", snap.symbol, unrealized_cents),
                );
                return false;
            }
        }

        true
    }

    fn shut_off(&self, rule: RiskRule, detail: &str) {
        if self.enabled.swap(false, Ordering::AcqRel) {
            warn!(rule = rule.name(), detail, "global risk limit breached, trading disabled");
            self.breaker.trip(&format!("{}: {detail}", rule.name()));
        }
    }

    /// Zero the per-day counters. Called at market open.
    pub fn reset_daily_counters(&self) {
        self.orders_today.store(0, Ordering::Release);
        self.daily_notional_cents.store(0, Ordering::Release);
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Release);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn limits(&self) -> RiskLimits {
        self.limits.read().clone()
    }

    pub fn set_limits(&self, limits: RiskLimits) {
        *self.limits.write() = limits;
    }

    pub fn stats(&self) -> RiskStats {
        let mut rejections_by_rule = [0u64; RISK_RULE_COUNT];
        let mut rejected = 0;
        for (idx, counter) in self.rejections.iter().enumerate() {
            let count = counter.load(Ordering::Relaxed);
            rejections_by_rule[idx] = count;
            rejected += count;
        }
        RiskStats {
            approved: self.approved.load(Ordering::Relaxed),
            rejected,
            rejections_by_rule,
            orders_today: self.orders_today.load(Ordering::Relaxed),
            daily_notional_cents: self.daily_notional_cents.load(Ordering::Relaxed),
            breaker_state: self.breaker.state(),
            enabled: self.is_enabled(),
        }
    }
}
