//! Circuit breaker
//!
//! Three-state machine guarding order flow: Closed (normal), Open
//! (tripped, everything fails fast), HalfOpen (cooldown elapsed, probing
//! recovery). `threshold` consecutive failures trip the breaker; after
//! `cooldown` the next permission check moves to HalfOpen, where one
//! success closes the breaker and one failure re-opens it immediately.

use crate::core::errors::{CoreError, CoreResult};
use crate::time::Clock;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BreakerState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl From<u8> for BreakerState {
    fn from(value: u8) -> Self {
        match value {
            1 => BreakerState::Open,
            2 => BreakerState::HalfOpen,
            _ => BreakerState::Closed,
        }
    }
}

pub struct CircuitBreaker {
    threshold: u64,
    cooldown_ns: u64,
    state: AtomicU8,
    consecutive_failures: AtomicU64,
    tripped_at_ns: AtomicU64,
    trip_count: AtomicU64,
    last_reason: Mutex<String>,
    clock: Arc<dyn Clock>,
}

impl CircuitBreaker {
    pub fn new(threshold: u64, cooldown_ns: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            threshold: threshold.max(1),
            cooldown_ns,
            state: AtomicU8::new(BreakerState::Closed as u8),
            consecutive_failures: AtomicU64::new(0),
            tripped_at_ns: AtomicU64::new(0),
            trip_count: AtomicU64::new(0),
            last_reason: Mutex::new(String::new()),
            clock,
        }
    }

    /// Permission check. While Open this fails with the trip reason; once
    /// the cooldown has elapsed the breaker moves to HalfOpen and allows a
    /// trial.
    pub fn check_allowed(&self) -> CoreResult<()> {
        match self.state() {
            BreakerState::Closed | BreakerState::HalfOpen => Ok(()),
            BreakerState::Open => {
                let tripped_at = self.tripped_at_ns.load(Ordering::Acquire);
                if self.clock.now_ns().saturating_sub(tripped_at) >= self.cooldown_ns {
                    self.state
                        .store(BreakerState::HalfOpen as u8, Ordering::Release);
                    debug!("circuit breaker half-open, probing recovery");
                    Ok(())
                } else {
                    Err(CoreError::CircuitBreakerTripped {
                        reason: self.last_reason.lock().clone(),
                    })
                }
            }
        }
    }

    pub fn record_success(&self) {
        match self.state() {
            BreakerState::Closed => {
                self.consecutive_failures.store(0, Ordering::Release);
            }
            BreakerState::HalfOpen => {
                self.state
                    .store(BreakerState::Closed as u8, Ordering::Release);
                self.consecutive_failures.store(0, Ordering::Release);
                info!("circuit breaker closed after successful probe");
            }
            BreakerState::Open => {}
        }
    }

    pub fn record_failure(&self, reason: &str) {
        match self.state() {
            BreakerState::Closed => {
                let failures = self.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1;
                if failures >= self.threshold {
                    self.open(reason);
                }
            }
            BreakerState::HalfOpen => {
                // Probe failed; trip time refreshes.
                self.open(reason);
            }
            BreakerState::Open => {}
        }
    }

    /// Administrative trip.
    pub fn trip(&self, reason: &str) {
        self.open(reason);
    }

    /// Administrative reset to Closed.
    pub fn reset(&self) {
        self.state
            .store(BreakerState::Closed as u8, Ordering::Release);
        self.consecutive_failures.store(0, Ordering::Release);
        info!("circuit breaker manually reset");
    }

    fn open(&self, reason: &str) {
        self.state.store(BreakerState::Open as u8, Ordering::Release);
        self.tripped_at_ns
            .store(self.clock.now_ns(), Ordering::Release);
        self.trip_count.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.store(0, Ordering::Release);
        *self.last_reason.lock() = reason.to_string();
        warn!(reason, "circuit breaker tripped");
    }

    pub fn state(&self) -> BreakerState {
        self.state.load(Ordering::Acquire).into()
    }

    pub fn consecutive_failures(&self) -> u64 {
        self.consecutive_failures.load(Ordering::Acquire)
    }

    pub fn trip_count(&self) -> u64 {
        self.trip_count.load(Ordering::Relaxed)
    }

    pub fn last_reason(&self) -> String {
        self.last_reason.lock().clone()
    }
}
