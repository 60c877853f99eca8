//! Venue adapter capability
//!
//! The core does not speak HTTP or WebSocket; it consumes this trait.
//! Adapters run their I/O on their own task pool and feed quotes, trades,
//! fills and order updates back into the event ring they were constructed
//! with. Trait methods must enqueue and return promptly; a handler thread
//! is never allowed to block on the network.

pub mod backoff;

pub use backoff::{ExponentialBackoff, RetryPolicy};

use crate::core::{OrderId, OrderStatus, Symbol};
use crate::orders::OrderSnapshot;
use std::fmt;
use thiserror::Error;
use tracing::warn;

/// Classification of a venue failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VenueErrorKind {
    RateLimited,
    Unauthorized,
    NotFound,
    InsufficientFunds,
    InvalidOrder,
    Transport,
    Server,
    Timeout,
}

impl fmt::Display for VenueErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VenueErrorKind::RateLimited => "rate limited",
            VenueErrorKind::Unauthorized => "unauthorized",
            VenueErrorKind::NotFound => "not found",
            VenueErrorKind::InsufficientFunds => "insufficient funds",
            VenueErrorKind::InvalidOrder => "invalid order",
            VenueErrorKind::Transport => "transport",
            VenueErrorKind::Server => "server",
            VenueErrorKind::Timeout => "timeout",
        };
        f.write_str(name)
    }
}

/// Typed venue failure. `retryable` drives the back-off path: retryable
/// errors are retried with jitter up to the policy's attempt cap,
/// non-retryable errors complete the order as REJECTED.
#[derive(Debug, Clone, Error)]
#[error("venue {kind} (code {code}): {message}")]
pub struct VenueError {
    pub kind: VenueErrorKind,
    pub code: i32,
    pub message: String,
    pub retryable: bool,
}

impl VenueError {
    pub fn new(kind: VenueErrorKind, code: i32, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            kind,
            code,
            message: message.into(),
            retryable,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(VenueErrorKind::Timeout, 0, message, true)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(VenueErrorKind::Transport, 0, message, true)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(VenueErrorKind::RateLimited, 429, message, true)
    }

    pub fn invalid_order(message: impl Into<String>) -> Self {
        Self::new(VenueErrorKind::InvalidOrder, 400, message, false)
    }

    pub fn insufficient_funds(message: impl Into<String>) -> Self {
        Self::new(VenueErrorKind::InsufficientFunds, 400, message, false)
    }
}

/// Order state change reported by a venue's stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderUpdate {
    pub order_id: OrderId,
    pub exchange_order_id: Option<u64>,
    pub prev_status: OrderStatus,
    pub new_status: OrderStatus,
    pub ts_ns: u64,
}

/// Capability the core consumes for each venue.
///
/// Acknowledgements, fills and cancels arrive asynchronously as ring
/// events published by the adapter; the methods here only carry the
/// outbound intent. Every in-flight operation carries the adapter's
/// configured deadline; a timeout surfaces as a retryable
/// [`VenueError`] of kind [`VenueErrorKind::Timeout`].
pub trait VenueAdapter: Send + Sync {
    fn name(&self) -> &str;

    fn submit_order(&self, order: &OrderSnapshot) -> Result<(), VenueError>;

    fn cancel_order(&self, order: &OrderSnapshot) -> Result<(), VenueError>;

    fn modify_order(&self, order: &OrderSnapshot) -> Result<(), VenueError>;

    fn open_orders(&self) -> Result<Vec<OrderSnapshot>, VenueError>;

    /// Cancel everything, optionally scoped to one symbol.
    fn cancel_all(&self, symbol: Option<&Symbol>) -> Result<(), VenueError>;

    fn subscribe_quotes(&self, symbols: &[Symbol]) -> Result<(), VenueError>;

    fn unsubscribe_quotes(&self, symbols: &[Symbol]) -> Result<(), VenueError>;

    fn subscribe_trades(&self, symbols: &[Symbol]) -> Result<(), VenueError>;

    fn unsubscribe_trades(&self, symbols: &[Symbol]) -> Result<(), VenueError>;
}

/// Submit with retry on retryable failures. Sleeps between attempts per
/// the back-off schedule; returns the last error once attempts are
/// exhausted or immediately for non-retryable failures.
pub fn submit_with_retry(
    venue: &dyn VenueAdapter,
    order: &OrderSnapshot,
    policy: RetryPolicy,
) -> Result<(), VenueError> {
    let mut backoff = ExponentialBackoff::new(policy);
    loop {
        match venue.submit_order(order) {
            Ok(()) => return Ok(()),
            Err(err) if err.retryable => match backoff.next_delay() {
                Some(delay) => {
                    warn!(
                        venue = venue.name(),
                        order_id = %order.id,
                        attempt = backoff.attempt(),
                        error = %err,
                        "retrying venue submit"
                    );
                    std::thread::sleep(delay);
                }
                None => return Err(err),
            },
            Err(err) => return Err(err),
        }
    }
}
