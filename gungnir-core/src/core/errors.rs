//! Domain error taxonomy for the execution core
//!
//! Every fallible operation in the pipeline surfaces one of these variants.
//! Validation failures are local and leave no state behind; transition and
//! scale violations are logged and leave the target record untouched.

use crate::venue::VenueError;
use thiserror::Error;

/// Core error type shared by all pipeline components.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Validation failure at the core boundary. No state change.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Attempted state change not permitted by the entity's transition table.
    /// The record is left unchanged.
    #[error("illegal {entity} transition {from} -> {to}")]
    IllegalTransition {
        entity: &'static str,
        from: &'static str,
        to: &'static str,
    },

    /// A trade's price scale contradicts the scale of a non-flat position.
    #[error("scale mismatch on {symbol}: position scale {position_scale}, trade scale {trade_scale}")]
    ScaleMismatch {
        symbol: String,
        position_scale: i64,
        trade_scale: i64,
    },

    /// Pre-trade risk check failed. `rule` is the stable rule name.
    #[error("risk rejected by {rule}: {reason}")]
    RiskRejected { rule: &'static str, reason: String },

    /// Error surfaced by a venue adapter.
    #[error(transparent)]
    Venue(#[from] VenueError),

    /// Circuit breaker is open; all new order intents are rejected until the
    /// cooldown elapses. Existing orders are unaffected.
    #[error("circuit breaker open: {reason}")]
    CircuitBreakerTripped { reason: String },

    /// Fixed-point arithmetic would overflow an i64.
    #[error("arithmetic overflow in {context}")]
    Overflow { context: &'static str },

    /// The event ring could not accept a publication within its bounded wait.
    #[error("ring back-pressure from {source_name}")]
    Backpressure { source_name: &'static str },

    /// Journal I/O failure.
    #[error("journal i/o: {0}")]
    Io(#[from] std::io::Error),

    /// Unexpected condition. Always logged with full context, never swallowed.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Stable rule name for risk rejections, `None` for other variants.
    pub fn risk_rule(&self) -> Option<&'static str> {
        match self {
            CoreError::RiskRejected { rule, .. } => Some(rule),
            _ => None,
        }
    }
}

/// Result alias used throughout the core.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_context() {
        let err = CoreError::IllegalTransition {
            entity: "order",
            from: "FILLED",
            to: "ACCEPTED",
        };
        let msg = err.to_string();
        assert!(msg.contains("order"));
        assert!(msg.contains("FILLED"));
        assert!(msg.contains("ACCEPTED"));
    }

    #[test]
    fn test_risk_rule_accessor() {
        let err = CoreError::RiskRejected {
            rule: "MaxOrderSize",
            reason: "qty 200 > 100".to_string(),
        };
        assert_eq!(err.risk_rule(), Some("MaxOrderSize"));
        assert_eq!(
            CoreError::InvalidInput("x".to_string()).risk_rule(),
            None
        );
    }
}
