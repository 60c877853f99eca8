//! Risk limit configuration
//!
//! Per-order and position size limits are in native units; every
//! notional or P&L limit is in cents so symbols at different price scales
//! compare against one number.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskLimits {
    /// Largest single order quantity, native units.
    pub max_order_size: i64,
    /// Largest single order notional, cents.
    pub max_order_notional_cents: i64,
    /// Largest absolute per-symbol position, native units.
    pub max_position_size: i64,
    /// New order intents admitted per trading day.
    pub max_orders_per_day: u64,
    /// Total traded notional admitted per day, cents.
    pub max_daily_notional_cents: i64,
    /// Daily loss at which trading stops, cents (positive number).
    pub max_daily_loss_cents: i64,
    /// Per-position peak-to-trough decline that disables trading, cents.
    pub max_position_drawdown_cents: i64,
    /// Per-position unrealized loss that disables trading, cents.
    pub max_position_unrealized_loss_cents: i64,
    /// Absolute net exposure bound, cents.
    pub max_net_exposure_cents: i64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_order_size: 10_000,
            max_order_notional_cents: 50_000_000,        // $500k
            max_position_size: 50_000,
            max_orders_per_day: 100_000,
            max_daily_notional_cents: 5_000_000_000,     // $50M
            max_daily_loss_cents: 10_000_000,            // $100k
            max_position_drawdown_cents: 5_000_000,      // $50k
            max_position_unrealized_loss_cents: 5_000_000,
            max_net_exposure_cents: 1_000_000_000,       // $10M
        }
    }
}

impl RiskLimits {
    /// Tight limits for cautious deployments.
    pub fn conservative() -> Self {
        Self {
            max_order_size: 1_000,
            max_order_notional_cents: 5_000_000,         // $50k
            max_position_size: 5_000,
            max_orders_per_day: 10_000,
            max_daily_notional_cents: 500_000_000,       // $5M
            max_daily_loss_cents: 1_000_000,             // $10k
            max_position_drawdown_cents: 500_000,
            max_position_unrealized_loss_cents: 500_000,
            max_net_exposure_cents: 100_000_000,         // $1M
        }
    }

    /// Wide limits for well-capitalized deployments.
    pub fn aggressive() -> Self {
        Self {
            max_order_size: 100_000,
            max_order_notional_cents: 500_000_000,       // $5M
            max_position_size: 500_000,
            max_orders_per_day: 1_000_000,
            max_daily_notional_cents: 50_000_000_000,    // $500M
            max_daily_loss_cents: 100_000_000,           // $1M
            max_position_drawdown_cents: 50_000_000,
            max_position_unrealized_loss_cents: 50_000_000,
            max_net_exposure_cents: 10_000_000_000,      // $100M
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profiles_ordering() {
        let conservative = RiskLimits::conservative();
        let default = RiskLimits::default();
        let aggressive = RiskLimits::aggressive();
        assert!(conservative.max_order_size < default.max_order_size);
        assert!(default.max_order_size < aggressive.max_order_size);
        assert!(conservative.max_daily_loss_cents < aggressive.max_daily_loss_cents);
    }

    #[test]
    fn test_serde_round_trip() {
        let limits = RiskLimits::default();
        let json = serde_json::to_string(&limits).unwrap();
        let back: RiskLimits = serde_json::from_str(&json).unwrap();
        assert_eq!(back, limits);
    }
}
