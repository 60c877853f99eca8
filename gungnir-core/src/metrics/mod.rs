//! Lock-free pipeline metrics
//!
//! Cache-padded atomic counters, relaxed ordering on the hot path, plus a
//! log-bucketed latency histogram for the publish-to-handle path. Snapshots
//! are taken without stopping the world.

pub mod histogram;

pub use histogram::LatencyHistogram;

use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicU64, Ordering};

macro_rules! counters {
    ($($(#[$doc:meta])* $name:ident => $inc:ident),+ $(,)?) => {
        /// Pipeline counters. One cache line per counter.
        pub struct CoreMetrics {
            $($(#[$doc])* pub $name: CachePadded<AtomicU64>,)+
            /// Publish-to-handle latency across all handlers.
            pub handle_latency: LatencyHistogram,
        }

        impl CoreMetrics {
            pub fn new() -> Self {
                Self {
                    $($name: CachePadded::new(AtomicU64::new(0)),)+
                    handle_latency: LatencyHistogram::new(),
                }
            }

            $(
                #[inline(always)]
                pub fn $inc(&self) {
                    self.$name.fetch_add(1, Ordering::Relaxed);
                }
            )+

            pub fn snapshot(&self) -> MetricsSnapshot {
                MetricsSnapshot {
                    $($name: self.$name.load(Ordering::Relaxed),)+
                    handle_latency_p99_ns: self.handle_latency.percentile_ns(0.99),
                    handle_latency_mean_ns: self.handle_latency.mean_ns(),
                }
            }
        }

        /// Point-in-time copy of all counters.
        #[derive(Debug, Clone, Copy, Default)]
        pub struct MetricsSnapshot {
            $(pub $name: u64,)+
            pub handle_latency_p99_ns: u64,
            pub handle_latency_mean_ns: u64,
        }
    };
}

counters! {
    /// Quotes observed by the metrics handler.
    quotes_received => inc_quotes,
    /// Public tape prints observed.
    market_trades_received => inc_market_trades,
    /// Own fills observed.
    fills_received => inc_fills,
    orders_created => inc_orders_created,
    orders_submitted => inc_orders_submitted,
    orders_accepted => inc_orders_accepted,
    orders_rejected => inc_orders_rejected,
    orders_cancelled => inc_orders_cancelled,
    orders_filled => inc_orders_filled,
    risk_rejections => inc_risk_rejections,
    timer_ticks => inc_timer_ticks,
}

impl Default for CoreMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSnapshot {
    /// Fills per submitted order.
    pub fn fill_rate(&self) -> f64 {
        if self.orders_submitted == 0 {
            0.0
        } else {
            self.fills_received as f64 / self.orders_submitted as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let m = CoreMetrics::new();
        m.inc_quotes();
        m.inc_quotes();
        m.inc_fills();
        m.inc_orders_submitted();

        let snap = m.snapshot();
        assert_eq!(snap.quotes_received, 2);
        assert_eq!(snap.fills_received, 1);
        assert_eq!(snap.orders_submitted, 1);
        assert_eq!(snap.fill_rate(), 1.0);
    }

    #[test]
    fn test_latency_flows_into_snapshot() {
        let m = CoreMetrics::new();
        m.handle_latency.record(1_000);
        m.handle_latency.record(3_000);
        let snap = m.snapshot();
        assert!(snap.handle_latency_p99_ns >= 3_000);
        assert_eq!(snap.handle_latency_mean_ns, 2_000);
    }

    #[test]
    fn test_fill_rate_with_no_orders() {
        assert_eq!(MetricsSnapshot::default().fill_rate(), 0.0);
    }
}
