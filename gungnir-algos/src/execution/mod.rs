//! Execution algorithm pipeline
//!
//! VWAP and TWAP share everything except the bucket schedule: slicing a
//! parent order across time buckets, catching up when behind the schedule,
//! capping children at a fraction of displayed opposite-side liquidity,
//! pricing at the opposite best, and completing at the horizon. The shared
//! pipeline lives in [`SlicedExecution`]; each algorithm contributes its
//! schedule and delegates the rest.

pub mod twap;
pub mod vwap;

pub use twap::Twap;
pub use vwap::Vwap;

use crate::context::{AlgoContext, ChildOrder};
use crate::state::{AlgoState, Lifecycle};
use gungnir_core::core::errors::{CoreError, CoreResult};
use gungnir_core::core::money::PriceScale;
use gungnir_core::core::{Side, StrategyId, Symbol, TimeInForce};
use gungnir_core::data::{Quote, Trade};
use tracing::{debug, info, warn};

/// Parent order parameters common to all execution algorithms.
#[derive(Debug, Clone, Copy)]
pub struct ExecParams {
    pub symbol: Symbol,
    pub side: Side,
    pub target_quantity: i64,
    /// Limit price at `scale`; zero means unconstrained.
    pub limit_price: i64,
    pub scale: PriceScale,
    pub start_ns: u64,
    pub end_ns: u64,
    /// Fraction of displayed opposite-side size a child may consume, in
    /// basis points of 10_000.
    pub max_participation_bps: u32,
    pub time_in_force: TimeInForce,
}

impl ExecParams {
    pub fn validate(&self) -> CoreResult<()> {
        if self.target_quantity <= 0 {
            return Err(CoreError::InvalidInput(format!(
                "target quantity must be positive, got {}",
                self.target_quantity
            )));
        }
        if self.end_ns <= self.start_ns {
            return Err(CoreError::InvalidInput(
                "execution horizon must end after it starts".to_string(),
            ));
        }
        if self.max_participation_bps == 0 {
            return Err(CoreError::InvalidInput(
                "participation cap must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Execution progress reported through the management surface.
#[derive(Debug, Clone, Copy)]
pub struct ExecStats {
    pub target_quantity: i64,
    pub filled_quantity: i64,
    pub orders_submitted: u64,
    pub benchmark_price: i64,
    pub average_fill_price: i64,
    /// Signed so positive is always adverse: above benchmark for buys,
    /// below for sells.
    pub slippage_bps: i64,
    pub current_bucket: usize,
    pub bucket_count: usize,
}

/// Child order quantity capped by displayed opposite-side liquidity:
/// `ceil(size * bps / 10_000)`, floored at one unit so a permitted child is
/// never rounded away.
pub(crate) fn participation_cap(opposite_size: i64, max_participation_bps: u32) -> i64 {
    let allowed =
        (opposite_size.max(0) as i128 * max_participation_bps as i128 + 9_999) / 10_000;
    (allowed as i64).max(1)
}

/// Shared sliced-execution pipeline.
pub(crate) struct SlicedExecution {
    pub id: StrategyId,
    pub algo_name: &'static str,
    pub params: ExecParams,
    pub lifecycle: Lifecycle,
    /// Per-bucket scheduled quantities; sums to `target_quantity`.
    pub schedule: Vec<i64>,
    pub executed_per_bucket: Vec<i64>,
    pub bucket_duration_ns: u64,
    pub current_bucket: usize,
    pub filled_quantity: i64,
    fill_notional: i128,
    pub orders_submitted: u64,
    pub fills_received: u64,
    pub benchmark_price: i64,
    initialized: bool,
}

impl SlicedExecution {
    pub fn new(id: StrategyId, algo_name: &'static str, params: ExecParams) -> CoreResult<Self> {
        params.validate()?;
        Ok(Self {
            id,
            algo_name,
            params,
            lifecycle: Lifecycle::new(params.start_ns),
            schedule: Vec::new(),
            executed_per_bucket: Vec::new(),
            bucket_duration_ns: 0,
            current_bucket: 0,
            filled_quantity: 0,
            fill_notional: 0,
            orders_submitted: 0,
            fills_received: 0,
            benchmark_price: 0,
            initialized: false,
        })
    }

    /// Install the bucket schedule. Must sum to the target; the builders
    /// guarantee this by pushing rounding remainders into a designated
    /// bucket.
    pub fn set_schedule(&mut self, schedule: Vec<i64>) {
        debug_assert_eq!(schedule.iter().sum::<i64>(), self.params.target_quantity);
        debug_assert!(!schedule.is_empty());
        self.bucket_duration_ns =
            (self.params.end_ns - self.params.start_ns) / schedule.len() as u64;
        self.executed_per_bucket = vec![0; schedule.len()];
        self.schedule = schedule;
    }

    /// Capture the arrival benchmark (mid at initialize). Exactly once.
    pub fn capture_benchmark(&mut self, ctx: &dyn AlgoContext) -> CoreResult<()> {
        if self.initialized {
            return Err(CoreError::IllegalTransition {
                entity: "algorithm",
                from: "INITIALIZED",
                to: "INITIALIZED",
            });
        }
        self.initialized = true;
        self.benchmark_price = ctx
            .quote(&self.params.symbol)
            .map(|q| q.mid())
            .unwrap_or(0);
        debug!(
            algo = self.algo_name,
            id = %self.id,
            benchmark = self.benchmark_price,
            "benchmark captured"
        );
        Ok(())
    }

    #[inline(always)]
    pub fn remaining(&self) -> i64 {
        (self.params.target_quantity - self.filled_quantity).max(0)
    }

    /// Bucket index for a timestamp, clamped to the schedule.
    pub fn bucket_at(&self, now_ns: u64) -> usize {
        if self.schedule.is_empty() || self.bucket_duration_ns == 0 {
            return 0;
        }
        let elapsed = now_ns.saturating_sub(self.params.start_ns);
        ((elapsed / self.bucket_duration_ns) as usize).min(self.schedule.len() - 1)
    }

    /// Move `current_bucket` forward to match the clock, logging each
    /// transition.
    fn advance_bucket(&mut self, now_ns: u64) {
        let bucket = self.bucket_at(now_ns);
        if bucket > self.current_bucket {
            debug!(
                algo = self.algo_name,
                id = %self.id,
                from = self.current_bucket,
                to = bucket,
                "bucket transition"
            );
            self.current_bucket = bucket;
        }
    }

    /// Desired child size at `now`: the unexecuted part of the current
    /// bucket plus an even share of the shortfall across the remaining
    /// buckets, never exceeding what is left of the parent.
    pub fn child_size(&self, now_ns: u64) -> i64 {
        if self.schedule.is_empty() {
            return 0;
        }
        let bucket = self.bucket_at(now_ns);
        let expected: i64 = self.schedule[..bucket].iter().sum();
        let behind = (expected - self.filled_quantity).max(0);
        let bucket_remaining = (self.schedule[bucket] - self.executed_per_bucket[bucket]).max(0);
        let buckets_remaining = (self.schedule.len() - bucket) as i64;
        let catchup = behind / buckets_remaining;
        self.remaining().min(bucket_remaining + catchup)
    }

    /// Quote-driven slice: size the child, cap it by participation, price
    /// it at the opposite best and submit.
    pub fn on_quote(&mut self, quote: &Quote, ctx: &dyn AlgoContext) {
        if !self.lifecycle.is_running() || quote.symbol != self.params.symbol {
            return;
        }
        let now = ctx.now_ns();
        if now >= self.params.end_ns {
            self.complete(now);
            return;
        }
        if now < self.params.start_ns {
            return;
        }
        self.advance_bucket(now);

        let mut quantity = self.child_size(now);
        if quantity <= 0 {
            return;
        }
        quantity = quantity.min(participation_cap(
            quote.opposite_size(self.params.side),
            self.params.max_participation_bps,
        ));
        let price = quote.opposite_price(self.params.side);
        self.submit_child(quantity, price, ctx);
    }

    /// Submit a child order. Zero quantity is a no-op; the limit price is
    /// never crossed (a buy prices down to the limit, a sell up to it).
    pub fn submit_child(&mut self, quantity: i64, price: i64, ctx: &dyn AlgoContext) {
        if quantity <= 0 || !self.lifecycle.is_running() {
            return;
        }
        let mut price = price;
        if self.params.limit_price > 0 {
            price = match self.params.side {
                Side::Buy => price.min(self.params.limit_price),
                Side::Sell => price.max(self.params.limit_price),
            };
        }
        if price <= 0 {
            return;
        }
        let child = ChildOrder {
            symbol: self.params.symbol,
            side: self.params.side,
            quantity,
            price,
            scale: self.params.scale,
            time_in_force: self.params.time_in_force,
            strategy_id: self.id,
        };
        match ctx.submit_order(child) {
            Ok(order_id) => {
                self.orders_submitted += 1;
                debug!(
                    algo = self.algo_name,
                    id = %self.id,
                    order_id = %order_id,
                    quantity,
                    price,
                    bucket = self.current_bucket,
                    "child order submitted"
                );
            }
            Err(err) => warn!(algo = self.algo_name, id = %self.id, error = %err, "child order rejected"),
        }
    }

    /// Fills are applied in every state and allocated to the bucket in
    /// which they arrived. A parent filled to target completes.
    pub fn on_fill(&mut self, trade: &Trade) {
        if trade.symbol != self.params.symbol {
            return;
        }
        self.filled_quantity += trade.quantity;
        self.fill_notional += trade.price as i128 * trade.quantity as i128;
        self.fills_received += 1;
        if !self.executed_per_bucket.is_empty() {
            let bucket = self.bucket_at(trade.executed_ts_ns);
            self.executed_per_bucket[bucket] += trade.quantity;
        }
        if self.filled_quantity >= self.params.target_quantity && self.lifecycle.is_running() {
            self.complete(trade.executed_ts_ns);
        }
    }

    /// Timer tick: horizon expiry completes the algorithm regardless of
    /// fill ratio; otherwise the bucket cursor advances.
    pub fn on_timer(&mut self, now_ns: u64) {
        if !self.lifecycle.is_running() {
            return;
        }
        if now_ns >= self.params.end_ns {
            self.complete(now_ns);
        } else {
            self.advance_bucket(now_ns);
        }
    }

    pub fn complete(&mut self, now_ns: u64) {
        if self.lifecycle.complete(now_ns).is_ok() {
            info!(
                algo = self.algo_name,
                id = %self.id,
                filled = self.filled_quantity,
                target = self.params.target_quantity,
                slippage_bps = self.slippage_bps(),
                "execution complete"
            );
        }
    }

    pub fn average_fill_price(&self) -> i64 {
        if self.filled_quantity == 0 {
            0
        } else {
            (self.fill_notional / self.filled_quantity as i128) as i64
        }
    }

    /// Deviation of the average fill from the arrival benchmark in basis
    /// points, sign-normalized so positive is adverse for either side.
    pub fn slippage_bps(&self) -> i64 {
        let avg = self.average_fill_price();
        if avg == 0 || self.benchmark_price == 0 {
            return 0;
        }
        let raw = ((avg as i128 - self.benchmark_price as i128) * 10_000)
            / self.benchmark_price as i128;
        match self.params.side {
            Side::Buy => raw as i64,
            Side::Sell => -(raw as i64),
        }
    }

    pub fn stats(&self) -> ExecStats {
        ExecStats {
            target_quantity: self.params.target_quantity,
            filled_quantity: self.filled_quantity,
            orders_submitted: self.orders_submitted,
            benchmark_price: self.benchmark_price,
            average_fill_price: self.average_fill_price(),
            slippage_bps: self.slippage_bps(),
            current_bucket: self.current_bucket,
            bucket_count: self.schedule.len(),
        }
    }

    pub fn state(&self) -> AlgoState {
        self.lifecycle.state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_participation_cap_ceil_and_floor() {
        // 10% of 250 displayed = 25.
        assert_eq!(participation_cap(250, 1_000), 25);
        // ceil(10% of 255) = 26.
        assert_eq!(participation_cap(255, 1_000), 26);
        // Never below one unit.
        assert_eq!(participation_cap(0, 1_000), 1);
        assert_eq!(participation_cap(3, 100), 1);
    }

    #[test]
    fn test_params_validation() {
        let symbol = Symbol::new("AAPL", "NASDAQ").unwrap();
        let good = ExecParams {
            symbol,
            side: Side::Buy,
            target_quantity: 100,
            limit_price: 0,
            scale: PriceScale::CENTS,
            start_ns: 0,
            end_ns: 100,
            max_participation_bps: 1_000,
            time_in_force: TimeInForce::Day,
        };
        assert!(good.validate().is_ok());
        assert!(ExecParams { target_quantity: 0, ..good }.validate().is_err());
        assert!(ExecParams { end_ns: 0, ..good }.validate().is_err());
        assert!(ExecParams { max_participation_bps: 0, ..good }.validate().is_err());
    }
}
