//! VWAP execution
//!
//! Paces the parent along a historical volume profile: bucket `i` is
//! scheduled `target * v_i / sum(v)`, with the last bucket absorbing the
//! rounding remainder so the schedule sums exactly to the target. Without
//! history the profile degrades to uniform weights.

use crate::algorithm::{AlgoSnapshot, Algorithm};
use crate::context::AlgoContext;
use crate::execution::{ExecParams, SlicedExecution};
use crate::state::AlgoState;
use gungnir_core::core::errors::CoreResult;
use gungnir_core::core::{StrategyId, Symbol};
use gungnir_core::data::{Quote, Trade};
use tracing::debug;

/// Bucket count for the volume profile.
pub const VWAP_BUCKETS: usize = 10;

pub struct Vwap {
    core: SlicedExecution,
}

impl Vwap {
    pub fn new(id: StrategyId, params: ExecParams) -> CoreResult<Self> {
        Ok(Self {
            core: SlicedExecution::new(id, "vwap", params)?,
        })
    }

    /// Scheduled quantities per bucket. The last bucket absorbs the
    /// remainder so the sum is exact.
    fn build_schedule(target: i64, weights: &[i64]) -> Vec<i64> {
        let total: i64 = weights.iter().sum();
        let mut schedule: Vec<i64> = weights
            .iter()
            .map(|w| ((target as i128 * *w as i128) / total as i128) as i64)
            .collect();
        let allocated: i64 = schedule.iter().take(weights.len() - 1).sum();
        let last = schedule.len() - 1;
        schedule[last] = target - allocated;
        schedule
    }

    fn profile(&self, ctx: &dyn AlgoContext) -> Vec<i64> {
        match ctx.historical_volume(&self.core.params.symbol, VWAP_BUCKETS) {
            Some(profile)
                if profile.len() == VWAP_BUCKETS
                    && profile.iter().all(|v| *v >= 0)
                    && profile.iter().sum::<i64>() > 0 =>
            {
                profile
            }
            _ => {
                debug!(
                    id = %self.core.id,
                    symbol = %self.core.params.symbol,
                    "no usable volume profile, falling back to uniform weights"
                );
                vec![1; VWAP_BUCKETS]
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn schedule(&self) -> &[i64] {
        &self.core.schedule
    }
}

impl Algorithm for Vwap {
    fn id(&self) -> StrategyId {
        self.core.id
    }

    fn name(&self) -> &'static str {
        "vwap"
    }

    fn state(&self) -> AlgoState {
        self.core.state()
    }

    fn handles(&self, symbol: &Symbol) -> bool {
        *symbol == self.core.params.symbol
    }

    fn initialize(&mut self, ctx: &dyn AlgoContext) -> CoreResult<()> {
        let weights = self.profile(ctx);
        let schedule = Self::build_schedule(self.core.params.target_quantity, &weights);
        self.core.set_schedule(schedule);
        self.core.capture_benchmark(ctx)
    }

    fn start(&mut self, now_ns: u64) -> CoreResult<()> {
        self.core.lifecycle.start(now_ns)
    }

    fn pause(&mut self, _now_ns: u64) -> CoreResult<()> {
        self.core.lifecycle.pause()
    }

    fn resume(&mut self, _now_ns: u64) -> CoreResult<()> {
        self.core.lifecycle.resume()
    }

    fn cancel(&mut self, now_ns: u64) -> CoreResult<()> {
        self.core.lifecycle.cancel(now_ns)
    }

    fn fail(&mut self, reason: &str, now_ns: u64) -> CoreResult<()> {
        self.core.lifecycle.fail(reason, now_ns)
    }

    fn on_quote(&mut self, quote: &Quote, ctx: &dyn AlgoContext) {
        self.core.on_quote(quote, ctx);
    }

    fn on_fill(&mut self, trade: &Trade) {
        self.core.on_fill(trade);
    }

    fn on_timer(&mut self, now_ns: u64, _ctx: &dyn AlgoContext) {
        self.core.on_timer(now_ns);
    }

    fn snapshot(&self) -> AlgoSnapshot {
        AlgoSnapshot {
            id: self.core.id,
            name: "vwap",
            state: self.core.state(),
            symbols: vec![self.core.params.symbol],
            orders_submitted: self.core.orders_submitted,
            fills_received: self.core.fills_received,
            filled_quantity: self.core.filled_quantity,
            execution: Some(self.core.stats()),
            strategy: None,
        }
    }
}
