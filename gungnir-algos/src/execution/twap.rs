//! TWAP execution
//!
//! Uniform pacing: the horizon is divided into `max(1, duration /
//! slice_interval)` buckets of `target / n` each, with the division
//! remainder spread one unit at a time across the first buckets. Catch-up
//! and participation behavior are shared with VWAP.

use crate::algorithm::{AlgoSnapshot, Algorithm};
use crate::context::AlgoContext;
use crate::execution::{ExecParams, SlicedExecution};
use crate::state::AlgoState;
use gungnir_core::core::errors::{CoreError, CoreResult};
use gungnir_core::core::{StrategyId, Symbol};
use gungnir_core::data::{Quote, Trade};

pub struct Twap {
    core: SlicedExecution,
}

impl Twap {
    pub fn new(id: StrategyId, params: ExecParams, slice_interval_ns: u64) -> CoreResult<Self> {
        if slice_interval_ns == 0 {
            return Err(CoreError::InvalidInput(
                "slice interval must be positive".to_string(),
            ));
        }
        let mut core = SlicedExecution::new(id, "twap", params)?;
        let duration = params.end_ns - params.start_ns;
        let buckets = ((duration / slice_interval_ns).max(1)) as usize;
        core.set_schedule(Self::build_schedule(params.target_quantity, buckets));
        Ok(Self { core })
    }

    /// `target / n` per bucket, remainder into the first `target % n`
    /// buckets.
    fn build_schedule(target: i64, buckets: usize) -> Vec<i64> {
        let n = buckets as i64;
        let base = target / n;
        let remainder = (target % n) as usize;
        (0..buckets)
            .map(|i| if i < remainder { base + 1 } else { base })
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn schedule(&self) -> &[i64] {
        &self.core.schedule
    }

    #[cfg(test)]
    pub(crate) fn core(&self) -> &SlicedExecution {
        &self.core
    }
}

impl Algorithm for Twap {
    fn id(&self) -> StrategyId {
        self.core.id
    }

    fn name(&self) -> &'static str {
        "twap"
    }

    fn state(&self) -> AlgoState {
        self.core.state()
    }

    fn handles(&self, symbol: &Symbol) -> bool {
        *symbol == self.core.params.symbol
    }

    fn initialize(&mut self, ctx: &dyn AlgoContext) -> CoreResult<()> {
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
            name: "twap",
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
