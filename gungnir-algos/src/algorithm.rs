//! Algorithm capability set
//!
//! Every execution algorithm and signal strategy exposes the same surface
//! to the dispatcher: lifecycle control, the event callbacks, hot config
//! update and a stats snapshot. Quote and timer callbacks are only acted on
//! while RUNNING; fills always update bookkeeping regardless of state.

use crate::context::AlgoContext;
use crate::execution::ExecStats;
use crate::state::AlgoState;
use crate::strategy::StrategyStats;
use gungnir_core::core::errors::{CoreError, CoreResult};
use gungnir_core::core::{StrategyId, Symbol};
use gungnir_core::data::{Quote, Trade};

pub trait Algorithm: Send {
    fn id(&self) -> StrategyId;

    fn name(&self) -> &'static str;

    fn state(&self) -> AlgoState;

    /// Whether this algorithm trades `symbol`.
    fn handles(&self, symbol: &Symbol) -> bool;

    /// Called exactly once, before `start`. Captures benchmarks and builds
    /// schedules from the context.
    fn initialize(&mut self, ctx: &dyn AlgoContext) -> CoreResult<()>;

    fn start(&mut self, now_ns: u64) -> CoreResult<()>;

    fn pause(&mut self, now_ns: u64) -> CoreResult<()>;

    fn resume(&mut self, now_ns: u64) -> CoreResult<()>;

    /// Advisory cancel: in-flight children are cancelled best-effort by the
    /// dispatcher; the algorithm moves to CANCELLED without waiting for
    /// their terminal confirmations.
    fn cancel(&mut self, now_ns: u64) -> CoreResult<()>;

    /// Fatal error: the algorithm moves to FAILED and records the reason.
    fn fail(&mut self, reason: &str, now_ns: u64) -> CoreResult<()>;

    fn on_quote(&mut self, quote: &Quote, ctx: &dyn AlgoContext);

    fn on_fill(&mut self, trade: &Trade);

    fn on_timer(&mut self, now_ns: u64, ctx: &dyn AlgoContext);

    /// Hot parameter update. Strategies accept their typed config as JSON;
    /// execution algorithms reject this by default.
    fn update_config(&mut self, _config: &serde_json::Value) -> CoreResult<()> {
        Err(CoreError::InvalidInput(
            "algorithm does not support hot config update".to_string(),
        ))
    }

    fn snapshot(&self) -> AlgoSnapshot;
}

/// Point-in-time view of one algorithm, served by the management surface.
#[derive(Debug, Clone)]
pub struct AlgoSnapshot {
    pub id: StrategyId,
    pub name: &'static str,
    pub state: AlgoState,
    pub symbols: Vec<Symbol>,
    pub orders_submitted: u64,
    pub fills_received: u64,
    pub filled_quantity: i64,
    pub execution: Option<ExecStats>,
    pub strategy: Option<StrategyStats>,
}
