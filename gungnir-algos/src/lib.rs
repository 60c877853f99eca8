//! Gungnir Algos - execution algorithms and signal strategies
//!
//! Built on `gungnir-core`: the dispatcher sits at the tail of the event
//! ring and fans quotes, fills and timer ticks out to registered
//! algorithms; algorithms emit child orders back through the shared
//! context, which routes them via the order manager and the ring.
//!
//! ## Module map
//! - `state`: the algorithm lifecycle state machine
//! - `algorithm`: the capability set every algorithm implements
//! - `context`: what an algorithm is allowed to see and do
//! - `execution`: VWAP and TWAP slicing over a shared pipeline
//! - `strategy`: momentum and mean-reversion over a shared pipeline
//! - `dispatcher`: registry, event fan-out, timer, management operations
//! - `engine`: full pipeline assembly in handler dependency order
//! - `testkit`: deterministic context and venue doubles

pub mod algorithm;
pub mod context;
pub mod dispatcher;
pub mod engine;
pub mod execution;
pub mod state;
pub mod strategy;
pub mod testkit;

pub use algorithm::{AlgoSnapshot, Algorithm};
pub use context::{AlgoContext, ChildOrder, EngineContext};
pub use dispatcher::{AlgoDispatcher, DispatchHandler, TimerDriver};
pub use engine::TradingEngine;
pub use execution::{ExecParams, ExecStats, Twap, Vwap};
pub use state::{AlgoState, Lifecycle};
pub use strategy::{
    MeanReversion, MeanReversionConfig, Momentum, MomentumConfig, SignalModel, SignalStrategy,
    StrategyStats,
};
