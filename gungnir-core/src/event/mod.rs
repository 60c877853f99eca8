//! Event sequencing
//!
//! The ring is the only permitted synchronization point between the
//! managers: quotes, fills and order commands are linearized here and
//! handed to the handler chain in dependency order.

pub mod ring;
pub mod types;

pub use ring::{EventHandler, EventRing, RingStats};
pub use types::{EventEnvelope, OrderRequest, PublishPolicy, TradingEvent};
