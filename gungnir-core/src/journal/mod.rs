//! Append-only journal capability
//!
//! Every order transition, fill, position change and strategy definition is
//! journaled as a tagged wire record. On restart, replay rebuilds the
//! in-memory indexes; a strategy tombstone supersedes any other record for
//! that id regardless of ordering.

pub mod replay;
pub mod writer;

pub use replay::{replay_file, replay_reader, ReplayIndex};
pub use writer::FileJournal;

use crate::core::{OrderId, OrderStatus, StrategyId};
use crate::data::Trade;
use crate::orders::OrderSnapshot;
use crate::positions::PositionSnapshot;
use serde::{Deserialize, Serialize};

/// Journal capability consumed by the core. Appends are fire-and-forget;
/// implementations log their own I/O failures rather than stalling the
/// pipeline.
pub trait Journal: Send + Sync {
    fn append(&self, record: JournalRecord);
}

/// No-op journal for tests and ephemeral runs.
pub struct NullJournal;

impl Journal for NullJournal {
    fn append(&self, _record: JournalRecord) {}
}

/// Strategy definition record. `deleted` is a soft-delete tombstone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyRecord {
    pub id: StrategyId,
    pub name: String,
    pub config: serde_json::Value,
    pub deleted: bool,
    pub updated_ts_ns: u64,
}

/// One order status transition, retained for the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub order_id: OrderId,
    pub prev_status: OrderStatus,
    pub new_status: OrderStatus,
    pub ts_ns: u64,
    pub reason: Option<String>,
}

/// Wire record, one JSON line per append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "record", content = "data")]
pub enum JournalRecord {
    Order(OrderSnapshot),
    Trade(Trade),
    Position(PositionSnapshot),
    Strategy(StrategyRecord),
    Audit(AuditRecord),
}

/// A record with its append timestamp, as stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub ts_ns: u64,
    #[serde(flatten)]
    pub record: JournalRecord,
}
