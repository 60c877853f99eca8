//! Journal replay
//!
//! Rebuilds the in-memory indexes from an append-only journal: orders by
//! client id (last write wins), strategies by id honoring soft-delete
//! tombstones, and the latest position per symbol. Replay is idempotent:
//! applying the same journal twice yields the same index, and a tombstone
//! wins over any non-deleted record for its id no matter where it appears
//! in the stream.

use crate::core::errors::CoreResult;
use crate::core::{OrderId, StrategyId, Symbol};
use crate::journal::{JournalEntry, JournalRecord, StrategyRecord};
use crate::orders::OrderSnapshot;
use crate::positions::PositionSnapshot;
use std::collections::{HashMap, HashSet};
use std::io::BufRead;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Default)]
pub struct ReplayIndex {
    pub orders: HashMap<OrderId, OrderSnapshot>,
    pub strategies: HashMap<StrategyId, StrategyRecord>,
    pub positions: HashMap<Symbol, PositionSnapshot>,
    /// Ids whose tombstone has been seen. Permanent for the replay.
    deleted_strategies: HashSet<StrategyId>,
    pub trades_seen: u64,
    pub audits_seen: u64,
    pub corrupt_lines: u64,
}

impl ReplayIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one record into the index.
    pub fn apply(&mut self, record: &JournalRecord) {
        match record {
            JournalRecord::Order(order) => {
                self.orders.insert(order.id, order.clone());
            }
            JournalRecord::Trade(_) => {
                self.trades_seen += 1;
            }
            JournalRecord::Position(position) => {
                self.positions.insert(position.symbol, *position);
            }
            JournalRecord::Strategy(strategy) => {
                if strategy.deleted {
                    self.deleted_strategies.insert(strategy.id);
                    self.strategies.remove(&strategy.id);
                } else if !self.deleted_strategies.contains(&strategy.id) {
                    self.strategies.insert(strategy.id, strategy.clone());
                }
            }
            JournalRecord::Audit(_) => {
                self.audits_seen += 1;
            }
        }
    }

    pub fn is_strategy_deleted(&self, id: StrategyId) -> bool {
        self.deleted_strategies.contains(&id)
    }
}

/// Replay from any line-oriented reader. Corrupt lines are counted and
/// skipped; a torn tail write must not prevent recovery.
pub fn replay_reader<R: BufRead>(reader: R) -> CoreResult<ReplayIndex> {
    let mut index = ReplayIndex::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<JournalEntry>(&line) {
            Ok(entry) => index.apply(&entry.record),
            Err(err) => {
                index.corrupt_lines += 1;
                warn!(line = line_no + 1, %err, "skipping corrupt journal line");
            }
        }
    }
    info!(
        orders = index.orders.len(),
        strategies = index.strategies.len(),
        positions = index.positions.len(),
        corrupt = index.corrupt_lines,
        "journal replay complete"
    );
    Ok(index)
}

pub fn replay_file(path: &Path) -> CoreResult<ReplayIndex> {
    let file = std::fs::File::open(path)?;
    replay_reader(std::io::BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::money::PriceScale;
    use crate::core::{OrderStatus, OrderType, Side, TimeInForce};
    use std::io::Cursor;

    fn order(id: u64, status: OrderStatus) -> OrderSnapshot {
        OrderSnapshot {
            id: OrderId::new(id),
            exchange_order_id: None,
            symbol: Symbol::new("AAPL", "NASDAQ").unwrap(),
            side: Side::Buy,
            order_type: OrderType::Limit,
            time_in_force: TimeInForce::Day,
            status,
            price: 15_000,
            stop_price: 0,
            scale: PriceScale::CENTS,
            quantity: 100,
            filled_quantity: 0,
            remaining_quantity: 100,
            average_fill_price: 0,
            last_fill_price: 0,
            last_fill_quantity: 0,
            created_ts_ns: 1,
            submitted_ts_ns: 0,
            accepted_ts_ns: 0,
            updated_ts_ns: 1,
            strategy_id: None,
            submit_latency_ns: 0,
            ack_latency_ns: 0,
            fill_latency_ns: 0,
            reject_reason: None,
        }
    }

    fn strategy(id: u64, deleted: bool) -> StrategyRecord {
        StrategyRecord {
            id: StrategyId::new(id),
            name: "momentum".to_string(),
            config: serde_json::json!({"short_period": 10}),
            deleted,
            updated_ts_ns: 1,
        }
    }

    fn position(qty: i64) -> PositionSnapshot {
        PositionSnapshot {
            symbol: Symbol::new("AAPL", "NASDAQ").unwrap(),
            quantity: qty,
            average_entry_price: 15_000,
            total_cost: 15_000,
            realized_pnl: 0,
            unrealized_pnl: 0,
            current_price: 0,
            market_value: 0,
            max_position_value: 0,
            max_drawdown: 0,
            scale: PriceScale::CENTS,
            opened_ts_ns: 1,
            last_updated_ts_ns: 1,
            trade_count: 1,
        }
    }

    fn journal_lines(records: &[JournalRecord]) -> String {
        records
            .iter()
            .map(|r| {
                serde_json::to_string(&JournalEntry {
                    ts_ns: 1,
                    record: r.clone(),
                })
                .unwrap()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_last_write_wins_per_order() {
        let lines = journal_lines(&[
            JournalRecord::Order(order(1, OrderStatus::Pending)),
            JournalRecord::Order(order(1, OrderStatus::Submitted)),
            JournalRecord::Order(order(2, OrderStatus::Pending)),
        ]);
        let index = replay_reader(Cursor::new(lines)).unwrap();
        assert_eq!(index.orders.len(), 2);
        assert_eq!(
            index.orders[&OrderId::new(1)].status,
            OrderStatus::Submitted
        );
    }

    #[test]
    fn test_latest_position_per_symbol() {
        let lines = journal_lines(&[
            JournalRecord::Position(position(100)),
            JournalRecord::Position(position(40)),
        ]);
        let index = replay_reader(Cursor::new(lines)).unwrap();
        let sym = Symbol::new("AAPL", "NASDAQ").unwrap();
        assert_eq!(index.positions[&sym].quantity, 40);
    }

    #[test]
    fn test_tombstone_wins_after_write() {
        let lines = journal_lines(&[
            JournalRecord::Strategy(strategy(1, false)),
            JournalRecord::Strategy(strategy(1, true)),
        ]);
        let index = replay_reader(Cursor::new(lines)).unwrap();
        assert!(index.strategies.is_empty());
        assert!(index.is_strategy_deleted(StrategyId::new(1)));
    }

    #[test]
    fn test_tombstone_wins_before_write() {
        // Tombstone first, write second: the write must not resurrect it.
        let lines = journal_lines(&[
            JournalRecord::Strategy(strategy(1, true)),
            JournalRecord::Strategy(strategy(1, false)),
        ]);
        let index = replay_reader(Cursor::new(lines)).unwrap();
        assert!(index.strategies.is_empty());
    }

    #[test]
    fn test_replay_is_idempotent() {
        let records = [
            JournalRecord::Order(order(1, OrderStatus::Submitted)),
            JournalRecord::Strategy(strategy(1, false)),
            JournalRecord::Strategy(strategy(2, true)),
            JournalRecord::Position(position(25)),
        ];
        let once = journal_lines(&records);
        let twice = format!("{once}\n{once}");

        let a = replay_reader(Cursor::new(once)).unwrap();
        let b = replay_reader(Cursor::new(twice)).unwrap();
        assert_eq!(a.orders, b.orders);
        assert_eq!(a.strategies, b.strategies);
        assert_eq!(a.positions, b.positions);
    }

    #[test]
    fn test_corrupt_lines_are_skipped() {
        let good = journal_lines(&[JournalRecord::Order(order(1, OrderStatus::Pending))]);
        let input = format!("{good}\n{{\"record\":\"Order\",\"data\":{{garbage");
        let index = replay_reader(Cursor::new(input)).unwrap();
        assert_eq!(index.orders.len(), 1);
        assert_eq!(index.corrupt_lines, 1);
    }
}
