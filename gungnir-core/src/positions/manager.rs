//! Position manager
//!
//! One position per symbol behind per-symbol locks; application is
//! serialized per symbol while distinct symbols proceed in parallel.
//! Aggregates are normalized to cents because raw P&L at heterogeneous
//! scales must never be summed.

use crate::core::errors::{CoreError, CoreResult};
use crate::core::money::PriceScale;
use crate::core::Symbol;
use crate::data::Trade;
use crate::positions::position::{Position, PositionSnapshot, TradeOutcome};
use crossbeam_utils::CachePadded;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error};

/// Observer of position changes, invoked after trade application and after
/// mark-to-market.
pub trait PositionListener: Send + Sync {
    fn on_position(&self, position: &PositionSnapshot);
}

/// Long and short sides of gross exposure, in cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GrossExposure {
    pub long_cents: i64,
    pub short_cents: i64,
}

pub struct PositionManager {
    positions: DashMap<Symbol, Arc<Mutex<Position>>>,
    listeners: RwLock<Arc<Vec<Arc<dyn PositionListener>>>>,
    scale_mismatches: CachePadded<AtomicU64>,
    duplicate_fills: CachePadded<AtomicU64>,
}

impl PositionManager {
    pub fn new() -> Self {
        Self {
            positions: DashMap::new(),
            listeners: RwLock::new(Arc::new(Vec::new())),
            scale_mismatches: CachePadded::new(AtomicU64::new(0)),
            duplicate_fills: CachePadded::new(AtomicU64::new(0)),
        }
    }

    fn cell(&self, symbol: Symbol, scale: PriceScale) -> Arc<Mutex<Position>> {
        // Clone the Arc out so the shard lock is not held while the
        // position lock is taken.
        self.positions
            .entry(symbol)
            .or_insert_with(|| Arc::new(Mutex::new(Position::new(symbol, scale))))
            .clone()
    }

    /// Apply a fill to its symbol's position, then refresh the mark at the
    /// last known market price.
    pub fn apply(&self, trade: &Trade) -> CoreResult<PositionSnapshot> {
        let cell = self.cell(trade.symbol, trade.scale);
        let snapshot = {
            let mut position = cell.lock();
            match position.apply_trade(trade) {
                Ok(TradeOutcome::Applied) => {}
                Ok(TradeOutcome::Duplicate) => {
                    self.duplicate_fills.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        symbol = %trade.symbol,
                        exchange_trade_id = trade.exchange_trade_id,
                        "duplicate fill ignored by position manager"
                    );
                    return Ok(position.snapshot());
                }
                Err(err) => {
                    if matches!(err, CoreError::ScaleMismatch { .. }) {
                        self.scale_mismatches.fetch_add(1, Ordering::Relaxed);
                        error!(symbol = %trade.symbol, error = %err, "trade rejected");
                    }
                    return Err(err);
                }
            }
            let mark = position.current_price;
            position.mark_to_market(mark);
            position.snapshot()
        };
        self.notify(&snapshot);
        Ok(snapshot)
    }

    /// Mark a symbol's position against a new market price.
    pub fn mark_to_market(&self, symbol: Symbol, price: i64) -> Option<PositionSnapshot> {
        let cell = self.positions.get(&symbol)?.clone();
        let snapshot = {
            let mut position = cell.lock();
            position.mark_to_market(price);
            position.snapshot()
        };
        self.notify(&snapshot);
        Some(snapshot)
    }

    pub fn snapshot(&self, symbol: Symbol) -> Option<PositionSnapshot> {
        let cell = self.positions.get(&symbol)?.clone();
        let snap = cell.lock().snapshot();
        Some(snap)
    }

    pub fn snapshots(&self) -> Vec<PositionSnapshot> {
        let cells: Vec<Arc<Mutex<Position>>> =
            self.positions.iter().map(|e| e.value().clone()).collect();
        cells.iter().map(|c| c.lock().snapshot()).collect()
    }

    /// Seed a position from a journaled snapshot (replay path).
    pub fn restore(&self, snap: &PositionSnapshot) {
        let cell = self.cell(snap.symbol, snap.scale);
        cell.lock().restore(snap);
    }

    pub fn total_realized_pnl_cents(&self) -> i64 {
        self.snapshots().iter().map(|s| s.realized_pnl_cents()).sum()
    }

    pub fn total_unrealized_pnl_cents(&self) -> i64 {
        self.snapshots()
            .iter()
            .map(|s| s.unrealized_pnl_cents())
            .sum()
    }

    pub fn total_pnl_cents(&self) -> i64 {
        self.snapshots()
            .iter()
            .map(|s| s.realized_pnl_cents() + s.unrealized_pnl_cents())
            .sum()
    }

    /// Long market value minus short market value, in cents.
    pub fn net_exposure_cents(&self) -> i64 {
        let gross = self.gross_exposure_cents();
        gross.long_cents - gross.short_cents
    }

    pub fn gross_exposure_cents(&self) -> GrossExposure {
        let mut gross = GrossExposure::default();
        for snap in self.snapshots() {
            if snap.quantity > 0 {
                gross.long_cents += snap.market_value_cents();
            } else if snap.quantity < 0 {
                gross.short_cents += snap.market_value_cents();
            }
        }
        gross
    }

    pub fn scale_mismatches(&self) -> u64 {
        self.scale_mismatches.load(Ordering::Relaxed)
    }

    pub fn duplicate_fills(&self) -> u64 {
        self.duplicate_fills.load(Ordering::Relaxed)
    }

    pub fn register_listener(&self, listener: Arc<dyn PositionListener>) {
        let mut guard = self.listeners.write();
        let mut next = (**guard).clone();
        next.push(listener);
        *guard = Arc::new(next);
    }

    fn notify(&self, snapshot: &PositionSnapshot) {
        let listeners = Arc::clone(&self.listeners.read());
        for listener in listeners.iter() {
            if catch_unwind(AssertUnwindSafe(|| listener.on_position(snapshot))).is_err() {
                error!(symbol = %snapshot.symbol, "position listener panicked");
            }
        }
    }
}

impl Default for PositionManager {
    fn default() -> Self {
        Self::new()
    }
}
