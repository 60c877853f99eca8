//! Per-symbol position accounting
//!
//! A position is a plain mutable record serialized per symbol by its
//! manager. All P&L stays in the position's native price scale; only the
//! aggregate views normalize to cents.
//!
//! Invariants, held after every successful mutation:
//! - `quantity == 0` implies `average_entry_price == 0` and `total_cost == 0`
//! - `market_value == |quantity| * current_price / scale`
//! - `unrealized_pnl == (current_price - average_entry_price) * quantity`

use crate::core::errors::{CoreError, CoreResult};
use crate::core::money::{self, PriceScale};
use crate::core::Symbol;
use crate::data::Trade;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Result of applying a trade to a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeOutcome {
    Applied,
    /// Same `exchange_trade_id` seen before; nothing changed.
    Duplicate,
}

#[derive(Debug, Clone)]
pub struct Position {
    pub symbol: Symbol,
    /// Signed: positive long, negative short.
    pub quantity: i64,
    pub average_entry_price: i64,
    /// Cost of the open quantity at entry, whole quote-currency units.
    pub total_cost: i64,
    /// Realized P&L at `scale`, net of commissions.
    pub realized_pnl: i64,
    /// Unrealized P&L at `scale`, refreshed by `mark_to_market`.
    pub unrealized_pnl: i64,
    pub current_price: i64,
    /// `|quantity| * current_price / scale`, whole quote-currency units.
    pub market_value: i64,
    pub max_position_value: i64,
    /// Largest observed peak-to-current decline of total P&L, at `scale`.
    pub max_drawdown: i64,
    pub scale: PriceScale,
    pub opened_ts_ns: u64,
    pub last_updated_ts_ns: u64,
    pub trade_count: u64,
    peak_total_pnl: i64,
    seen_trades: HashSet<u64>,
}

impl Position {
    pub fn new(symbol: Symbol, scale: PriceScale) -> Self {
        Self {
            symbol,
            quantity: 0,
            average_entry_price: 0,
            total_cost: 0,
            realized_pnl: 0,
            unrealized_pnl: 0,
            current_price: 0,
            market_value: 0,
            max_position_value: 0,
            max_drawdown: 0,
            scale,
            opened_ts_ns: 0,
            last_updated_ts_ns: 0,
            trade_count: 0,
            peak_total_pnl: 0,
            seen_trades: HashSet::new(),
        }
    }

    #[inline(always)]
    pub fn is_flat(&self) -> bool {
        self.quantity == 0
    }

    #[inline(always)]
    pub fn total_pnl(&self) -> i64 {
        self.realized_pnl + self.unrealized_pnl
    }

    /// Apply a fill.
    ///
    /// A scale change is only permitted while flat; on a non-flat position a
    /// conflicting scale rejects the trade with `ScaleMismatch` and leaves
    /// the record untouched. Re-delivery of a known `exchange_trade_id` is
    /// a no-op.
    pub fn apply_trade(&mut self, trade: &Trade) -> CoreResult<TradeOutcome> {
        if self.seen_trades.contains(&trade.exchange_trade_id) {
            return Ok(TradeOutcome::Duplicate);
        }
        if trade.quantity <= 0 || trade.price <= 0 {
            return Err(CoreError::InvalidInput(format!(
                "trade must have positive price and quantity, got price {} qty {}",
                trade.price, trade.quantity
            )));
        }
        if self.is_flat() {
            self.scale = trade.scale;
        } else if trade.scale != self.scale {
            return Err(CoreError::ScaleMismatch {
                symbol: self.symbol.to_string(),
                position_scale: self.scale.divisor(),
                trade_scale: trade.scale.divisor(),
            });
        }

        let tq = trade.signed_quantity();
        let tp = trade.price;

        if self.quantity == 0 {
            // Opening from flat.
            self.quantity = tq;
            self.average_entry_price = tp;
            self.total_cost = money::notional(tp, tq.abs(), self.scale);
            self.opened_ts_ns = trade.executed_ts_ns;
        } else if self.quantity.signum() == tq.signum() {
            // Adding in the same direction: quantity-weighted entry.
            let q_abs = self.quantity.abs();
            let entry_notional = self.average_entry_price as i128 * q_abs as i128
                + tp as i128 * tq.abs() as i128;
            self.average_entry_price = (entry_notional / (q_abs + tq.abs()) as i128) as i64;
            self.total_cost += money::notional(tp, tq.abs(), self.scale);
            self.quantity += tq;
        } else {
            // Reducing, closing or reversing.
            let closing = self.quantity.abs().min(tq.abs());
            let pnl = (tp as i128 - self.average_entry_price as i128)
                * closing as i128
                * self.quantity.signum() as i128;
            self.realized_pnl = self
                .realized_pnl
                .checked_add(i64::try_from(pnl).map_err(|_| CoreError::Overflow {
                    context: "realized pnl",
                })?)
                .ok_or(CoreError::Overflow {
                    context: "realized pnl",
                })?;

            self.quantity += tq;
            if self.quantity == 0 {
                self.average_entry_price = 0;
                self.total_cost = 0;
            } else if self.quantity.signum() == tq.signum() {
                // Reversal: the surplus opens a fresh position at the trade price.
                self.average_entry_price = tp;
                self.total_cost = money::notional(tp, self.quantity.abs(), self.scale);
                self.opened_ts_ns = trade.executed_ts_ns;
            } else {
                // Plain reduction keeps the entry; cost follows the open quantity.
                self.total_cost =
                    money::notional(self.average_entry_price, self.quantity.abs(), self.scale);
            }
        }

        if trade.commission_cents != 0 {
            // Commission arrives in cents; realized P&L lives at the
            // position's scale.
            let commission_scaled =
                money::mul_div(trade.commission_cents, self.scale.divisor(), money::CENTS_PER_UNIT);
            self.realized_pnl -= commission_scaled;
        }

        self.seen_trades.insert(trade.exchange_trade_id);
        self.trade_count += 1;
        self.last_updated_ts_ns = trade.executed_ts_ns;
        debug_assert!(!self.is_flat() || (self.average_entry_price == 0 && self.total_cost == 0));
        Ok(TradeOutcome::Applied)
    }

    /// Refresh market value and unrealized P&L against `price`. A
    /// non-positive price (price not yet known) is ignored.
    pub fn mark_to_market(&mut self, price: i64) {
        if price <= 0 {
            return;
        }
        self.current_price = price;
        if self.quantity == 0 {
            self.market_value = 0;
            self.unrealized_pnl = 0;
        } else {
            self.market_value = money::notional(price, self.quantity.abs(), self.scale);
            self.unrealized_pnl = ((price as i128 - self.average_entry_price as i128)
                * self.quantity as i128) as i64;
        }
        if self.market_value > self.max_position_value {
            self.max_position_value = self.market_value;
        }

        let total = self.total_pnl();
        if total > self.peak_total_pnl {
            self.peak_total_pnl = total;
        }
        let drawdown = self.peak_total_pnl - total;
        if drawdown > self.max_drawdown {
            self.max_drawdown = drawdown;
        }
    }

    pub fn snapshot(&self) -> PositionSnapshot {
        PositionSnapshot {
            symbol: self.symbol,
            quantity: self.quantity,
            average_entry_price: self.average_entry_price,
            total_cost: self.total_cost,
            realized_pnl: self.realized_pnl,
            unrealized_pnl: self.unrealized_pnl,
            current_price: self.current_price,
            market_value: self.market_value,
            max_position_value: self.max_position_value,
            max_drawdown: self.max_drawdown,
            scale: self.scale,
            opened_ts_ns: self.opened_ts_ns,
            last_updated_ts_ns: self.last_updated_ts_ns,
            trade_count: self.trade_count,
        }
    }

    /// Seed state from a journaled snapshot. Replay only; wipes local
    /// bookkeeping.
    pub fn restore(&mut self, snap: &PositionSnapshot) {
        self.quantity = snap.quantity;
        self.average_entry_price = snap.average_entry_price;
        self.total_cost = snap.total_cost;
        self.realized_pnl = snap.realized_pnl;
        self.unrealized_pnl = snap.unrealized_pnl;
        self.current_price = snap.current_price;
        self.market_value = snap.market_value;
        self.max_position_value = snap.max_position_value;
        self.max_drawdown = snap.max_drawdown;
        self.scale = snap.scale;
        self.opened_ts_ns = snap.opened_ts_ns;
        self.last_updated_ts_ns = snap.last_updated_ts_ns;
        self.trade_count = snap.trade_count;
        self.peak_total_pnl = snap.realized_pnl + snap.unrealized_pnl;
        self.seen_trades.clear();
    }
}

/// Immutable copy journaled after every application and handed to
/// listeners and external observers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub symbol: Symbol,
    pub quantity: i64,
    pub average_entry_price: i64,
    pub total_cost: i64,
    pub realized_pnl: i64,
    pub unrealized_pnl: i64,
    pub current_price: i64,
    pub market_value: i64,
    pub max_position_value: i64,
    pub max_drawdown: i64,
    pub scale: PriceScale,
    pub opened_ts_ns: u64,
    pub last_updated_ts_ns: u64,
    pub trade_count: u64,
}

impl PositionSnapshot {
    #[inline(always)]
    pub fn total_pnl(&self) -> i64 {
        self.realized_pnl + self.unrealized_pnl
    }

    pub fn realized_pnl_cents(&self) -> i64 {
        money::to_cents(self.realized_pnl, self.scale)
    }

    pub fn unrealized_pnl_cents(&self) -> i64 {
        money::to_cents(self.unrealized_pnl, self.scale)
    }

    pub fn market_value_cents(&self) -> i64 {
        // Market value is in whole quote-currency units.
        self.market_value * money::CENTS_PER_UNIT
    }
}
