//! Signal strategy pipeline
//!
//! A strategy caches the latest quote per symbol, asks its model for a
//! signal in [-1, 1] and a target position, then reconciles the live
//! position toward the target: order size is `target - current` capped at
//! the configured max order size, priced at the opposite-side best. P&L is
//! accounted locally with the same rules as the position manager so
//! per-strategy stats survive independent of the global book.

pub mod mean_reversion;
pub mod momentum;

pub use mean_reversion::{MeanReversion, MeanReversionConfig};
pub use momentum::{Momentum, MomentumConfig};

use crate::algorithm::{AlgoSnapshot, Algorithm};
use crate::context::{AlgoContext, ChildOrder};
use crate::state::{AlgoState, Lifecycle};
use gungnir_core::core::errors::CoreResult;
use gungnir_core::core::money::PriceScale;
use gungnir_core::core::{Side, StrategyId, Symbol, TimeInForce};
use gungnir_core::data::{Quote, Trade};
use gungnir_core::positions::Position;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Model output for one quote.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    /// Signal strength in [-1, 1].
    pub signal: f64,
    /// Desired signed position.
    pub target_position: i64,
}

impl Evaluation {
    pub const fn hold(current_position: i64) -> Self {
        Self {
            signal: 0.0,
            target_position: current_position,
        }
    }
}

/// Signal computation seam. One model instance per traded symbol.
pub trait SignalModel: Send {
    fn name(&self) -> &'static str;

    /// Evaluate the latest mid price against the current position.
    fn evaluate(&mut self, mid: f64, current_position: i64) -> Evaluation;

    /// Hot parameter update from the typed config serialized as JSON.
    fn reconfigure(&mut self, config: &serde_json::Value) -> CoreResult<()>;

    /// Cap for a single reconciliation order, native units.
    fn max_order_size(&self) -> i64;
}

/// Per-symbol signal state reported through the management surface.
#[derive(Debug, Clone)]
pub struct SymbolSignal {
    pub symbol: Symbol,
    pub signal: f64,
    pub target_position: i64,
    pub current_position: i64,
}

#[derive(Debug, Clone)]
pub struct StrategyStats {
    pub realized_pnl_cents: i64,
    pub unrealized_pnl_cents: i64,
    pub signals: Vec<SymbolSignal>,
}

/// Shared strategy pipeline, generic over the signal model.
pub struct SignalStrategy<M: SignalModel> {
    id: StrategyId,
    name: &'static str,
    symbols: Vec<Symbol>,
    lifecycle: Lifecycle,
    models: HashMap<Symbol, M>,
    books: HashMap<Symbol, Position>,
    quotes: HashMap<Symbol, Quote>,
    last_eval: HashMap<Symbol, Evaluation>,
    scale: PriceScale,
    orders_submitted: u64,
    fills_received: u64,
    filled_quantity: i64,
}

impl<M: SignalModel> SignalStrategy<M> {
    pub fn new(
        id: StrategyId,
        name: &'static str,
        symbols: Vec<Symbol>,
        scale: PriceScale,
        mut model_for: impl FnMut(&Symbol) -> M,
    ) -> Self {
        let models = symbols.iter().map(|s| (*s, model_for(s))).collect();
        let books = symbols
            .iter()
            .map(|s| (*s, Position::new(*s, scale)))
            .collect();
        Self {
            id,
            name,
            symbols,
            lifecycle: Lifecycle::new(0),
            models,
            books,
            quotes: HashMap::new(),
            last_eval: HashMap::new(),
            scale,
            orders_submitted: 0,
            fills_received: 0,
            filled_quantity: 0,
        }
    }

    fn current_position(&self, symbol: &Symbol) -> i64 {
        self.books.get(symbol).map(|b| b.quantity).unwrap_or(0)
    }

    /// Issue the order that moves the live position toward the target.
    fn reconcile(&mut self, symbol: Symbol, eval: Evaluation, quote: &Quote, ctx: &dyn AlgoContext) {
        let current = self.current_position(&symbol);
        let delta = eval.target_position - current;
        if delta == 0 {
            return;
        }
        let max_order = self
            .models
            .get(&symbol)
            .map(|m| m.max_order_size())
            .unwrap_or(0);
        let quantity = delta.abs().min(max_order);
        if quantity <= 0 {
            return;
        }
        let side = if delta > 0 { Side::Buy } else { Side::Sell };
        let price = quote.opposite_price(side);
        if price <= 0 {
            return;
        }
        let child = ChildOrder {
            symbol,
            side,
            quantity,
            price,
            scale: quote.scale,
            time_in_force: TimeInForce::Day,
            strategy_id: self.id,
        };
        match ctx.submit_order(child) {
            Ok(order_id) => {
                self.orders_submitted += 1;
                debug!(
                    strategy = self.name,
                    id = %self.id,
                    order_id = %order_id,
                    %symbol,
                    %side,
                    quantity,
                    target = eval.target_position,
                    current,
                    "reconciliation order submitted"
                );
            }
            Err(err) => {
                warn!(strategy = self.name, id = %self.id, error = %err, "reconciliation order rejected")
            }
        }
    }

    fn stats(&self) -> StrategyStats {
        let mut realized = 0;
        let mut unrealized = 0;
        for book in self.books.values() {
            let snap = book.snapshot();
            realized += snap.realized_pnl_cents();
            unrealized += snap.unrealized_pnl_cents();
        }
        let signals = self
            .symbols
            .iter()
            .map(|symbol| SymbolSignal {
                symbol: *symbol,
                signal: self.last_eval.get(symbol).map(|e| e.signal).unwrap_or(0.0),
                target_position: self
                    .last_eval
                    .get(symbol)
                    .map(|e| e.target_position)
                    .unwrap_or(0),
                current_position: self.current_position(symbol),
            })
            .collect();
        StrategyStats {
            realized_pnl_cents: realized,
            unrealized_pnl_cents: unrealized,
            signals,
        }
    }

    #[cfg(test)]
    pub(crate) fn last_evaluation(&self, symbol: &Symbol) -> Option<Evaluation> {
        self.last_eval.get(symbol).copied()
    }

    #[cfg(test)]
    pub(crate) fn book(&self, symbol: &Symbol) -> Option<&Position> {
        self.books.get(symbol)
    }
}

impl<M: SignalModel> Algorithm for SignalStrategy<M> {
    fn id(&self) -> StrategyId {
        self.id
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn state(&self) -> AlgoState {
        self.lifecycle.state()
    }

    fn handles(&self, symbol: &Symbol) -> bool {
        self.models.contains_key(symbol)
    }

    fn initialize(&mut self, _ctx: &dyn AlgoContext) -> CoreResult<()> {
        Ok(())
    }

    fn start(&mut self, now_ns: u64) -> CoreResult<()> {
        self.lifecycle.start(now_ns)
    }

    fn pause(&mut self, _now_ns: u64) -> CoreResult<()> {
        self.lifecycle.pause()
    }

    fn resume(&mut self, _now_ns: u64) -> CoreResult<()> {
        self.lifecycle.resume()
    }

    fn cancel(&mut self, now_ns: u64) -> CoreResult<()> {
        self.lifecycle.cancel(now_ns)
    }

    fn fail(&mut self, reason: &str, now_ns: u64) -> CoreResult<()> {
        self.lifecycle.fail(reason, now_ns)
    }

    fn on_quote(&mut self, quote: &Quote, ctx: &dyn AlgoContext) {
        if !self.lifecycle.is_running() {
            return;
        }
        let symbol = quote.symbol;
        if !self.models.contains_key(&symbol) {
            return;
        }
        self.quotes.insert(symbol, *quote);

        let mid = quote.mid() as f64 / quote.scale.divisor() as f64;
        let current = self.current_position(&symbol);
        let eval = match self.models.get_mut(&symbol) {
            Some(model) => model.evaluate(mid, current),
            None => return,
        };
        self.last_eval.insert(symbol, eval);
        self.reconcile(symbol, eval, quote, ctx);
    }

    fn on_fill(&mut self, trade: &Trade) {
        // Fills update the local book in every state.
        self.fills_received += 1;
        self.filled_quantity += trade.quantity;
        let book = self
            .books
            .entry(trade.symbol)
            .or_insert_with(|| Position::new(trade.symbol, self.scale));
        if let Err(err) = book.apply_trade(trade) {
            warn!(strategy = self.name, id = %self.id, error = %err, "strategy book rejected fill");
            return;
        }
        if let Some(quote) = self.quotes.get(&trade.symbol) {
            book.mark_to_market(quote.mid());
        }
    }

    fn on_timer(&mut self, _now_ns: u64, _ctx: &dyn AlgoContext) {
        // Signal strategies are quote-driven; timers only matter for the
        // mark refresh.
        if !self.lifecycle.is_running() {
            return;
        }
        for (symbol, book) in self.books.iter_mut() {
            if let Some(quote) = self.quotes.get(symbol) {
                book.mark_to_market(quote.mid());
            }
        }
    }

    fn update_config(&mut self, config: &serde_json::Value) -> CoreResult<()> {
        for model in self.models.values_mut() {
            model.reconfigure(config)?;
        }
        Ok(())
    }

    fn snapshot(&self) -> AlgoSnapshot {
        AlgoSnapshot {
            id: self.id,
            name: self.name,
            state: self.lifecycle.state(),
            symbols: self.symbols.clone(),
            orders_submitted: self.orders_submitted,
            fills_received: self.fills_received,
            filled_quantity: self.filled_quantity,
            execution: None,
            strategy: Some(self.stats()),
        }
    }
}
