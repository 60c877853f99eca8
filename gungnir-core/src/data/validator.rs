//! Producer-side quote validation
//!
//! Sits between venue adapters and the event ring. Venues transiently emit
//! crossed books, zero prices and replayed sequence numbers; none of those
//! may reach the handlers.

use crate::data::types::Quote;
use crate::core::Symbol;
use crossbeam_utils::CachePadded;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Why a quote was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum QuoteReject {
    /// `ask < bid`.
    CrossedBook = 0,
    /// Bid or ask price not strictly positive.
    NonPositivePrice = 1,
    /// Bid or ask size negative.
    NegativeSize = 2,
    /// Sequence number did not advance for the symbol.
    StaleSequence = 3,
}

impl QuoteReject {
    pub const fn as_str(&self) -> &'static str {
        match self {
            QuoteReject::CrossedBook => "crossed book",
            QuoteReject::NonPositivePrice => "non-positive price",
            QuoteReject::NegativeSize => "negative size",
            QuoteReject::StaleSequence => "stale sequence",
        }
    }
}

/// Counts for each rejection cause plus accepted quotes.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuoteValidatorStats {
    pub accepted: u64,
    pub crossed: u64,
    pub non_positive_price: u64,
    pub negative_size: u64,
    pub stale_sequence: u64,
}

/// Stateful quote filter. Tracks the last accepted sequence per symbol.
pub struct QuoteValidator {
    last_sequence: DashMap<Symbol, u64>,
    accepted: CachePadded<AtomicU64>,
    rejects: [CachePadded<AtomicU64>; 4],
}

impl QuoteValidator {
    pub fn new() -> Self {
        Self {
            last_sequence: DashMap::new(),
            accepted: CachePadded::new(AtomicU64::new(0)),
            rejects: std::array::from_fn(|_| CachePadded::new(AtomicU64::new(0))),
        }
    }

    /// Validate a quote, updating per-symbol sequence state on acceptance.
    pub fn validate(&self, quote: &Quote) -> Result<(), QuoteReject> {
        if let Err(cause) = self.check(quote) {
            self.rejects[cause as usize].fetch_add(1, Ordering::Relaxed);
            debug!(
                symbol = %quote.symbol,
                sequence = quote.sequence,
                cause = cause.as_str(),
                "quote dropped"
            );
            return Err(cause);
        }
        self.last_sequence.insert(quote.symbol, quote.sequence);
        self.accepted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn check(&self, quote: &Quote) -> Result<(), QuoteReject> {
        if quote.bid_price <= 0 || quote.ask_price <= 0 {
            return Err(QuoteReject::NonPositivePrice);
        }
        if quote.bid_size < 0 || quote.ask_size < 0 {
            return Err(QuoteReject::NegativeSize);
        }
        if quote.is_crossed() {
            return Err(QuoteReject::CrossedBook);
        }
        if let Some(last) = self.last_sequence.get(&quote.symbol) {
            if quote.sequence <= *last {
                return Err(QuoteReject::StaleSequence);
            }
        }
        Ok(())
    }

    pub fn stats(&self) -> QuoteValidatorStats {
        QuoteValidatorStats {
            accepted: self.accepted.load(Ordering::Relaxed),
            crossed: self.rejects[QuoteReject::CrossedBook as usize].load(Ordering::Relaxed),
            non_positive_price: self.rejects[QuoteReject::NonPositivePrice as usize]
                .load(Ordering::Relaxed),
            negative_size: self.rejects[QuoteReject::NegativeSize as usize].load(Ordering::Relaxed),
            stale_sequence: self.rejects[QuoteReject::StaleSequence as usize]
                .load(Ordering::Relaxed),
        }
    }
}

impl Default for QuoteValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::money::PriceScale;

    fn quote(sequence: u64, bid: i64, ask: i64) -> Quote {
        Quote {
            symbol: Symbol::new("BTCUSDT", "BINANCE").unwrap(),
            bid_price: bid,
            ask_price: ask,
            bid_size: 10,
            ask_size: 10,
            exchange_ts_ns: sequence * 1_000,
            received_ts_ns: sequence * 1_000 + 50,
            sequence,
            scale: PriceScale::CRYPTO_8,
        }
    }

    #[test]
    fn test_accepts_well_formed_quotes() {
        let v = QuoteValidator::new();
        assert!(v.validate(&quote(1, 100, 101)).is_ok());
        assert!(v.validate(&quote(2, 100, 100)).is_ok()); // locked book is fine
        assert_eq!(v.stats().accepted, 2);
    }

    #[test]
    fn test_rejects_crossed_book() {
        let v = QuoteValidator::new();
        assert_eq!(v.validate(&quote(1, 102, 101)), Err(QuoteReject::CrossedBook));
        assert_eq!(v.stats().crossed, 1);
    }

    #[test]
    fn test_rejects_non_positive_price() {
        let v = QuoteValidator::new();
        assert_eq!(
            v.validate(&quote(1, 0, 101)),
            Err(QuoteReject::NonPositivePrice)
        );
    }

    #[test]
    fn test_rejects_sequence_regression() {
        let v = QuoteValidator::new();
        assert!(v.validate(&quote(5, 100, 101)).is_ok());
        assert_eq!(v.validate(&quote(5, 100, 101)), Err(QuoteReject::StaleSequence));
        assert_eq!(v.validate(&quote(4, 100, 101)), Err(QuoteReject::StaleSequence));
        assert!(v.validate(&quote(6, 100, 101)).is_ok());
    }

    #[test]
    fn test_sequence_tracked_per_symbol() {
        let v = QuoteValidator::new();
        let mut other = quote(1, 100, 101);
        other.symbol = Symbol::new("ETHUSDT", "BINANCE").unwrap();
        assert!(v.validate(&quote(3, 100, 101)).is_ok());
        assert!(v.validate(&other).is_ok()); // lower sequence, different symbol
    }
}
