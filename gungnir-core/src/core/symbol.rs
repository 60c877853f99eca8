//! Instrument identity
//!
//! A `Symbol` is an immutable `(ticker, venue)` pair stored inline so it can
//! live in pre-allocated event slots without heap traffic. Tickers and venue
//! names are canonicalized to uppercase ASCII at construction; equality and
//! hashing cover both fields.

use crate::core::errors::{CoreError, CoreResult};
use crate::core::money::PriceScale;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

const MAX_TICKER_LEN: usize = 12;
const MAX_VENUE_LEN: usize = 12;

/// Venues treated as crypto for asset-class derivation. Everything else is
/// assumed to be an equity venue.
const CRYPTO_VENUES: &[&str] = &["BINANCE", "COINBASE", "KRAKEN", "BYBIT", "OKX", "DERIBIT"];

/// Asset class derived from the venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetClass {
    Equity,
    Crypto,
}

impl AssetClass {
    /// Conventional price scale for the class: cents for equities,
    /// 8 decimals for crypto.
    pub const fn default_scale(&self) -> PriceScale {
        match self {
            AssetClass::Equity => PriceScale::CENTS,
            AssetClass::Crypto => PriceScale::CRYPTO_8,
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetClass::Equity => write!(f, "EQUITY"),
            AssetClass::Crypto => write!(f, "CRYPTO"),
        }
    }
}

/// Immutable instrument identity, inline and copyable.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symbol {
    ticker: [u8; MAX_TICKER_LEN],
    venue: [u8; MAX_VENUE_LEN],
    ticker_len: u8,
    venue_len: u8,
}

impl Symbol {
    /// Build a symbol, uppercasing both fields.
    ///
    /// Fails on empty fields, non-ASCII input, or names longer than the
    /// inline capacity (12 bytes each).
    pub fn new(ticker: &str, venue: &str) -> CoreResult<Self> {
        let ticker_bytes = Self::canonicalize("ticker", ticker, MAX_TICKER_LEN)?;
        let venue_bytes = Self::canonicalize("venue", venue, MAX_VENUE_LEN)?;

        let mut sym = Symbol {
            ticker: [0; MAX_TICKER_LEN],
            venue: [0; MAX_VENUE_LEN],
            ticker_len: ticker.len() as u8,
            venue_len: venue.len() as u8,
        };
        sym.ticker[..ticker.len()].copy_from_slice(&ticker_bytes);
        sym.venue[..venue.len()].copy_from_slice(&venue_bytes);
        Ok(sym)
    }

    fn canonicalize(field: &str, value: &str, max: usize) -> CoreResult<Vec<u8>> {
        if value.is_empty() {
            return Err(CoreError::InvalidInput(format!("{field} must not be empty")));
        }
        if value.len() > max {
            return Err(CoreError::InvalidInput(format!(
                "{field} '{value}' exceeds {max} bytes"
            )));
        }
        if !value.is_ascii() {
            return Err(CoreError::InvalidInput(format!(
                "{field} '{value}' must be ASCII"
            )));
        }
        Ok(value.bytes().map(|b| b.to_ascii_uppercase()).collect())
    }

    #[inline(always)]
    pub fn ticker(&self) -> &str {
        // Bytes are validated ASCII at construction.
        unsafe { std::str::from_utf8_unchecked(&self.ticker[..self.ticker_len as usize]) }
    }

    #[inline(always)]
    pub fn venue(&self) -> &str {
        unsafe { std::str::from_utf8_unchecked(&self.venue[..self.venue_len as usize]) }
    }

    /// Asset class derived from the venue name.
    pub fn asset_class(&self) -> AssetClass {
        if CRYPTO_VENUES.contains(&self.venue()) {
            AssetClass::Crypto
        } else {
            AssetClass::Equity
        }
    }

    /// Conventional price scale for this symbol's asset class.
    pub fn default_scale(&self) -> PriceScale {
        self.asset_class().default_scale()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.ticker(), self.venue())
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({}@{})", self.ticker(), self.venue())
    }
}

impl FromStr for Symbol {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        let (ticker, venue) = s.split_once('@').ok_or_else(|| {
            CoreError::InvalidInput(format!("symbol '{s}' must be TICKER@VENUE"))
        })?;
        Symbol::new(ticker, venue)
    }
}

impl Serialize for Symbol {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Symbol {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Symbol::from_str(&s).map_err(D::Error::custom)
    }
}
