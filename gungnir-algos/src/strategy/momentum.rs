//! Momentum strategy
//!
//! Dual exponential moving averages over the mid price. The normalized
//! divergence `(short - long) / long` is scaled by a 5% full-deflection
//! band and clipped to [-1, 1]; weak divergences below the configured
//! threshold are flattened to zero. Target position is proportional to the
//! signal.

use crate::strategy::{Evaluation, SignalModel, SignalStrategy};
use gungnir_core::core::errors::{CoreError, CoreResult};
use gungnir_core::core::money::PriceScale;
use gungnir_core::core::{StrategyId, Symbol};
use serde::{Deserialize, Serialize};

/// Divergence at which the signal saturates: 5% of the long EMA.
const FULL_DEFLECTION: f64 = 0.05;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MomentumConfig {
    #[serde(default = "default_short_period")]
    pub short_period: u32,
    #[serde(default = "default_long_period")]
    pub long_period: u32,
    /// Minimum divergence (as a fraction of the long EMA) to act on.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_max_position")]
    pub max_position_size: i64,
    #[serde(default = "default_max_order")]
    pub max_order_size: i64,
}

fn default_short_period() -> u32 {
    10
}

fn default_long_period() -> u32 {
    30
}

fn default_threshold() -> f64 {
    0.01
}

fn default_max_position() -> i64 {
    100
}

fn default_max_order() -> i64 {
    50
}

impl Default for MomentumConfig {
    fn default() -> Self {
        Self {
            short_period: default_short_period(),
            long_period: default_long_period(),
            threshold: default_threshold(),
            max_position_size: default_max_position(),
            max_order_size: default_max_order(),
        }
    }
}

impl MomentumConfig {
    pub fn with_periods(mut self, short: u32, long: u32) -> Self {
        self.short_period = short;
        self.long_period = long;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_sizing(mut self, max_position: i64, max_order: i64) -> Self {
        self.max_position_size = max_position;
        self.max_order_size = max_order;
        self
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.short_period == 0 || self.long_period <= self.short_period {
            return Err(CoreError::InvalidInput(format!(
                "momentum periods must satisfy 0 < short < long, got {}/{}",
                self.short_period, self.long_period
            )));
        }
        if self.max_position_size <= 0 || self.max_order_size <= 0 {
            return Err(CoreError::InvalidInput(
                "momentum sizing must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

pub struct Momentum {
    config: MomentumConfig,
    short_ema: f64,
    long_ema: f64,
    short_alpha: f64,
    long_alpha: f64,
    primed: bool,
}

impl Momentum {
    pub fn new(config: MomentumConfig) -> CoreResult<Self> {
        config.validate()?;
        Ok(Self::from_validated(config))
    }

    fn from_validated(config: MomentumConfig) -> Self {
        Self {
            short_alpha: 2.0 / (config.short_period as f64 + 1.0),
            long_alpha: 2.0 / (config.long_period as f64 + 1.0),
            config,
            short_ema: 0.0,
            long_ema: 0.0,
            primed: false,
        }
    }

    /// A ready-to-register strategy trading `symbols` with one model per
    /// symbol.
    pub fn strategy(
        id: StrategyId,
        symbols: Vec<Symbol>,
        scale: PriceScale,
        config: MomentumConfig,
    ) -> CoreResult<SignalStrategy<Momentum>> {
        config.validate()?;
        Ok(SignalStrategy::new(id, "momentum", symbols, scale, |_| {
            Momentum::from_validated(config.clone())
        }))
    }

    fn signal(&self) -> f64 {
        if self.long_ema.abs() < f64::EPSILON {
            return 0.0;
        }
        let divergence = (self.short_ema - self.long_ema) / self.long_ema;
        let signal = (divergence / FULL_DEFLECTION).clamp(-1.0, 1.0);
        if signal.abs() < self.config.threshold / FULL_DEFLECTION {
            0.0
        } else {
            signal
        }
    }
}

impl SignalModel for Momentum {
    fn name(&self) -> &'static str {
        "momentum"
    }

    fn evaluate(&mut self, mid: f64, _current_position: i64) -> Evaluation {
        if !self.primed {
            // First observation seeds both EMAs.
            self.short_ema = mid;
            self.long_ema = mid;
            self.primed = true;
            return Evaluation {
                signal: 0.0,
                target_position: 0,
            };
        }
        self.short_ema += self.short_alpha * (mid - self.short_ema);
        self.long_ema += self.long_alpha * (mid - self.long_ema);

        let signal = self.signal();
        Evaluation {
            signal,
            target_position: (signal * self.config.max_position_size as f64) as i64,
        }
    }

    fn reconfigure(&mut self, config: &serde_json::Value) -> CoreResult<()> {
        let next: MomentumConfig = serde_json::from_value(config.clone())
            .map_err(|err| CoreError::InvalidInput(format!("bad momentum config: {err}")))?;
        next.validate()?;
        self.short_alpha = 2.0 / (next.short_period as f64 + 1.0);
        self.long_alpha = 2.0 / (next.long_period as f64 + 1.0);
        // EMA state carries over; only the smoothing and sizing change.
        self.config = next;
        Ok(())
    }

    fn max_order_size(&self) -> i64 {
        self.config.max_order_size
    }
}
