//! Mean-reversion strategy
//!
//! Rolling z-score of the mid against a fixed lookback window. Entries
//! fade the move once `|z|` clears the entry threshold, exits flatten when
//! `|z|` falls inside the exit band, and a move further against an open
//! position doubles it, bounded at twice the configured size. The signal
//! is quiet until the window is full or when the window is degenerate
//! (sigma below 1e-4).

use crate::strategy::{Evaluation, SignalModel, SignalStrategy};
use gungnir_core::core::errors::{CoreError, CoreResult};
use gungnir_core::core::money::PriceScale;
use gungnir_core::core::{StrategyId, Symbol};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

const SIGMA_FLOOR: f64 = 1e-4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeanReversionConfig {
    #[serde(default = "default_lookback")]
    pub lookback: usize,
    /// |z| at which a position is entered.
    #[serde(default = "default_entry_z")]
    pub entry_z: f64,
    /// |z| under which an open position is closed.
    #[serde(default = "default_exit_z")]
    pub exit_z: f64,
    #[serde(default = "default_max_position")]
    pub max_position_size: i64,
    #[serde(default = "default_max_order")]
    pub max_order_size: i64,
}

fn default_lookback() -> usize {
    20
}

fn default_entry_z() -> f64 {
    2.0
}

fn default_exit_z() -> f64 {
    0.5
}

fn default_max_position() -> i64 {
    100
}

fn default_max_order() -> i64 {
    50
}

impl Default for MeanReversionConfig {
    fn default() -> Self {
        Self {
            lookback: default_lookback(),
            entry_z: default_entry_z(),
            exit_z: default_exit_z(),
            max_position_size: default_max_position(),
            max_order_size: default_max_order(),
        }
    }
}

impl MeanReversionConfig {
    pub fn with_lookback(mut self, lookback: usize) -> Self {
        self.lookback = lookback;
        self
    }

    pub fn with_bands(mut self, entry_z: f64, exit_z: f64) -> Self {
        self.entry_z = entry_z;
        self.exit_z = exit_z;
        self
    }

    pub fn with_sizing(mut self, max_position: i64, max_order: i64) -> Self {
        self.max_position_size = max_position;
        self.max_order_size = max_order;
        self
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.lookback < 2 {
            return Err(CoreError::InvalidInput(format!(
                "lookback must be at least 2, got {}",
                self.lookback
            )));
        }
        if self.entry_z <= 0.0 || self.exit_z < 0.0 || self.exit_z >= self.entry_z {
            return Err(CoreError::InvalidInput(format!(
                "bands must satisfy 0 <= exit_z < entry_z, got {}/{}",
                self.exit_z, self.entry_z
            )));
        }
        if self.max_position_size <= 0 || self.max_order_size <= 0 {
            return Err(CoreError::InvalidInput(
                "mean-reversion sizing must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

pub struct MeanReversion {
    config: MeanReversionConfig,
    window: VecDeque<f64>,
    /// |z| at the last entry or add, for the double-down trigger.
    entry_abs_z: Option<f64>,
}

impl MeanReversion {
    pub fn new(config: MeanReversionConfig) -> CoreResult<Self> {
        config.validate()?;
        Ok(Self::from_validated(config))
    }

    fn from_validated(config: MeanReversionConfig) -> Self {
        Self {
            window: VecDeque::with_capacity(config.lookback),
            config,
            entry_abs_z: None,
        }
    }

    /// A ready-to-register strategy trading `symbols` with one model per
    /// symbol.
    pub fn strategy(
        id: StrategyId,
        symbols: Vec<Symbol>,
        scale: PriceScale,
        config: MeanReversionConfig,
    ) -> CoreResult<SignalStrategy<MeanReversion>> {
        config.validate()?;
        Ok(SignalStrategy::new(
            id,
            "mean_reversion",
            symbols,
            scale,
            |_| MeanReversion::from_validated(config.clone()),
        ))
    }

    fn push(&mut self, mid: f64) {
        if self.window.len() == self.config.lookback {
            self.window.pop_front();
        }
        self.window.push_back(mid);
    }

    /// Population mean and standard deviation of the window.
    fn moments(&self) -> (f64, f64) {
        let n = self.window.len() as f64;
        let mean = self.window.iter().sum::<f64>() / n;
        let variance = self
            .window
            .iter()
            .map(|price| {
                let diff = price - mean;
                diff * diff
            })
            .sum::<f64>()
            / n;
        (mean, variance.sqrt())
    }

    fn target(&mut self, z: f64, current: i64) -> i64 {
        let config = &self.config;
        if current == 0 {
            if z.abs() < config.entry_z {
                self.entry_abs_z = None;
                return 0;
            }
            // Fade the move at full size; the ratio only matters at the
            // boundary where it is exactly one.
            let size = (config.max_position_size as f64
                * (z.abs() / config.entry_z).min(1.0)) as i64;
            self.entry_abs_z = Some(z.abs());
            return -z.signum() as i64 * size;
        }

        if z.abs() < config.exit_z {
            self.entry_abs_z = None;
            return 0;
        }

        // Same-direction stretch beyond both the entry band and the level
        // at which the position was opened doubles it, bounded.
        let against = (current > 0 && z < 0.0) || (current < 0 && z > 0.0);
        if against && z.abs() >= config.entry_z {
            if let Some(entry_abs) = self.entry_abs_z {
                if z.abs() > entry_abs {
                    self.entry_abs_z = Some(z.abs());
                    let doubled = current.saturating_mul(2);
                    let bound = config.max_position_size * 2;
                    return doubled.clamp(-bound, bound);
                }
            }
        }

        current
    }
}

impl SignalModel for MeanReversion {
    fn name(&self) -> &'static str {
        "mean_reversion"
    }

    fn evaluate(&mut self, mid: f64, current_position: i64) -> Evaluation {
        self.push(mid);
        if self.window.len() < self.config.lookback {
            return Evaluation::hold(current_position);
        }
        let (mean, sigma) = self.moments();
        if sigma < SIGMA_FLOOR {
            return Evaluation::hold(current_position);
        }
        let z = (mid - mean) / sigma;
        let signal = (-z / self.config.entry_z).clamp(-1.0, 1.0);
        Evaluation {
            signal,
            target_position: self.target(z, current_position),
        }
    }

    fn reconfigure(&mut self, config: &serde_json::Value) -> CoreResult<()> {
        let next: MeanReversionConfig = serde_json::from_value(config.clone())
            .map_err(|err| CoreError::InvalidInput(format!("bad mean-reversion config: {err}")))?;
        next.validate()?;
        if next.lookback < self.config.lookback {
            while self.window.len() > next.lookback {
                self.window.pop_front();
            }
        }
        self.config = next;
        Ok(())
    }

    fn max_order_size(&self) -> i64 {
        self.config.max_order_size
    }
}
