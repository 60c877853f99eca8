//! Engine configuration
//!
//! Serde-backed config structs with sane defaults and two opinionated
//! profiles. Everything here is read once at assembly time; hot paths only
//! see the resolved values.

use crate::risk::RiskLimits;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RingConfig {
    /// Slot count, power of two.
    #[serde(default = "default_ring_capacity")]
    pub capacity: usize,
    /// Bounded wait for blocking publications before they fail.
    #[serde(default = "default_publish_wait_ms")]
    pub publish_wait_ms: u64,
    /// Bounded wait for drain at shutdown.
    #[serde(default = "default_drain_wait_ms")]
    pub drain_wait_ms: u64,
}

fn default_ring_capacity() -> usize {
    8_192
}

fn default_publish_wait_ms() -> u64 {
    5
}

fn default_drain_wait_ms() -> u64 {
    5_000
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            capacity: default_ring_capacity(),
            publish_wait_ms: default_publish_wait_ms(),
            drain_wait_ms: default_drain_wait_ms(),
        }
    }
}

impl RingConfig {
    pub fn publish_wait(&self) -> Duration {
        Duration::from_millis(self.publish_wait_ms)
    }

    pub fn drain_wait(&self) -> Duration {
        Duration::from_millis(self.drain_wait_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    #[serde(default)]
    pub limits: RiskLimits,
    /// Consecutive rejections before the breaker opens.
    #[serde(default = "default_breaker_threshold")]
    pub breaker_threshold: u64,
    #[serde(default = "default_breaker_cooldown_ms")]
    pub breaker_cooldown_ms: u64,
}

fn default_breaker_threshold() -> u64 {
    5
}

fn default_breaker_cooldown_ms() -> u64 {
    30_000
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            limits: RiskLimits::default(),
            breaker_threshold: default_breaker_threshold(),
            breaker_cooldown_ms: default_breaker_cooldown_ms(),
        }
    }
}

impl RiskConfig {
    pub fn breaker_cooldown_ns(&self) -> u64 {
        self.breaker_cooldown_ms * 1_000_000
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalConfig {
    /// Journal file; `None` disables journaling.
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_journal_buffer")]
    pub buffer: usize,
}

fn default_journal_buffer() -> usize {
    4_096
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            path: None,
            buffer: default_journal_buffer(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub ring: RingConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub journal: JournalConfig,
    /// Order record pool size.
    #[serde(default = "default_order_pool")]
    pub order_pool: usize,
}

fn default_order_pool() -> usize {
    4_096
}

impl EngineConfig {
    pub fn conservative() -> Self {
        Self {
            risk: RiskConfig {
                limits: RiskLimits::conservative(),
                breaker_threshold: 3,
                breaker_cooldown_ms: 60_000,
            },
            ..Self::default()
        }
    }

    pub fn aggressive() -> Self {
        Self {
            risk: RiskConfig {
                limits: RiskLimits::aggressive(),
                breaker_threshold: 10,
                breaker_cooldown_ms: 10_000,
            },
            ..Self::default()
        }
    }
}
