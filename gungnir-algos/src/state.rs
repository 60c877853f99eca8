//! Algorithm lifecycle state machine
//!
//! ```text
//! INITIALIZED -> RUNNING            (start)
//! RUNNING <-> PAUSED                (pause / resume)
//! RUNNING -> COMPLETED              (completion condition)
//! RUNNING | PAUSED -> CANCELLED     (cancel)
//! RUNNING -> FAILED                 (fatal error)
//! ```
//!
//! Only RUNNING processes quotes and timer ticks. Fills may arrive in any
//! state and always update fill bookkeeping. Terminal states admit nothing;
//! re-entering INITIALIZED is forbidden.

use gungnir_core::core::errors::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AlgoState {
    Initialized = 0,
    Running = 1,
    Paused = 2,
    Completed = 3,
    Cancelled = 4,
    Failed = 5,
}

impl AlgoState {
    #[inline(always)]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, AlgoState::Completed | AlgoState::Cancelled | AlgoState::Failed)
    }

    pub const fn can_transition_to(&self, next: AlgoState) -> bool {
        use AlgoState::*;
        match (self, next) {
            (Initialized, Running) => true,
            (Running, Paused) | (Paused, Running) => true,
            (Running, Completed) => true,
            (Running, Cancelled) | (Paused, Cancelled) => true,
            (Running, Failed) => true,
            _ => false,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            AlgoState::Initialized => "INITIALIZED",
            AlgoState::Running => "RUNNING",
            AlgoState::Paused => "PAUSED",
            AlgoState::Completed => "COMPLETED",
            AlgoState::Cancelled => "CANCELLED",
            AlgoState::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for AlgoState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle record shared by every algorithm.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    state: AlgoState,
    pub created_ts_ns: u64,
    pub started_ts_ns: u64,
    pub ended_ts_ns: u64,
    pub failure_reason: Option<String>,
}

impl Lifecycle {
    pub fn new(created_ts_ns: u64) -> Self {
        Self {
            state: AlgoState::Initialized,
            created_ts_ns,
            started_ts_ns: 0,
            ended_ts_ns: 0,
            failure_reason: None,
        }
    }

    #[inline(always)]
    pub fn state(&self) -> AlgoState {
        self.state
    }

    #[inline(always)]
    pub fn is_running(&self) -> bool {
        self.state == AlgoState::Running
    }

    fn transition(&mut self, next: AlgoState) -> CoreResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(CoreError::IllegalTransition {
                entity: "algorithm",
                from: self.state.as_str(),
                to: next.as_str(),
            });
        }
        self.state = next;
        Ok(())
    }

    pub fn start(&mut self, now_ns: u64) -> CoreResult<()> {
        self.transition(AlgoState::Running)?;
        self.started_ts_ns = now_ns;
        Ok(())
    }

    pub fn pause(&mut self) -> CoreResult<()> {
        self.transition(AlgoState::Paused)
    }

    pub fn resume(&mut self) -> CoreResult<()> {
        self.transition(AlgoState::Running)
    }

    pub fn complete(&mut self, now_ns: u64) -> CoreResult<()> {
        self.transition(AlgoState::Completed)?;
        self.ended_ts_ns = now_ns;
        Ok(())
    }

    pub fn cancel(&mut self, now_ns: u64) -> CoreResult<()> {
        self.transition(AlgoState::Cancelled)?;
        self.ended_ts_ns = now_ns;
        Ok(())
    }

    pub fn fail(&mut self, reason: &str, now_ns: u64) -> CoreResult<()> {
        self.transition(AlgoState::Failed)?;
        self.ended_ts_ns = now_ns;
        self.failure_reason = Some(reason.to_string());
        Ok(())
    }
}
