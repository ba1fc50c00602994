//! Reconnect bookkeeping: attempt counter plus exponential backoff.
//!
//! The supervisor is a plain state machine. The transport asks it what to
//! do after every close and tells it about every successful open; timers
//! are the caller's business.

use std::time::Duration;

/// Backoff parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// When false, every close is final.
    pub enabled: bool,
    /// Automatic retries allowed between two successful opens.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 5,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
        }
    }
}

impl ReconnectPolicy {
    /// `min(base * 2^attempt, max)` for a 0-based attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay)
    }
}

/// Decision taken after a transport closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// Reconnect after `delay`. `attempt` is 1-based.
    Retry { attempt: u32, delay: Duration },
    /// No further automatic reconnects.
    Final,
}

#[derive(Debug, Clone)]
pub struct ReconnectSupervisor {
    policy: ReconnectPolicy,
    attempts: u32,
}

impl ReconnectSupervisor {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
        }
    }

    /// A transport opened successfully; the budget starts over.
    pub fn on_open(&mut self) {
        self.attempts = 0;
    }

    pub fn on_close(&mut self) -> CloseOutcome {
        if !self.policy.enabled || self.attempts >= self.policy.max_attempts {
            return CloseOutcome::Final;
        }
        let delay = self.policy.delay_for(self.attempts);
        self.attempts += 1;
        CloseOutcome::Retry {
            attempt: self.attempts,
            delay,
        }
    }

    /// Retries consumed since the last successful open.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }
}
