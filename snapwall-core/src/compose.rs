//! Outbound danmaku validation.
//!
//! Runs before a message reaches the transport: trims the text, enforces
//! the length limit and rate-limits accepted sends with a fixed cooldown.

use std::time::{Duration, Instant};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComposeError {
    #[error("message is empty")]
    Empty,
    #[error("message is {len} characters, limit is {max}")]
    TooLong { max: usize, len: usize },
    #[error("please wait {}s before sending again", .remaining.as_secs_f32().ceil())]
    CoolingDown { remaining: Duration },
}

#[derive(Debug, Clone)]
pub struct ComposerConfig {
    /// Limit in characters, not bytes.
    pub max_chars: usize,
    pub cooldown: Duration,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            max_chars: 50,
            cooldown: Duration::from_millis(2000),
        }
    }
}

#[derive(Debug)]
pub struct DanmakuComposer {
    config: ComposerConfig,
    last_sent: Option<Instant>,
}

impl DanmakuComposer {
    pub fn new(config: ComposerConfig) -> Self {
        Self {
            config,
            last_sent: None,
        }
    }

    /// Validate `input` at time `now`. On success the cooldown restarts and
    /// the trimmed text is returned.
    pub fn compose(&mut self, input: &str, now: Instant) -> Result<String, ComposeError> {
        let text = input.trim();
        if text.is_empty() {
            return Err(ComposeError::Empty);
        }
        let len = text.chars().count();
        if len > self.config.max_chars {
            return Err(ComposeError::TooLong {
                max: self.config.max_chars,
                len,
            });
        }
        let remaining = self.remaining_cooldown(now);
        if !remaining.is_zero() {
            return Err(ComposeError::CoolingDown { remaining });
        }

        self.last_sent = Some(now);
        Ok(text.to_string())
    }

    /// Time left before another message is accepted.
    pub fn remaining_cooldown(&self, now: Instant) -> Duration {
        match self.last_sent {
            Some(sent) => self
                .config
                .cooldown
                .saturating_sub(now.saturating_duration_since(sent)),
            None => Duration::ZERO,
        }
    }
}

impl Default for DanmakuComposer {
    fn default() -> Self {
        Self::new(ComposerConfig::default())
    }
}
