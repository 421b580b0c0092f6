//! Linear reconnect backoff with a ceiling on both the delay and the number of attempts.
//!
//! Every failed connection adds [`INCREMENT`] to the delay, the delay handed out is capped at
//! [`MAX_DELAY`], and the policy gives up once either more than [`MAX_RECONNECTS`] attempts have
//! been made or the uncapped delay grows past [`MAX_TIMEOUT`].

use core::time::Duration;

pub use crate::errors::ExhaustedError;

/// Delay before the first reconnect and after a [`reset`][BackoffPolicy::reset]
pub const START: Duration = crate::constants::START;
/// Amount added to the delay on every failure
pub const INCREMENT: Duration = crate::constants::INCREMENT;
/// Longest delay ever handed out by [`BackoffPolicy::current_delay`]
pub const MAX_DELAY: Duration = crate::constants::MAX_DELAY;
/// Number of reconnects allowed before the policy is exhausted
pub const MAX_RECONNECTS: u32 = crate::constants::MAX_RECONNECTS;
/// Uncapped delay past which the policy is exhausted
pub const MAX_TIMEOUT: Duration = crate::constants::MAX_TIMEOUT;

/// Tunables for a [`BackoffPolicy`], defaults match the module constants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BackoffConfig {
    pub start: Duration,
    pub increment: Duration,
    pub max_delay: Duration,
    pub max_reconnects: u32,
    pub max_timeout: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            start: START,
            increment: INCREMENT,
            max_delay: MAX_DELAY,
            max_reconnects: MAX_RECONNECTS,
            max_timeout: MAX_TIMEOUT,
        }
    }
}

impl BackoffConfig {
    #[must_use]
    pub fn with_start(mut self, start: Duration) -> Self {
        self.start = start;
        self
    }

    #[must_use]
    pub fn with_increment(mut self, increment: Duration) -> Self {
        self.increment = increment;
        self
    }

    #[must_use]
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    #[must_use]
    pub fn with_max_reconnects(mut self, max_reconnects: u32) -> Self {
        self.max_reconnects = max_reconnects;
        self
    }

    #[must_use]
    pub fn with_max_timeout(mut self, max_timeout: Duration) -> Self {
        self.max_timeout = max_timeout;
        self
    }
}

/// Reconnect delay calculator owned by a single session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    config: BackoffConfig,
    delay_interval: Duration,
    attempt_count: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}

impl BackoffPolicy {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            delay_interval: config.start,
            attempt_count: 0,
            config,
        }
    }

    /// Picks up where a previous policy left off, e.g. when a caller rebuilds a session after an outage it already waited through
    pub fn resume(config: BackoffConfig, delay_interval: Duration, attempt_count: u32) -> Self {
        Self {
            config,
            delay_interval,
            attempt_count,
        }
    }

    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// The uncapped interval, see [`current_delay`][Self::current_delay] for what a caller should wait
    pub fn delay_interval(&self) -> Duration {
        self.delay_interval
    }

    /// How long to wait before the next reconnect
    pub fn current_delay(&self) -> Duration {
        self.delay_interval.min(self.config.max_delay)
    }

    /// Whether either ceiling has been passed
    pub fn is_exhausted(&self) -> bool {
        self.attempt_count > self.config.max_reconnects
            || self.delay_interval > self.config.max_timeout
    }

    /// Counts a failed connection and returns the delay before the next one.
    ///
    /// Once exhausted the policy stays exhausted until [`reset`][Self::reset], the caller must not reconnect on its own.
    pub fn record_failure_and_advance(&mut self) -> Result<Duration, ExhaustedError> {
        self.attempt_count = self.attempt_count.saturating_add(1);
        self.delay_interval = self.delay_interval.saturating_add(self.config.increment);

        if self.is_exhausted() {
            return Err(ExhaustedError {
                attempts: self.attempt_count,
            });
        }

        Ok(self.current_delay())
    }

    /// Back to the starting delay with no attempts counted, called once a connection is confirmed healthy
    pub fn reset(&mut self) {
        self.delay_interval = self.config.start;
        self.attempt_count = 0;
    }
}
