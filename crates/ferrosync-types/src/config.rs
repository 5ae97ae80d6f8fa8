//! Configuration value types shared across crates
//!
//! These are plain validated values; loading them from files lives in
//! `ferrosync-config`.

use std::time::Duration;

/// Bounded connection retry with a fixed delay
///
/// Attempts are numbered from zero. A policy with `max_retries = 3` allows
/// four attempts in total and sleeps `delay` between consecutive attempts,
/// never after the last one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Fixed pause between attempts
    pub delay: Duration,
}

impl RetryPolicy {
    /// Default number of retries
    pub const DEFAULT_RETRIES: u32 = 3;
    /// Default delay between attempts
    pub const DEFAULT_DELAY: Duration = Duration::from_secs(1);

    /// Create a retry policy
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// A policy that makes a single attempt
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Total attempts the policy allows
    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Whether another attempt follows the failed attempt `attempt`
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    /// Delay to wait after the failed attempt `attempt`, if any
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        self.should_retry(attempt).then_some(self.delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_RETRIES, Self::DEFAULT_DELAY)
    }
}

/// Timeout configuration for a remote session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimeoutConfig {
    /// Bound on a single connect-and-login attempt
    pub connect_timeout: Duration,
    /// Bound on each remote primitive call
    pub idle_timeout: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(30),
        }
    }
}
