//! Retry policy for notification delivery.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How many times a job is attempted and how long to wait in between.
///
/// The delay before attempt `n + 1` is `base * 2^(n - 1)`, capped at `max`,
/// so the defaults wait 1s, 2s, 4s, 8s between five attempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Default: 5
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Delay after the first failure. Default: 1 second
    #[serde(default = "defaults::base_delay", with = "secs")]
    pub base_delay: Duration,

    /// Upper bound on any single delay. Default: 30 seconds
    #[serde(default = "defaults::max_delay", with = "secs")]
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: defaults::max_attempts(),
            base_delay: defaults::base_delay(),
            max_delay: defaults::max_delay(),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Whether another attempt may follow attempt number `attempt` (1-indexed)
    #[must_use]
    pub const fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Delay to wait after failed attempt number `attempt` (1-indexed)
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1 << exponent)
            .min(self.max_delay)
    }
}

mod defaults {
    use std::time::Duration;

    pub const fn max_attempts() -> u32 {
        5
    }

    pub const fn base_delay() -> Duration {
        Duration::from_secs(1)
    }

    pub const fn max_delay() -> Duration {
        Duration::from_secs(30)
    }
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
