//! Manager configuration.
//!
//! The reset timing values are hardware policy. They default to the named
//! constants below and can be overridden from a TOML file, validated at
//! load time.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{PartitionError, Result};

/// Delay between two availability polls of the reset watcher.
pub const DEFAULT_RESET_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Number of availability polls before a reset is declared timed out.
pub const DEFAULT_RESET_MAX_ATTEMPTS: u32 = 100;

/// Reset watcher polling policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetPolicy {
    /// Delay before each availability poll.
    #[serde(default = "default_poll_interval", with = "humantime_duration")]
    pub poll_interval: Duration,

    /// Polls before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_poll_interval() -> Duration {
    DEFAULT_RESET_POLL_INTERVAL
}

fn default_max_attempts() -> u32 {
    DEFAULT_RESET_MAX_ATTEMPTS
}

impl Default for ResetPolicy {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_RESET_POLL_INTERVAL,
            max_attempts: DEFAULT_RESET_MAX_ATTEMPTS,
        }
    }
}

impl ResetPolicy {
    /// Creates the default policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the poll interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the attempt bound.
    #[must_use]
    pub const fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Longest time a caller can wait for one watcher run.
    #[must_use]
    pub fn total_budget(&self) -> Duration {
        self.poll_interval.saturating_mul(self.max_attempts)
    }

    /// Validates the policy.
    ///
    /// # Errors
    /// Returns an error if the interval or the attempt bound is zero.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(PartitionError::config(
                "reset.poll_interval must be greater than zero",
            ));
        }
        if self.max_attempts == 0 {
            return Err(PartitionError::config(
                "reset.max_attempts must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Lifecycle manager configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Reset watcher policy.
    #[serde(default)]
    pub reset: ResetPolicy,

    /// Release a lease in the background when it is dropped unreleased.
    #[serde(default = "default_release_on_drop")]
    pub release_on_drop: bool,
}

fn default_release_on_drop() -> bool {
    true
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            reset: ResetPolicy::default(),
            release_on_drop: default_release_on_drop(),
        }
    }
}

impl ManagerConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the reset policy.
    #[must_use]
    pub const fn with_reset_policy(mut self, policy: ResetPolicy) -> Self {
        self.reset = policy;
        self
    }

    /// Enables or disables release-on-drop for leases.
    #[must_use]
    pub const fn with_release_on_drop(mut self, enabled: bool) -> Self {
        self.release_on_drop = enabled;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        self.reset.validate()
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    /// Returns an error if the text cannot be parsed or is invalid.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| PartitionError::config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| PartitionError::config(format!("failed to read config: {e}")))?;
        Self::from_toml_str(&content)
    }
}

/// Serde adapter writing durations as humantime strings ("1ms", "2s").
mod humantime_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}
