//! Job polling configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::application::polling::PollPolicy;

/// Job polling configuration
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PollingConfig {
    /// Fixed period between status fetches, in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Consecutive "not found" answers that expire a job
    #[serde(default = "default_max_consecutive_not_found")]
    pub max_consecutive_not_found: u32,
}

fn default_interval_ms() -> u64 {
    5_000
}

fn default_max_consecutive_not_found() -> u32 {
    3
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_consecutive_not_found: default_max_consecutive_not_found(),
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn policy(&self) -> PollPolicy {
        PollPolicy::default()
            .with_interval(self.interval())
            .with_max_consecutive_not_found(self.max_consecutive_not_found)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.interval_ms == 0 || self.interval_ms > 600_000 {
            return Err(ValidationError::InvalidPollInterval);
        }
        if self.max_consecutive_not_found == 0 {
            return Err(ValidationError::InvalidNotFoundThreshold);
        }
        Ok(())
    }
}
