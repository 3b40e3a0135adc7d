//! Timed buffer configuration
//!
//! The configuration can be built in code or deserialized, for example from JSON:
//!
//! ```
//! use timedbuf::TimedBufferConfig;
//!
//! let config: TimedBufferConfig =
//!     serde_json::from_str(r#"{"capacity": 15, "flush_interval_secs": 0.5}"#).unwrap();
//! assert_eq!(config.capacity, 15);
//! assert_eq!(config.flush_interval.as_millis(), 500);
//! assert_eq!(config.thread_name, "timed-buffer");
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::TimedBufferError;

/// Shortest timer period the event loop will wait for.
///
/// A zero interval means "flush continuously"; the loop still needs a tick.
pub const MIN_TICK: Duration = Duration::from_millis(1);

fn default_thread_name() -> String {
    "timed-buffer".to_string()
}

/// Settings for a [`TimedBuffer`](crate::TimedBuffer)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedBufferConfig {
    /// Items per batch before a size-triggered flush
    pub capacity: usize,
    /// Time since the last flush after which the buffer is flushed
    #[serde(rename = "flush_interval_secs", with = "secs_f64")]
    pub flush_interval: Duration,
    /// Name of the event loop thread
    #[serde(default = "default_thread_name")]
    pub thread_name: String,
}

impl TimedBufferConfig {
    /// Config with an interval in whole seconds
    #[must_use]
    pub fn new(capacity: usize, flush_interval_secs: u64) -> Self {
        Self {
            capacity,
            flush_interval: Duration::from_secs(flush_interval_secs),
            thread_name: default_thread_name(),
        }
    }

    #[must_use]
    pub fn with_flush_interval(mut self, flush_interval: Duration) -> Self {
        self.flush_interval = flush_interval;
        self
    }

    #[must_use]
    pub fn with_thread_name(mut self, name: &str) -> Self {
        self.thread_name = name.to_string();
        self
    }

    /// Check that the config can drive a buffer
    pub fn validate(&self) -> Result<(), TimedBufferError> {
        if self.capacity == 0 {
            return Err(TimedBufferError::InvalidCapacity);
        }
        Ok(())
    }

    /// The period the loop's timer actually uses
    #[must_use]
    pub fn timer_period(&self) -> Duration {
        self.flush_interval.max(MIN_TICK)
    }
}

mod secs_f64 {
    use std::time::Duration;

    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(de::Error::custom)
    }
}
