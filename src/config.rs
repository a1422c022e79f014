//! # Storage Configuration
//!
//! Explicit configuration threaded through storage construction. There is no
//! process-wide mutable state: every tunable a storage engine consults lives
//! in the `StorageConfig` it was built with.
//!
//! ## Values
//!
//! | Field | Default | Used by |
//! |-------|---------|---------|
//! | `max_error_retries` | 3 | storage retry loop |
//! | `command_timeout` | 30 s | driver calls |
//! | `connection_close_timeout` | 300 s | pool idle expiry |
//! | `date_time_format` | `%Y%m%d%H%M%S%3f` | big-integer human-readable temporal marshaling |

use std::time::Duration;

use crate::storage::marshal::DEFAULT_DATE_TIME_FORMAT;

/// Configuration for a [`SqlStorage`](crate::storage::SqlStorage) instance.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Maximum number of immediate retries after a transient connection
    /// failure before the error is surfaced.
    pub max_error_retries: u32,
    /// Fixed per-command timeout handed to the native driver.
    pub command_timeout: Duration,
    /// Idle age beyond which a pooled connection is evicted instead of
    /// reused.
    pub connection_close_timeout: Duration,
    /// chrono format pattern for the human-readable big-integer temporal
    /// representation.
    pub date_time_format: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            max_error_retries: 3,
            command_timeout: Duration::from_secs(30),
            connection_close_timeout: Duration::from_secs(300),
            date_time_format: DEFAULT_DATE_TIME_FORMAT.to_string(),
        }
    }
}

impl StorageConfig {
    pub fn with_max_error_retries(mut self, retries: u32) -> Self {
        self.max_error_retries = retries;
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn with_connection_close_timeout(mut self, timeout: Duration) -> Self {
        self.connection_close_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = StorageConfig::default();
        assert_eq!(config.max_error_retries, 3);
        assert_eq!(config.command_timeout, Duration::from_secs(30));
        assert_eq!(config.connection_close_timeout, Duration::from_secs(300));
        assert_eq!(config.date_time_format, "%Y%m%d%H%M%S%3f");
    }

    #[test]
    fn builder_overrides() {
        let config = StorageConfig::default()
            .with_max_error_retries(1)
            .with_connection_close_timeout(Duration::from_secs(5));
        assert_eq!(config.max_error_retries, 1);
        assert_eq!(config.connection_close_timeout, Duration::from_secs(5));
    }
}
