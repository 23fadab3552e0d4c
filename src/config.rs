//! Configuration Module
//!
//! Handles loading engine tunables from environment variables.

use std::env;

/// Engine configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Idle time in milliseconds after which a config becomes evictable
    pub eviction_timeout_ms: u64,
    /// Interval in milliseconds between eviction sweeps
    pub cleanup_interval_ms: u64,
    /// Interval in milliseconds between persistence sweeps
    pub polling_interval_ms: u64,
    /// Quiet window in milliseconds for debounced widget updates
    pub debounce_window_ms: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `EVICTION_TIMEOUT_MS` - Idle eviction threshold (default: 60000)
    /// - `CLEANUP_INTERVAL_MS` - Eviction sweep interval (default: 30000)
    /// - `POLLING_INTERVAL_MS` - Persistence sweep interval (default: 5000)
    /// - `DEBOUNCE_WINDOW_MS` - Debounce quiet window (default: 500)
    pub fn from_env() -> Self {
        Self {
            eviction_timeout_ms: env::var("EVICTION_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60_000),
            cleanup_interval_ms: env::var("CLEANUP_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30_000),
            polling_interval_ms: env::var("POLLING_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5_000),
            debounce_window_ms: env::var("DEBOUNCE_WINDOW_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(500),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            eviction_timeout_ms: 60_000,
            cleanup_interval_ms: 30_000,
            polling_interval_ms: 5_000,
            debounce_window_ms: 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.eviction_timeout_ms, 60_000);
        assert_eq!(config.cleanup_interval_ms, 30_000);
        assert_eq!(config.polling_interval_ms, 5_000);
        assert_eq!(config.debounce_window_ms, 500);
    }

    #[test]
    fn test_config_from_env_defaults() {
        // Clear any existing env vars to test defaults
        env::remove_var("EVICTION_TIMEOUT_MS");
        env::remove_var("CLEANUP_INTERVAL_MS");
        env::remove_var("POLLING_INTERVAL_MS");
        env::remove_var("DEBOUNCE_WINDOW_MS");

        let config = Config::from_env();
        assert_eq!(config.eviction_timeout_ms, 60_000);
        assert_eq!(config.cleanup_interval_ms, 30_000);
        assert_eq!(config.polling_interval_ms, 5_000);
        assert_eq!(config.debounce_window_ms, 500);
    }
}
