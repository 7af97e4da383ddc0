//! Engine configuration.

use std::time::Duration;

/// Configuration for the correlation engine.
///
/// # Default Values
///
/// - `transaction_timeout`: 1 minute. How long a pending request (or an
///   orphaned response) waits for its counterpart before being finalized
///   incomplete.
/// - `cleanup_retention`: 5 minutes. How long finalized records are held
///   for bookkeeping before the cleanup sweep drops them.
/// - `shard_count`: 16. Number of lock shards for the in-flight map.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Wait before finalizing a transaction whose counterpart never arrived.
    pub transaction_timeout: Duration,
    /// Retention window for finalized-record bookkeeping.
    pub cleanup_retention: Duration,
    /// Number of lock shards for the in-flight transaction map.
    pub shard_count: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            transaction_timeout: Duration::from_secs(60),
            cleanup_retention: Duration::from_secs(300),
            shard_count: 16,
        }
    }
}

impl EngineConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub const fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder {
            transaction_timeout: None,
            cleanup_retention: None,
            shard_count: None,
        }
    }
}

/// Builder for [`EngineConfig`].
#[derive(Debug, Clone)]
pub struct EngineConfigBuilder {
    transaction_timeout: Option<Duration>,
    cleanup_retention: Option<Duration>,
    shard_count: Option<usize>,
}

impl EngineConfigBuilder {
    /// Set the transaction timeout.
    #[must_use]
    pub const fn transaction_timeout(mut self, timeout: Duration) -> Self {
        self.transaction_timeout = Some(timeout);
        self
    }

    /// Set the finalized-record retention window.
    #[must_use]
    pub const fn cleanup_retention(mut self, retention: Duration) -> Self {
        self.cleanup_retention = Some(retention);
        self
    }

    /// Set the number of lock shards.
    ///
    /// # Panics
    ///
    /// Panics if `shard_count` is 0.
    #[must_use]
    pub fn shard_count(mut self, shard_count: usize) -> Self {
        assert!(shard_count > 0, "shard_count must be greater than 0");
        self.shard_count = Some(shard_count);
        self
    }

    /// Build the [`EngineConfig`].
    #[must_use]
    pub fn build(self) -> EngineConfig {
        let defaults = EngineConfig::default();
        EngineConfig {
            transaction_timeout: self.transaction_timeout.unwrap_or(defaults.transaction_timeout),
            cleanup_retention: self.cleanup_retention.unwrap_or(defaults.cleanup_retention),
            shard_count: self.shard_count.unwrap_or(defaults.shard_count),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = EngineConfig::default();
        assert_eq!(config.transaction_timeout, Duration::from_secs(60));
        assert_eq!(config.cleanup_retention, Duration::from_secs(300));
        assert_eq!(config.shard_count, 16);
    }

    #[test]
    fn builder_overrides_selected_fields() {
        let config = EngineConfig::builder()
            .transaction_timeout(Duration::from_millis(50))
            .build();
        assert_eq!(config.transaction_timeout, Duration::from_millis(50));
        assert_eq!(config.cleanup_retention, Duration::from_secs(300));
    }
}
