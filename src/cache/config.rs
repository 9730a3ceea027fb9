//! Cache configuration.

use std::time::Duration;

/// Configuration for a cache instance.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries in the cache.
    pub max_capacity: u64,

    /// Time-to-live for cache entries.
    /// After this duration, entries are automatically evicted.
    pub ttl: Option<Duration>,

    /// Time-to-idle for cache entries.
    /// Entries are evicted if not accessed within this duration.
    pub tti: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            ttl: Some(Duration::from_secs(300)), // 5 minutes
            tti: None,
        }
    }
}

impl CacheConfig {
    /// Set max capacity for cache (builder pattern).
    #[must_use]
    pub fn max_capacity(mut self, max_capacity: u64) -> Self {
        self.max_capacity = max_capacity;
        self
    }

    /// Set time-to-live for cache entries.
    #[must_use]
    pub fn ttl(mut self, duration: Duration) -> Self {
        self.ttl = Some(duration);
        self
    }

    /// Set time-to-idle for cache entries.
    #[must_use]
    pub fn tti(mut self, duration: Duration) -> Self {
        self.tti = Some(duration);
        self
    }

    /// Filter sets are read on every group message.
    /// Idle chats drop out quickly, busy chats stay warm.
    pub fn filter_sets() -> Self {
        Self::default()
            .max_capacity(5_000)
            .ttl(Duration::from_secs(600)) // 10 minutes
            .tti(Duration::from_secs(120)) // 2 minutes idle
    }

    /// Chat settings are read on every command.
    pub fn chat_settings() -> Self {
        Self::default()
            .max_capacity(5_000)
            .ttl(Duration::from_secs(3600)) // 1 hour
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let filters = CacheConfig::filter_sets();
        assert_eq!(filters.max_capacity, 5_000);
        assert_eq!(filters.tti, Some(Duration::from_secs(120)));

        let settings = CacheConfig::chat_settings();
        assert_eq!(settings.ttl, Some(Duration::from_secs(3600)));
        assert_eq!(settings.tti, None);
    }
}
