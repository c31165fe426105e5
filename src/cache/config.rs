//! Cache configuration.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_TTL_SECONDS: u64 = 20;
const DEFAULT_RESPONSE_LIMIT: usize = 200;

/// Response cache configuration from `yatube.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable the home-page response cache.
    pub enabled: bool,
    /// Seconds a cached response stays valid.
    pub ttl_seconds: u64,
    /// Maximum cached responses before LRU eviction.
    pub response_limit: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: DEFAULT_TTL_SECONDS,
            response_limit: DEFAULT_RESPONSE_LIMIT,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    /// Returns the response limit as NonZeroUsize, clamping to 1 if zero.
    pub fn response_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.response_limit).unwrap_or(NonZeroUsize::MIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert!(config.enabled);
        assert_eq!(config.ttl_seconds, 20);
        assert_eq!(config.response_limit, 200);
    }

    #[test]
    fn response_limit_clamps_to_min() {
        let config = CacheConfig {
            response_limit: 0,
            ..Default::default()
        };
        assert_eq!(config.response_limit_non_zero().get(), 1);
    }
}
