use anyhow::{bail, Result};
use std::env;

/// Default payload TTL: 5 minutes
const DEFAULT_TTL_SECONDS: u64 = 300;

/// Default refresh lock TTL: 30 seconds
const DEFAULT_LOCK_TTL_SECONDS: u64 = 30;

/// Default staleness threshold as a fraction of the TTL
const DEFAULT_STALE_RATIO: f64 = 0.8;

/// Tuning for one cache namespace.
///
/// An entry is considered stale once its age exceeds `ttl_seconds *
/// stale_ratio`, leaving the remaining TTL window for a background refresh to
/// land before the store evicts the entry.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub namespace: String,
    pub ttl_seconds: u64,
    pub lock_ttl_seconds: u64,
    pub stale_ratio: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            namespace: "muninn".to_string(),
            ttl_seconds: DEFAULT_TTL_SECONDS,
            lock_ttl_seconds: DEFAULT_LOCK_TTL_SECONDS,
            stale_ratio: DEFAULT_STALE_RATIO,
        }
    }
}

impl CacheConfig {
    pub fn from_env() -> Result<Self> {
        let namespace = env::var("CACHE_NAMESPACE").unwrap_or_else(|_| "muninn".to_string());

        let ttl_seconds = env::var("CACHE_TTL_SECONDS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TTL_SECONDS);

        let lock_ttl_seconds = env::var("CACHE_LOCK_TTL_SECONDS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_LOCK_TTL_SECONDS);

        let stale_ratio = env::var("CACHE_STALE_RATIO")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(DEFAULT_STALE_RATIO);

        let config = Self {
            namespace,
            ttl_seconds,
            lock_ttl_seconds,
            stale_ratio,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.namespace.is_empty() {
            bail!("cache namespace must not be empty");
        }
        if self.ttl_seconds == 0 {
            bail!("cache TTL must be at least one second");
        }
        if self.lock_ttl_seconds == 0 {
            bail!("refresh lock TTL must be at least one second");
        }
        if !(self.stale_ratio > 0.0 && self.stale_ratio <= 1.0) {
            bail!(
                "stale ratio must be within (0, 1], got {}",
                self.stale_ratio
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = CacheConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ttl_seconds, 300);
        assert_eq!(config.lock_ttl_seconds, 30);
    }

    #[test]
    fn rejects_out_of_range_stale_ratio() {
        let config = CacheConfig {
            stale_ratio: 1.5,
            ..CacheConfig::default()
        };
        assert!(config.validate().is_err());

        let config = CacheConfig {
            stale_ratio: 0.0,
            ..CacheConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_ttl() {
        let config = CacheConfig {
            ttl_seconds: 0,
            ..CacheConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
