//! Runtime tunables for the key service.
//!
//! Values live under the `aegis` namespace and are read from environment
//! variables with the `AEGIS_` prefix (`AEGIS_CACHE_LIMIT`,
//! `AEGIS_CACHE_MAX_AGE_SEC`, `AEGIS_CACHE_EXPIRATION_CHECK_SEC`). They are
//! re-read on every use rather than cached at startup, so an operator can
//! retune a running service.

use serde::Deserialize;
use tracing::warn;

/// Tunable settings consumed by the key service core.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    /// Maximum number of cached database keys.
    #[serde(default = "default_cache_limit")]
    pub cache_limit: usize,

    /// TTL of a cache entry, in seconds from insert.
    #[serde(default = "default_cache_max_age_sec")]
    pub cache_max_age_sec: u64,

    /// Period between expiry sweeps, in seconds.
    #[serde(default = "default_cache_expiration_check_sec")]
    pub cache_expiration_check_sec: u64,
}

fn default_cache_limit() -> usize {
    100_000
}
fn default_cache_max_age_sec() -> u64 {
    1800
}
fn default_cache_expiration_check_sec() -> u64 {
    10
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache_limit: default_cache_limit(),
            cache_max_age_sec: default_cache_max_age_sec(),
            cache_expiration_check_sec: default_cache_expiration_check_sec(),
        }
    }
}

impl Settings {
    /// Read the current settings from the environment.
    ///
    /// Unset keys take their defaults. A malformed environment is reported
    /// once per read at warn level and the defaults are served instead;
    /// tunables are consulted on hot paths where failing is not an option.
    pub fn current() -> Self {
        match Self::load() {
            Ok(settings) => settings,
            Err(e) => {
                warn!(error = %e, "invalid aegis configuration; using defaults");
                Self::default()
            }
        }
    }

    fn load() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::with_prefix("AEGIS"))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_correct() {
        assert_eq!(default_cache_limit(), 100_000);
        assert_eq!(default_cache_max_age_sec(), 1800);
        assert_eq!(default_cache_expiration_check_sec(), 10);
        assert_eq!(
            Settings::default(),
            Settings {
                cache_limit: 100_000,
                cache_max_age_sec: 1800,
                cache_expiration_check_sec: 10,
            }
        );
    }

    #[test]
    fn current_serves_defaults_on_clean_env() {
        // Test processes do not set AEGIS_* variables.
        assert_eq!(Settings::current(), Settings::default());
    }
}
