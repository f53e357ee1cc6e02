//! # SOF Config - Configuration Management
//!
//! Handles configuration loading from files and environment variables.
//! Environment variables use the `SOF` prefix with `__` between sections,
//! e.g. `SOF__CACHE__TTL_SECONDS=60`.

pub mod validation;

use std::path::Path;

use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use sof_const::{DEFAULT_ACCESS_ADMIN_ROLE, DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL_SECONDS};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
}

fn default_backend() -> String {
    "memory".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,

    #[serde(default = "default_cache_max_capacity")]
    pub max_capacity: u64,

    #[serde(default = "default_cache_ttl_seconds")]
    pub ttl_seconds: u64,
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_max_capacity() -> u64 {
    DEFAULT_CACHE_CAPACITY
}

fn default_cache_ttl_seconds() -> u64 {
    DEFAULT_CACHE_TTL_SECONDS
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            max_capacity: default_cache_max_capacity(),
            ttl_seconds: default_cache_ttl_seconds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Create a missing access role (self-administered) when registering an
    /// entity instead of rejecting the registration
    #[serde(default)]
    pub lazy_role_creation: bool,

    /// Name of the role whose members may rewrite access configuration
    #[serde(default = "default_access_admin_role")]
    pub access_admin_role: String,
}

fn default_access_admin_role() -> String {
    DEFAULT_ACCESS_ADMIN_ROLE.to_string()
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            lazy_role_creation: false,
            access_admin_role: default_access_admin_role(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// One of `pretty`, `compact` or `json`
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "compact".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

/// Load configuration from file and environment
pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let builder = ConfigBuilder::builder()
        .add_source(File::from(path.as_ref()).required(false))
        .add_source(Environment::with_prefix("SOF").separator("__"))
        .build()?;

    builder.try_deserialize()
}

/// Load configuration with defaults
pub fn load_or_default<P: AsRef<Path>>(path: P) -> Config {
    load(path).unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.store.backend, "memory");
        assert!(config.cache.enabled);
        assert_eq!(config.cache.max_capacity, 10_000);
        assert!(!config.registry.lazy_role_creation);
        assert_eq!(config.registry.access_admin_role, "sof.access.admin");
        assert_eq!(config.observability.log_format, "compact");
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = load_or_default("/nonexistent/sof.toml");
        assert_eq!(config.cache.ttl_seconds, 300);
    }

    #[test]
    fn test_load_partial_file() {
        let path = std::env::temp_dir().join(format!("sof-config-{}.toml", std::process::id()));
        std::fs::write(
            &path,
            "[registry]\nlazy_role_creation = true\n\n[cache]\nttl_seconds = 30\n",
        )
        .unwrap();

        let config = load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert!(config.registry.lazy_role_creation);
        assert_eq!(config.registry.access_admin_role, "sof.access.admin");
        assert_eq!(config.cache.ttl_seconds, 30);
        assert!(config.cache.enabled);
        assert_eq!(config.store.backend, "memory");
    }
}
