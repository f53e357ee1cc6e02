//! Configuration validation
//!
//! Validates configuration values and ensures consistency

use thiserror::Error;

use crate::{CacheConfig, Config, ObservabilityConfig, RegistryConfig, StoreConfig};

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid cache capacity: {0} (must be > 0)")]
    InvalidCacheCapacity(u64),

    #[error("Invalid cache TTL: {0} (must be > 0)")]
    InvalidCacheTTL(u64),

    #[error("Invalid log level: {0} (must be one of: trace, debug, info, warn, error)")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0} (must be one of: pretty, compact, json)")]
    InvalidLogFormat(String),

    #[error("Invalid backend: {0} (must be one of: memory)")]
    InvalidBackend(String),

    #[error("Access admin role name must not be empty")]
    EmptyAccessAdminRole,

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

/// Validation result type
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validate complete configuration
pub fn validate(config: &Config) -> ValidationResult<()> {
    let mut errors: Vec<ValidationError> = [
        validate_store(&config.store),
        validate_cache(&config.cache),
        validate_registry(&config.registry),
        validate_observability(&config.observability),
    ]
    .into_iter()
    .filter_map(Result::err)
    .collect();

    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(ValidationError::Multiple(errors)),
    }
}

pub fn validate_store(config: &StoreConfig) -> ValidationResult<()> {
    match config.backend.to_lowercase().as_str() {
        "memory" => Ok(()),
        _ => Err(ValidationError::InvalidBackend(config.backend.clone())),
    }
}

/// Capacity and TTL only matter when the cache is enabled
pub fn validate_cache(config: &CacheConfig) -> ValidationResult<()> {
    if config.enabled {
        if config.max_capacity == 0 {
            return Err(ValidationError::InvalidCacheCapacity(config.max_capacity));
        }

        if config.ttl_seconds == 0 {
            return Err(ValidationError::InvalidCacheTTL(config.ttl_seconds));
        }
    }

    Ok(())
}

pub fn validate_registry(config: &RegistryConfig) -> ValidationResult<()> {
    if config.access_admin_role.trim().is_empty() {
        return Err(ValidationError::EmptyAccessAdminRole);
    }
    Ok(())
}

pub fn validate_observability(config: &ObservabilityConfig) -> ValidationResult<()> {
    match config.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(ValidationError::InvalidLogLevel(config.log_level.clone())),
    }
    match config.log_format.to_lowercase().as_str() {
        "pretty" | "compact" | "json" => Ok(()),
        _ => Err(ValidationError::InvalidLogFormat(config.log_format.clone())),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        let config = Config::default();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_validate_store_unknown_backend() {
        let config = StoreConfig {
            backend: "foundationdb".to_string(),
        };
        assert!(matches!(
            validate_store(&config),
            Err(ValidationError::InvalidBackend(_))
        ));
    }

    #[test]
    fn test_validate_cache_zero_capacity() {
        let config = CacheConfig {
            enabled: true,
            max_capacity: 0,
            ttl_seconds: 300,
        };
        assert!(matches!(
            validate_cache(&config),
            Err(ValidationError::InvalidCacheCapacity(0))
        ));
    }

    #[test]
    fn test_validate_disabled_cache_skips_limits() {
        let config = CacheConfig {
            enabled: false,
            max_capacity: 0,
            ttl_seconds: 0,
        };
        assert!(validate_cache(&config).is_ok());
    }

    #[test]
    fn test_validate_registry_empty_role() {
        let config = RegistryConfig {
            lazy_role_creation: false,
            access_admin_role: "  ".to_string(),
        };
        assert!(matches!(
            validate_registry(&config),
            Err(ValidationError::EmptyAccessAdminRole)
        ));
    }

    #[test]
    fn test_validate_observability() {
        let mut config = ObservabilityConfig::default();
        config.log_level = "verbose".to_string();
        assert!(matches!(
            validate_observability(&config),
            Err(ValidationError::InvalidLogLevel(_))
        ));

        config.log_level = "DEBUG".to_string();
        config.log_format = "xml".to_string();
        assert!(matches!(
            validate_observability(&config),
            Err(ValidationError::InvalidLogFormat(_))
        ));
    }

    #[test]
    fn test_validate_collects_multiple_errors() {
        let mut config = Config::default();
        config.store.backend = "nope".to_string();
        config.cache.ttl_seconds = 0;
        match validate(&config) {
            Err(ValidationError::Multiple(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("expected multiple errors, got {:?}", other),
        }
    }
}
