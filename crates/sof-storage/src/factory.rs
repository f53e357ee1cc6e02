//! Backend selection by name
//!
//! The registry's configuration names its store as a string; this module maps
//! that name onto a concrete [`StorageBackend`].

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::memory::MemoryBackend;
use crate::{StorageBackend, StorageError, StorageResult};

/// Kinds of store the registry can run on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// Process-local ordered map
    #[default]
    Memory,
}

impl BackendKind {
    /// Every kind accepted by [`StorageFactory::from_name`]
    pub const ALL: &'static [BackendKind] = &[BackendKind::Memory];

    pub fn name(self) -> &'static str {
        match self {
            BackendKind::Memory => "memory",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BackendKind {
    type Err = StorageError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let wanted = name.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| StorageError::internal(format!("no storage backend named `{name}`")))
    }
}

/// Builds shared backend handles
pub struct StorageFactory;

impl StorageFactory {
    pub fn create(kind: BackendKind) -> Arc<dyn StorageBackend> {
        match kind {
            BackendKind::Memory => Arc::new(MemoryBackend::new()),
        }
    }

    /// Resolve a configured backend name and build it
    pub fn from_name(name: &str) -> StorageResult<Arc<dyn StorageBackend>> {
        let kind: BackendKind = name.parse()?;
        tracing::debug!(backend = %kind, "Creating storage backend");
        Ok(Self::create(kind))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_names_are_case_insensitive() {
        for name in ["memory", "Memory", " MEMORY "] {
            assert_eq!(name.parse::<BackendKind>().unwrap(), BackendKind::Memory);
        }
        assert_eq!(BackendKind::default().to_string(), "memory");
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        let err = "postgres".parse::<BackendKind>().unwrap_err();
        assert!(err.to_string().contains("postgres"));
        assert!(StorageFactory::from_name("").is_err());
    }

    #[tokio::test]
    async fn test_factory_builds_usable_store() {
        let store = StorageFactory::from_name("memory").unwrap();
        store.set(b"k".to_vec(), b"v".to_vec()).await.unwrap();
        assert_eq!(store.get(b"k").await.unwrap(), Some(b"v".to_vec()));
    }
}
