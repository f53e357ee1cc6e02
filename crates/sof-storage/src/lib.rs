//! # SOF Storage - Storage Abstraction Layer
//!
//! Provides the key-value substrate the registry is persisted in.
//!
//! The registry needs four things from its backend: durable key lookup,
//! ordered range reads (for composite keys and array enumeration), and
//! atomic multi-key writes through [`Transaction`]. Everything above this
//! crate encodes its records into plain byte keys and values.
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                sof-repository                    │
//! │   (key schema, records, indexed relations)       │
//! ├──────────────────────────────────────────────────┤
//! │                 sof-storage                      │
//! │   StorageBackend: get, set, delete, get_range,   │
//! │                   transaction                    │
//! └──────────────────────────────────────────────────┘
//! ```

#![deny(unsafe_code)]

use std::ops::Range;

use async_trait::async_trait;
use thiserror::Error;

pub mod factory;
pub mod memory;

pub use factory::{BackendKind, StorageFactory};
pub use memory::{FaultPlan, MemoryBackend, MemoryTransaction};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Conflict: transaction already finished")]
    Conflict,

    #[error("Injected fault: {message}")]
    Injected { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl StorageError {
    pub fn conflict() -> Self {
        StorageError::Conflict
    }

    pub fn injected(message: impl Into<String>) -> Self {
        StorageError::Injected {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        StorageError::Internal {
            message: message.into(),
        }
    }
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

// ============================================================================
// Storage Traits
// ============================================================================

/// A stored key/value pair returned by range reads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/// Point reads, shared by backends and open transactions
#[async_trait]
pub trait StorageRead: Send + Sync {
    /// Read the value stored under `key`
    async fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>>;
}

/// The abstract storage backend interface
#[async_trait]
pub trait StorageBackend: StorageRead {
    /// Write a single key outside any transaction
    async fn set(&self, key: Vec<u8>, value: Vec<u8>) -> StorageResult<()>;

    /// Delete a single key outside any transaction
    async fn delete(&self, key: &[u8]) -> StorageResult<()>;

    /// Read every pair with `range.start <= key < range.end`, in key order
    async fn get_range(&self, range: Range<Vec<u8>>) -> StorageResult<Vec<KeyValue>>;

    /// Open a transaction; nothing it stages is visible until `commit`
    async fn transaction(&self) -> StorageResult<Box<dyn Transaction>>;
}

/// An atomic multi-key write
///
/// Reads through a transaction observe its own staged writes. Dropping a
/// transaction without committing discards everything it staged.
#[async_trait]
pub trait Transaction: StorageRead {
    fn set(&mut self, key: Vec<u8>, value: Vec<u8>);

    fn delete(&mut self, key: Vec<u8>);

    /// Number of writes staged so far
    fn staged(&self) -> usize;

    /// Apply every staged write at once
    async fn commit(&mut self) -> StorageResult<()>;
}
