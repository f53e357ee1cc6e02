//! In-memory storage backend for testing and development

use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::{
    KeyValue, StorageBackend, StorageError, StorageRead, StorageResult, Transaction,
};

/// A one-shot failure armed on the next transaction opened against a backend
///
/// Used to exercise rollback paths: the transaction fails part-way through,
/// and nothing it staged may become visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPlan {
    /// Fail the first read or commit after `n` writes have been staged
    AfterStagedWrites(usize),
    /// Fail at commit time
    OnCommit,
}

type Map = BTreeMap<Vec<u8>, Vec<u8>>;

/// In-memory ordered key-value store
#[derive(Clone, Default)]
pub struct MemoryBackend {
    data: Arc<RwLock<Map>>,
    fault: Arc<parking_lot::Mutex<Option<FaultPlan>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a fault for the next transaction
    pub fn inject_fault(&self, plan: FaultPlan) {
        *self.fault.lock() = Some(plan);
    }

    /// Disarm any pending fault
    pub fn clear_fault(&self) {
        *self.fault.lock() = None;
    }

    /// Number of stored keys
    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.data.read().await.is_empty()
    }
}

#[async_trait]
impl StorageRead for MemoryBackend {
    async fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.data.read().await.get(key).cloned())
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn set(&self, key: Vec<u8>, value: Vec<u8>) -> StorageResult<()> {
        self.data.write().await.insert(key, value);
        Ok(())
    }

    async fn delete(&self, key: &[u8]) -> StorageResult<()> {
        self.data.write().await.remove(key);
        Ok(())
    }

    async fn get_range(&self, range: Range<Vec<u8>>) -> StorageResult<Vec<KeyValue>> {
        if range.start >= range.end {
            return Ok(Vec::new());
        }
        let data = self.data.read().await;
        Ok(data
            .range(range)
            .map(|(key, value)| KeyValue {
                key: key.clone(),
                value: value.clone(),
            })
            .collect())
    }

    async fn transaction(&self) -> StorageResult<Box<dyn Transaction>> {
        let fault = self.fault.lock().take();
        Ok(Box::new(MemoryTransaction {
            data: Arc::clone(&self.data),
            staged: BTreeMap::new(),
            writes: 0,
            fault,
            finished: false,
        }))
    }
}

/// Transaction over a [`MemoryBackend`]
///
/// Writes are buffered in an overlay and applied under a single write lock on
/// commit, so readers of the backend see either none or all of them.
pub struct MemoryTransaction {
    data: Arc<RwLock<Map>>,
    /// `None` marks a staged delete
    staged: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    writes: usize,
    fault: Option<FaultPlan>,
    finished: bool,
}

impl MemoryTransaction {
    fn check_fault(&mut self, at_commit: bool) -> StorageResult<()> {
        let tripped = match self.fault {
            Some(FaultPlan::AfterStagedWrites(n)) => self.writes >= n,
            Some(FaultPlan::OnCommit) => at_commit,
            None => false,
        };
        if tripped {
            let plan = self.fault.take();
            debug!(?plan, writes = self.writes, "Injected storage fault tripped");
            return Err(StorageError::injected(format!(
                "fault {:?} tripped after {} staged writes",
                plan, self.writes
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageRead for MemoryTransaction {
    async fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        if let Some(FaultPlan::AfterStagedWrites(n)) = self.fault {
            if self.writes >= n {
                return Err(StorageError::injected(format!(
                    "read after {} staged writes",
                    self.writes
                )));
            }
        }
        if let Some(staged) = self.staged.get(key) {
            return Ok(staged.clone());
        }
        Ok(self.data.read().await.get(key).cloned())
    }
}

#[async_trait]
impl Transaction for MemoryTransaction {
    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.staged.insert(key, Some(value));
        self.writes += 1;
    }

    fn delete(&mut self, key: Vec<u8>) {
        self.staged.insert(key, None);
        self.writes += 1;
    }

    fn staged(&self) -> usize {
        self.writes
    }

    async fn commit(&mut self) -> StorageResult<()> {
        if self.finished {
            return Err(StorageError::conflict());
        }
        self.check_fault(true)?;

        let staged = std::mem::take(&mut self.staged);
        let mut data = self.data.write().await;
        for (key, value) in staged {
            match value {
                Some(value) => {
                    data.insert(key, value);
                }
                None => {
                    data.remove(&key);
                }
            }
        }
        self.finished = true;
        Ok(())
    }
}
