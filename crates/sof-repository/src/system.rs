//! Per-system initialization markers.

use sof_storage::{StorageRead, Transaction};
use sof_types::{InitializedRecord, SystemId};

use crate::error::RepositoryResult;
use crate::keys;
use crate::table::RecordTable;

static INITIALIZED: RecordTable<SystemId, InitializedRecord> =
    RecordTable::new(keys::INITIALIZED_TABLE);

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRepository;

impl SystemRepository {
    pub const fn new() -> Self {
        Self
    }

    pub async fn is_initialized<R>(&self, reader: &R, system: &SystemId) -> RepositoryResult<bool>
    where
        R: StorageRead + ?Sized,
    {
        Ok(INITIALIZED
            .get(reader, system)
            .await?
            .is_some_and(|record| record.initialized))
    }

    pub fn mark_initialized(&self, txn: &mut dyn Transaction, system: &SystemId) -> RepositoryResult<()> {
        INITIALIZED.put(txn, system, &InitializedRecord { initialized: true })
    }
}
