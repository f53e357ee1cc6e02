//! Access configuration entries, keyed by [`AccessTarget`].

use sof_storage::{StorageBackend, StorageRead, Transaction};
use sof_types::{AccessConfig, AccessTarget, FunctionSelector, SystemId};

use crate::error::RepositoryResult;
use crate::keys;
use crate::table::RecordTable;

static ACCESS_CONFIGS: RecordTable<AccessTarget, AccessConfig> =
    RecordTable::new(keys::ACCESS_CONFIG_TABLE);

#[derive(Debug, Clone, Copy, Default)]
pub struct AccessConfigRepository;

impl AccessConfigRepository {
    pub const fn new() -> Self {
        Self
    }

    /// The entry for a target, configured or not
    pub async fn get<R>(
        &self,
        reader: &R,
        system: &SystemId,
        function: &FunctionSelector,
    ) -> RepositoryResult<Option<AccessConfig>>
    where
        R: StorageRead + ?Sized,
    {
        ACCESS_CONFIGS
            .get(reader, &AccessTarget::of(system, function))
            .await
    }

    /// The entry for a target if it is configured
    pub async fn configured<R>(
        &self,
        reader: &R,
        system: &SystemId,
        function: &FunctionSelector,
    ) -> RepositoryResult<Option<AccessConfig>>
    where
        R: StorageRead + ?Sized,
    {
        Ok(self
            .get(reader, system, function)
            .await?
            .filter(|config| config.configured))
    }

    pub fn put(&self, txn: &mut dyn Transaction, config: &AccessConfig) -> RepositoryResult<()> {
        let target = AccessTarget::of(&config.target_system, &config.target_function);
        ACCESS_CONFIGS.put(txn, &target, config)
    }

    /// Every configured entry
    pub async fn list<S>(&self, backend: &S) -> RepositoryResult<Vec<AccessConfig>>
    where
        S: StorageBackend + ?Sized,
    {
        Ok(ACCESS_CONFIGS
            .scan(backend)
            .await?
            .into_iter()
            .map(|(_, config)| config)
            .filter(|config| config.configured)
            .collect())
    }
}
