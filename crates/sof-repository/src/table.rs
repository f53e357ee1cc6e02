//! Typed record tables over the raw key-value backend.

use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sof_storage::{StorageBackend, StorageRead, Transaction};
use sof_types::{AccessTarget, Account, EntityId, RoleId, SystemId, TagId};

use crate::error::{RepositoryError, RepositoryResult};
use crate::keys;

/// An identifier usable as a key segment
pub trait StorageId:
    Copy + Eq + fmt::Debug + fmt::Display + FromStr + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// The segment written into keys; lowercase hex without `0x`
    fn key_part(&self) -> String;
}

macro_rules! storage_id {
    ($($ty:ty),* $(,)?) => {
        $(
            impl StorageId for $ty {
                fn key_part(&self) -> String {
                    self.to_hex()
                }
            }
        )*
    };
}

storage_id!(EntityId, RoleId, TagId, Account, SystemId, AccessTarget);

pub(crate) fn encode<T: Serialize>(value: &T) -> RepositoryResult<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> RepositoryResult<T> {
    Ok(serde_json::from_slice(bytes)?)
}

/// A table of serde records keyed by `K`
///
/// Records are stored as JSON under `sof:{table}:{id}`.
pub struct RecordTable<K, V> {
    name: &'static str,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> fmt::Debug for RecordTable<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordTable").field("name", &self.name).finish()
    }
}

impl<K: StorageId, V: Serialize + DeserializeOwned> RecordTable<K, V> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn key(&self, id: &K) -> Vec<u8> {
        keys::record::by_id(self.name, &id.key_part())
    }

    /// Read the record stored for `id`, if any
    pub async fn get<R>(&self, reader: &R, id: &K) -> RepositoryResult<Option<V>>
    where
        R: StorageRead + ?Sized,
    {
        match reader.get(&self.key(id)).await? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Stage a write of the record for `id`
    pub fn put(&self, txn: &mut dyn Transaction, id: &K, record: &V) -> RepositoryResult<()> {
        txn.set(self.key(id), encode(record)?);
        Ok(())
    }

    /// Stage removal of the record for `id`
    pub fn remove(&self, txn: &mut dyn Transaction, id: &K) {
        txn.delete(self.key(id));
    }

    /// Every stored record, in key order
    pub async fn scan<S>(&self, backend: &S) -> RepositoryResult<Vec<(K, V)>>
    where
        S: StorageBackend + ?Sized,
    {
        let prefix = keys::record::table_prefix(self.name);
        let entries = backend
            .get_range(prefix.clone()..keys::record::table_end(self.name))
            .await?;

        let mut records = Vec::with_capacity(entries.len());
        for entry in entries {
            let suffix = std::str::from_utf8(&entry.key[prefix.len()..])
                .map_err(|e| RepositoryError::Serialization(e.to_string()))?;
            let id = K::from_str(suffix).map_err(|_| {
                RepositoryError::Serialization(format!("bad {} key: {}", self.name, suffix))
            })?;
            records.push((id, decode(&entry.value)?));
        }
        Ok(records)
    }
}
