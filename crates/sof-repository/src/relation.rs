//! Bidirectional many-to-many relations with O(1) membership and removal.
//!
//! An [`IndexedRelation`] keeps, for every owner, an array of its elements and,
//! for every element, an array of its owners. A link record per pair stores
//! the pair's position in both arrays, so membership is a single read and
//! removal swaps the last slot into the vacated one.
//!
//! Invariants maintained across every mutation:
//!
//! - `e` is in `elements_of(o)` iff `o` is in `owners_of(e)` iff `link(o, e)` exists
//! - `elements_of(o)[link(o, e).forward_index] == e`
//! - `owners_of(e)[link(o, e).reverse_index] == o`
//! - no duplicates on either side

use std::fmt;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};
use sof_storage::{StorageRead, Transaction};
use tracing::trace;

use crate::error::{RepositoryError, RepositoryResult};
use crate::keys::{self, relation::Side};
use crate::table::{decode, encode, StorageId};

/// How an endpoint's existence is checked before a mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Must have a live record (`exists: true`) in the named table
    Record(&'static str),
    /// Any value is accepted
    Unchecked,
}

/// Position of a pair in both arrays, plus an optional payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub forward_index: u64,
    pub reverse_index: u64,
    #[serde(default)]
    pub value: Option<Vec<u8>>,
}

#[derive(Deserialize)]
struct Presence {
    #[serde(default)]
    exists: bool,
}

pub struct IndexedRelation<O, E> {
    name: &'static str,
    owner: Endpoint,
    element: Endpoint,
    _marker: PhantomData<fn() -> (O, E)>,
}

impl<O, E> fmt::Debug for IndexedRelation<O, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexedRelation")
            .field("name", &self.name)
            .field("owner", &self.owner)
            .field("element", &self.element)
            .finish()
    }
}

impl<O: StorageId, E: StorageId> IndexedRelation<O, E> {
    pub const fn new(name: &'static str, owner: Endpoint, element: Endpoint) -> Self {
        Self {
            name,
            owner,
            element,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn corrupt(&self, detail: impl Into<String>) -> RepositoryError {
        RepositoryError::Corrupt {
            relation: self.name,
            detail: detail.into(),
        }
    }

    async fn ensure_exists<R>(&self, reader: &R, endpoint: Endpoint, id: &str) -> RepositoryResult<()>
    where
        R: StorageRead + ?Sized,
    {
        let Endpoint::Record(table) = endpoint else {
            return Ok(());
        };
        let live = match reader.get(&keys::record::by_id(table, id)).await? {
            Some(bytes) => decode::<Presence>(&bytes)?.exists,
            None => false,
        };
        if live {
            Ok(())
        } else {
            Err(RepositoryError::NotFound(format!("{} {}", table, id)))
        }
    }

    async fn read_len<R>(&self, reader: &R, side: Side, id: &str) -> RepositoryResult<u64>
    where
        R: StorageRead + ?Sized,
    {
        match reader.get(&keys::relation::length(self.name, side, id)).await? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| self.corrupt(format!("bad length record for {}", id)))?;
                Ok(u64::from_le_bytes(raw))
            }
            None => Ok(0),
        }
    }

    fn write_len(&self, txn: &mut dyn Transaction, side: Side, id: &str, len: u64) {
        let key = keys::relation::length(self.name, side, id);
        if len == 0 {
            txn.delete(key);
        } else {
            txn.set(key, len.to_le_bytes().to_vec());
        }
    }

    async fn read_slot<R, T>(&self, reader: &R, side: Side, id: &str, index: u64) -> RepositoryResult<T>
    where
        R: StorageRead + ?Sized,
        T: StorageId,
    {
        match reader
            .get(&keys::relation::slot(self.name, side, id, index))
            .await?
        {
            Some(bytes) => decode(&bytes),
            None => Err(self.corrupt(format!(
                "missing {} slot {} of {}",
                side.as_str(),
                index,
                id
            ))),
        }
    }

    async fn read_array<R, T>(&self, reader: &R, side: Side, id: &str) -> RepositoryResult<Vec<T>>
    where
        R: StorageRead + ?Sized,
        T: StorageId,
    {
        let len = self.read_len(reader, side, id).await?;
        let mut out = Vec::with_capacity(len as usize);
        for index in 0..len {
            out.push(self.read_slot(reader, side, id, index).await?);
        }
        Ok(out)
    }

    /// The link between `owner` and `element`, if they are related
    pub async fn link<R>(&self, reader: &R, owner: &O, element: &E) -> RepositoryResult<Option<Link>>
    where
        R: StorageRead + ?Sized,
    {
        let key = keys::relation::link(self.name, &owner.key_part(), &element.key_part());
        match reader.get(&key).await? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn write_link(&self, txn: &mut dyn Transaction, owner: &str, element: &str, link: &Link) -> RepositoryResult<()> {
        txn.set(keys::relation::link(self.name, owner, element), encode(link)?);
        Ok(())
    }

    /// Relate `owner` and `element`.
    ///
    /// Returns `false` when the pair was already related; a supplied `value`
    /// still overwrites the stored payload in that case.
    pub async fn add(
        &self,
        txn: &mut dyn Transaction,
        owner: &O,
        element: &E,
        value: Option<Vec<u8>>,
    ) -> RepositoryResult<bool> {
        let owner_part = owner.key_part();
        let element_part = element.key_part();
        self.ensure_exists(&*txn, self.owner, &owner_part).await?;
        self.ensure_exists(&*txn, self.element, &element_part).await?;

        if let Some(mut link) = self.link(&*txn, owner, element).await? {
            if value.is_some() {
                link.value = value;
                self.write_link(txn, &owner_part, &element_part, &link)?;
            }
            return Ok(false);
        }

        let forward_index = self.read_len(&*txn, Side::Forward, &owner_part).await?;
        let reverse_index = self.read_len(&*txn, Side::Reverse, &element_part).await?;

        txn.set(
            keys::relation::slot(self.name, Side::Forward, &owner_part, forward_index),
            encode(element)?,
        );
        txn.set(
            keys::relation::slot(self.name, Side::Reverse, &element_part, reverse_index),
            encode(owner)?,
        );
        self.write_len(txn, Side::Forward, &owner_part, forward_index + 1);
        self.write_len(txn, Side::Reverse, &element_part, reverse_index + 1);
        self.write_link(
            txn,
            &owner_part,
            &element_part,
            &Link {
                forward_index,
                reverse_index,
                value,
            },
        )?;

        trace!(relation = self.name, %owner, %element, forward_index, reverse_index, "Linked");
        Ok(true)
    }

    /// Unrelate `owner` and `element`; returns `false` when they were not related
    pub async fn remove(&self, txn: &mut dyn Transaction, owner: &O, element: &E) -> RepositoryResult<bool> {
        let owner_part = owner.key_part();
        let element_part = element.key_part();
        self.ensure_exists(&*txn, self.owner, &owner_part).await?;
        self.ensure_exists(&*txn, self.element, &element_part).await?;

        let Some(link) = self.link(&*txn, owner, element).await? else {
            return Ok(false);
        };

        // Owner's element array: move the last element into the vacated slot
        let forward_len = self.read_len(&*txn, Side::Forward, &owner_part).await?;
        let last = forward_len
            .checked_sub(1)
            .ok_or_else(|| self.corrupt(format!("empty forward array for {}", owner)))?;
        if link.forward_index != last {
            let moved: E = self.read_slot(&*txn, Side::Forward, &owner_part, last).await?;
            let moved_part = moved.key_part();
            let mut moved_link = self
                .link(&*txn, owner, &moved)
                .await?
                .ok_or_else(|| self.corrupt(format!("dangling slot {} -> {}", owner, moved)))?;
            moved_link.forward_index = link.forward_index;
            txn.set(
                keys::relation::slot(self.name, Side::Forward, &owner_part, link.forward_index),
                encode(&moved)?,
            );
            self.write_link(txn, &owner_part, &moved_part, &moved_link)?;
        }
        txn.delete(keys::relation::slot(self.name, Side::Forward, &owner_part, last));
        self.write_len(txn, Side::Forward, &owner_part, last);

        // Element's owner array, same procedure
        let reverse_len = self.read_len(&*txn, Side::Reverse, &element_part).await?;
        let last = reverse_len
            .checked_sub(1)
            .ok_or_else(|| self.corrupt(format!("empty reverse array for {}", element)))?;
        if link.reverse_index != last {
            let moved: O = self.read_slot(&*txn, Side::Reverse, &element_part, last).await?;
            let moved_part = moved.key_part();
            let mut moved_link = self
                .link(&*txn, &moved, element)
                .await?
                .ok_or_else(|| self.corrupt(format!("dangling slot {} <- {}", element, moved)))?;
            moved_link.reverse_index = link.reverse_index;
            txn.set(
                keys::relation::slot(self.name, Side::Reverse, &element_part, link.reverse_index),
                encode(&moved)?,
            );
            self.write_link(txn, &moved_part, &element_part, &moved_link)?;
        }
        txn.delete(keys::relation::slot(self.name, Side::Reverse, &element_part, last));
        self.write_len(txn, Side::Reverse, &element_part, last);

        txn.delete(keys::relation::link(self.name, &owner_part, &element_part));

        trace!(relation = self.name, %owner, %element, "Unlinked");
        Ok(true)
    }

    /// Remove every element of `owner`, returning what was removed
    pub async fn clear_owner(&self, txn: &mut dyn Transaction, owner: &O) -> RepositoryResult<Vec<E>> {
        let elements = self.elements_of(&*txn, owner).await?;
        for element in &elements {
            self.remove(txn, owner, element).await?;
        }
        Ok(elements)
    }

    /// Remove `element` from every owner, returning the former owners
    pub async fn clear_element(&self, txn: &mut dyn Transaction, element: &E) -> RepositoryResult<Vec<O>> {
        let owners = self.owners_of(&*txn, element).await?;
        for owner in &owners {
            self.remove(txn, owner, element).await?;
        }
        Ok(owners)
    }

    pub async fn contains<R>(&self, reader: &R, owner: &O, element: &E) -> RepositoryResult<bool>
    where
        R: StorageRead + ?Sized,
    {
        Ok(self.link(reader, owner, element).await?.is_some())
    }

    /// Elements of `owner` in array order
    pub async fn elements_of<R>(&self, reader: &R, owner: &O) -> RepositoryResult<Vec<E>>
    where
        R: StorageRead + ?Sized,
    {
        self.read_array(reader, Side::Forward, &owner.key_part()).await
    }

    /// Owners of `element` in array order
    pub async fn owners_of<R>(&self, reader: &R, element: &E) -> RepositoryResult<Vec<O>>
    where
        R: StorageRead + ?Sized,
    {
        self.read_array(reader, Side::Reverse, &element.key_part()).await
    }

    pub async fn element_count<R>(&self, reader: &R, owner: &O) -> RepositoryResult<u64>
    where
        R: StorageRead + ?Sized,
    {
        self.read_len(reader, Side::Forward, &owner.key_part()).await
    }

    pub async fn owner_count<R>(&self, reader: &R, element: &E) -> RepositoryResult<u64>
    where
        R: StorageRead + ?Sized,
    {
        self.read_len(reader, Side::Reverse, &element.key_part()).await
    }

    /// Element at `index` of `owner`'s array, `None` past the end
    pub async fn element_at<R>(&self, reader: &R, owner: &O, index: u64) -> RepositoryResult<Option<E>>
    where
        R: StorageRead + ?Sized,
    {
        let owner_part = owner.key_part();
        if index >= self.read_len(reader, Side::Forward, &owner_part).await? {
            return Ok(None);
        }
        Ok(Some(self.read_slot(reader, Side::Forward, &owner_part, index).await?))
    }

    /// Owner at `index` of `element`'s array, `None` past the end
    pub async fn owner_at<R>(&self, reader: &R, element: &E, index: u64) -> RepositoryResult<Option<O>>
    where
        R: StorageRead + ?Sized,
    {
        let element_part = element.key_part();
        if index >= self.read_len(reader, Side::Reverse, &element_part).await? {
            return Ok(None);
        }
        Ok(Some(self.read_slot(reader, Side::Reverse, &element_part, index).await?))
    }
}
