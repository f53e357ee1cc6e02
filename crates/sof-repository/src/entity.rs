//! Entity records and class membership.

use sof_storage::StorageRead;
use sof_types::{EntityId, EntityRecord};

use crate::error::RepositoryResult;
use crate::keys;
use crate::relation::{Endpoint, IndexedRelation};
use crate::table::RecordTable;

static ENTITIES: RecordTable<EntityId, EntityRecord> = RecordTable::new(keys::ENTITY_TABLE);

/// Class -> objects
static CLASS_OBJECTS: IndexedRelation<EntityId, EntityId> = IndexedRelation::new(
    "class_objects",
    Endpoint::Record(keys::ENTITY_TABLE),
    Endpoint::Record(keys::ENTITY_TABLE),
);

#[derive(Debug, Clone, Copy, Default)]
pub struct EntityRepository;

impl EntityRepository {
    pub const fn new() -> Self {
        Self
    }

    pub fn records(&self) -> &'static RecordTable<EntityId, EntityRecord> {
        &ENTITIES
    }

    pub fn class_objects(&self) -> &'static IndexedRelation<EntityId, EntityId> {
        &CLASS_OBJECTS
    }

    pub async fn active<R>(&self, reader: &R, entity: &EntityId) -> RepositoryResult<Option<EntityRecord>>
    where
        R: StorageRead + ?Sized,
    {
        Ok(ENTITIES.get(reader, entity).await?.filter(|record| record.exists))
    }
}
