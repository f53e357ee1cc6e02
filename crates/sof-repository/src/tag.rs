//! Tag records and the per-kind entity tag relations.

use sof_storage::StorageRead;
use sof_types::{EntityId, TagId, TagKind, TagRecord};

use crate::error::RepositoryResult;
use crate::keys;
use crate::relation::{Endpoint, IndexedRelation};
use crate::table::RecordTable;

static TAGS: RecordTable<TagId, TagRecord> = RecordTable::new(keys::TAG_TABLE);

const ENTITY: Endpoint = Endpoint::Record(keys::ENTITY_TABLE);
const TAG: Endpoint = Endpoint::Record(keys::TAG_TABLE);

static PROPERTY_TAGS: IndexedRelation<EntityId, TagId> =
    IndexedRelation::new("property_tags", ENTITY, TAG);
static RESOURCE_TAGS: IndexedRelation<EntityId, TagId> =
    IndexedRelation::new("resource_tags", ENTITY, TAG);
static RELATION_TAGS: IndexedRelation<EntityId, TagId> =
    IndexedRelation::new("relation_tags", ENTITY, TAG);
static SYSTEM_TAGS: IndexedRelation<EntityId, TagId> =
    IndexedRelation::new("system_tags", ENTITY, TAG);

/// Access to the tag table and the entity <-> tag relations
#[derive(Debug, Clone, Copy, Default)]
pub struct TagRepository;

impl TagRepository {
    pub const fn new() -> Self {
        Self
    }

    pub fn records(&self) -> &'static RecordTable<TagId, TagRecord> {
        &TAGS
    }

    /// The relation holding tags of `kind`
    pub fn relation(&self, kind: TagKind) -> &'static IndexedRelation<EntityId, TagId> {
        match kind {
            TagKind::Property => &PROPERTY_TAGS,
            TagKind::ResourceRelation => &RESOURCE_TAGS,
            TagKind::EntityRelation => &RELATION_TAGS,
            TagKind::System => &SYSTEM_TAGS,
        }
    }

    /// The relation a given tag belongs to, selected by the kind in its id
    pub fn relation_for(&self, tag: &TagId) -> &'static IndexedRelation<EntityId, TagId> {
        self.relation(tag.kind())
    }

    pub async fn active<R>(&self, reader: &R, tag: &TagId) -> RepositoryResult<Option<TagRecord>>
    where
        R: StorageRead + ?Sized,
    {
        Ok(TAGS.get(reader, tag).await?.filter(|record| record.exists))
    }

    /// Every tag on `entity`, grouped by kind in [`TagKind::ALL`] order
    pub async fn tags_on<R>(&self, reader: &R, entity: &EntityId) -> RepositoryResult<Vec<TagId>>
    where
        R: StorageRead + ?Sized,
    {
        let mut tags = Vec::new();
        for kind in TagKind::ALL {
            tags.extend(self.relation(kind).elements_of(reader, entity).await?);
        }
        Ok(tags)
    }
}
