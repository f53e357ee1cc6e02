//! Tag registry
//!
//! Tags are typed by the kind prefix in their id and attach to entities
//! through one indexed relation per kind. Each attachment may carry an
//! opaque value. Entity-relation tags are single-valued: attaching a second
//! one to the same entity replaces the first.

use std::sync::Arc;

use sof_repository::{EntityRepository, TagRepository};
use sof_storage::{StorageBackend, Transaction};
use sof_types::{EntityId, EntityRecord, TagId, TagKind, TagRecord};
use tracing::debug;

use crate::error::{RecordKind, RegistryError, Result};

#[derive(Clone)]
pub struct TagRegistry {
    storage: Arc<dyn StorageBackend>,
    repo: TagRepository,
    entities: EntityRepository,
}

impl TagRegistry {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            storage,
            repo: TagRepository::new(),
            entities: EntityRepository::new(),
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn tag_exists(&self, tag: &TagId) -> Result<bool> {
        Ok(self.repo.active(self.storage.as_ref(), tag).await?.is_some())
    }

    /// Every entity carrying `tag`
    pub async fn subjects_with(&self, tag: &TagId) -> Result<Vec<EntityId>> {
        Ok(self
            .repo
            .relation_for(tag)
            .owners_of(self.storage.as_ref(), tag)
            .await?)
    }

    /// Tags of one kind on `subject`
    pub async fn tags_on(&self, subject: &EntityId, kind: TagKind) -> Result<Vec<TagId>> {
        Ok(self
            .repo
            .relation(kind)
            .elements_of(self.storage.as_ref(), subject)
            .await?)
    }

    /// Tags of every kind on `subject`
    pub async fn all_tags_on(&self, subject: &EntityId) -> Result<Vec<TagId>> {
        Ok(self.repo.tags_on(self.storage.as_ref(), subject).await?)
    }

    pub async fn has_tag(&self, subject: &EntityId, tag: &TagId) -> Result<bool> {
        Ok(self
            .repo
            .relation_for(tag)
            .contains(self.storage.as_ref(), subject, tag)
            .await?)
    }

    /// The value stored with an attachment; `None` when unattached or attached without one
    pub async fn tag_value(&self, subject: &EntityId, tag: &TagId) -> Result<Option<Vec<u8>>> {
        Ok(self
            .repo
            .relation_for(tag)
            .link(self.storage.as_ref(), subject, tag)
            .await?
            .and_then(|link| link.value))
    }

    // =========================================================================
    // Transactional operations
    // =========================================================================

    async fn active_subject_in(&self, txn: &dyn Transaction, subject: &EntityId) -> Result<EntityRecord> {
        self.entities
            .active(txn, subject)
            .await?
            .ok_or_else(|| RegistryError::not_found(RecordKind::Entity, subject))
    }

    async fn require_tag_in(&self, txn: &dyn Transaction, tag: &TagId) -> Result<()> {
        match self.repo.active(txn, tag).await? {
            Some(_) => Ok(()),
            None => Err(RegistryError::not_found(RecordKind::Tag, tag)),
        }
    }

    pub(crate) async fn create_in(&self, txn: &mut dyn Transaction, tag: &TagId) -> Result<()> {
        if self.repo.active(&*txn, tag).await?.is_some() {
            return Err(RegistryError::already_exists(RecordKind::Tag, tag));
        }
        self.repo.records().put(
            txn,
            tag,
            &TagRecord {
                exists: true,
                kind: tag.kind(),
            },
        )?;
        debug!(%tag, kind = %tag.kind(), "Tag created");
        Ok(())
    }

    /// Attach `tag` to `subject`. Returns whether the attachment is new; an
    /// existing attachment only has its value overwritten when one is given.
    pub(crate) async fn attach_in(
        &self,
        txn: &mut dyn Transaction,
        tag: &TagId,
        subject: &EntityId,
        value: Option<Vec<u8>>,
    ) -> Result<bool> {
        self.require_tag_in(&*txn, tag).await?;
        let mut record = self.active_subject_in(&*txn, subject).await?;
        let relation = self.repo.relation_for(tag);

        if tag.kind() == TagKind::EntityRelation {
            if let Some(previous) = record.relation_tag.filter(|previous| previous != tag) {
                relation.remove(txn, subject, &previous).await?;
                debug!(%subject, %previous, replacement = %tag, "Entity relation tag replaced");
            }
            if record.relation_tag != Some(*tag) {
                record.relation_tag = Some(*tag);
                self.entities.records().put(txn, subject, &record)?;
            }
        }

        let attached = relation.add(txn, subject, tag, value).await?;
        debug!(%tag, %subject, attached, "Tag attached");
        Ok(attached)
    }

    /// Returns whether an attachment was removed
    pub(crate) async fn detach_in(&self, txn: &mut dyn Transaction, tag: &TagId, subject: &EntityId) -> Result<bool> {
        self.require_tag_in(&*txn, tag).await?;
        let mut record = self.active_subject_in(&*txn, subject).await?;
        let detached = self
            .repo
            .relation_for(tag)
            .remove(txn, subject, tag)
            .await?;

        if record.relation_tag == Some(*tag) {
            record.relation_tag = None;
            self.entities.records().put(txn, subject, &record)?;
        }

        debug!(%tag, %subject, detached, "Tag detached");
        Ok(detached)
    }

    /// Detach every tag of every kind from `subject`
    pub(crate) async fn detach_all_in(&self, txn: &mut dyn Transaction, subject: &EntityId) -> Result<Vec<TagId>> {
        let mut detached = Vec::new();
        for kind in TagKind::ALL {
            detached.extend(self.repo.relation(kind).clear_owner(txn, subject).await?);
        }
        Ok(detached)
    }

    /// Detach `tag` from every subject and deactivate it; returns the former subjects
    pub(crate) async fn delete_in(&self, txn: &mut dyn Transaction, tag: &TagId) -> Result<Vec<EntityId>> {
        self.require_tag_in(&*txn, tag).await?;
        let subjects = self.repo.relation_for(tag).owners_of(&*txn, tag).await?;
        for subject in &subjects {
            self.detach_in(txn, tag, subject).await?;
        }
        self.repo.records().put(
            txn,
            tag,
            &TagRecord {
                exists: false,
                kind: tag.kind(),
            },
        )?;
        debug!(%tag, detached = subjects.len(), "Tag deleted");
        Ok(subjects)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use sof_storage::MemoryBackend;
    use sof_types::{EntityKind, RoleId};

    use super::*;

    async fn setup(entities: &[EntityId], tags: &[TagId]) -> TagRegistry {
        let registry = TagRegistry::new(Arc::new(MemoryBackend::new()));
        let mut txn = registry.storage.transaction().await.unwrap();
        for entity in entities {
            registry
                .entities
                .records()
                .put(
                    txn.as_mut(),
                    entity,
                    &EntityRecord::new(EntityKind::Singleton, RoleId::default(), None),
                )
                .unwrap();
        }
        for tag in tags {
            registry.create_in(txn.as_mut(), tag).await.unwrap();
        }
        txn.commit().await.unwrap();
        registry
    }

    #[tokio::test]
    async fn test_attach_is_idempotent_and_overwrites_value() {
        let e = EntityId::from(1u64);
        let t = TagId::new(TagKind::Property, "colour");
        let registry = setup(&[e], &[t]).await;

        let mut txn = registry.storage.transaction().await.unwrap();
        assert!(registry
            .attach_in(txn.as_mut(), &t, &e, Some(b"red".to_vec()))
            .await
            .unwrap());
        assert!(!registry
            .attach_in(txn.as_mut(), &t, &e, Some(b"blue".to_vec()))
            .await
            .unwrap());
        txn.commit().await.unwrap();

        assert_eq!(registry.tag_value(&e, &t).await.unwrap(), Some(b"blue".to_vec()));
        assert_eq!(registry.tags_on(&e, TagKind::Property).await.unwrap(), vec![t]);
        assert_eq!(registry.subjects_with(&t).await.unwrap(), vec![e]);
    }

    #[tokio::test]
    async fn test_attach_unknown_tag_or_subject() {
        let e = EntityId::from(1u64);
        let t = TagId::new(TagKind::Property, "known");
        let registry = setup(&[e], &[t]).await;

        let mut txn = registry.storage.transaction().await.unwrap();
        let err = registry
            .attach_in(txn.as_mut(), &TagId::new(TagKind::Property, "unknown"), &e, None)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::NotFound { kind: RecordKind::Tag, .. }));

        let err = registry
            .attach_in(txn.as_mut(), &t, &EntityId::from(99u64), None)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::NotFound { kind: RecordKind::Entity, .. }));
    }

    #[tokio::test]
    async fn test_entity_relation_tag_is_single_valued() {
        let e = EntityId::from(1u64);
        let first = TagId::new(TagKind::EntityRelation, "owned_by");
        let second = TagId::new(TagKind::EntityRelation, "docked_at");
        let registry = setup(&[e], &[first, second]).await;

        let mut txn = registry.storage.transaction().await.unwrap();
        registry.attach_in(txn.as_mut(), &first, &e, None).await.unwrap();
        registry.attach_in(txn.as_mut(), &second, &e, None).await.unwrap();
        txn.commit().await.unwrap();

        assert_eq!(
            registry.tags_on(&e, TagKind::EntityRelation).await.unwrap(),
            vec![second]
        );
        assert!(registry.subjects_with(&first).await.unwrap().is_empty());
        let record = registry
            .entities
            .active(registry.storage.as_ref(), &e)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.relation_tag, Some(second));
    }

    #[tokio::test]
    async fn test_delete_tag_cascades() {
        let a = EntityId::from(1u64);
        let b = EntityId::from(2u64);
        let t = TagId::new(TagKind::System, "fuel");
        let keep = TagId::new(TagKind::System, "ammo");
        let registry = setup(&[a, b], &[t, keep]).await;

        let mut txn = registry.storage.transaction().await.unwrap();
        for subject in [a, b] {
            registry.attach_in(txn.as_mut(), &t, &subject, None).await.unwrap();
            registry.attach_in(txn.as_mut(), &keep, &subject, None).await.unwrap();
        }
        let subjects = registry.delete_in(txn.as_mut(), &t).await.unwrap();
        txn.commit().await.unwrap();

        assert_eq!(subjects, vec![a, b]);
        assert!(!registry.tag_exists(&t).await.unwrap());
        assert!(registry.subjects_with(&t).await.unwrap().is_empty());
        assert_eq!(registry.all_tags_on(&a).await.unwrap(), vec![keep]);
        assert_eq!(registry.all_tags_on(&b).await.unwrap(), vec![keep]);
    }
}
