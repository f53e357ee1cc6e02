//! Entity, class and object registry
//!
//! All three kinds share the [`EntityId`] namespace. Singleton entities and
//! classes stand alone; an object belongs to at most one class, and the class
//! lists it in its object set. Every registered id names an access role.

use std::sync::Arc;

use sof_repository::EntityRepository;
use sof_storage::{StorageBackend, Transaction};
use sof_types::{EntityId, EntityKind, EntityRecord, RoleId, TagId, TagKind};
use tracing::debug;

use crate::error::{RecordKind, RegistryError, Result};
use crate::roles::RoleManager;
use crate::tags::TagRegistry;

fn record_kind(kind: EntityKind) -> RecordKind {
    match kind {
        EntityKind::Singleton => RecordKind::Entity,
        EntityKind::Class => RecordKind::Class,
        EntityKind::Object => RecordKind::Object,
    }
}

/// What to register
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub id: EntityId,
    pub kind: EntityKind,
    pub access_role: RoleId,
    /// Owning class; objects only
    pub class: Option<EntityId>,
    pub tags: Vec<TagId>,
}

impl Registration {
    pub fn entity(id: EntityId, access_role: RoleId) -> Self {
        Self {
            id,
            kind: EntityKind::Singleton,
            access_role,
            class: None,
            tags: Vec::new(),
        }
    }

    pub fn class(id: EntityId, access_role: RoleId) -> Self {
        Self {
            kind: EntityKind::Class,
            ..Self::entity(id, access_role)
        }
    }

    pub fn object(id: EntityId, access_role: RoleId, class: Option<EntityId>) -> Self {
        Self {
            kind: EntityKind::Object,
            class,
            ..Self::entity(id, access_role)
        }
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = TagId>) -> Self {
        self.tags.extend(tags);
        self
    }
}

#[derive(Clone)]
pub struct EntityRegistry {
    storage: Arc<dyn StorageBackend>,
    repo: EntityRepository,
    roles: RoleManager,
    tags: TagRegistry,
    lazy_role_creation: bool,
}

impl EntityRegistry {
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        roles: RoleManager,
        tags: TagRegistry,
        lazy_role_creation: bool,
    ) -> Self {
        Self {
            storage,
            repo: EntityRepository::new(),
            roles,
            tags,
            lazy_role_creation,
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// The live record for `id`
    pub async fn entity(&self, id: &EntityId) -> Result<Option<EntityRecord>> {
        Ok(self.repo.active(self.storage.as_ref(), id).await?)
    }

    pub async fn entity_exists(&self, id: &EntityId) -> Result<bool> {
        Ok(self.entity(id).await?.is_some())
    }

    pub async fn access_role_of(&self, id: &EntityId) -> Result<Option<RoleId>> {
        Ok(self.entity(id).await?.map(|record| record.access_role))
    }

    pub async fn tags_of(&self, id: &EntityId, kind: TagKind) -> Result<Vec<TagId>> {
        self.tags.tags_on(id, kind).await
    }

    pub async fn tag_value(&self, id: &EntityId, tag: &TagId) -> Result<Option<Vec<u8>>> {
        self.tags.tag_value(id, tag).await
    }

    pub async fn objects_of(&self, class: &EntityId) -> Result<Vec<EntityId>> {
        Ok(self
            .repo
            .class_objects()
            .elements_of(self.storage.as_ref(), class)
            .await?)
    }

    pub async fn class_of(&self, object: &EntityId) -> Result<Option<EntityId>> {
        Ok(self.entity(object).await?.and_then(|record| record.class))
    }

    // =========================================================================
    // Transactional operations
    // =========================================================================

    async fn active_in(&self, txn: &dyn Transaction, id: &EntityId) -> Result<EntityRecord> {
        self.repo
            .active(txn, id)
            .await?
            .ok_or_else(|| RegistryError::not_found(RecordKind::Entity, id))
    }

    async fn require_class_in(&self, txn: &dyn Transaction, class: &EntityId) -> Result<()> {
        match self.repo.active(txn, class).await? {
            Some(record) if record.kind == EntityKind::Class => Ok(()),
            Some(record) => Err(RegistryError::InvalidStateTransition(format!(
                "{} is a {}, not a class",
                class, record.kind
            ))),
            None => Err(RegistryError::InvalidStateTransition(format!(
                "class {} is not registered",
                class
            ))),
        }
    }

    async fn require_object_in(&self, txn: &dyn Transaction, object: &EntityId) -> Result<EntityRecord> {
        let record = self.active_in(txn, object).await?;
        if record.kind != EntityKind::Object {
            return Err(RegistryError::InvalidStateTransition(format!(
                "{} is a {}, not an object",
                object, record.kind
            )));
        }
        Ok(record)
    }

    /// Ensure `role` is active, creating it self-administered when lazy creation is on
    async fn resolve_role_in(&self, txn: &mut dyn Transaction, role: &RoleId) -> Result<()> {
        if self.roles.exists_in(&*txn, role).await? {
            return Ok(());
        }
        if !self.lazy_role_creation {
            return Err(RegistryError::RoleNotFound(*role));
        }
        self.roles.create_in(txn, role, role).await?;
        debug!(%role, "Access role created lazily");
        Ok(())
    }

    pub(crate) async fn register_in(&self, txn: &mut dyn Transaction, registration: &Registration) -> Result<()> {
        let id = &registration.id;
        if let Some(existing) = self.repo.active(&*txn, id).await? {
            return Err(RegistryError::already_exists(record_kind(existing.kind), id));
        }

        self.resolve_role_in(txn, &registration.access_role).await?;

        let class = match registration.kind {
            EntityKind::Object => registration.class,
            _ => None,
        };
        if let Some(class) = &class {
            self.require_class_in(&*txn, class).await?;
        }

        self.repo.records().put(
            txn,
            id,
            &EntityRecord::new(registration.kind, registration.access_role, class),
        )?;
        if let Some(class) = &class {
            self.repo.class_objects().add(txn, class, id, None).await?;
        }
        for tag in &registration.tags {
            self.tags.attach_in(txn, tag, id, None).await?;
        }

        debug!(
            %id,
            kind = %registration.kind,
            role = %registration.access_role,
            tags = registration.tags.len(),
            "Entity registered"
        );
        Ok(())
    }

    pub(crate) async fn attach_tag_in(
        &self,
        txn: &mut dyn Transaction,
        id: &EntityId,
        tag: &TagId,
        value: Option<Vec<u8>>,
    ) -> Result<bool> {
        self.tags.attach_in(txn, tag, id, value).await
    }

    pub(crate) async fn detach_tag_in(&self, txn: &mut dyn Transaction, id: &EntityId, tag: &TagId) -> Result<bool> {
        self.tags.detach_in(txn, tag, id).await
    }

    /// Move `object` into `class`, leaving its previous class.
    /// Returns `false` when the object already belonged to `class`.
    pub(crate) async fn set_class_in(&self, txn: &mut dyn Transaction, object: &EntityId, class: &EntityId) -> Result<bool> {
        let mut record = self.require_object_in(&*txn, object).await?;
        self.require_class_in(&*txn, class).await?;
        if record.class == Some(*class) {
            return Ok(false);
        }

        if let Some(previous) = record.class {
            self.repo.class_objects().remove(txn, &previous, object).await?;
        }
        self.repo.class_objects().add(txn, class, object, None).await?;
        let previous = record.class.replace(*class);
        self.repo.records().put(txn, object, &record)?;

        debug!(%object, ?previous, %class, "Object re-parented");
        Ok(true)
    }

    /// Detach `object` from its class; returns the class it left
    pub(crate) async fn clear_class_in(&self, txn: &mut dyn Transaction, object: &EntityId) -> Result<Option<EntityId>> {
        let mut record = self.require_object_in(&*txn, object).await?;
        let Some(previous) = record.class.take() else {
            return Ok(None);
        };
        self.repo.class_objects().remove(txn, &previous, object).await?;
        self.repo.records().put(txn, object, &record)?;
        debug!(%object, %previous, "Object detached from class");
        Ok(Some(previous))
    }

    /// Returns the previous access role
    pub(crate) async fn set_access_role_in(&self, txn: &mut dyn Transaction, id: &EntityId, role: &RoleId) -> Result<RoleId> {
        let mut record = self.active_in(&*txn, id).await?;
        self.resolve_role_in(txn, role).await?;
        let previous = std::mem::replace(&mut record.access_role, *role);
        self.repo.records().put(txn, id, &record)?;
        debug!(%id, %previous, %role, "Access role changed");
        Ok(previous)
    }

    /// Detach every tag, unlink class membership, and tombstone the record.
    /// Objects of a deregistered class are orphaned.
    pub(crate) async fn deregister_in(&self, txn: &mut dyn Transaction, id: &EntityId) -> Result<EntityRecord> {
        let record = self.active_in(&*txn, id).await?;

        let tags = self.tags.detach_all_in(txn, id).await?;

        match record.kind {
            EntityKind::Object => {
                if let Some(class) = &record.class {
                    self.repo.class_objects().remove(txn, class, id).await?;
                }
            }
            EntityKind::Class => {
                let objects = self.repo.class_objects().clear_owner(txn, id).await?;
                for object in &objects {
                    if let Some(mut orphan) = self.repo.active(&*txn, object).await? {
                        orphan.class = None;
                        self.repo.records().put(txn, object, &orphan)?;
                    }
                }
                debug!(class = %id, orphaned = objects.len(), "Class objects orphaned");
            }
            EntityKind::Singleton => {}
        }

        self.repo
            .records()
            .put(txn, id, &EntityRecord::tombstone(record.kind))?;

        debug!(%id, kind = %record.kind, tags = tags.len(), "Entity deregistered");
        Ok(record)
    }
}
