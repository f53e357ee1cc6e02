//! The registry facade
//!
//! [`Registry`] is the single entry point for callers. Every mutation is
//! takes the writer lock, is gated by the access evaluator as the target of
//! its [`Operation`], and runs inside one storage transaction. A mutation that
//! fails part-way leaves nothing behind.
//!
//! The gate, the writes and the cache invalidation that follows a commit all
//! happen under the writer lock. Decision providers read committed state and
//! must not call back into registry mutations.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use sof_cache::{AccessCache, CacheStats};
use sof_config::{validation, Config, RegistryConfig};
use sof_const::DEFAULT_ACCESS_ADMIN_ROLE;
use sof_observe::logging::{mutation_span, record_staged_writes};
use sof_repository::SystemRepository;
use sof_storage::{StorageBackend, StorageFactory, Transaction};
use sof_types::{
    AccessConfig, Account, Decision, DecisionRequest, EntityId, EntityKind, EntityRecord, FunctionSelector, RoleId,
    SystemId, TagId,
};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, Instrument, Span};

use crate::access::{AccessControl, DecisionProvider};
use crate::entities::{EntityRegistry, Registration};
use crate::error::{RecordKind, RegistryError, Result};
use crate::providers::{
    access_admin_function, entity_access_role_function, EntityAccessRoleGate, RoleGate, ENTITY_CONTEXT_FIELD,
};
use crate::roles::RoleManager;
use crate::systems::{all_systems, sof_access_system, Operation};
use crate::tags::TagRegistry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrySettings {
    /// Create missing access roles on registration instead of failing
    pub lazy_role_creation: bool,
    /// Members of this role may rewrite access configuration
    pub access_admin_role: RoleId,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            lazy_role_creation: false,
            access_admin_role: RoleId::from_name(DEFAULT_ACCESS_ADMIN_ROLE),
        }
    }
}

impl From<&RegistryConfig> for RegistrySettings {
    fn from(config: &RegistryConfig) -> Self {
        Self {
            lazy_role_creation: config.lazy_role_creation,
            access_admin_role: RoleId::from_name(&config.access_admin_role),
        }
    }
}

/// An open mutation: the writer lock plus the transaction staging its writes.
/// The lock is held until the mutation is dropped, so invalidation done after
/// [`commit`](Self::commit) is still serialized with other mutations.
struct Mutation<'a> {
    _writer: MutexGuard<'a, ()>,
    txn: Box<dyn Transaction>,
    span: Span,
}

impl Mutation<'_> {
    fn txn(&mut self) -> &mut dyn Transaction {
        self.txn.as_mut()
    }

    async fn commit(&mut self) -> Result<()> {
        record_staged_writes(&self.span, self.txn.staged());
        self.txn.commit().instrument(self.span.clone()).await?;
        debug!(parent: &self.span, "Mutation committed");
        Ok(())
    }
}

pub struct Registry {
    storage: Arc<dyn StorageBackend>,
    writer: Mutex<()>,
    systems: SystemRepository,
    roles: RoleManager,
    tags: TagRegistry,
    entities: EntityRegistry,
    access: AccessControl,
    settings: RegistrySettings,
}

#[bon::bon]
impl Registry {
    /// Wire the registry over `backend` and bind the built-in decision providers
    #[builder]
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        #[builder(default)] settings: RegistrySettings,
        cache: Option<Arc<AccessCache>>,
    ) -> Self {
        let roles = RoleManager::new(Arc::clone(&backend));
        let tags = TagRegistry::new(Arc::clone(&backend));
        let entities = EntityRegistry::new(
            Arc::clone(&backend),
            roles.clone(),
            tags.clone(),
            settings.lazy_role_creation,
        );
        let access = AccessControl::new(Arc::clone(&backend), cache);

        access.register_provider(
            sof_access_system(),
            access_admin_function(),
            Arc::new(RoleGate::new(roles.clone(), settings.access_admin_role)),
        );
        access.register_provider(
            sof_access_system(),
            entity_access_role_function(),
            Arc::new(EntityAccessRoleGate::new(entities.clone(), roles.clone())),
        );

        Self {
            storage: backend,
            writer: Mutex::new(()),
            systems: SystemRepository::new(),
            roles,
            tags,
            entities,
            access,
            settings,
        }
    }
}

impl Registry {
    /// Build a registry from loaded configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        validation::validate(config).map_err(|e| RegistryError::InvalidConfig(e.to_string()))?;

        let backend = StorageFactory::from_name(&config.store.backend)?;
        let cache = config.cache.enabled.then(|| {
            Arc::new(AccessCache::new(
                config.cache.max_capacity,
                Duration::from_secs(config.cache.ttl_seconds),
            ))
        });

        Ok(Self::builder()
            .backend(backend)
            .settings(RegistrySettings::from(&config.registry))
            .maybe_cache(cache)
            .build())
    }

    pub fn settings(&self) -> &RegistrySettings {
        &self.settings
    }

    pub fn roles(&self) -> &RoleManager {
        &self.roles
    }

    pub fn tags(&self) -> &TagRegistry {
        &self.tags
    }

    pub fn entities(&self) -> &EntityRegistry {
        &self.entities
    }

    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Mark every registry system initialized and create the access-admin
    /// role with `owner` as its first member. Runs once per store.
    pub async fn initialize(&self, owner: &Account) -> Result<()> {
        let _writer = self.writer.lock().await;
        let span = mutation_span("initialize", &owner.to_string());
        let mut txn = self.storage.transaction().await?;

        for system in all_systems() {
            if self.systems.is_initialized(txn.as_ref(), &system).await? {
                return Err(RegistryError::already_exists(RecordKind::System, system.label()));
            }
            self.systems.mark_initialized(txn.as_mut(), &system)?;
        }
        self.roles
            .bootstrap_in(txn.as_mut(), &self.settings.access_admin_role, owner)
            .await?;

        record_staged_writes(&span, txn.staged());
        txn.commit().instrument(span).await?;

        info!(%owner, admin_role = %self.settings.access_admin_role, "Registry initialized");
        Ok(())
    }

    pub async fn is_initialized(&self, system: &SystemId) -> Result<bool> {
        Ok(self
            .systems
            .is_initialized(self.storage.as_ref(), system)
            .await?)
    }

    // =========================================================================
    // Access gate
    // =========================================================================

    /// Decide whether `caller` may call `(system, function)` with `context`
    pub async fn check_access(
        &self,
        caller: &Account,
        system: &SystemId,
        function: &FunctionSelector,
        context: Option<Value>,
    ) -> Result<Decision> {
        self.access
            .evaluate(&DecisionRequest {
                caller: *caller,
                target_system: *system,
                target_function: *function,
                context,
            })
            .await
    }

    /// [`check_access`](Self::check_access), failing with `AccessDenied` on a denial
    pub async fn enforce_access(
        &self,
        caller: &Account,
        system: &SystemId,
        function: &FunctionSelector,
        context: Option<Value>,
    ) -> Result<()> {
        self.access
            .enforce(&DecisionRequest {
                caller: *caller,
                target_system: *system,
                target_function: *function,
                context,
            })
            .await
    }

    pub fn register_provider(
        &self,
        access_system: SystemId,
        access_function: FunctionSelector,
        provider: Arc<dyn DecisionProvider>,
    ) {
        self.access
            .register_provider(access_system, access_function, provider);
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.access.cache_stats()
    }

    /// Take the writer lock, gate `operation`, then open its transaction
    async fn begin(&self, caller: &Account, operation: Operation, context: Value) -> Result<Mutation<'_>> {
        let writer = self.writer.lock().await;
        self.access
            .enforce(&DecisionRequest {
                caller: *caller,
                target_system: operation.system(),
                target_function: operation.selector(),
                context: Some(context),
            })
            .await?;

        let txn = self.storage.transaction().await?;
        Ok(Mutation {
            _writer: writer,
            txn,
            span: mutation_span(operation.name(), &caller.to_string()),
        })
    }

    // =========================================================================
    // Roles
    // =========================================================================

    /// A self-administered role gets `caller` as its first member
    pub async fn create_role(&self, caller: &Account, role: &RoleId, admin: &RoleId) -> Result<()> {
        let mut mutation = self
            .begin(caller, Operation::CreateRole, json!({ "role": role, "admin": admin }))
            .await?;
        self.roles.create_by_in(mutation.txn(), caller, role, admin).await?;
        mutation.commit().await?;

        if role == admin {
            self.access.invalidate_caller(caller).await;
        }
        Ok(())
    }

    /// Returns whether the membership is new
    pub async fn grant_role(&self, caller: &Account, role: &RoleId, account: &Account) -> Result<bool> {
        let mut mutation = self
            .begin(caller, Operation::GrantRole, json!({ "role": role, "account": account }))
            .await?;
        let granted = self.roles.grant_in(mutation.txn(), caller, role, account).await?;
        mutation.commit().await?;

        if granted {
            self.access.invalidate_caller(account).await;
        }
        Ok(granted)
    }

    /// Returns whether a membership was removed
    pub async fn revoke_role(&self, caller: &Account, role: &RoleId, account: &Account) -> Result<bool> {
        let mut mutation = self
            .begin(caller, Operation::RevokeRole, json!({ "role": role, "account": account }))
            .await?;
        let revoked = self.roles.revoke_in(mutation.txn(), caller, role, account).await?;
        mutation.commit().await?;

        if revoked {
            self.access.invalidate_caller(account).await;
        }
        Ok(revoked)
    }

    pub async fn renounce_role(&self, caller: &Account, role: &RoleId) -> Result<bool> {
        let mut mutation = self
            .begin(caller, Operation::RenounceRole, json!({ "role": role }))
            .await?;
        let renounced = self.roles.renounce_in(mutation.txn(), role, caller).await?;
        mutation.commit().await?;

        if renounced {
            self.access.invalidate_caller(caller).await;
        }
        Ok(renounced)
    }

    /// Returns the previous admin role
    pub async fn transfer_role_admin(&self, caller: &Account, role: &RoleId, new_admin: &RoleId) -> Result<RoleId> {
        let mut mutation = self
            .begin(
                caller,
                Operation::TransferRoleAdmin,
                json!({ "role": role, "new_admin": new_admin }),
            )
            .await?;
        let previous = self
            .roles
            .transfer_admin_in(mutation.txn(), caller, role, new_admin)
            .await?;
        mutation.commit().await?;
        Ok(previous)
    }

    /// Returns the accounts that lost the role
    pub async fn delete_role(&self, caller: &Account, role: &RoleId) -> Result<Vec<Account>> {
        let mut mutation = self
            .begin(caller, Operation::DeleteRole, json!({ "role": role }))
            .await?;
        let members = self.roles.delete_in(mutation.txn(), caller, role).await?;
        mutation.commit().await?;

        for member in &members {
            self.access.invalidate_caller(member).await;
        }
        Ok(members)
    }

    pub async fn has_role(&self, role: &RoleId, account: &Account) -> Result<bool> {
        self.roles.has_role(role, account).await
    }

    pub async fn role_exists(&self, role: &RoleId) -> Result<bool> {
        self.roles.role_exists(role).await
    }

    pub async fn role_admin(&self, role: &RoleId) -> Result<Option<RoleId>> {
        self.roles.role_admin(role).await
    }

    pub async fn role_members(&self, role: &RoleId) -> Result<Vec<Account>> {
        self.roles.members(role).await
    }

    // =========================================================================
    // Tags
    // =========================================================================

    pub async fn create_tag(&self, caller: &Account, tag: &TagId) -> Result<()> {
        let mut mutation = self
            .begin(caller, Operation::CreateTag, json!({ "tag": tag }))
            .await?;
        self.tags.create_in(mutation.txn(), tag).await?;
        mutation.commit().await?;
        Ok(())
    }

    /// Detaches the tag everywhere; returns the entities that carried it
    pub async fn delete_tag(&self, caller: &Account, tag: &TagId) -> Result<Vec<EntityId>> {
        let mut mutation = self
            .begin(caller, Operation::DeleteTag, json!({ "tag": tag }))
            .await?;
        let subjects = self.tags.delete_in(mutation.txn(), tag).await?;
        mutation.commit().await?;
        Ok(subjects)
    }

    /// Returns whether the tag was newly attached
    pub async fn attach_tag(
        &self,
        caller: &Account,
        entity: &EntityId,
        tag: &TagId,
        value: Option<Vec<u8>>,
    ) -> Result<bool> {
        let mut mutation = self
            .begin(caller, Operation::AttachTag, entity_context(entity, json!({ "tag": tag })))
            .await?;
        let attached = self
            .entities
            .attach_tag_in(mutation.txn(), entity, tag, value)
            .await?;
        mutation.commit().await?;
        Ok(attached)
    }

    pub async fn detach_tag(&self, caller: &Account, entity: &EntityId, tag: &TagId) -> Result<bool> {
        let mut mutation = self
            .begin(caller, Operation::DetachTag, entity_context(entity, json!({ "tag": tag })))
            .await?;
        let detached = self.entities.detach_tag_in(mutation.txn(), entity, tag).await?;
        mutation.commit().await?;
        Ok(detached)
    }

    // =========================================================================
    // Entities
    // =========================================================================

    pub async fn register(&self, caller: &Account, registration: &Registration) -> Result<()> {
        let operation = match registration.kind {
            EntityKind::Singleton => Operation::RegisterEntity,
            EntityKind::Class => Operation::RegisterClass,
            EntityKind::Object => Operation::RegisterObject,
        };
        let context = entity_context(
            &registration.id,
            json!({
                "access_role": registration.access_role,
                "class": registration.class,
                "tags": registration.tags,
            }),
        );
        let mut mutation = self.begin(caller, operation, context).await?;
        self.entities.register_in(mutation.txn(), registration).await?;
        mutation.commit().await?;
        Ok(())
    }

    pub async fn register_entity(
        &self,
        caller: &Account,
        id: &EntityId,
        access_role: &RoleId,
        tags: &[TagId],
    ) -> Result<()> {
        self.register(
            caller,
            &Registration::entity(*id, *access_role).with_tags(tags.iter().copied()),
        )
        .await
    }

    pub async fn register_class(
        &self,
        caller: &Account,
        id: &EntityId,
        access_role: &RoleId,
        tags: &[TagId],
    ) -> Result<()> {
        self.register(
            caller,
            &Registration::class(*id, *access_role).with_tags(tags.iter().copied()),
        )
        .await
    }

    pub async fn register_object(
        &self,
        caller: &Account,
        id: &EntityId,
        access_role: &RoleId,
        class: Option<&EntityId>,
        tags: &[TagId],
    ) -> Result<()> {
        self.register(
            caller,
            &Registration::object(*id, *access_role, class.copied()).with_tags(tags.iter().copied()),
        )
        .await
    }

    /// Returns `false` when the object already belonged to `class`
    pub async fn set_class(&self, caller: &Account, object: &EntityId, class: &EntityId) -> Result<bool> {
        let mut mutation = self
            .begin(caller, Operation::SetClass, entity_context(object, json!({ "class": class })))
            .await?;
        let moved = self.entities.set_class_in(mutation.txn(), object, class).await?;
        mutation.commit().await?;
        Ok(moved)
    }

    /// Returns the class the object left
    pub async fn clear_class(&self, caller: &Account, object: &EntityId) -> Result<Option<EntityId>> {
        let mut mutation = self
            .begin(caller, Operation::ClearClass, entity_context(object, json!({})))
            .await?;
        let previous = self.entities.clear_class_in(mutation.txn(), object).await?;
        mutation.commit().await?;
        Ok(previous)
    }

    /// Returns the previous access role
    pub async fn set_access_role(&self, caller: &Account, id: &EntityId, role: &RoleId) -> Result<RoleId> {
        let mut mutation = self
            .begin(caller, Operation::SetAccessRole, entity_context(id, json!({ "role": role })))
            .await?;
        let previous = self.entities.set_access_role_in(mutation.txn(), id, role).await?;
        mutation.commit().await?;

        // Entity-scoped decisions may hinge on the old role
        self.access.invalidate_all().await;
        Ok(previous)
    }

    /// Returns the record as it was before deregistration
    pub async fn deregister(&self, caller: &Account, id: &EntityId) -> Result<EntityRecord> {
        let mut mutation = self
            .begin(caller, Operation::Deregister, entity_context(id, json!({})))
            .await?;
        let record = self.entities.deregister_in(mutation.txn(), id).await?;
        mutation.commit().await?;

        self.access.invalidate_all().await;
        Ok(record)
    }

    pub async fn entity(&self, id: &EntityId) -> Result<Option<EntityRecord>> {
        self.entities.entity(id).await
    }

    pub async fn entity_exists(&self, id: &EntityId) -> Result<bool> {
        self.entities.entity_exists(id).await
    }

    pub async fn objects_of(&self, class: &EntityId) -> Result<Vec<EntityId>> {
        self.entities.objects_of(class).await
    }

    pub async fn tags_of(&self, id: &EntityId) -> Result<Vec<TagId>> {
        self.tags.all_tags_on(id).await
    }

    pub async fn entities_tagged(&self, tag: &TagId) -> Result<Vec<EntityId>> {
        self.tags.subjects_with(tag).await
    }

    // =========================================================================
    // Access configuration
    // =========================================================================

    async fn begin_admin(&self, caller: &Account, operation: Operation, context: Value) -> Result<Mutation<'_>> {
        let mutation = self.begin(caller, operation, context).await?;
        self.roles
            .require_member_in(mutation.txn.as_ref(), &self.settings.access_admin_role, caller)
            .await?;
        Ok(mutation)
    }

    /// Point a target at a decision system. New entries start unenforced.
    pub async fn configure_access(
        &self,
        caller: &Account,
        target_system: &SystemId,
        target_function: &FunctionSelector,
        access_system: &SystemId,
        access_function: &FunctionSelector,
    ) -> Result<AccessConfig> {
        let context = json!({
            "target_system": target_system,
            "target_function": target_function,
            "access_system": access_system,
            "access_function": access_function,
        });
        let mut mutation = self
            .begin_admin(caller, Operation::ConfigureAccess, context)
            .await?;
        let config = self
            .access
            .configure_in(
                mutation.txn(),
                target_system,
                target_function,
                access_system,
                access_function,
            )
            .await?;
        mutation.commit().await?;

        self.access
            .invalidate_target(target_system, target_function)
            .await;
        Ok(config)
    }

    pub async fn set_enforcement(
        &self,
        caller: &Account,
        target_system: &SystemId,
        target_function: &FunctionSelector,
        enforcement: bool,
    ) -> Result<AccessConfig> {
        let context = json!({
            "target_system": target_system,
            "target_function": target_function,
            "enforcement": enforcement,
        });
        let mut mutation = self
            .begin_admin(caller, Operation::SetEnforcement, context)
            .await?;
        let config = self
            .access
            .set_enforcement_in(mutation.txn(), target_system, target_function, enforcement)
            .await?;
        mutation.commit().await?;

        self.access
            .invalidate_target(target_system, target_function)
            .await;
        Ok(config)
    }

    pub async fn remove_access_config(
        &self,
        caller: &Account,
        target_system: &SystemId,
        target_function: &FunctionSelector,
    ) -> Result<AccessConfig> {
        let context = json!({
            "target_system": target_system,
            "target_function": target_function,
        });
        let mut mutation = self
            .begin_admin(caller, Operation::RemoveAccessConfig, context)
            .await?;
        let config = self
            .access
            .remove_config_in(mutation.txn(), target_system, target_function)
            .await?;
        mutation.commit().await?;

        self.access
            .invalidate_target(target_system, target_function)
            .await;
        Ok(config)
    }

    pub async fn access_config(
        &self,
        target_system: &SystemId,
        target_function: &FunctionSelector,
    ) -> Result<Option<AccessConfig>> {
        self.access.access_config(target_system, target_function).await
    }
}

/// Call context naming the entity an operation acts on
fn entity_context(entity: &EntityId, mut extra: Value) -> Value {
    if let Value::Object(fields) = &mut extra {
        fields.insert(ENTITY_CONTEXT_FIELD.to_string(), Value::String(entity.to_string()));
    }
    extra
}
