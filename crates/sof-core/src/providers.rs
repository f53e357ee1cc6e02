//! Built-in decision providers

use async_trait::async_trait;
use sof_types::{DecisionRequest, EntityId, FunctionSelector, RoleId};

use crate::access::{DecisionError, DecisionProvider};
use crate::entities::EntityRegistry;
use crate::roles::RoleManager;

/// Selector of the access-admin [`RoleGate`] in the SOF access system
pub fn access_admin_function() -> FunctionSelector {
    FunctionSelector::from_signature("access_admin(caller)")
}

/// Selector of the [`EntityAccessRoleGate`] in the SOF access system
pub fn entity_access_role_function() -> FunctionSelector {
    FunctionSelector::from_signature("entity_access_role(caller,entity_id)")
}

/// Allows callers holding a fixed role
#[derive(Clone)]
pub struct RoleGate {
    roles: RoleManager,
    role: RoleId,
}

impl RoleGate {
    pub fn new(roles: RoleManager, role: RoleId) -> Self {
        Self { roles, role }
    }
}

#[async_trait]
impl DecisionProvider for RoleGate {
    async fn decide(&self, request: &DecisionRequest) -> Result<bool, DecisionError> {
        Ok(self.roles.has_role(&self.role, &request.caller).await?)
    }
}

/// Allows callers holding the access role of the entity named by the
/// `entity_id` field of the call context
#[derive(Clone)]
pub struct EntityAccessRoleGate {
    entities: EntityRegistry,
    roles: RoleManager,
}

/// Context field naming the entity a call operates on
pub const ENTITY_CONTEXT_FIELD: &str = "entity_id";

impl EntityAccessRoleGate {
    pub fn new(entities: EntityRegistry, roles: RoleManager) -> Self {
        Self { entities, roles }
    }

    fn entity_of(request: &DecisionRequest) -> Result<EntityId, DecisionError> {
        let raw = request
            .context
            .as_ref()
            .and_then(|context| context.get(ENTITY_CONTEXT_FIELD))
            .ok_or(DecisionError::MissingContext(ENTITY_CONTEXT_FIELD))?;
        let raw = raw
            .as_str()
            .ok_or_else(|| DecisionError::InvalidContext(format!("{} is not a string", ENTITY_CONTEXT_FIELD)))?;
        raw.parse()
            .map_err(|e| DecisionError::InvalidContext(format!("{}: {}", ENTITY_CONTEXT_FIELD, e)))
    }
}

#[async_trait]
impl DecisionProvider for EntityAccessRoleGate {
    async fn decide(&self, request: &DecisionRequest) -> Result<bool, DecisionError> {
        let entity = Self::entity_of(request)?;
        // Unknown entities fail the decision; failures are never memoized
        let role = self
            .entities
            .access_role_of(&entity)
            .await?
            .ok_or_else(|| DecisionError::InvalidContext(format!("entity {} is not registered", entity)))?;
        Ok(self.roles.has_role(&role, &request.caller).await?)
    }
}
