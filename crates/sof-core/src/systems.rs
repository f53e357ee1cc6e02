//! Registry systems and the operations they expose
//!
//! Every mutating registry call is an [`Operation`] of one system, and is
//! gated as the target `(operation.system(), operation.selector())`.

use sof_const::{
    ACCESS_CONFIG_SYSTEM, ACCESS_NAMESPACE, ENTITY_SYSTEM, ROLE_MANAGEMENT_SYSTEM, SOF_ACCESS_SYSTEM,
    TAG_SYSTEM, WORLD_NAMESPACE,
};
use sof_types::{FunctionSelector, SystemId};

pub fn access_config_system() -> SystemId {
    SystemId::new(WORLD_NAMESPACE, ACCESS_CONFIG_SYSTEM)
}

pub fn role_management_system() -> SystemId {
    SystemId::new(WORLD_NAMESPACE, ROLE_MANAGEMENT_SYSTEM)
}

pub fn entity_system() -> SystemId {
    SystemId::new(WORLD_NAMESPACE, ENTITY_SYSTEM)
}

pub fn tag_system() -> SystemId {
    SystemId::new(WORLD_NAMESPACE, TAG_SYSTEM)
}

/// Home of the built-in decision providers
pub fn sof_access_system() -> SystemId {
    SystemId::new(ACCESS_NAMESPACE, SOF_ACCESS_SYSTEM)
}

/// Every system tracked in the initialization table
pub fn all_systems() -> [SystemId; 5] {
    [
        access_config_system(),
        role_management_system(),
        entity_system(),
        tag_system(),
        sof_access_system(),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    // Role management
    CreateRole,
    GrantRole,
    RevokeRole,
    RenounceRole,
    TransferRoleAdmin,
    DeleteRole,
    // Tags
    CreateTag,
    DeleteTag,
    AttachTag,
    DetachTag,
    // Entities
    RegisterEntity,
    RegisterClass,
    RegisterObject,
    SetClass,
    ClearClass,
    SetAccessRole,
    Deregister,
    // Access configuration
    ConfigureAccess,
    SetEnforcement,
    RemoveAccessConfig,
}

impl Operation {
    pub const ALL: [Operation; 20] = [
        Operation::CreateRole,
        Operation::GrantRole,
        Operation::RevokeRole,
        Operation::RenounceRole,
        Operation::TransferRoleAdmin,
        Operation::DeleteRole,
        Operation::CreateTag,
        Operation::DeleteTag,
        Operation::AttachTag,
        Operation::DetachTag,
        Operation::RegisterEntity,
        Operation::RegisterClass,
        Operation::RegisterObject,
        Operation::SetClass,
        Operation::ClearClass,
        Operation::SetAccessRole,
        Operation::Deregister,
        Operation::ConfigureAccess,
        Operation::SetEnforcement,
        Operation::RemoveAccessConfig,
    ];

    /// The system the operation belongs to
    pub fn system(self) -> SystemId {
        match self {
            Operation::CreateRole
            | Operation::GrantRole
            | Operation::RevokeRole
            | Operation::RenounceRole
            | Operation::TransferRoleAdmin
            | Operation::DeleteRole => role_management_system(),
            Operation::CreateTag | Operation::DeleteTag => tag_system(),
            Operation::AttachTag
            | Operation::DetachTag
            | Operation::RegisterEntity
            | Operation::RegisterClass
            | Operation::RegisterObject
            | Operation::SetClass
            | Operation::ClearClass
            | Operation::SetAccessRole
            | Operation::Deregister => entity_system(),
            Operation::ConfigureAccess | Operation::SetEnforcement | Operation::RemoveAccessConfig => {
                access_config_system()
            }
        }
    }

    /// The signature the selector is derived from
    pub fn signature(self) -> &'static str {
        match self {
            Operation::CreateRole => "create_role(role,admin)",
            Operation::GrantRole => "grant_role(role,account)",
            Operation::RevokeRole => "revoke_role(role,account)",
            Operation::RenounceRole => "renounce_role(role)",
            Operation::TransferRoleAdmin => "transfer_role_admin(role,new_admin)",
            Operation::DeleteRole => "delete_role(role)",
            Operation::CreateTag => "create_tag(tag)",
            Operation::DeleteTag => "delete_tag(tag)",
            Operation::AttachTag => "attach_tag(entity,tag,value)",
            Operation::DetachTag => "detach_tag(entity,tag)",
            Operation::RegisterEntity => "register_entity(entity,access_role,tags)",
            Operation::RegisterClass => "register_class(class,access_role,tags)",
            Operation::RegisterObject => "register_object(object,access_role,class,tags)",
            Operation::SetClass => "set_class(object,class)",
            Operation::ClearClass => "clear_class(object)",
            Operation::SetAccessRole => "set_access_role(entity,role)",
            Operation::Deregister => "deregister(entity)",
            Operation::ConfigureAccess => {
                "configure_access(target_system,target_function,access_system,access_function)"
            }
            Operation::SetEnforcement => "set_enforcement(target_system,target_function,enforcement)",
            Operation::RemoveAccessConfig => "remove_access_config(target_system,target_function)",
        }
    }

    pub fn selector(self) -> FunctionSelector {
        FunctionSelector::from_signature(self.signature())
    }

    /// Short name used in logs
    pub fn name(self) -> &'static str {
        let signature = self.signature();
        match signature.find('(') {
            Some(end) => &signature[..end],
            None => signature,
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_system_ids() {
        assert_eq!(role_management_system().name(), "RoleManagementSy");
        assert_eq!(entity_system().namespace(), "evefrontier");
        assert_eq!(sof_access_system().label(), "sofaccess:SOFAccessSystem");
    }

    #[test]
    fn test_selectors_are_distinct() {
        let selectors: HashSet<_> = Operation::ALL.iter().map(|op| (op.system(), op.selector())).collect();
        assert_eq!(selectors.len(), Operation::ALL.len());
    }

    #[test]
    fn test_operation_name() {
        assert_eq!(Operation::GrantRole.name(), "grant_role");
        assert_eq!(Operation::Deregister.to_string(), "deregister");
        assert_eq!(Operation::SetClass.system(), entity_system());
    }
}
