//! Stored record shapes
//!
//! Set-valued fields (tag sets, class objects, role members) are not part of
//! these records; they live in indexed relations next to the records.

use serde::{Deserialize, Serialize};

use crate::ids::{EntityId, FunctionSelector, RoleId, SystemId, TagId, TagKind};

/// Which catalog an entity belongs to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// Standalone entity carrying property and resource tags
    #[default]
    Singleton,
    /// Class in the two-level catalog; owns a set of objects
    Class,
    /// Instance in the two-level catalog; belongs to at most one class
    Object,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Singleton => "entity",
            EntityKind::Class => "class",
            EntityKind::Object => "object",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub exists: bool,
    pub kind: EntityKind,
    pub access_role: RoleId,
    /// The single entity-relation tag, if any
    #[serde(default)]
    pub relation_tag: Option<TagId>,
    /// Owning class; only ever set on objects
    #[serde(default)]
    pub class: Option<EntityId>,
}

impl EntityRecord {
    pub fn new(kind: EntityKind, access_role: RoleId, class: Option<EntityId>) -> Self {
        Self {
            exists: true,
            kind,
            access_role,
            relation_tag: None,
            class,
        }
    }

    /// The cleared record left behind by deregistration
    pub fn tombstone(kind: EntityKind) -> Self {
        Self {
            exists: false,
            kind,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRecord {
    pub exists: bool,
    pub kind: TagKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRecord {
    pub exists: bool,
    /// Role whose members administer this one; may be the role itself
    pub admin: RoleId,
}

/// Membership of one account in one role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub is_member: bool,
    /// Position of the account in the role's member array; meaningful only when `is_member`
    pub index: u64,
}

/// Per-target access policy entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessConfig {
    pub configured: bool,
    pub target_system: SystemId,
    pub target_function: FunctionSelector,
    pub access_system: SystemId,
    pub access_function: FunctionSelector,
    pub enforcement: bool,
    /// Bumped on every rewrite; part of every memoized decision key
    #[serde(default)]
    pub revision: u64,
}

impl AccessConfig {
    /// Whether calls to the target must be delegated
    pub fn is_enforced(&self) -> bool {
        self.configured && self.enforcement
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitializedRecord {
    pub initialized: bool,
}
