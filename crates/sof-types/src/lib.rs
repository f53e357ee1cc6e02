//! # SOF Types
//!
//! Shared type definitions for the SOF registry.
//!
//! This crate provides the identifiers, stored records and decision types used
//! across the registry crates, ensuring a single source of truth and
//! preventing circular dependencies.

use serde::{Deserialize, Serialize};

pub mod ids;
pub mod records;

pub use ids::{
    Account, AccessTarget, EntityId, FunctionSelector, IdParseError, RoleId, SystemId, TagId,
    TagKind,
};
pub use records::{
    AccessConfig, EntityKind, EntityRecord, InitializedRecord, Membership, RoleRecord, TagRecord,
};

// ============================================================================
// Decision Types
// ============================================================================

/// The result of an access evaluation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn from_allowed(allowed: bool) -> Self {
        if allowed {
            Decision::Allow
        } else {
            Decision::Deny
        }
    }

    pub fn is_allowed(self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Decision::Allow => "allow",
            Decision::Deny => "deny",
        }
    }
}

/// What a decision system is asked to rule on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub caller: Account,
    pub target_system: SystemId,
    pub target_function: FunctionSelector,
    /// Arguments of the gated call, shaped by the calling system
    pub context: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_from_allowed() {
        assert_eq!(Decision::from_allowed(true), Decision::Allow);
        assert_eq!(Decision::from_allowed(false), Decision::Deny);
        assert!(Decision::Allow.is_allowed());
        assert_eq!(Decision::Deny.as_str(), "deny");
    }
}
