//! # SOF Core - Access-Controlled Registry
//!
//! Registers entities, classes and objects, tags them, and guards every
//! mutation with role-based and delegated access control.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use sof_core::Registry;
//! use sof_storage::MemoryBackend;
//! use sof_types::{Account, EntityId, RoleId};
//!
//! # async fn example() -> sof_core::Result<()> {
//! let registry = Registry::builder().backend(Arc::new(MemoryBackend::new())).build();
//! let owner = Account::from(1);
//! registry.initialize(&owner).await?;
//!
//! let role = RoleId::from_name("smart-gate.admin");
//! registry.create_role(&owner, &role, &role).await?;
//! registry.register_entity(&owner, &EntityId::from(42u64), &role, &[]).await?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

pub mod access;
pub mod entities;
pub mod error;
pub mod providers;
pub mod registry;
pub mod roles;
pub mod systems;
pub mod tags;

pub use access::{AccessControl, DecisionError, DecisionProvider};
pub use entities::{EntityRegistry, Registration};
pub use error::{RecordKind, RegistryError, RegistryErrorCode, Result};
pub use providers::{EntityAccessRoleGate, RoleGate, ENTITY_CONTEXT_FIELD};
pub use registry::{Registry, RegistrySettings};
pub use roles::RoleManager;
pub use systems::Operation;
pub use tags::TagRegistry;
