//! # SOF Repository
//!
//! Typed persistence for the registry on top of [`sof_storage`].
//!
//! Records live in [`RecordTable`]s; every set-valued field (role members,
//! tags of an entity, objects of a class) lives in an [`IndexedRelation`],
//! which keeps both directions of a many-to-many relation with constant-time
//! membership and removal.
//!
//! Mutations take a `&mut dyn Transaction` and only stage writes; callers
//! commit. Reads accept anything implementing [`StorageRead`], so the same
//! query runs against a backend or against an open transaction.
//!
//! [`StorageRead`]: sof_storage::StorageRead

#![deny(unsafe_code)]

pub mod access;
pub mod entity;
pub mod error;
pub mod keys;
pub mod relation;
pub mod role;
pub mod system;
pub mod table;
pub mod tag;

pub use access::AccessConfigRepository;
pub use entity::EntityRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use relation::{Endpoint, IndexedRelation, Link};
pub use role::RoleRepository;
pub use system::SystemRepository;
pub use table::{RecordTable, StorageId};
pub use tag::TagRepository;
