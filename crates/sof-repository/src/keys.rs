//! Key encoding utilities for registry storage.
//!
//! Every key follows a hierarchical schema under [`KEY_PREFIX`]:
//!
//! - `sof:{table}:{id}` - Record by ID (roles, tags, entities, access configs, systems)
//! - `sof:rel:{name}:fwd:{owner}:len` - Number of elements held by an owner
//! - `sof:rel:{name}:fwd:{owner}:{index}` - Element at a position of the owner's array
//! - `sof:rel:{name}:rev:{element}:len` - Number of owners holding an element
//! - `sof:rel:{name}:rev:{element}:{index}` - Owner at a position of the element's array
//! - `sof:rel:{name}:link:{owner}:{element}` - Link record with both array positions
//!
//! IDs are lowercase hex without a `0x` prefix, so they never contain `:` or `~`.

pub use sof_const::KEY_PREFIX;

/// Table holding [`sof_types::RoleRecord`]s
pub const ROLE_TABLE: &str = "role";
/// Table holding [`sof_types::TagRecord`]s
pub const TAG_TABLE: &str = "tag";
/// Table holding [`sof_types::EntityRecord`]s
pub const ENTITY_TABLE: &str = "entity";
/// Table holding [`sof_types::AccessConfig`]s keyed by access target
pub const ACCESS_CONFIG_TABLE: &str = "access";
/// Table holding [`sof_types::InitializedRecord`]s keyed by system
pub const INITIALIZED_TABLE: &str = "initialized";

/// Key builders for record tables.
pub mod record {
    use super::KEY_PREFIX;

    /// Build key for a record by ID.
    ///
    /// Schema: `sof:{table}:{id}`
    #[inline]
    pub fn by_id(table: &str, id: &str) -> Vec<u8> {
        format!("{}:{}:{}", KEY_PREFIX, table, id).into_bytes()
    }

    /// Build prefix for scanning a whole table.
    ///
    /// Schema: `sof:{table}:`
    #[inline]
    pub fn table_prefix(table: &str) -> Vec<u8> {
        format!("{}:{}:", KEY_PREFIX, table).into_bytes()
    }

    /// Build the end key for scanning a whole table.
    ///
    /// Uses `~` (0x7E) as the terminator since it sorts after all alphanumeric characters.
    #[inline]
    pub fn table_end(table: &str) -> Vec<u8> {
        format!("{}:{}~", KEY_PREFIX, table).into_bytes()
    }
}

/// Key builders for indexed relations.
pub mod relation {
    use super::KEY_PREFIX;

    /// Which array of a relation a key addresses.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Side {
        /// Elements held by an owner
        Forward,
        /// Owners holding an element
        Reverse,
    }

    impl Side {
        pub fn as_str(self) -> &'static str {
            match self {
                Side::Forward => "fwd",
                Side::Reverse => "rev",
            }
        }
    }

    /// Build key for the length of one array.
    ///
    /// Schema: `sof:rel:{name}:{side}:{id}:len`
    #[inline]
    pub fn length(name: &str, side: Side, id: &str) -> Vec<u8> {
        format!("{}:rel:{}:{}:{}:len", KEY_PREFIX, name, side.as_str(), id).into_bytes()
    }

    /// Build key for one position of an array.
    ///
    /// Schema: `sof:rel:{name}:{side}:{id}:{index}`
    ///
    /// The index is zero-padded to 20 digits so slots sort numerically.
    #[inline]
    pub fn slot(name: &str, side: Side, id: &str, index: u64) -> Vec<u8> {
        format!(
            "{}:rel:{}:{}:{}:{:020}",
            KEY_PREFIX,
            name,
            side.as_str(),
            id,
            index
        )
        .into_bytes()
    }

    /// Build key for the link between an owner and an element.
    ///
    /// Schema: `sof:rel:{name}:link:{owner}:{element}`
    #[inline]
    pub fn link(name: &str, owner: &str, element: &str) -> Vec<u8> {
        format!("{}:rel:{}:link:{}:{}", KEY_PREFIX, name, owner, element).into_bytes()
    }
}
