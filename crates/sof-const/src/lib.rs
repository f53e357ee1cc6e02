//! # SOF Constants
//!
//! Centralized constants used across the SOF registry crates.
//! This crate provides a single source of truth for magic numbers and strings.

// ============================================================================
// Storage Key Constants
// ============================================================================

/// Prefix for every registry key to enable namespace isolation in a shared backend.
pub const KEY_PREFIX: &str = "sof";

// ============================================================================
// System Namespace Constants
// ============================================================================

/// Namespace holding the registry systems (roles, tags, entities, access config).
///
/// Resource namespaces are truncated to 14 bytes when encoded.
pub const WORLD_NAMESPACE: &str = "evefrontier";

/// Namespace holding the built-in access decision systems.
pub const ACCESS_NAMESPACE: &str = "sofaccess";

/// System names are truncated to 16 bytes when encoded, hence the clipped spellings.
pub const ACCESS_CONFIG_SYSTEM: &str = "AccessConfigSyst";
pub const ROLE_MANAGEMENT_SYSTEM: &str = "RoleManagementSy";
pub const ENTITY_SYSTEM: &str = "EntitySystem";
pub const TAG_SYSTEM: &str = "TagSystem";
pub const SOF_ACCESS_SYSTEM: &str = "SOFAccessSystem";

// ============================================================================
// Role Constants
// ============================================================================

/// Name of the role whose members may rewrite access configuration.
///
/// Created as a self-administered role by registry initialization.
pub const DEFAULT_ACCESS_ADMIN_ROLE: &str = "sof.access.admin";

// ============================================================================
// Cache Constants
// ============================================================================

/// Default maximum number of memoized call-access decisions
pub const DEFAULT_CACHE_CAPACITY: u64 = 10_000;

/// Default lifetime of a memoized call-access decision, in seconds
pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 300;
