//! Fixed-width identifiers
//!
//! Every identifier is a fixed-size byte string rendered as `0x`-prefixed
//! lowercase hex. The hex form is also the serialized form, so identifiers
//! round-trip through JSON records and storage keys unchanged.

use std::fmt;
use std::str::FromStr;

use primitive_types::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdParseError {
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("unknown tag kind prefix: {0}")]
    UnknownTagKind(String),
}

fn decode_hex<const N: usize>(s: &str) -> Result<[u8; N], IdParseError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(digits).map_err(|e| IdParseError::InvalidHex(e.to_string()))?;
    let actual = bytes.len();
    bytes.try_into().map_err(|_| IdParseError::InvalidLength {
        expected: N,
        actual,
    })
}

/// Left-align `name` into `N` bytes, hashing it first when it does not fit.
fn pack_name<const N: usize>(name: &str) -> [u8; N] {
    let mut out = [0u8; N];
    let raw = name.as_bytes();
    if raw.len() <= N {
        out[..raw.len()].copy_from_slice(raw);
    } else {
        let digest = Sha256::digest(raw);
        out.copy_from_slice(&digest[..N]);
    }
    out
}

/// Left-align `name` into `N` bytes, truncating anything past the width.
fn truncate_name<const N: usize>(name: &str) -> [u8; N] {
    let mut out = [0u8; N];
    let raw = name.as_bytes();
    let len = raw.len().min(N);
    out[..len].copy_from_slice(&raw[..len]);
    out
}

fn trim_name(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

macro_rules! fixed_id {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name([u8; $len]);

        impl $name {
            pub const LEN: usize = $len;

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            /// Lowercase hex without the `0x` prefix, used in storage keys
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::try_from_bytes(decode_hex::<$len>(s)?)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

fixed_id!(
    /// 256-bit identifier shared by singleton entities, classes and objects
    EntityId,
    32
);

fixed_id!(
    /// Role identifier, a `bytes32` value
    RoleId,
    32
);

fixed_id!(
    /// Tag identifier: 2-byte kind prefix followed by a 30-byte name
    TagId,
    32
);

fixed_id!(
    /// 20-byte caller address
    Account,
    20
);

fixed_id!(
    /// Resource id of a system: `"sy"` type, 14-byte namespace, 16-byte name
    SystemId,
    32
);

fixed_id!(
    /// 4-byte function selector within a system
    FunctionSelector,
    4
);

fixed_id!(
    /// Key of an access configuration entry, derived from a system and a selector
    AccessTarget,
    32
);

// ============================================================================
// EntityId
// ============================================================================

impl EntityId {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    fn try_from_bytes(bytes: [u8; 32]) -> Result<Self, IdParseError> {
        Ok(Self(bytes))
    }

    pub fn to_u256(&self) -> U256 {
        U256::from_big_endian(&self.0)
    }
}

impl From<u64> for EntityId {
    fn from(value: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }
}

impl From<U256> for EntityId {
    fn from(value: U256) -> Self {
        let mut bytes = [0u8; 32];
        value.to_big_endian(&mut bytes);
        Self(bytes)
    }
}

// ============================================================================
// RoleId
// ============================================================================

impl RoleId {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    fn try_from_bytes(bytes: [u8; 32]) -> Result<Self, IdParseError> {
        Ok(Self(bytes))
    }

    /// Encode a role name the way a `bytes32` string literal is laid out.
    ///
    /// Names longer than 32 bytes are hashed with SHA-256.
    pub fn from_name(name: &str) -> Self {
        Self(pack_name::<32>(name))
    }
}

impl Default for RoleId {
    fn default() -> Self {
        Self([0u8; 32])
    }
}

// ============================================================================
// TagId
// ============================================================================

/// Kind of a tag, stored in the first two bytes of its id
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TagKind {
    /// Free-form property of a singleton entity
    Property,
    /// Relation from an entity to a resource
    ResourceRelation,
    /// Relation from an entity to another entity; single-valued per entity
    EntityRelation,
    /// System tag on a class or object
    System,
}

impl TagKind {
    pub const ALL: [TagKind; 4] = [
        TagKind::Property,
        TagKind::ResourceRelation,
        TagKind::EntityRelation,
        TagKind::System,
    ];

    pub fn prefix(self) -> [u8; 2] {
        match self {
            TagKind::Property => *b"pr",
            TagKind::ResourceRelation => *b"rr",
            TagKind::EntityRelation => *b"er",
            TagKind::System => *b"sy",
        }
    }

    pub fn from_prefix(prefix: [u8; 2]) -> Option<Self> {
        TagKind::ALL.into_iter().find(|kind| kind.prefix() == prefix)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TagKind::Property => "property",
            TagKind::ResourceRelation => "resource_relation",
            TagKind::EntityRelation => "entity_relation",
            TagKind::System => "system",
        }
    }
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TagId {
    pub fn new(kind: TagKind, name: &str) -> Self {
        let mut bytes = [0u8; 32];
        bytes[..2].copy_from_slice(&kind.prefix());
        bytes[2..].copy_from_slice(&pack_name::<30>(name));
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, IdParseError> {
        Self::try_from_bytes(bytes)
    }

    fn try_from_bytes(bytes: [u8; 32]) -> Result<Self, IdParseError> {
        let prefix = [bytes[0], bytes[1]];
        if TagKind::from_prefix(prefix).is_none() {
            return Err(IdParseError::UnknownTagKind(hex::encode(prefix)));
        }
        Ok(Self(bytes))
    }

    pub fn kind(&self) -> TagKind {
        // Construction rejects unknown prefixes.
        TagKind::from_prefix([self.0[0], self.0[1]]).unwrap_or(TagKind::Property)
    }

    /// The 30-byte identifier part
    pub fn identifier(&self) -> &[u8] {
        &self.0[2..]
    }
}

// ============================================================================
// Account
// ============================================================================

impl Account {
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    fn try_from_bytes(bytes: [u8; 20]) -> Result<Self, IdParseError> {
        Ok(Self(bytes))
    }
}

impl From<u64> for Account {
    fn from(value: u64) -> Self {
        let mut bytes = [0u8; 20];
        bytes[12..].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }
}

// ============================================================================
// SystemId
// ============================================================================

const SYSTEM_TYPE: [u8; 2] = *b"sy";

impl SystemId {
    /// Build a system resource id; namespace and name are truncated to 14 and 16 bytes.
    pub fn new(namespace: &str, name: &str) -> Self {
        let mut bytes = [0u8; 32];
        bytes[..2].copy_from_slice(&SYSTEM_TYPE);
        bytes[2..16].copy_from_slice(&truncate_name::<14>(namespace));
        bytes[16..].copy_from_slice(&truncate_name::<16>(name));
        Self(bytes)
    }

    fn try_from_bytes(bytes: [u8; 32]) -> Result<Self, IdParseError> {
        Ok(Self(bytes))
    }

    pub fn namespace(&self) -> String {
        trim_name(&self.0[2..16])
    }

    pub fn name(&self) -> String {
        trim_name(&self.0[16..])
    }

    /// Human readable `namespace:name` form for logs
    pub fn label(&self) -> String {
        format!("{}:{}", self.namespace(), self.name())
    }
}

// ============================================================================
// FunctionSelector / AccessTarget
// ============================================================================

impl FunctionSelector {
    pub const fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    fn try_from_bytes(bytes: [u8; 4]) -> Result<Self, IdParseError> {
        Ok(Self(bytes))
    }

    /// First four bytes of the SHA-256 digest of a function signature
    pub fn from_signature(signature: &str) -> Self {
        let digest = Sha256::digest(signature.as_bytes());
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&digest[..4]);
        Self(bytes)
    }
}

impl AccessTarget {
    /// SHA-256 of the system id followed by the selector
    pub fn of(system: &SystemId, function: &FunctionSelector) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(system.as_bytes());
        hasher.update(function.as_bytes());
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&hasher.finalize());
        Self(bytes)
    }

    fn try_from_bytes(bytes: [u8; 32]) -> Result<Self, IdParseError> {
        Ok(Self(bytes))
    }
}
