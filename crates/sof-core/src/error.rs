use sof_repository::RepositoryError;
use sof_storage::StorageError;
use sof_types::{Account, FunctionSelector, RoleId, SystemId};
use thiserror::Error;

/// The kind of record an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Entity,
    Class,
    Object,
    Tag,
    Role,
    AccessConfig,
    System,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordKind::Entity => write!(f, "entity"),
            RecordKind::Class => write!(f, "class"),
            RecordKind::Object => write!(f, "object"),
            RecordKind::Tag => write!(f, "tag"),
            RecordKind::Role => write!(f, "role"),
            RecordKind::AccessConfig => write!(f, "access config"),
            RecordKind::System => write!(f, "system"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryErrorCode {
    AlreadyExists,
    NotFound,
    RoleNotFound,
    Unauthorized,
    InvalidStateTransition,
    AccessDenied,
    InvalidConfig,
    Storage,
}

impl RegistryErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            RegistryErrorCode::AlreadyExists => "already_exists",
            RegistryErrorCode::NotFound => "not_found",
            RegistryErrorCode::RoleNotFound => "role_not_found",
            RegistryErrorCode::Unauthorized => "unauthorized",
            RegistryErrorCode::InvalidStateTransition => "invalid_state_transition",
            RegistryErrorCode::AccessDenied => "access_denied",
            RegistryErrorCode::InvalidConfig => "invalid_config",
            RegistryErrorCode::Storage => "storage",
        }
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("{kind} '{id}' already exists")]
    AlreadyExists { kind: RecordKind, id: String },

    #[error("{kind} '{id}' not found")]
    NotFound { kind: RecordKind, id: String },

    #[error("role {0} does not exist")]
    RoleNotFound(RoleId),

    #[error("account {account} is missing required role {required}")]
    Unauthorized { account: Account, required: RoleId },

    #[error("invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("access denied: {caller} may not call {function} on {system}")]
    AccessDenied {
        caller: Account,
        system: SystemId,
        function: FunctionSelector,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl RegistryError {
    pub fn already_exists(kind: RecordKind, id: impl ToString) -> Self {
        RegistryError::AlreadyExists {
            kind,
            id: id.to_string(),
        }
    }

    pub fn not_found(kind: RecordKind, id: impl ToString) -> Self {
        RegistryError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn code(&self) -> RegistryErrorCode {
        match self {
            RegistryError::AlreadyExists { .. } => RegistryErrorCode::AlreadyExists,
            RegistryError::NotFound { .. } => RegistryErrorCode::NotFound,
            RegistryError::RoleNotFound(_) => RegistryErrorCode::RoleNotFound,
            RegistryError::Unauthorized { .. } => RegistryErrorCode::Unauthorized,
            RegistryError::InvalidStateTransition(_) => RegistryErrorCode::InvalidStateTransition,
            RegistryError::AccessDenied { .. } => RegistryErrorCode::AccessDenied,
            RegistryError::InvalidConfig(_) => RegistryErrorCode::InvalidConfig,
            RegistryError::Repository(RepositoryError::NotFound(_)) => RegistryErrorCode::NotFound,
            RegistryError::Repository(_) => RegistryErrorCode::Storage,
        }
    }
}

impl From<StorageError> for RegistryError {
    fn from(err: StorageError) -> Self {
        RegistryError::Repository(err.into())
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;
