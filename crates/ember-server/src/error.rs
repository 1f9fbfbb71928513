use serde::Serialize;
use thiserror::Error;

/// Stable, caller-visible error kinds. Serialized as snake_case in HTTP bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    Unauthorized,
    CorruptRecord,
    StorageUnavailable,
    InvalidPattern,
    InvalidOptions,
    /// Server-side failure unrelated to any stored record.
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::NotFound => "not_found",
            Self::Unauthorized => "unauthorized",
            Self::CorruptRecord => "corrupt_record",
            Self::StorageUnavailable => "storage_unavailable",
            Self::InvalidPattern => "invalid_pattern",
            Self::InvalidOptions => "invalid_options",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by the vault store.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Absent, consumed and expired records all collapse into this variant.
    #[error("secret not found or no longer available")]
    NotFound,

    #[error("invalid passphrase")]
    Unauthorized,

    #[error("stored secret failed integrity check")]
    CorruptRecord,

    #[error("storage backend error: {0}")]
    Storage(String),
}

impl VaultError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::NotFound => ErrorKind::NotFound,
            Self::Unauthorized => ErrorKind::Unauthorized,
            Self::CorruptRecord => ErrorKind::CorruptRecord,
            Self::Storage(_) => ErrorKind::StorageUnavailable,
        }
    }

    /// Whether the failure came from the backend and may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

macro_rules! storage_error_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for VaultError {
                fn from(e: $ty) -> Self {
                    VaultError::Storage(e.to_string())
                }
            }
        )*
    };
}

storage_error_from!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

/// Errors returned by the password generator.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GeneratorError {
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("invalid options: {0}")]
    InvalidOptions(String),
}

impl GeneratorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidPattern(_) => ErrorKind::InvalidPattern,
            Self::InvalidOptions(_) => ErrorKind::InvalidOptions,
        }
    }
}

pub type Result<T, E = VaultError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_snake_case() {
        assert_eq!(VaultError::NotFound.kind().as_str(), "not_found");
        assert_eq!(
            serde_json::to_value(ErrorKind::CorruptRecord).unwrap(),
            serde_json::json!("corrupt_record")
        );
        assert_eq!(
            serde_json::to_value(ErrorKind::Internal).unwrap(),
            serde_json::json!(ErrorKind::Internal.as_str())
        );
        assert_eq!(
            GeneratorError::InvalidPattern("x".into()).kind(),
            ErrorKind::InvalidPattern
        );
    }

    #[test]
    fn only_storage_is_transient() {
        assert!(VaultError::Storage("io".into()).is_transient());
        assert!(!VaultError::NotFound.is_transient());
        assert!(!VaultError::Unauthorized.is_transient());
    }

    #[test]
    fn not_found_message_is_generic() {
        assert_eq!(
            VaultError::NotFound.to_string(),
            "secret not found or no longer available"
        );
    }
}
