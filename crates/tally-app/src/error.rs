//! # Application Errors
//!
//! ```text
//! AppError
//! ├── Core(CoreError)    business rule or missing aggregate (stable message)
//! └── Store(StoreError)  a port failed (database down, lock poisoned, ...)
//! ```
//!
//! Use cases return [`AppError`]. Adapters return [`StoreError`].

use thiserror::Error;

use tally_core::error::{CoreError, ErrorKind, ValidationError};

/// Failures reported by repository and transaction adapters.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A write referenced a row that does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A unique constraint rejected the write.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Begin, commit or rollback failed, or was called out of order.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// A stored value could not be read back into a domain type.
    #[error("Corrupt stored value: {0}")]
    Corrupt(String),

    /// Any other backend failure.
    #[error("Storage error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            entity,
            id: id.into(),
        }
    }
}

/// Result type for port operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// What a use case fails with.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Core(CoreError::Validation(err))
    }
}

impl AppError {
    /// The domain error kind, or `None` for storage failures.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            AppError::Core(err) => Some(err.kind()),
            AppError::Store(_) => None,
        }
    }

    /// True only for a referenced aggregate that does not exist.
    pub fn is_not_found(&self) -> bool {
        self.kind() == Some(ErrorKind::NotFound)
    }
}

/// Result type for use cases.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_message_passes_through() {
        let err: AppError = CoreError::not_found("Loyalty card", "card-9").into();
        assert_eq!(err.to_string(), "Loyalty card not found.");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_store_errors_have_no_kind() {
        let err: AppError = StoreError::not_found("Order", "o-1").into();
        assert_eq!(err.kind(), None);
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_validation_error_is_domain() {
        let err: AppError = ValidationError::Required {
            field: "Program name".to_string(),
        }
        .into();
        assert_eq!(err.kind(), Some(ErrorKind::Domain));
        assert_eq!(err.to_string(), "Program name is required.");
    }
}
