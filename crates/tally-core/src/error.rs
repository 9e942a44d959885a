//! # Error Types
//!
//! Domain-specific error types for tally-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tally-core errors (this file)                                          │
//! │  ├── CoreError        - Business rule violations and missing aggregates │
//! │  └── ValidationError  - Field-level input validation failures           │
//! │                                                                         │
//! │  tally-app errors                                                       │
//! │  ├── StoreError       - Port (repository) failures                      │
//! │  └── AppError         - What a use case returns: Core or Store          │
//! │                                                                         │
//! │  tally-db errors                                                        │
//! │  └── DbError          - SQLite failures, converted into StoreError      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Two Kinds
//! Every `CoreError` is either a **domain** error (a business rule said no)
//! or a **not-found** error (a referenced aggregate does not exist).
//! Callers that need to tell them apart use [`CoreError::kind`].
//!
//! Messages are stable, operator-facing sentences. Callers and tests match
//! on them, so changing one is a breaking change.

use thiserror::Error;

use crate::money::{Money, MoneyError};

// =============================================================================
// Core Error
// =============================================================================

/// Which of the two error kinds a [`CoreError`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A business rule rejected the request.
    Domain,
    /// A referenced aggregate does not exist.
    NotFound,
}

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A referenced aggregate does not exist.
    ///
    /// `entity` is the human name used in the message ("POS session",
    /// "Discount code", "Loyalty program", "Loyalty card"). `id` is the
    /// looked-up key, kept for logs.
    #[error("{entity} not found.")]
    NotFound { entity: &'static str, id: String },

    /// Orders can only be placed against an open register session.
    #[error("Orders can only be placed against an open session.")]
    SessionNotOpen { session_id: String },

    #[error("Discount code is inactive.")]
    DiscountInactive,

    #[error("Discount code has expired.")]
    DiscountExpired,

    #[error("Discount code usage limit has been reached.")]
    DiscountUsageLimitReached,

    /// Cash handed over does not cover what is owed in cash.
    ///
    /// ## User Workflow
    /// ```text
    /// Order total: 100.00, tender: cash
    ///      │
    ///      ▼
    /// Cashier enters tendered: 50.00
    ///      │
    ///      ▼
    /// InsufficientCash { tendered: 50, required: 100 }
    ///      │
    ///      ▼
    /// UI shows: "Insufficient cash tendered: 50.00 given, 100.00 required."
    /// ```
    #[error(
        "Insufficient cash tendered: {} given, {} required.",
        .tendered.to_display(),
        .required.to_display()
    )]
    InsufficientCash { tendered: Money, required: Money },

    #[error("Payment amounts must be greater than zero.")]
    PaymentAmountNotPositive,

    #[error(
        "Payment amounts ({}) do not equal order total ({}).",
        .paid.to_display(),
        .total.to_display()
    )]
    SplitTotalMismatch { paid: Money, total: Money },

    #[error("Order amount must be greater than zero to accrue points.")]
    OrderAmountNotPositive,

    #[error("Cannot accrue points for an inactive loyalty program.")]
    InactiveLoyaltyProgram,

    #[error("Points to redeem must be greater than zero.")]
    PointsNotPositive,

    #[error("Insufficient points balance.")]
    InsufficientPoints,

    /// A decimal amount could not be read.
    #[error("Invalid amount: {0}")]
    InvalidAmount(#[from] MoneyError),

    /// Validation error (wraps ValidationError).
    #[error("{0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a NotFound error for a given entity name and key.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Returns whether this is a domain or a not-found error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::NotFound { .. } => ErrorKind::NotFound,
            _ => ErrorKind::Domain,
        }
    }

    /// Shorthand for `kind() == ErrorKind::NotFound`.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required.")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters.")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}.")]
    OutOfRange { field: String, min: String, max: String },

    /// Value must be strictly greater than zero.
    #[error("{field} must be greater than zero.")]
    MustBePositive { field: String },

    /// Invalid format (e.g., characters not allowed in a code).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Duplicate value (e.g., duplicate discount code).
    #[error("{field} '{value}' already exists.")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
