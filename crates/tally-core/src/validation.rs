//! # Validation Module
//!
//! Input validation utilities for Tally POS.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Calling layer (HTTP, UI)                                      │
//! │  ├── Shape checks (deserialization)                                     │
//! │  └── Line inputs: positive quantities and prices                        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Use case creation inputs                                      │
//! │  └── THIS MODULE: codes, names, rates, percentages                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Storage                                                       │
//! │  ├── NOT NULL / UNIQUE constraints                                      │
//! │  └── Guarded updates (usage limits)                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tally_core::money::Money;
//! use tally_core::validation::{validate_discount_code, validate_positive};
//!
//! assert_eq!(validate_discount_code(" summer10 ").unwrap(), "SUMMER10");
//! assert!(validate_positive("Discount value", Money::zero()).is_err());
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::{MAX_CODE_LENGTH, MAX_NAME_LENGTH};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Checks that a text field is not blank and returns it trimmed.
pub fn validate_required(field: &str, value: &str) -> ValidationResult<String> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    Ok(value.to_string())
}

/// Validates a display name (discount name, loyalty program name).
///
/// ## Rules
/// - Must not be blank
/// - At most [`MAX_NAME_LENGTH`] characters after trimming
pub fn validate_name(field: &str, value: &str) -> ValidationResult<String> {
    let value = validate_required(field, value)?;

    if value.chars().count() > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LENGTH,
        });
    }

    Ok(value)
}

/// Validates a promotional code and returns its canonical (uppercase) form.
///
/// ## Rules
/// - Must not be blank
/// - At most [`MAX_CODE_LENGTH`] characters
/// - Letters, digits, hyphens and underscores only
///
/// ## Example
/// ```rust
/// use tally_core::validation::validate_discount_code;
///
/// assert_eq!(validate_discount_code("summer-10").unwrap(), "SUMMER-10");
/// assert!(validate_discount_code("").is_err());
/// assert!(validate_discount_code("two words").is_err());
/// ```
pub fn validate_discount_code(code: &str) -> ValidationResult<String> {
    let code = validate_required("Discount code", code)?;

    if code.chars().count() > MAX_CODE_LENGTH {
        return Err(ValidationError::TooLong {
            field: "Discount code".to_string(),
            max: MAX_CODE_LENGTH,
        });
    }

    if !code
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "Discount code".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(code.to_uppercase())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Value must be strictly greater than zero.
pub fn validate_positive(field: &str, value: Money) -> ValidationResult<()> {
    if !value.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Value must lie in `0..=100`.
pub fn validate_percentage(field: &str, value: Money) -> ValidationResult<()> {
    if value.is_negative() || value > Money::from_int(100) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: "0".to_string(),
            max: "100".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_required() {
        assert_eq!(validate_required("Name", "  Gold  ").unwrap(), "Gold");
        assert_eq!(
            validate_required("Name", "   "),
            Err(ValidationError::Required {
                field: "Name".to_string()
            })
        );
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("Name", "Summer Sale").is_ok());
        assert!(validate_name("Name", "").is_err());
        assert!(validate_name("Name", &"A".repeat(300)).is_err());
    }

    #[test]
    fn test_validate_discount_code() {
        assert_eq!(validate_discount_code("summer10").unwrap(), "SUMMER10");
        assert_eq!(validate_discount_code("vip_2025").unwrap(), "VIP_2025");

        assert!(validate_discount_code("").is_err());
        assert!(validate_discount_code("   ").is_err());
        assert!(validate_discount_code("has space").is_err());
        assert!(validate_discount_code(&"A".repeat(100)).is_err());
    }

    #[test]
    fn test_validate_positive() {
        assert!(validate_positive("Value", Money::from_int(1)).is_ok());
        assert!(validate_positive("Value", Money::zero()).is_err());
        assert!(validate_positive("Value", Money::from_int(-5)).is_err());
    }

    #[test]
    fn test_validate_percentage() {
        assert!(validate_percentage("Value", Money::zero()).is_ok());
        assert!(validate_percentage("Value", Money::from_int(100)).is_ok());
        assert!(validate_percentage("Value", Money::parse("100.00000001").unwrap()).is_err());
        assert!(validate_percentage("Value", Money::from_int(-1)).is_err());
    }
}
