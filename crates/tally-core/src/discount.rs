//! # Discount Codes
//!
//! Promotional codes and the rules for applying them to an order total.
//!
//! ## Validation Sequence (fail-fast)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  code given                                                             │
//! │     │                                                                   │
//! │     ├── not found ─────────────► "Discount code not found."   (lookup)  │
//! │     ├── is_active = false ─────► "Discount code is inactive."           │
//! │     ├── expires_at < now ──────► "Discount code has expired."           │
//! │     ├── times_used ≥ limit ────► "Discount code usage limit has been    │
//! │     │                             reached."                             │
//! │     ▼                                                                   │
//! │  percentage:    amount = total × value ÷ 100                            │
//! │  fixed_amount:  amount = min(value, total)    (total never negative)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Lookup and the usage increment need storage and live in the application
//! layer; everything after the lookup is here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::validation::{
    validate_discount_code, validate_name, validate_percentage, validate_positive,
};

/// How a discount's `value` is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    /// `value` is a percentage of the order total.
    Percentage,
    /// `value` is a currency amount, capped at the order total.
    FixedAmount,
}

/// A promotional code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosDiscount {
    pub id: String,
    pub tenant_id: String,
    /// Uppercase, unique per tenant.
    pub code: String,
    pub name: String,
    pub discount_type: DiscountType,
    pub value: Money,
    /// `None` means unlimited.
    pub usage_limit: Option<i64>,
    /// Only ever incremented.
    pub times_used: i64,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

/// Result of applying a discount to an order total.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscountApplication {
    /// Total after the discount.
    pub total: Money,
    pub discount_amount: Money,
    /// `None` when no code was supplied.
    pub discount_code_id: Option<String>,
    /// `None` when no code was supplied.
    pub code: Option<String>,
}

impl DiscountApplication {
    /// The outcome when no code is supplied: nothing changes.
    pub fn none(total: Money) -> Self {
        DiscountApplication {
            total,
            discount_amount: Money::zero(),
            discount_code_id: None,
            code: None,
        }
    }

    pub fn is_applied(&self) -> bool {
        self.discount_code_id.is_some()
    }
}

/// Canonical form of a code for lookup: trimmed and uppercased.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

impl PosDiscount {
    /// Checks the lifecycle state, in order: active, not expired, usage left.
    pub fn ensure_usable(&self, now: DateTime<Utc>) -> CoreResult<()> {
        if !self.is_active {
            return Err(CoreError::DiscountInactive);
        }

        if self.expires_at.is_some_and(|expires| expires < now) {
            return Err(CoreError::DiscountExpired);
        }

        if self.usage_limit.is_some_and(|limit| self.times_used >= limit) {
            return Err(CoreError::DiscountUsageLimitReached);
        }

        Ok(())
    }

    /// The amount this discount takes off `total`.
    ///
    /// ## Example
    /// ```rust
    /// # use tally_core::discount::{DiscountType, PosDiscount};
    /// # use tally_core::money::Money;
    /// # let discount = PosDiscount {
    /// #     id: "d1".into(), tenant_id: "t1".into(), code: "BIG".into(), name: "Big".into(),
    /// #     discount_type: DiscountType::FixedAmount, value: Money::from_int(200),
    /// #     usage_limit: None, times_used: 0, expires_at: None, is_active: true,
    /// # };
    /// // A fixed 200 off a 50 order only takes 50
    /// assert_eq!(discount.amount_for(Money::from_int(50)).unwrap(), Money::from_int(50));
    /// ```
    pub fn amount_for(&self, total: Money) -> CoreResult<Money> {
        Ok(match self.discount_type {
            DiscountType::Percentage => total.percent_of(self.value)?,
            DiscountType::FixedAmount => self.value.min(total).max(Money::zero()),
        })
    }

    /// Validates and computes in one step.
    pub fn apply(&self, total: Money, now: DateTime<Utc>) -> CoreResult<DiscountApplication> {
        self.ensure_usable(now)?;

        let discount_amount = self.amount_for(total)?;

        Ok(DiscountApplication {
            total: total.checked_sub(discount_amount)?,
            discount_amount,
            discount_code_id: Some(self.id.clone()),
            code: Some(self.code.clone()),
        })
    }
}

// =============================================================================
// Creation Input
// =============================================================================

/// Input for creating a discount code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDiscount {
    pub tenant_id: String,
    pub code: String,
    pub name: String,
    pub discount_type: DiscountType,
    pub value: Money,
    #[serde(default)]
    pub usage_limit: Option<i64>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl NewDiscount {
    /// Validates the input and returns it with code and name normalized.
    ///
    /// ## Rules
    /// - code and name not blank
    /// - value > 0
    /// - percentage value ≤ 100
    /// - usage limit, when set, ≥ 1
    pub fn validate(self) -> CoreResult<NewDiscount> {
        let code = validate_discount_code(&self.code)?;
        let name = validate_name("Discount name", &self.name)?;

        validate_positive("Discount value", self.value)?;
        if self.discount_type == DiscountType::Percentage {
            validate_percentage("Percentage discount value", self.value)?;
        }

        if self.usage_limit.is_some_and(|limit| limit < 1) {
            return Err(ValidationError::MustBePositive {
                field: "Usage limit".to_string(),
            }
            .into());
        }

        Ok(NewDiscount { code, name, ..self })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn discount(discount_type: DiscountType, value: i64) -> PosDiscount {
        PosDiscount {
            id: "disc-1".to_string(),
            tenant_id: "tenant-1".to_string(),
            code: "SUMMER10".to_string(),
            name: "Summer".to_string(),
            discount_type,
            value: Money::from_int(value),
            usage_limit: None,
            times_used: 0,
            expires_at: None,
            is_active: true,
        }
    }

    #[test]
    fn test_percentage_discount() {
        let applied = discount(DiscountType::Percentage, 10)
            .apply(Money::from_int(100), Utc::now())
            .unwrap();

        assert_eq!(applied.discount_amount.to_string(), "10.00000000");
        assert_eq!(applied.total.to_string(), "90.00000000");
        assert_eq!(applied.discount_code_id.as_deref(), Some("disc-1"));
        assert!(applied.is_applied());
    }

    #[test]
    fn test_fixed_amount_capped_at_total() {
        let applied = discount(DiscountType::FixedAmount, 200)
            .apply(Money::from_int(50), Utc::now())
            .unwrap();

        assert_eq!(applied.discount_amount, Money::from_int(50));
        assert!(applied.total.is_zero());
    }

    #[test]
    fn test_fixed_amount_below_total() {
        let applied = discount(DiscountType::FixedAmount, 15)
            .apply(Money::from_int(40), Utc::now())
            .unwrap();
        assert_eq!(applied.total, Money::from_int(25));
    }

    #[test]
    fn test_inactive_checked_before_expiry() {
        let mut d = discount(DiscountType::Percentage, 10);
        d.is_active = false;
        d.expires_at = Some(Utc::now() - Duration::days(1));

        let err = d.ensure_usable(Utc::now()).unwrap_err();
        assert_eq!(err.to_string(), "Discount code is inactive.");
    }

    #[test]
    fn test_expired() {
        let mut d = discount(DiscountType::Percentage, 10);
        d.expires_at = Some(Utc::now() - Duration::hours(1));
        assert!(matches!(
            d.ensure_usable(Utc::now()),
            Err(CoreError::DiscountExpired)
        ));

        d.expires_at = Some(Utc::now() + Duration::hours(1));
        assert!(d.ensure_usable(Utc::now()).is_ok());
    }

    #[test]
    fn test_usage_limit_reached_at_equality() {
        let mut d = discount(DiscountType::Percentage, 10);
        d.usage_limit = Some(5);
        d.times_used = 4;
        assert!(d.ensure_usable(Utc::now()).is_ok());

        d.times_used = 5;
        let err = d.ensure_usable(Utc::now()).unwrap_err();
        assert_eq!(err.to_string(), "Discount code usage limit has been reached.");
    }

    #[test]
    fn test_no_code_changes_nothing() {
        let none = DiscountApplication::none(Money::from_int(80));
        assert_eq!(none.total, Money::from_int(80));
        assert!(none.discount_amount.is_zero());
        assert!(!none.is_applied());
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code("  summer10 "), "SUMMER10");
    }

    fn new_discount(discount_type: DiscountType, value: &str) -> NewDiscount {
        NewDiscount {
            tenant_id: "tenant-1".to_string(),
            code: " welcome5 ".to_string(),
            name: " Welcome ".to_string(),
            discount_type,
            value: Money::parse(value).unwrap(),
            usage_limit: None,
            expires_at: None,
            is_active: true,
        }
    }

    #[test]
    fn test_new_discount_is_normalized() {
        let valid = new_discount(DiscountType::FixedAmount, "5")
            .validate()
            .unwrap();
        assert_eq!(valid.code, "WELCOME5");
        assert_eq!(valid.name, "Welcome");
    }

    #[test]
    fn test_new_discount_rules() {
        assert!(new_discount(DiscountType::FixedAmount, "0").validate().is_err());
        assert!(new_discount(DiscountType::Percentage, "100").validate().is_ok());
        assert!(new_discount(DiscountType::Percentage, "101").validate().is_err());
        // Fixed amounts above 100 are fine
        assert!(new_discount(DiscountType::FixedAmount, "150").validate().is_ok());

        let mut blank = new_discount(DiscountType::FixedAmount, "5");
        blank.code = "  ".to_string();
        let err = blank.validate().unwrap_err();
        assert_eq!(err.to_string(), "Discount code is required.");

        let mut limited = new_discount(DiscountType::FixedAmount, "5");
        limited.usage_limit = Some(0);
        assert!(limited.validate().is_err());
    }
}
