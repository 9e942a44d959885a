//! # Loyalty
//!
//! Programs, member cards and the points ledger.
//!
//! ## Points Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   order amount ── × points_per_currency_unit ──► points (accrual)       │
//! │                                                      │                  │
//! │                                                      ▼                  │
//! │                                           ┌───────────────────┐         │
//! │                                           │    LoyaltyCard    │         │
//! │                                           │  points_balance   │ ≥ 0     │
//! │                                           └─────────┬─────────┘         │
//! │                                                     │                   │
//! │   discount ◄── ÷ redemption_rate ── points (redemption)                 │
//! │                                                                         │
//! │   Every movement appends a LoyaltyTransaction (signed delta).           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::{Money, Points, Rate};
use crate::validation::{validate_name, validate_positive, validate_required};

// =============================================================================
// Program
// =============================================================================

/// A tenant's loyalty scheme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoyaltyProgram {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    /// Points earned per one unit of currency spent.
    pub points_per_currency_unit: Rate,
    /// Points required for one unit of discount.
    pub redemption_rate: Rate,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl LoyaltyProgram {
    pub fn ensure_active(&self) -> CoreResult<()> {
        if !self.is_active {
            return Err(CoreError::InactiveLoyaltyProgram);
        }
        Ok(())
    }

    /// Points earned for spending `order_amount`.
    pub fn points_for(&self, order_amount: Money) -> CoreResult<Points> {
        Ok(order_amount.checked_mul(self.points_per_currency_unit)?)
    }

    /// Discount granted for redeeming `points`.
    ///
    /// ## Example
    /// ```rust
    /// # use chrono::Utc;
    /// # use tally_core::loyalty::LoyaltyProgram;
    /// # use tally_core::money::Money;
    /// # let program = LoyaltyProgram {
    /// #     id: "p".into(), tenant_id: "t".into(), name: "Rewards".into(),
    /// #     points_per_currency_unit: Money::from_int(1),
    /// #     redemption_rate: Money::from_int(100),
    /// #     is_active: true, created_at: Utc::now(),
    /// # };
    /// // 100 points buy one unit of discount
    /// let discount = program.discount_for(Money::from_int(250)).unwrap();
    /// assert_eq!(discount.to_string(), "2.50000000");
    /// ```
    pub fn discount_for(&self, points: Points) -> CoreResult<Money> {
        validate_positive("Redemption rate", self.redemption_rate)?;
        Ok(points.checked_div(self.redemption_rate)?)
    }
}

/// Input for creating a loyalty program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLoyaltyProgram {
    pub tenant_id: String,
    pub name: String,
    pub points_per_currency_unit: Rate,
    pub redemption_rate: Rate,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl NewLoyaltyProgram {
    /// Validates the input and returns it with the name trimmed.
    pub fn validate(self) -> CoreResult<NewLoyaltyProgram> {
        validate_required("Tenant", &self.tenant_id)?;
        let name = validate_name("Program name", &self.name)?;
        validate_positive("Points per currency unit", self.points_per_currency_unit)?;
        validate_positive("Redemption rate", self.redemption_rate)?;

        Ok(NewLoyaltyProgram { name, ..self })
    }
}

// =============================================================================
// Card
// =============================================================================

/// A customer's membership in a program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoyaltyCard {
    pub id: String,
    pub tenant_id: String,
    pub program_id: String,
    pub customer_id: String,
    /// Never negative.
    pub points_balance: Points,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields for a card created on first accrual.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLoyaltyCard {
    pub tenant_id: String,
    pub program_id: String,
    pub customer_id: String,
}

impl LoyaltyCard {
    /// Adds points and returns the new balance.
    ///
    /// A balance out of range fails and leaves the card untouched.
    pub fn credit(&mut self, points: Points) -> CoreResult<Points> {
        self.points_balance = self.points_balance.checked_add(points)?;
        Ok(self.points_balance)
    }

    /// Removes points and returns the new balance.
    ///
    /// An overdraft fails with [`CoreError::InsufficientPoints`] and leaves
    /// the balance untouched.
    pub fn debit(&mut self, points: Points) -> CoreResult<Points> {
        if points > self.points_balance {
            return Err(CoreError::InsufficientPoints);
        }
        self.points_balance = self.points_balance.checked_sub(points)?;
        Ok(self.points_balance)
    }
}

// =============================================================================
// Ledger
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum LoyaltyTransactionType {
    Accrual,
    Redemption,
}

/// An append-only ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoyaltyTransaction {
    pub id: String,
    pub tenant_id: String,
    pub card_id: String,
    pub transaction_type: LoyaltyTransactionType,
    /// Signed: positive for accruals, negative for redemptions.
    pub points: Points,
    pub balance_after: Points,
    /// Order id or other external reference.
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewLoyaltyTransaction {
    pub tenant_id: String,
    pub card_id: String,
    pub transaction_type: LoyaltyTransactionType,
    pub points: Points,
    pub balance_after: Points,
    pub reference: Option<String>,
}

impl NewLoyaltyTransaction {
    pub fn accrual(card: &LoyaltyCard, points: Points, reference: Option<String>) -> Self {
        NewLoyaltyTransaction {
            tenant_id: card.tenant_id.clone(),
            card_id: card.id.clone(),
            transaction_type: LoyaltyTransactionType::Accrual,
            points,
            balance_after: card.points_balance,
            reference,
        }
    }

    pub fn redemption(card: &LoyaltyCard, points: Points, reference: Option<String>) -> Self {
        NewLoyaltyTransaction {
            tenant_id: card.tenant_id.clone(),
            card_id: card.id.clone(),
            transaction_type: LoyaltyTransactionType::Redemption,
            points: -points,
            balance_after: card.points_balance,
            reference,
        }
    }
}

/// Rejects a non-positive points amount for redemption.
pub fn ensure_points_positive(points: Points) -> CoreResult<()> {
    if !points.is_positive() {
        return Err(CoreError::PointsNotPositive);
    }
    Ok(())
}

/// Rejects a non-positive order amount for accrual.
pub fn ensure_order_amount_positive(order_amount: Money) -> CoreResult<()> {
    if !order_amount.is_positive() {
        return Err(CoreError::OrderAmountNotPositive);
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::MoneyError;

    fn m(s: &str) -> Money {
        Money::parse(s).unwrap()
    }

    fn program(earn: &str, redeem: &str) -> LoyaltyProgram {
        LoyaltyProgram {
            id: "prog-1".to_string(),
            tenant_id: "tenant-1".to_string(),
            name: "Rewards".to_string(),
            points_per_currency_unit: m(earn),
            redemption_rate: m(redeem),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn card(balance: &str) -> LoyaltyCard {
        LoyaltyCard {
            id: "card-1".to_string(),
            tenant_id: "tenant-1".to_string(),
            program_id: "prog-1".to_string(),
            customer_id: "cust-1".to_string(),
            points_balance: m(balance),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_points_for() {
        assert_eq!(program("1.5", "100").points_for(m("90")).unwrap(), m("135"));
        assert_eq!(program("0.1", "100").points_for(m("24.99")).unwrap(), m("2.499"));
    }

    #[test]
    fn test_points_out_of_range_are_rejected() {
        let big = m("100000000000000000000");
        assert!(matches!(
            program("1000", "100").points_for(big),
            Err(CoreError::InvalidAmount(MoneyError::Overflow))
        ));

        let mut c = card("500000000000000000000");
        assert!(c.credit(m("500000000000000000000")).is_err());
        assert_eq!(c.points_balance, m("500000000000000000000"));
    }

    #[test]
    fn test_discount_for() {
        assert_eq!(program("1", "10").discount_for(m("25")).unwrap(), m("2.5"));
        assert!(program("1", "0").discount_for(m("25")).is_err());
    }

    #[test]
    fn test_inactive_program() {
        let mut p = program("1", "10");
        p.is_active = false;
        assert_eq!(
            p.ensure_active().unwrap_err().to_string(),
            "Cannot accrue points for an inactive loyalty program."
        );
    }

    #[test]
    fn test_debit_overdraft_leaves_balance() {
        let mut c = card("40");
        let err = c.debit(m("50")).unwrap_err();
        assert_eq!(err.to_string(), "Insufficient points balance.");
        assert_eq!(c.points_balance, m("40"));

        assert_eq!(c.debit(m("40")).unwrap(), Money::zero());
    }

    #[test]
    fn test_credit() {
        let mut c = card("0");
        assert_eq!(c.credit(m("12.5")).unwrap(), m("12.5"));
    }

    #[test]
    fn test_ledger_deltas_are_signed() {
        let mut c = card("100");
        c.debit(m("30")).unwrap();
        let entry = NewLoyaltyTransaction::redemption(&c, m("30"), None);
        assert_eq!(entry.points, m("-30"));
        assert_eq!(entry.balance_after, m("70"));

        c.credit(m("5")).unwrap();
        let entry = NewLoyaltyTransaction::accrual(&c, m("5"), Some("order-1".into()));
        assert_eq!(entry.points, m("5"));
        assert_eq!(entry.transaction_type, LoyaltyTransactionType::Accrual);
    }

    #[test]
    fn test_new_program_validation() {
        let input = NewLoyaltyProgram {
            tenant_id: "tenant-1".to_string(),
            name: "  Rewards ".to_string(),
            points_per_currency_unit: m("1"),
            redemption_rate: m("100"),
            is_active: true,
        };
        assert_eq!(input.clone().validate().unwrap().name, "Rewards");

        let blank = NewLoyaltyProgram {
            name: " ".to_string(),
            ..input.clone()
        };
        assert!(blank.validate().is_err());

        let zero_rate = NewLoyaltyProgram {
            redemption_rate: Money::zero(),
            ..input
        };
        assert!(zero_rate.validate().is_err());
    }

    #[test]
    fn test_guards() {
        assert!(ensure_points_positive(Money::zero()).is_err());
        assert!(ensure_order_amount_positive(m("-1")).is_err());
        assert!(ensure_order_amount_positive(m("0.01")).is_ok());
    }
}
