//! # Domain Types
//!
//! Register sessions, orders, order lines and payments.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐        │
//! │  │   PosSession    │   │    PosOrder     │   │ PosOrderPayment │        │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │        │
//! │  │  id             │◄──│  session_id     │◄──│  order_id       │        │
//! │  │  status         │   │  order_number   │   │  payment_method │        │
//! │  │  total_sales    │   │  subtotal       │   │  amount         │        │
//! │  │  order_count    │   │  discount_amount│   │  tendered       │        │
//! │  └─────────────────┘   │  tax_amount     │   │  change         │        │
//! │                        │  total          │   └─────────────────┘        │
//! │                        │  lines ─────────┼──► PosOrderLine (snapshot)   │
//! │                        └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The session is owned by the register-management flow; order placement
//! only reads it and bumps its counters. Orders, lines and payments are
//! created once per placement and never changed afterwards.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::{Money, Quantity, Rate};

// =============================================================================
// Session
// =============================================================================

/// Whether a register session accepts orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Open,
    Closed,
}

/// A cash register session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosSession {
    pub id: String,
    pub tenant_id: String,
    pub status: SessionStatus,
    /// Running sum of order totals placed in this session.
    pub total_sales: Money,
    pub order_count: i64,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// Counter values written back after an order is placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTotals {
    pub total_sales: Money,
    pub order_count: i64,
}

impl PosSession {
    /// Fails with [`CoreError::SessionNotOpen`] unless the session is open.
    pub fn ensure_open(&self) -> CoreResult<()> {
        if self.status != SessionStatus::Open {
            return Err(CoreError::SessionNotOpen {
                session_id: self.id.clone(),
            });
        }
        Ok(())
    }

    /// Counters after one more order of `order_total`.
    pub fn totals_after_sale(&self, order_total: Money) -> CoreResult<SessionTotals> {
        Ok(SessionTotals {
            total_sales: self.total_sales.checked_add(order_total)?,
            order_count: self.order_count + 1,
        })
    }
}

// =============================================================================
// Order Lines
// =============================================================================

/// One line of an order as submitted by the caller.
///
/// `discount` is an absolute amount taken off the line's gross, not a rate.
/// `tax_rate` is a percentage applied to the line after that discount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLineInput {
    pub product_id: String,
    pub product_name: String,
    pub unit_price: Money,
    pub quantity: Quantity,
    #[serde(default)]
    pub discount: Money,
    #[serde(default)]
    pub tax_rate: Rate,
}

impl OrderLineInput {
    /// Convenience constructor for a line without discount or tax.
    pub fn new(
        product_id: impl Into<String>,
        product_name: impl Into<String>,
        unit_price: Money,
        quantity: Quantity,
    ) -> Self {
        OrderLineInput {
            product_id: product_id.into(),
            product_name: product_name.into(),
            unit_price,
            quantity,
            discount: Money::zero(),
            tax_rate: Money::zero(),
        }
    }

    pub fn with_discount(mut self, discount: Money) -> Self {
        self.discount = discount;
        self
    }

    pub fn with_tax_rate(mut self, tax_rate: Rate) -> Self {
        self.tax_rate = tax_rate;
        self
    }
}

/// A priced order line, frozen as part of the order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosOrderLine {
    pub product_id: String,
    pub product_name: String,
    pub unit_price: Money,
    pub quantity: Quantity,
    pub discount: Money,
    pub tax_rate: Rate,
    /// `unit_price × quantity`.
    pub gross_amount: Money,
    /// Tax on `gross_amount − discount`.
    pub tax_amount: Money,
    /// `gross_amount − discount + tax_amount`.
    pub line_total: Money,
}

// =============================================================================
// Order
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Settled in full at the register. Orders are only ever stored paid.
    #[default]
    Paid,
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosOrder {
    pub id: String,
    pub tenant_id: String,
    pub session_id: String,
    /// Sequential per tenant, e.g. `POS-000042`.
    pub order_number: String,
    pub customer_id: Option<String>,
    pub status: OrderStatus,
    pub subtotal: Money,
    /// Line discounts plus the discount-code adjustment.
    pub discount_amount: Money,
    pub tax_amount: Money,
    pub total: Money,
    pub discount_code_id: Option<String>,
    pub created_by: String,
    pub lines: Vec<PosOrderLine>,
    pub created_at: DateTime<Utc>,
}

/// Everything needed to persist an order; the repository assigns `id` and
/// `created_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPosOrder {
    pub tenant_id: String,
    pub session_id: String,
    pub order_number: String,
    pub customer_id: Option<String>,
    pub status: OrderStatus,
    pub subtotal: Money,
    pub discount_amount: Money,
    pub tax_amount: Money,
    pub total: Money,
    pub discount_code_id: Option<String>,
    pub created_by: String,
    pub lines: Vec<PosOrderLine>,
}

// =============================================================================
// Payment Method
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash. The only tender that produces change.
    Cash,
    /// Card payment on an external terminal.
    Card,
    DigitalWallet,
    BankTransfer,
    StoreCredit,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 5] = [
        PaymentMethod::Cash,
        PaymentMethod::Card,
        PaymentMethod::DigitalWallet,
        PaymentMethod::BankTransfer,
        PaymentMethod::StoreCredit,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::DigitalWallet => "digital_wallet",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::StoreCredit => "store_credit",
        }
    }

    #[inline]
    pub const fn is_cash(&self) -> bool {
        matches!(self, PaymentMethod::Cash)
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        PaymentMethod::ALL
            .into_iter()
            .find(|m| m.as_str() == wanted)
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "payment_method".to_string(),
                allowed: PaymentMethod::ALL
                    .iter()
                    .map(|m| m.as_str().to_string())
                    .collect(),
            })
    }
}

// =============================================================================
// Payment
// =============================================================================

/// One tender applied to an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosOrderPayment {
    pub id: String,
    pub order_id: String,
    pub payment_method: PaymentMethod,
    pub amount: Money,
    /// For cash: what the customer handed over.
    pub tendered: Option<Money>,
    /// For cash: what was handed back.
    pub change: Option<Money>,
    pub created_at: DateTime<Utc>,
}

/// Payment row to persist; the repository assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPosOrderPayment {
    pub order_id: String,
    pub payment_method: PaymentMethod,
    pub amount: Money,
    pub tendered: Option<Money>,
    pub change: Option<Money>,
}

// =============================================================================
// Unit Tests
// =============================================================================
