//! # Payment Reconciliation
//!
//! Checks a tender against the order total and works out change.
//!
//! ## Input Shapes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Legacy single tender            Split tender                           │
//! │  ─────────────────────           ─────────────────────────────────      │
//! │  payment_method: "cash"          payments: [                            │
//! │  cash_tendered:  "100"             { payment_method: "cash", "60" },    │
//! │                                    { payment_method: "card", "40" },    │
//! │                                  ]                                      │
//! │                                  cash_tendered: "70"                    │
//! │          │                                │                             │
//! │          ▼                                ▼                             │
//! │  cash: tendered ≥ total          1. every amount > 0                    │
//! │  other: nothing to check         2. Σ amount == total (exact)           │
//! │                                  3. tendered ≥ cash portion             │
//! │          │                                │                             │
//! │          └──────────────┬─────────────────┘                             │
//! │                         ▼                                               │
//! │                    Settlement                                           │
//! │          rows to persist, change, split flag                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Change in a split tender is `tendered − cash portion`, never
//! `tendered − order total`.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{NewPosOrderPayment, PaymentMethod};

/// One entry of a split tender as submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentEntry {
    pub payment_method: PaymentMethod,
    pub amount: Money,
}

impl PaymentEntry {
    pub fn new(payment_method: PaymentMethod, amount: Money) -> Self {
        PaymentEntry {
            payment_method,
            amount,
        }
    }
}

/// How the customer pays.
#[derive(Debug, Clone, PartialEq)]
pub enum Tender {
    /// One method covers the whole total.
    Single {
        method: PaymentMethod,
        /// Only meaningful for cash. `None` means exact cash.
        cash_tendered: Option<Money>,
    },
    /// The total is spread over several entries.
    Split {
        payments: Vec<PaymentEntry>,
        /// Cash handed over for the cash portion, if known.
        cash_tendered: Option<Money>,
    },
}

impl Tender {
    /// Builds a tender from the raw order input.
    ///
    /// A non-empty `payments` list selects split mode and `payment_method`
    /// is ignored. Otherwise `payment_method` is required.
    pub fn from_parts(
        payment_method: Option<PaymentMethod>,
        payments: Vec<PaymentEntry>,
        cash_tendered: Option<Money>,
    ) -> CoreResult<Tender> {
        if !payments.is_empty() {
            return Ok(Tender::Split {
                payments,
                cash_tendered,
            });
        }

        let method = payment_method.ok_or_else(|| ValidationError::Required {
            field: "Payment method".to_string(),
        })?;

        Ok(Tender::Single {
            method,
            cash_tendered,
        })
    }

    /// Number of payment entries this tender produces.
    pub fn entry_count(&self) -> usize {
        match self {
            Tender::Single { .. } => 1,
            Tender::Split { payments, .. } => payments.len(),
        }
    }
}

/// A payment row ready to be stored against an order.
#[derive(Debug, Clone, PartialEq)]
pub struct SettledPayment {
    pub payment_method: PaymentMethod,
    pub amount: Money,
    pub tendered: Option<Money>,
    pub change: Option<Money>,
}

impl SettledPayment {
    pub fn for_order(&self, order_id: &str) -> NewPosOrderPayment {
        NewPosOrderPayment {
            order_id: order_id.to_string(),
            payment_method: self.payment_method,
            amount: self.amount,
            tendered: self.tendered,
            change: self.change,
        }
    }
}

/// Outcome of a successful reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub payments: Vec<SettledPayment>,
    /// Cash handed back. Zero when no cash changes hands.
    pub change: Money,
    /// More than one payment entry.
    pub is_split: bool,
}

/// Validates `tender` against the final order `total`.
///
/// ## Example
/// ```rust
/// use tally_core::money::Money;
/// use tally_core::payment::{reconcile, PaymentEntry, Tender};
/// use tally_core::types::PaymentMethod;
///
/// let tender = Tender::Split {
///     payments: vec![
///         PaymentEntry::new(PaymentMethod::Cash, Money::from_int(60)),
///         PaymentEntry::new(PaymentMethod::Card, Money::from_int(40)),
///     ],
///     cash_tendered: Some(Money::from_int(70)),
/// };
///
/// let settlement = reconcile(&tender, Money::from_int(100)).unwrap();
/// assert_eq!(settlement.change, Money::from_int(10));
/// assert!(settlement.is_split);
/// ```
pub fn reconcile(tender: &Tender, total: Money) -> CoreResult<Settlement> {
    match tender {
        Tender::Single {
            method,
            cash_tendered,
        } => reconcile_single(*method, *cash_tendered, total),
        Tender::Split {
            payments,
            cash_tendered,
        } => reconcile_split(payments, *cash_tendered, total),
    }
}

fn reconcile_single(
    method: PaymentMethod,
    cash_tendered: Option<Money>,
    total: Money,
) -> CoreResult<Settlement> {
    if !method.is_cash() {
        return Ok(Settlement {
            payments: vec![SettledPayment {
                payment_method: method,
                amount: total,
                tendered: None,
                change: None,
            }],
            change: Money::zero(),
            is_split: false,
        });
    }

    let tendered = cash_tendered.unwrap_or(total);
    let change = settle_cash(tendered, total)?;

    Ok(Settlement {
        payments: vec![SettledPayment {
            payment_method: method,
            amount: total,
            tendered: Some(tendered),
            change: Some(change),
        }],
        change,
        is_split: false,
    })
}

fn reconcile_split(
    payments: &[PaymentEntry],
    cash_tendered: Option<Money>,
    total: Money,
) -> CoreResult<Settlement> {
    if payments.iter().any(|p| !p.amount.is_positive()) {
        return Err(CoreError::PaymentAmountNotPositive);
    }

    let paid = Money::checked_sum(payments.iter().map(|p| p.amount))?;
    if paid != total {
        return Err(CoreError::SplitTotalMismatch { paid, total });
    }

    let cash_portion = Money::checked_sum(
        payments
            .iter()
            .filter(|p| p.payment_method.is_cash())
            .map(|p| p.amount),
    )?;
    let has_cash = payments.iter().any(|p| p.payment_method.is_cash());

    let (tendered, change) = match cash_tendered {
        Some(tendered) if has_cash => (Some(tendered), settle_cash(tendered, cash_portion)?),
        _ => (None, Money::zero()),
    };

    // Tendered and change are recorded once, on the first cash row.
    let mut recorded = false;
    let settled = payments
        .iter()
        .map(|p| {
            let mut row = SettledPayment {
                payment_method: p.payment_method,
                amount: p.amount,
                tendered: None,
                change: None,
            };
            if p.payment_method.is_cash() && !recorded && tendered.is_some() {
                row.tendered = tendered;
                row.change = Some(change);
                recorded = true;
            }
            row
        })
        .collect();

    Ok(Settlement {
        payments: settled,
        change,
        is_split: payments.len() > 1,
    })
}

/// Change due for `tendered` against `required`.
fn settle_cash(tendered: Money, required: Money) -> CoreResult<Money> {
    if tendered < required {
        return Err(CoreError::InsufficientCash { tendered, required });
    }
    Ok(tendered.checked_sub(required)?)
}

// =============================================================================
// Unit Tests
// =============================================================================
