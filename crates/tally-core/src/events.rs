//! # Domain Events
//!
//! Facts published after a use case commits.
//!
//! ## Order Placement Sequence
//! ```text
//! PlaceOrder commit
//!      │
//!      ├──► DiscountCodeApplied      (only when a code was applied)
//!      ├──► SplitPaymentProcessed    (only when more than one payment entry)
//!      └──► PosOrderPlaced           (always, always last)
//!                 │
//!                 └──► loyalty listener (best effort)
//! ```
//!
//! Payloads are serialized with a `type` tag so they can be logged or
//! forwarded as JSON. `PosOrderPlaced` tolerates older payloads that lack
//! `customer_id` and `total_amount`.

use serde::{Deserialize, Serialize};

use crate::money::{Money, Points};
use crate::types::PosOrderLine;

/// Emitted once per placed order, after every other order event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosOrderPlaced {
    pub order_id: String,
    pub tenant_id: String,
    pub lines: Vec<PosOrderLine>,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub total_amount: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscountCodeApplied {
    pub order_id: String,
    pub tenant_id: String,
    pub discount_id: String,
    pub code: String,
    pub discount_amount: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitPaymentProcessed {
    pub order_id: String,
    pub payment_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoyaltyProgramCreated {
    pub program_id: String,
    pub tenant_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoyaltyPointsAccrued {
    pub card_id: String,
    pub tenant_id: String,
    pub customer_id: String,
    pub points: Points,
    pub balance: Points,
    pub reference: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoyaltyPointsRedeemed {
    pub card_id: String,
    pub tenant_id: String,
    pub points: Points,
    pub discount_amount: Money,
    pub balance: Points,
}

/// Every event the engine publishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DomainEvent {
    PosOrderPlaced(PosOrderPlaced),
    DiscountCodeApplied(DiscountCodeApplied),
    SplitPaymentProcessed(SplitPaymentProcessed),
    LoyaltyProgramCreated(LoyaltyProgramCreated),
    LoyaltyPointsAccrued(LoyaltyPointsAccrued),
    LoyaltyPointsRedeemed(LoyaltyPointsRedeemed),
}

impl DomainEvent {
    /// Stable event name, identical to the serialized `type` tag.
    pub const fn name(&self) -> &'static str {
        match self {
            DomainEvent::PosOrderPlaced(_) => "PosOrderPlaced",
            DomainEvent::DiscountCodeApplied(_) => "DiscountCodeApplied",
            DomainEvent::SplitPaymentProcessed(_) => "SplitPaymentProcessed",
            DomainEvent::LoyaltyProgramCreated(_) => "LoyaltyProgramCreated",
            DomainEvent::LoyaltyPointsAccrued(_) => "LoyaltyPointsAccrued",
            DomainEvent::LoyaltyPointsRedeemed(_) => "LoyaltyPointsRedeemed",
        }
    }
}

macro_rules! impl_from_event {
    ($($event:ident),* $(,)?) => {
        $(
            impl From<$event> for DomainEvent {
                fn from(event: $event) -> Self {
                    DomainEvent::$event(event)
                }
            }
        )*
    };
}

impl_from_event!(
    PosOrderPlaced,
    DiscountCodeApplied,
    SplitPaymentProcessed,
    LoyaltyProgramCreated,
    LoyaltyPointsAccrued,
    LoyaltyPointsRedeemed,
);
