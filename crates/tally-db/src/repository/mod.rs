//! # Repository Module
//!
//! `tally-app` port implementations for [`crate::SqliteStore`].
//!
//! ## Port Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SqliteStore                                                            │
//! │  ├── session.rs   SessionRepository   pos_sessions                      │
//! │  ├── order.rs     OrderRepository     pos_orders, pos_order_lines,      │
//! │  │                                    order_sequences                   │
//! │  ├── payment.rs   PaymentRepository   pos_order_payments                │
//! │  ├── discount.rs  DiscountRepository  pos_discounts                     │
//! │  └── loyalty.rs   LoyaltyRepository   loyalty_programs, loyalty_cards,  │
//! │                                       loyalty_transactions              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Rows are read into private `*Row` structs first, then converted. Decimal
//! columns are TEXT and a value that fails to parse is reported as corrupt
//! instead of being coerced.

pub mod discount;
pub mod loyalty;
pub mod order;
pub mod payment;
pub mod session;

use tally_core::money::Money;
use uuid::Uuid;

use crate::error::{DbError, DbResult};

pub(crate) fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Parses a TEXT decimal column.
pub(crate) fn money(column: &str, raw: &str) -> DbResult<Money> {
    Money::parse(raw).map_err(|_| DbError::corrupt(column, raw))
}

pub(crate) fn opt_money(column: &str, raw: Option<&str>) -> DbResult<Option<Money>> {
    raw.map(|value| money(column, value)).transpose()
}
