//! # tally-core: Pure Business Logic for Tally POS
//!
//! This crate holds the order-placement rules as pure functions with zero
//! I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tally POS Architecture                           │
//! │                                                                         │
//! │  ┌───────────────────────────────────────────────────────────────────┐  │
//! │  │               Calling layer (HTTP, register UI)                   │  │
//! │  └─────────────────────────────┬─────────────────────────────────────┘  │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼─────────────────────────────────────┐  │
//! │  │                    tally-app (use cases)                          │  │
//! │  │   PlaceOrder, discounts, loyalty, event bus, ports                │  │
//! │  └─────────────────────────────┬─────────────────────────────────────┘  │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼─────────────────────────────────────┐  │
//! │  │               ★ tally-core (THIS CRATE) ★                         │  │
//! │  │                                                                   │  │
//! │  │   ┌─────────┐ ┌─────────┐ ┌──────────┐ ┌─────────┐ ┌─────────┐    │  │
//! │  │   │  money  │ │ pricing │ │ discount │ │ payment │ │ loyalty │    │  │
//! │  │   └─────────┘ └─────────┘ └──────────┘ └─────────┘ └─────────┘    │  │
//! │  │   ┌─────────┐ ┌─────────┐ ┌──────────┐ ┌────────────┐             │  │
//! │  │   │  types  │ │ events  │ │  error   │ │ validation │             │  │
//! │  │   └─────────┘ └─────────┘ └──────────┘ └────────────┘             │  │
//! │  │                                                                   │  │
//! │  │   NO I/O • NO DATABASE • NO ASYNC • PURE FUNCTIONS                │  │
//! │  └───────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  ┌───────────────────────────────────────────────────────────────────┐  │
//! │  │             tally-db (SQLite adapters for the ports)              │  │
//! │  └───────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Fixed-scale exact decimal (no floating point!)
//! - [`types`] - Sessions, orders, lines, payments
//! - [`pricing`] - Line and order totals
//! - [`discount`] - Discount code rules
//! - [`payment`] - Single and split tender reconciliation
//! - [`loyalty`] - Programs, cards, points ledger
//! - [`events`] - Domain events
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use tally_core::money::Money;
//! use tally_core::payment::{reconcile, Tender};
//! use tally_core::pricing::price_order;
//! use tally_core::types::{OrderLineInput, PaymentMethod};
//!
//! let line = OrderLineInput::new("sku-1", "Coffee beans", Money::from_int(100), Money::from_int(1))
//!     .with_discount(Money::from_int(10))
//!     .with_tax_rate(Money::from_int(10));
//!
//! let totals = price_order(&[line]).unwrap();
//! assert_eq!(totals.total.to_string(), "99.00000000");
//!
//! let tender = Tender::Single {
//!     method: PaymentMethod::Cash,
//!     cash_tendered: Some(Money::from_int(100)),
//! };
//! let settlement = reconcile(&tender, totals.total).unwrap();
//! assert_eq!(settlement.change.to_display(), "1.00");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod discount;
pub mod error;
pub mod events;
pub mod loyalty;
pub mod money;
pub mod payment;
pub mod pricing;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ErrorKind, ValidationError};
pub use events::DomainEvent;
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Fractional digits kept by every stored or computed amount.
pub const DECIMAL_SCALE: u32 = 8;

/// Fractional digits shown to customers and operators.
pub const DISPLAY_SCALE: u32 = 2;

/// Maximum length of a discount code.
pub const MAX_CODE_LENGTH: usize = 50;

/// Maximum length of a display name.
pub const MAX_NAME_LENGTH: usize = 255;
