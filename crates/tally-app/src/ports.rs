//! # Ports
//!
//! The collaborator contracts the use cases depend on. `tally-db` provides
//! SQLite adapters, [`crate::memory::InMemoryStore`] provides in-process ones.
//!
//! ## Port Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                            Use Cases                                    │
//! │                                                                         │
//! │  PlaceOrder ─────┬──► SessionRepository    find_by_id, update_totals    │
//! │                  ├──► OrderRepository      next_number, create          │
//! │                  ├──► PaymentRepository    create            (optional) │
//! │                  ├──► DiscountRepository   find_by_code,     (optional) │
//! │                  │                         increment_usage              │
//! │                  ├──► TransactionManager   begin ──► commit / rollback  │
//! │                  └──► EventDispatcher      dispatch (after commit)      │
//! │                                                                         │
//! │  Loyalty ────────┬──► LoyaltyRepository    programs, cards, ledger      │
//! │                  ├──► TransactionManager                                │
//! │                  └──► EventDispatcher                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use tally_core::discount::{NewDiscount, PosDiscount};
use tally_core::events::DomainEvent;
use tally_core::loyalty::{
    LoyaltyCard, LoyaltyProgram, LoyaltyTransaction, NewLoyaltyCard, NewLoyaltyProgram,
    NewLoyaltyTransaction,
};
use tally_core::money::{Money, Points};
use tally_core::types::{
    NewPosOrder, NewPosOrderPayment, PosOrder, PosOrderPayment, PosSession, SessionTotals,
};

use crate::error::{AppResult, StoreResult};

// =============================================================================
// Repositories
// =============================================================================

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> StoreResult<Option<PosSession>>;

    /// Writes new running totals and returns the updated session.
    async fn update_totals(&self, id: &str, totals: SessionTotals) -> StoreResult<PosSession>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Allocates the next order number for a tenant, e.g. `POS-000042`.
    async fn next_number(&self, tenant_id: &str) -> StoreResult<String>;

    async fn create(&self, order: NewPosOrder) -> StoreResult<PosOrder>;

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<PosOrder>>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn create(&self, payment: NewPosOrderPayment) -> StoreResult<PosOrderPayment>;

    async fn list_by_order(&self, order_id: &str) -> StoreResult<Vec<PosOrderPayment>>;
}

#[async_trait]
pub trait DiscountRepository: Send + Sync {
    /// `code` is already normalized to uppercase.
    async fn find_by_code(&self, tenant_id: &str, code: &str)
        -> StoreResult<Option<PosDiscount>>;

    /// Atomically bumps `times_used` unless that would pass `usage_limit`.
    ///
    /// Returns `false` when the limit stopped the increment.
    async fn increment_usage(&self, id: &str) -> StoreResult<bool>;

    async fn create(&self, discount: NewDiscount) -> StoreResult<PosDiscount>;
}

#[async_trait]
pub trait LoyaltyRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> StoreResult<Option<LoyaltyProgram>>;

    /// The tenant's active program, if any.
    async fn find_active_by_tenant(&self, tenant_id: &str) -> StoreResult<Option<LoyaltyProgram>>;

    async fn create_program(&self, program: NewLoyaltyProgram) -> StoreResult<LoyaltyProgram>;

    async fn find_card_by_id(&self, id: &str) -> StoreResult<Option<LoyaltyCard>>;

    async fn find_card_by_customer(
        &self,
        tenant_id: &str,
        customer_id: &str,
        program_id: &str,
    ) -> StoreResult<Option<LoyaltyCard>>;

    /// Creates a card with a zero balance.
    async fn create_card(&self, card: NewLoyaltyCard) -> StoreResult<LoyaltyCard>;

    async fn update_card_balance(&self, id: &str, balance: Points) -> StoreResult<LoyaltyCard>;

    async fn create_transaction(
        &self,
        transaction: NewLoyaltyTransaction,
    ) -> StoreResult<LoyaltyTransaction>;

    async fn list_transactions(&self, card_id: &str) -> StoreResult<Vec<LoyaltyTransaction>>;
}

// =============================================================================
// Transactions
// =============================================================================

/// Opens units of work.
///
/// Implementations serialize transactions: a second `begin` waits until the
/// first transaction is finished.
#[async_trait]
pub trait TransactionManager: Send + Sync {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>>;
}

/// An open unit of work.
///
/// Dropping it without `commit` rolls back and frees the store for the next
/// `begin`. A cancelled or panicking caller never leaves it open.
#[async_trait]
pub trait StoreTransaction: Send {
    async fn commit(self: Box<Self>) -> StoreResult<()>;
    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}

/// Runs `work` inside a transaction.
///
/// Commits on `Ok`. On `Err` rolls back and returns the original error; a
/// failed rollback is logged, not returned. If the returned future is
/// dropped before it completes, the transaction rolls back on drop.
///
/// ## Example
/// ```rust,ignore
/// let order = run_in_transaction(self.tx.as_ref(), self.place(input)).await?;
/// ```
pub async fn run_in_transaction<T, F>(tx: &dyn TransactionManager, work: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    let transaction = tx.begin().await?;

    match work.await {
        Ok(value) => {
            transaction.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = transaction.rollback().await {
                warn!(error = %rollback_err, "Rollback failed");
            }
            Err(err)
        }
    }
}

// =============================================================================
// Events
// =============================================================================

/// Publishes domain events. Never fails from the publisher's point of view.
#[async_trait]
pub trait EventDispatcher: Send + Sync {
    async fn dispatch(&self, event: DomainEvent);
}

/// Reacts to dispatched events.
#[async_trait]
pub trait EventListener: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    async fn handle(&self, event: &DomainEvent);
}

// =============================================================================
// Loyalty accrual seam
// =============================================================================

/// Outcome of crediting points for a purchase.
#[derive(Debug, Clone, PartialEq)]
pub struct Accrual {
    pub card: LoyaltyCard,
    pub points: Points,
}

/// Request to credit points for a purchase.
#[derive(Debug, Clone, PartialEq)]
pub struct AccrualRequest {
    pub tenant_id: String,
    pub program_id: String,
    pub customer_id: String,
    pub order_amount: Money,
    pub reference: Option<String>,
}

/// Anything that can credit loyalty points.
#[async_trait]
pub trait PointsAccrual: Send + Sync {
    async fn accrue(&self, request: AccrualRequest) -> AppResult<Accrual>;
}

#[async_trait]
impl<T: PointsAccrual + ?Sized> PointsAccrual for Arc<T> {
    async fn accrue(&self, request: AccrualRequest) -> AppResult<Accrual> {
        (**self).accrue(request).await
    }
}
