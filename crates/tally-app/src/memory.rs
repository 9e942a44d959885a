//! # In-Memory Store
//!
//! One object implementing every port, for tests, demos and embedding.
//!
//! ## Transactions
//! ```text
//! begin()     wait for the transaction lock, snapshot all tables
//! commit()    drop the snapshot, release the lock
//! rollback()  restore the snapshot, release the lock
//! drop        same as rollback
//! ```
//!
//! Writes made outside a transaction apply immediately.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, warn};
use uuid::Uuid;

use tally_core::discount::{NewDiscount, PosDiscount};
use tally_core::loyalty::{
    LoyaltyCard, LoyaltyProgram, LoyaltyTransaction, NewLoyaltyCard, NewLoyaltyProgram,
    NewLoyaltyTransaction,
};
use tally_core::money::{Money, Points};
use tally_core::types::{
    NewPosOrder, NewPosOrderPayment, PosOrder, PosOrderPayment, PosSession, SessionStatus,
    SessionTotals,
};

use crate::error::{StoreError, StoreResult};
use crate::ports::{
    DiscountRepository, LoyaltyRepository, OrderRepository, PaymentRepository, SessionRepository,
    StoreTransaction, TransactionManager,
};

#[derive(Debug, Clone, Default)]
struct Tables {
    sessions: HashMap<String, PosSession>,
    orders: HashMap<String, PosOrder>,
    order_sequences: HashMap<String, i64>,
    payments: Vec<PosOrderPayment>,
    discounts: HashMap<String, PosDiscount>,
    programs: HashMap<String, LoyaltyProgram>,
    cards: HashMap<String, LoyaltyCard>,
    loyalty_transactions: Vec<LoyaltyTransaction>,
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    tx_lock: Arc<AsyncMutex<()>>,
}

fn poisoned() -> StoreError {
    StoreError::Backend("in-memory store lock poisoned".to_string())
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Tables>> {
        self.tables.read().map_err(|_| poisoned())
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Tables>> {
        self.tables.write().map_err(|_| poisoned())
    }

    /// Opens a register session for `tenant_id` and returns it.
    pub fn open_session(&self, tenant_id: &str) -> StoreResult<PosSession> {
        let session = PosSession {
            id: new_id(),
            tenant_id: tenant_id.to_string(),
            status: SessionStatus::Open,
            total_sales: Money::zero(),
            order_count: 0,
            opened_at: Utc::now(),
            closed_at: None,
        };
        self.write()?
            .sessions
            .insert(session.id.clone(), session.clone());
        Ok(session)
    }

    /// Closes a session so it stops accepting orders.
    pub fn close_session(&self, id: &str) -> StoreResult<PosSession> {
        let mut tables = self.write()?;
        let session = tables
            .sessions
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found("POS session", id))?;
        session.status = SessionStatus::Closed;
        session.closed_at = Some(Utc::now());
        Ok(session.clone())
    }

    /// Replaces a stored discount, e.g. to deactivate or expire it.
    pub fn put_discount(&self, discount: PosDiscount) -> StoreResult<()> {
        self.write()?
            .discounts
            .insert(discount.id.clone(), discount);
        Ok(())
    }

    /// Replaces a stored loyalty program.
    pub fn put_program(&self, program: LoyaltyProgram) -> StoreResult<()> {
        self.write()?.programs.insert(program.id.clone(), program);
        Ok(())
    }

    pub fn order_count(&self) -> StoreResult<usize> {
        Ok(self.read()?.orders.len())
    }

    pub fn payment_count(&self) -> StoreResult<usize> {
        Ok(self.read()?.payments.len())
    }

    pub fn discount(&self, id: &str) -> StoreResult<Option<PosDiscount>> {
        Ok(self.read()?.discounts.get(id).cloned())
    }

    pub fn in_transaction(&self) -> bool {
        self.tx_lock.try_lock().is_err()
    }
}

// =============================================================================
// Transaction Manager
// =============================================================================

#[async_trait]
impl TransactionManager for InMemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        let lock = self.tx_lock.clone().lock_owned().await;
        let snapshot = self.read()?.clone();

        debug!("In-memory transaction started");
        Ok(Box::new(MemoryTransaction {
            tables: self.tables.clone(),
            snapshot: Some(snapshot),
            _lock: lock,
        }))
    }
}

/// Holds the pre-transaction tables until commit.
///
/// Field order matters: the snapshot is restored in `drop` before `_lock`
/// is released.
struct MemoryTransaction {
    tables: Arc<RwLock<Tables>>,
    snapshot: Option<Tables>,
    _lock: OwnedMutexGuard<()>,
}

impl MemoryTransaction {
    fn restore(&mut self) -> StoreResult<bool> {
        let Some(snapshot) = self.snapshot.take() else {
            return Ok(false);
        };
        *self.tables.write().map_err(|_| poisoned())? = snapshot;
        Ok(true)
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let mut this = self;
        this.snapshot = None;
        debug!("In-memory transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        let mut this = self;
        this.restore()?;
        debug!("In-memory transaction rolled back");
        Ok(())
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        match self.restore() {
            Ok(true) => warn!("In-memory transaction dropped before commit, rolled back"),
            Ok(false) => {}
            Err(err) => warn!(error = %err, "In-memory transaction dropped, restore failed"),
        }
    }
}

// =============================================================================
// Sessions, Orders, Payments
// =============================================================================

#[async_trait]
impl SessionRepository for InMemoryStore {
    async fn find_by_id(&self, id: &str) -> StoreResult<Option<PosSession>> {
        Ok(self.read()?.sessions.get(id).cloned())
    }

    async fn update_totals(&self, id: &str, totals: SessionTotals) -> StoreResult<PosSession> {
        let mut tables = self.write()?;
        let session = tables
            .sessions
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found("POS session", id))?;
        session.total_sales = totals.total_sales;
        session.order_count = totals.order_count;
        Ok(session.clone())
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn next_number(&self, tenant_id: &str) -> StoreResult<String> {
        let mut tables = self.write()?;
        let sequence = tables
            .order_sequences
            .entry(tenant_id.to_string())
            .or_insert(0);
        *sequence += 1;
        Ok(format!("POS-{:06}", sequence))
    }

    async fn create(&self, order: NewPosOrder) -> StoreResult<PosOrder> {
        let order = PosOrder {
            id: new_id(),
            tenant_id: order.tenant_id,
            session_id: order.session_id,
            order_number: order.order_number,
            customer_id: order.customer_id,
            status: order.status,
            subtotal: order.subtotal,
            discount_amount: order.discount_amount,
            tax_amount: order.tax_amount,
            total: order.total,
            discount_code_id: order.discount_code_id,
            created_by: order.created_by,
            lines: order.lines,
            created_at: Utc::now(),
        };
        self.write()?.orders.insert(order.id.clone(), order.clone());
        Ok(order)
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<PosOrder>> {
        Ok(self.read()?.orders.get(id).cloned())
    }
}

#[async_trait]
impl PaymentRepository for InMemoryStore {
    async fn create(&self, payment: NewPosOrderPayment) -> StoreResult<PosOrderPayment> {
        let payment = PosOrderPayment {
            id: new_id(),
            order_id: payment.order_id,
            payment_method: payment.payment_method,
            amount: payment.amount,
            tendered: payment.tendered,
            change: payment.change,
            created_at: Utc::now(),
        };
        self.write()?.payments.push(payment.clone());
        Ok(payment)
    }

    async fn list_by_order(&self, order_id: &str) -> StoreResult<Vec<PosOrderPayment>> {
        Ok(self
            .read()?
            .payments
            .iter()
            .filter(|p| p.order_id == order_id)
            .cloned()
            .collect())
    }
}

// =============================================================================
// Discounts
// =============================================================================

#[async_trait]
impl DiscountRepository for InMemoryStore {
    async fn find_by_code(
        &self,
        tenant_id: &str,
        code: &str,
    ) -> StoreResult<Option<PosDiscount>> {
        Ok(self
            .read()?
            .discounts
            .values()
            .find(|d| d.tenant_id == tenant_id && d.code == code)
            .cloned())
    }

    async fn increment_usage(&self, id: &str) -> StoreResult<bool> {
        let mut tables = self.write()?;
        let discount = tables
            .discounts
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found("Discount", id))?;

        if discount
            .usage_limit
            .is_some_and(|limit| discount.times_used >= limit)
        {
            return Ok(false);
        }

        discount.times_used += 1;
        Ok(true)
    }

    async fn create(&self, discount: NewDiscount) -> StoreResult<PosDiscount> {
        let mut tables = self.write()?;
        if tables
            .discounts
            .values()
            .any(|d| d.tenant_id == discount.tenant_id && d.code == discount.code)
        {
            return Err(StoreError::Conflict(format!(
                "discount code {} already exists",
                discount.code
            )));
        }

        let discount = PosDiscount {
            id: new_id(),
            tenant_id: discount.tenant_id,
            code: discount.code,
            name: discount.name,
            discount_type: discount.discount_type,
            value: discount.value,
            usage_limit: discount.usage_limit,
            times_used: 0,
            expires_at: discount.expires_at,
            is_active: discount.is_active,
        };
        tables.discounts.insert(discount.id.clone(), discount.clone());
        Ok(discount)
    }
}

// =============================================================================
// Loyalty
// =============================================================================

#[async_trait]
impl LoyaltyRepository for InMemoryStore {
    async fn find_by_id(&self, id: &str) -> StoreResult<Option<LoyaltyProgram>> {
        Ok(self.read()?.programs.get(id).cloned())
    }

    async fn find_active_by_tenant(&self, tenant_id: &str) -> StoreResult<Option<LoyaltyProgram>> {
        Ok(self
            .read()?
            .programs
            .values()
            .filter(|p| p.tenant_id == tenant_id && p.is_active)
            .min_by_key(|p| p.created_at)
            .cloned())
    }

    async fn create_program(&self, program: NewLoyaltyProgram) -> StoreResult<LoyaltyProgram> {
        let program = LoyaltyProgram {
            id: new_id(),
            tenant_id: program.tenant_id,
            name: program.name,
            points_per_currency_unit: program.points_per_currency_unit,
            redemption_rate: program.redemption_rate,
            is_active: program.is_active,
            created_at: Utc::now(),
        };
        self.write()?
            .programs
            .insert(program.id.clone(), program.clone());
        Ok(program)
    }

    async fn find_card_by_id(&self, id: &str) -> StoreResult<Option<LoyaltyCard>> {
        Ok(self.read()?.cards.get(id).cloned())
    }

    async fn find_card_by_customer(
        &self,
        tenant_id: &str,
        customer_id: &str,
        program_id: &str,
    ) -> StoreResult<Option<LoyaltyCard>> {
        Ok(self
            .read()?
            .cards
            .values()
            .find(|c| {
                c.tenant_id == tenant_id
                    && c.customer_id == customer_id
                    && c.program_id == program_id
            })
            .cloned())
    }

    async fn create_card(&self, card: NewLoyaltyCard) -> StoreResult<LoyaltyCard> {
        let card = LoyaltyCard {
            id: new_id(),
            tenant_id: card.tenant_id,
            program_id: card.program_id,
            customer_id: card.customer_id,
            points_balance: Money::zero(),
            is_active: true,
            created_at: Utc::now(),
        };
        self.write()?.cards.insert(card.id.clone(), card.clone());
        Ok(card)
    }

    async fn update_card_balance(&self, id: &str, balance: Points) -> StoreResult<LoyaltyCard> {
        let mut tables = self.write()?;
        let card = tables
            .cards
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found("Loyalty card", id))?;
        card.points_balance = balance;
        Ok(card.clone())
    }

    async fn create_transaction(
        &self,
        transaction: NewLoyaltyTransaction,
    ) -> StoreResult<LoyaltyTransaction> {
        let transaction = LoyaltyTransaction {
            id: new_id(),
            tenant_id: transaction.tenant_id,
            card_id: transaction.card_id,
            transaction_type: transaction.transaction_type,
            points: transaction.points,
            balance_after: transaction.balance_after,
            reference: transaction.reference,
            created_at: Utc::now(),
        };
        self.write()?.loyalty_transactions.push(transaction.clone());
        Ok(transaction)
    }

    async fn list_transactions(&self, card_id: &str) -> StoreResult<Vec<LoyaltyTransaction>> {
        Ok(self
            .read()?
            .loyalty_transactions
            .iter()
            .filter(|t| t.card_id == card_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::discount::DiscountType;

    fn new_discount(code: &str, usage_limit: Option<i64>) -> NewDiscount {
        NewDiscount {
            tenant_id: "tenant-1".to_string(),
            code: code.to_string(),
            name: "Promo".to_string(),
            discount_type: DiscountType::Percentage,
            value: Money::from_int(10),
            usage_limit,
            expires_at: None,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_order_numbers_are_per_tenant() {
        let store = InMemoryStore::new();
        assert_eq!(store.next_number("a").await.unwrap(), "POS-000001");
        assert_eq!(store.next_number("a").await.unwrap(), "POS-000002");
        assert_eq!(store.next_number("b").await.unwrap(), "POS-000001");
    }

    #[tokio::test]
    async fn test_increment_usage_respects_limit() {
        let store = InMemoryStore::new();
        let discount = DiscountRepository::create(&store, new_discount("ONCE", Some(1)))
            .await
            .unwrap();

        assert!(store.increment_usage(&discount.id).await.unwrap());
        assert!(!store.increment_usage(&discount.id).await.unwrap());
        assert_eq!(store.discount(&discount.id).unwrap().unwrap().times_used, 1);
    }

    #[tokio::test]
    async fn test_duplicate_code_conflicts() {
        let store = InMemoryStore::new();
        DiscountRepository::create(&store, new_discount("DUP", None))
            .await
            .unwrap();
        let err = DiscountRepository::create(&store, new_discount("DUP", None))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_rollback_restores_snapshot() {
        let store = InMemoryStore::new();
        let session = store.open_session("tenant-1").unwrap();

        let tx = store.begin().await.unwrap();
        assert!(store.in_transaction());
        store
            .update_totals(
                &session.id,
                SessionTotals {
                    total_sales: Money::from_int(10),
                    order_count: 1,
                },
            )
            .await
            .unwrap();
        store.next_number("tenant-1").await.unwrap();
        tx.rollback().await.unwrap();

        let session = SessionRepository::find_by_id(&store, &session.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.order_count, 0);
        assert_eq!(store.next_number("tenant-1").await.unwrap(), "POS-000001");
        assert!(!store.in_transaction());
    }

    #[tokio::test]
    async fn test_commit_keeps_writes() {
        let store = InMemoryStore::new();
        let tx = store.begin().await.unwrap();
        store.next_number("tenant-1").await.unwrap();
        tx.commit().await.unwrap();

        assert!(!store.in_transaction());
        assert_eq!(store.next_number("tenant-1").await.unwrap(), "POS-000002");
    }

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() {
        let store = InMemoryStore::new();

        let tx = store.begin().await.unwrap();
        store.next_number("tenant-1").await.unwrap();
        drop(tx);

        assert!(!store.in_transaction());
        assert_eq!(store.next_number("tenant-1").await.unwrap(), "POS-000001");

        // Lock released: the next transaction starts right away
        let tx = store.begin().await.unwrap();
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_transactions_are_serialized() {
        let store = Arc::new(InMemoryStore::new());
        let tx = store.begin().await.unwrap();

        let waiter = {
            let store = store.clone();
            tokio::spawn(async move {
                let tx = store.begin().await.unwrap();
                tx.commit().await.unwrap();
            })
        };

        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        tx.commit().await.unwrap();
        waiter.await.unwrap();
    }
}
