//! # tally-db: Database Layer for Tally POS
//!
//! SQLite adapters for the `tally-app` ports, built on sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tally POS Data Flow                              │
//! │                                                                         │
//! │  PosServices (tally-app)                                                │
//! │       │  Arc<dyn SessionRepository>, Arc<dyn TransactionManager>, ...   │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                     tally-db (THIS CRATE)                       │    │
//! │  │                                                                 │    │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐    │    │
//! │  │   │   Database    │    │  SqliteStore  │    │  Migrations  │    │    │
//! │  │   │   (pool.rs)   │───►│  (store.rs +  │    │  (embedded)  │    │    │
//! │  │   │               │    │  repository/) │    │              │    │    │
//! │  │   │ SqlitePool    │    │ every port +  │    │ 001_initial  │    │    │
//! │  │   │               │    │ transactions  │    │ _schema.sql  │    │    │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘    │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database file (TALLY_DB_PATH)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tally_app::{AppConfig, PosServices};
//! use tally_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("tally.db")).await?;
//! let store = Arc::new(db.store());
//! let services = PosServices::new(store, AppConfig::load()?);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use store::SqliteStore;

// =============================================================================
// End-to-end Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use tally_app::bus::EventLog;
    use tally_app::ports::{
        DiscountRepository, LoyaltyRepository, PaymentRepository, SessionRepository,
    };
    use tally_app::use_cases::{PlaceOrderInput, PlaceOrderUseCase};
    use tally_app::{AppConfig, EventBus, PosServices, StoreResult};
    use tally_core::discount::{DiscountType, NewDiscount};
    use tally_core::loyalty::NewLoyaltyProgram;
    use tally_core::money::Money;
    use tally_core::payment::PaymentEntry;
    use tally_core::types::{OrderLineInput, PaymentMethod, PosSession, SessionTotals};

    use crate::repository::test_support::store;
    use crate::SqliteStore;

    const TENANT: &str = "tenant-1";

    async fn setup() -> (Arc<SqliteStore>, PosServices, PosSession, Arc<EventLog>) {
        let store = Arc::new(store().await);
        let session = store.open_session(TENANT).await.unwrap();
        let services = PosServices::new(store.clone(), AppConfig::for_tenant(TENANT));
        let log = Arc::new(EventLog::new());
        services.bus.subscribe(log.clone());
        (store, services, session, log)
    }

    fn input(session: &PosSession, price: i64) -> PlaceOrderInput {
        PlaceOrderInput {
            tenant_id: TENANT.to_string(),
            session_id: session.id.clone(),
            created_by: "cashier-1".to_string(),
            customer_id: Some("cust-1".to_string()),
            lines: vec![OrderLineInput::new(
                "p1",
                "Widget",
                Money::from_int(price),
                Money::from_int(1),
            )],
            discount_code: None,
            payment_method: None,
            payments: vec![
                PaymentEntry::new(PaymentMethod::Cash, Money::from_int(price - 10)),
                PaymentEntry::new(PaymentMethod::Card, Money::from_int(10)),
            ],
            cash_tendered: Some(Money::from_int(price)),
        }
    }

    #[tokio::test]
    async fn test_split_order_with_loyalty() {
        let (store, services, session, log) = setup().await;
        let program = services
            .create_loyalty_program
            .execute(NewLoyaltyProgram {
                tenant_id: TENANT.to_string(),
                name: "Rewards".to_string(),
                points_per_currency_unit: Money::from_int(1),
                redemption_rate: Money::from_int(100),
                is_active: true,
            })
            .await
            .unwrap();

        let placed = services
            .place_order
            .execute(input(&session, 50))
            .await
            .unwrap();

        assert_eq!(placed.order.order_number, "POS-000001");
        assert_eq!(placed.change, Money::from_int(10));
        assert_eq!(placed.session.total_sales, Money::from_int(50));

        let payments = store.list_by_order(&placed.order.id).await.unwrap();
        assert_eq!(payments.len(), 2);
        assert_eq!(payments[0].payment_method, PaymentMethod::Cash);
        assert_eq!(payments[0].change, Some(Money::from_int(10)));

        let card = store
            .find_card_by_customer(TENANT, "cust-1", &program.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(card.points_balance, Money::from_int(50));

        assert_eq!(
            log.names(),
            vec![
                "LoyaltyProgramCreated",
                "SplitPaymentProcessed",
                "PosOrderPlaced",
                "LoyaltyPointsAccrued",
            ]
        );
    }

    #[tokio::test]
    async fn test_exhausted_code_rolls_back_everything() {
        let (store, services, session, log) = setup().await;
        let discount = services
            .create_discount
            .execute(NewDiscount {
                tenant_id: TENANT.to_string(),
                code: "ONCE".to_string(),
                name: "One shot".to_string(),
                discount_type: DiscountType::FixedAmount,
                value: Money::from_int(5),
                usage_limit: Some(1),
                expires_at: None,
                is_active: true,
            })
            .await
            .unwrap();
        // Used up elsewhere
        assert!(store.increment_usage(&discount.id).await.unwrap());

        let mut order = input(&session, 50);
        order.discount_code = Some("once".to_string());
        let err = services.place_order.execute(order).await.unwrap_err();

        assert_eq!(err.to_string(), "Discount code usage limit has been reached.");
        assert!(!store.in_transaction());
        assert!(log.names().is_empty());

        // Nothing persisted, number not consumed
        let placed = services
            .place_order
            .execute(input(&session, 50))
            .await
            .unwrap();
        assert_eq!(placed.order.order_number, "POS-000001");
        assert_eq!(placed.session.order_count, 1);
    }

    /// Stalls before the session counters are written.
    struct SlowSessions(Arc<SqliteStore>);

    #[async_trait]
    impl SessionRepository for SlowSessions {
        async fn find_by_id(&self, id: &str) -> StoreResult<Option<PosSession>> {
            SessionRepository::find_by_id(self.0.as_ref(), id).await
        }

        async fn update_totals(&self, id: &str, totals: SessionTotals) -> StoreResult<PosSession> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            self.0.update_totals(id, totals).await
        }
    }

    #[tokio::test]
    async fn test_cancelled_order_rolls_back() {
        let (store, services, session, _log) = setup().await;
        let slow = PlaceOrderUseCase::new(
            Arc::new(SlowSessions(store.clone())),
            store.clone(),
            store.clone(),
            Arc::new(EventBus::new()),
        )
        .with_payments(store.clone());

        let timed_out =
            tokio::time::timeout(Duration::from_millis(20), slow.execute(input(&session, 50)))
                .await;
        assert!(timed_out.is_err());
        assert!(!store.in_transaction());

        let placed = tokio::time::timeout(
            Duration::from_secs(2),
            services.place_order.execute(input(&session, 50)),
        )
        .await
        .expect("store still locked")
        .unwrap();

        // The cancelled order and its number are gone
        assert_eq!(placed.order.order_number, "POS-000001");
        assert_eq!(placed.session.order_count, 1);
        assert_eq!(store.list_by_order(&placed.order.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_closed_session_rejected() {
        let (store, services, session, _log) = setup().await;
        store.close_session(&session.id).await.unwrap();

        let err = services
            .place_order
            .execute(input(&session, 50))
            .await
            .unwrap_err();

        assert!(!err.is_not_found());
        assert!(!store.in_transaction());
    }
}
