//! # Service Wiring
//!
//! Builds every use case over one store and one event bus.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Arc<S: PosStore>  (InMemoryStore or tally_db::SqliteStore)             │
//! │        │                                                                │
//! │        ├──► PlaceOrderUseCase  ──dispatch──►  EventBus                  │
//! │        ├──► CreatePosDiscountUseCase            │                       │
//! │        ├──► CreateLoyaltyProgramUseCase         │ PosOrderPlaced        │
//! │        ├──► AccrueLoyaltyPointsUseCase ◄────────┘ (auto_accrue_loyalty) │
//! │        └──► RedeemLoyaltyPointsUseCase                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use tracing::info;

use crate::bus::EventBus;
use crate::config::AppConfig;
use crate::listeners::PosOrderPlacedLoyaltyListener;
use crate::ports::{
    DiscountRepository, LoyaltyRepository, OrderRepository, PaymentRepository, SessionRepository,
    TransactionManager,
};
use crate::use_cases::{
    AccrueLoyaltyPointsUseCase, CreateLoyaltyProgramUseCase, CreatePosDiscountUseCase,
    PlaceOrderUseCase, RedeemLoyaltyPointsUseCase,
};

/// A storage backend implementing every port.
pub trait PosStore:
    SessionRepository
    + OrderRepository
    + PaymentRepository
    + DiscountRepository
    + LoyaltyRepository
    + TransactionManager
    + 'static
{
}

impl<T> PosStore for T where
    T: SessionRepository
        + OrderRepository
        + PaymentRepository
        + DiscountRepository
        + LoyaltyRepository
        + TransactionManager
        + 'static
{
}

pub struct PosServices {
    pub config: AppConfig,
    pub bus: Arc<EventBus>,
    pub place_order: PlaceOrderUseCase,
    pub create_discount: CreatePosDiscountUseCase,
    pub create_loyalty_program: CreateLoyaltyProgramUseCase,
    pub accrue_points: Arc<AccrueLoyaltyPointsUseCase>,
    pub redeem_points: RedeemLoyaltyPointsUseCase,
}

impl PosServices {
    pub fn new<S: PosStore>(store: Arc<S>, config: AppConfig) -> Self {
        let bus = Arc::new(EventBus::new());

        let place_order =
            PlaceOrderUseCase::new(store.clone(), store.clone(), store.clone(), bus.clone())
                .with_payments(store.clone())
                .with_discounts(store.clone());
        let create_discount = CreatePosDiscountUseCase::new(store.clone(), store.clone());
        let create_loyalty_program =
            CreateLoyaltyProgramUseCase::new(store.clone(), store.clone(), bus.clone());
        let accrue_points = Arc::new(AccrueLoyaltyPointsUseCase::new(
            store.clone(),
            store.clone(),
            bus.clone(),
        ));
        let redeem_points = RedeemLoyaltyPointsUseCase::new(store.clone(), store.clone(), bus.clone());

        if config.auto_accrue_loyalty {
            bus.subscribe(Arc::new(PosOrderPlacedLoyaltyListener::new(
                store.clone(),
                accrue_points.clone(),
            )));
        }

        info!(
            tenant_id = %config.tenant_id,
            auto_accrue_loyalty = config.auto_accrue_loyalty,
            "POS services ready"
        );

        Self {
            config,
            bus,
            place_order,
            create_discount,
            create_loyalty_program,
            accrue_points,
            redeem_points,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventLog;
    use crate::memory::InMemoryStore;
    use crate::use_cases::{PlaceOrderInput, RedeemPointsInput};
    use tally_core::discount::{DiscountType, NewDiscount};
    use tally_core::loyalty::NewLoyaltyProgram;
    use tally_core::money::Money;
    use tally_core::types::{OrderLineInput, PaymentMethod, PosSession};

    const TENANT: &str = "tenant-1";

    fn setup(auto_accrue: bool) -> (Arc<InMemoryStore>, PosServices, PosSession, Arc<EventLog>) {
        let store = Arc::new(InMemoryStore::new());
        let session = store.open_session(TENANT).unwrap();
        let mut config = AppConfig::for_tenant(TENANT);
        config.auto_accrue_loyalty = auto_accrue;
        let services = PosServices::new(store.clone(), config);
        let log = Arc::new(EventLog::new());
        services.bus.subscribe(log.clone());
        (store, services, session, log)
    }

    fn order(session: &PosSession, price: i64, customer: Option<&str>) -> PlaceOrderInput {
        PlaceOrderInput {
            tenant_id: TENANT.to_string(),
            session_id: session.id.clone(),
            created_by: "cashier-1".to_string(),
            customer_id: customer.map(str::to_string),
            lines: vec![OrderLineInput::new(
                "p1",
                "Widget",
                Money::from_int(price),
                Money::from_int(1),
            )],
            discount_code: None,
            payment_method: Some(PaymentMethod::Card),
            payments: vec![],
            cash_tendered: None,
        }
    }

    async fn rewards(services: &PosServices) -> String {
        services
            .create_loyalty_program
            .execute(NewLoyaltyProgram {
                tenant_id: TENANT.to_string(),
                name: "Rewards".to_string(),
                points_per_currency_unit: Money::from_int(1),
                redemption_rate: Money::from_int(10),
                is_active: true,
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_order_accrues_then_redeems() {
        let (store, services, session, log) = setup(true);
        let program_id = rewards(&services).await;
        services
            .create_discount
            .execute(NewDiscount {
                tenant_id: TENANT.to_string(),
                code: "half".to_string(),
                name: "Half off".to_string(),
                discount_type: DiscountType::Percentage,
                value: Money::from_int(50),
                usage_limit: Some(1),
                expires_at: None,
                is_active: true,
            })
            .await
            .unwrap();

        let mut input = order(&session, 200, Some("cust-1"));
        input.discount_code = Some("HALF".to_string());
        let placed = services.place_order.execute(input).await.unwrap();
        assert_eq!(placed.order.total, Money::from_int(100));

        // Points are earned on the post-discount total
        let card = store
            .find_card_by_customer(TENANT, "cust-1", &program_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(card.points_balance, Money::from_int(100));

        let redeemed = services
            .redeem_points
            .execute(RedeemPointsInput {
                tenant_id: TENANT.to_string(),
                card_id: card.id.clone(),
                points: Money::from_int(40),
                reference: None,
            })
            .await
            .unwrap();
        assert_eq!(redeemed.discount_amount, Money::from_int(4));
        assert_eq!(redeemed.card.points_balance, Money::from_int(60));

        assert_eq!(
            log.names(),
            vec![
                "LoyaltyProgramCreated",
                "DiscountCodeApplied",
                "PosOrderPlaced",
                "LoyaltyPointsAccrued",
                "LoyaltyPointsRedeemed",
            ]
        );
    }

    #[tokio::test]
    async fn test_auto_accrue_disabled() {
        let (store, services, session, _log) = setup(false);
        let program_id = rewards(&services).await;

        services
            .place_order
            .execute(order(&session, 50, Some("cust-1")))
            .await
            .unwrap();

        assert!(store
            .find_card_by_customer(TENANT, "cust-1", &program_id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_orders_without_program_still_succeed() {
        let (store, services, session, log) = setup(true);

        let placed = services
            .place_order
            .execute(order(&session, 50, Some("cust-1")))
            .await
            .unwrap();

        assert_eq!(placed.session.order_count, 1);
        assert_eq!(store.order_count().unwrap(), 1);
        assert_eq!(log.names(), vec!["PosOrderPlaced"]);
    }
}
