//! # Accrue Loyalty Points
//!
//! ```text
//! order_amount > 0 ?
//!      │
//!      ▼
//! program exists (same tenant) ? ── no ──► "Loyalty program not found."
//!      │
//!      ▼
//! program active ? ──────────────── no ──► "Cannot accrue points for an
//!      │                                    inactive loyalty program."
//!      ▼
//! find or create the customer's card (new cards start at 0)
//!      │
//!      ▼
//! balance += order_amount × points_per_currency_unit
//! ledger  += accrual entry
//!      │
//!      ▼  (after commit)
//! LoyaltyPointsAccrued
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use tally_core::error::CoreError;
use tally_core::events::LoyaltyPointsAccrued;
use tally_core::loyalty::{ensure_order_amount_positive, NewLoyaltyCard, NewLoyaltyTransaction};

use crate::error::AppResult;
use crate::ports::{
    run_in_transaction, Accrual, AccrualRequest, EventDispatcher, LoyaltyRepository,
    PointsAccrual, TransactionManager,
};

pub struct AccrueLoyaltyPointsUseCase {
    loyalty: Arc<dyn LoyaltyRepository>,
    tx: Arc<dyn TransactionManager>,
    events: Arc<dyn EventDispatcher>,
}

impl AccrueLoyaltyPointsUseCase {
    pub fn new(
        loyalty: Arc<dyn LoyaltyRepository>,
        tx: Arc<dyn TransactionManager>,
        events: Arc<dyn EventDispatcher>,
    ) -> Self {
        Self {
            loyalty,
            tx,
            events,
        }
    }

    pub async fn execute(&self, request: AccrualRequest) -> AppResult<Accrual> {
        ensure_order_amount_positive(request.order_amount)?;

        let accrual = run_in_transaction(self.tx.as_ref(), self.credit(&request)).await?;

        info!(
            card_id = %accrual.card.id,
            points = %accrual.points,
            balance = %accrual.card.points_balance,
            "Loyalty points accrued"
        );

        self.events
            .dispatch(
                LoyaltyPointsAccrued {
                    card_id: accrual.card.id.clone(),
                    tenant_id: accrual.card.tenant_id.clone(),
                    customer_id: accrual.card.customer_id.clone(),
                    points: accrual.points,
                    balance: accrual.card.points_balance,
                    reference: request.reference,
                }
                .into(),
            )
            .await;

        Ok(accrual)
    }

    async fn credit(&self, request: &AccrualRequest) -> AppResult<Accrual> {
        let program = self
            .loyalty
            .find_by_id(&request.program_id)
            .await?
            .filter(|p| p.tenant_id == request.tenant_id)
            .ok_or_else(|| CoreError::not_found("Loyalty program", request.program_id.as_str()))?;
        program.ensure_active()?;

        let existing = self
            .loyalty
            .find_card_by_customer(&request.tenant_id, &request.customer_id, &program.id)
            .await?;
        let mut card = match existing {
            Some(card) => card,
            None => {
                debug!(
                    customer_id = %request.customer_id,
                    program_id = %program.id,
                    "Creating loyalty card"
                );
                self.loyalty
                    .create_card(NewLoyaltyCard {
                        tenant_id: request.tenant_id.clone(),
                        program_id: program.id.clone(),
                        customer_id: request.customer_id.clone(),
                    })
                    .await?
            }
        };

        let points = program.points_for(request.order_amount)?;
        let balance = card.credit(points)?;

        let card = self.loyalty.update_card_balance(&card.id, balance).await?;
        self.loyalty
            .create_transaction(NewLoyaltyTransaction::accrual(
                &card,
                points,
                request.reference.clone(),
            ))
            .await?;

        Ok(Accrual { card, points })
    }
}

#[async_trait]
impl PointsAccrual for AccrueLoyaltyPointsUseCase {
    async fn accrue(&self, request: AccrualRequest) -> AppResult<Accrual> {
        self.execute(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{EventBus, EventLog};
    use crate::memory::InMemoryStore;
    use tally_core::loyalty::{LoyaltyTransactionType, NewLoyaltyProgram};
    use tally_core::money::Money;

    struct Fixture {
        store: Arc<InMemoryStore>,
        log: Arc<EventLog>,
        use_case: AccrueLoyaltyPointsUseCase,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let log = Arc::new(EventLog::new());
        let bus = Arc::new(EventBus::new());
        bus.subscribe(log.clone());
        let use_case = AccrueLoyaltyPointsUseCase::new(store.clone(), store.clone(), bus);
        Fixture {
            store,
            log,
            use_case,
        }
    }

    async fn program(store: &InMemoryStore, earn: &str) -> String {
        store
            .create_program(NewLoyaltyProgram {
                tenant_id: "tenant-1".to_string(),
                name: "Rewards".to_string(),
                points_per_currency_unit: Money::parse(earn).unwrap(),
                redemption_rate: Money::from_int(100),
                is_active: true,
            })
            .await
            .unwrap()
            .id
    }

    fn request(program_id: &str, amount: &str) -> AccrualRequest {
        AccrualRequest {
            tenant_id: "tenant-1".to_string(),
            program_id: program_id.to_string(),
            customer_id: "cust-1".to_string(),
            order_amount: Money::parse(amount).unwrap(),
            reference: Some("order-1".to_string()),
        }
    }

    #[tokio::test]
    async fn test_first_accrual_creates_card() {
        let fx = fixture();
        let program_id = program(&fx.store, "1.5").await;

        let accrual = fx.use_case.execute(request(&program_id, "90")).await.unwrap();

        assert_eq!(accrual.points, Money::from_int(135));
        assert_eq!(accrual.card.points_balance, Money::from_int(135));
        assert_eq!(fx.log.names(), vec!["LoyaltyPointsAccrued"]);

        let ledger = fx.store.list_transactions(&accrual.card.id).await.unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].transaction_type, LoyaltyTransactionType::Accrual);
        assert_eq!(ledger[0].reference.as_deref(), Some("order-1"));
    }

    #[tokio::test]
    async fn test_second_accrual_reuses_card() {
        let fx = fixture();
        let program_id = program(&fx.store, "1").await;

        let first = fx.use_case.execute(request(&program_id, "10")).await.unwrap();
        let second = fx.use_case.execute(request(&program_id, "5.5")).await.unwrap();

        assert_eq!(first.card.id, second.card.id);
        assert_eq!(second.card.points_balance.to_string(), "15.50000000");
    }

    #[tokio::test]
    async fn test_amount_must_be_positive() {
        let fx = fixture();
        let program_id = program(&fx.store, "1").await;

        let err = fx
            .use_case
            .execute(request(&program_id, "0"))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Order amount must be greater than zero to accrue points."
        );
    }

    #[tokio::test]
    async fn test_program_not_found() {
        let fx = fixture();

        let err = fx
            .use_case
            .execute(request("missing", "10"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Loyalty program not found.");
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_inactive_program() {
        let fx = fixture();
        let program_id = program(&fx.store, "1").await;
        let mut program = LoyaltyRepository::find_by_id(fx.store.as_ref(), &program_id)
            .await
            .unwrap()
            .unwrap();
        program.is_active = false;
        fx.store.put_program(program).unwrap();

        let err = fx
            .use_case
            .execute(request(&program_id, "10"))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot accrue points for an inactive loyalty program."
        );
        assert!(!err.is_not_found());
        assert!(fx.log.names().is_empty());
    }
}
