//! Creates a tenant loyalty program.

use std::sync::Arc;

use tracing::info;

use tally_core::events::LoyaltyProgramCreated;
use tally_core::loyalty::{LoyaltyProgram, NewLoyaltyProgram};

use crate::error::{AppError, AppResult};
use crate::ports::{run_in_transaction, EventDispatcher, LoyaltyRepository, TransactionManager};

pub struct CreateLoyaltyProgramUseCase {
    loyalty: Arc<dyn LoyaltyRepository>,
    tx: Arc<dyn TransactionManager>,
    events: Arc<dyn EventDispatcher>,
}

impl CreateLoyaltyProgramUseCase {
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

    /// Validates the name and both rates, stores the program and publishes
    /// `LoyaltyProgramCreated`.
    pub async fn execute(&self, input: NewLoyaltyProgram) -> AppResult<LoyaltyProgram> {
        let input = input.validate()?;

        let work = async {
            let program = self.loyalty.create_program(input).await?;
            Ok::<_, AppError>(program)
        };
        let program = run_in_transaction(self.tx.as_ref(), work).await?;

        info!(
            program_id = %program.id,
            tenant_id = %program.tenant_id,
            "Loyalty program created"
        );

        self.events
            .dispatch(
                LoyaltyProgramCreated {
                    program_id: program.id.clone(),
                    tenant_id: program.tenant_id.clone(),
                    name: program.name.clone(),
                }
                .into(),
            )
            .await;

        Ok(program)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{EventBus, EventLog};
    use crate::memory::InMemoryStore;
    use tally_core::money::Money;

    fn input(name: &str, earn: &str, redeem: &str) -> NewLoyaltyProgram {
        NewLoyaltyProgram {
            tenant_id: "tenant-1".to_string(),
            name: name.to_string(),
            points_per_currency_unit: Money::parse(earn).unwrap(),
            redemption_rate: Money::parse(redeem).unwrap(),
            is_active: true,
        }
    }

    fn use_case() -> (CreateLoyaltyProgramUseCase, Arc<EventLog>) {
        let store = Arc::new(InMemoryStore::new());
        let log = Arc::new(EventLog::new());
        let bus = Arc::new(EventBus::new());
        bus.subscribe(log.clone());
        (
            CreateLoyaltyProgramUseCase::new(store.clone(), store, bus),
            log,
        )
    }

    #[tokio::test]
    async fn test_creates_and_publishes() {
        let (use_case, log) = use_case();

        let program = use_case
            .execute(input("Rewards", "1.5", "100"))
            .await
            .unwrap();

        assert_eq!(program.points_per_currency_unit.to_string(), "1.50000000");
        assert_eq!(program.redemption_rate.to_string(), "100.00000000");
        assert!(program.is_active);
        assert_eq!(log.names(), vec!["LoyaltyProgramCreated"]);
    }

    #[tokio::test]
    async fn test_rejects_bad_input() {
        let (use_case, log) = use_case();

        assert!(use_case.execute(input("", "1", "100")).await.is_err());
        assert!(use_case.execute(input("Rewards", "0", "100")).await.is_err());
        assert!(use_case.execute(input("Rewards", "1", "-1")).await.is_err());
        assert!(log.names().is_empty());
    }
}
