//! Converts loyalty points into an order discount.

use std::sync::Arc;

use serde::Deserialize;
use tracing::info;

use tally_core::error::CoreError;
use tally_core::events::LoyaltyPointsRedeemed;
use tally_core::loyalty::{ensure_points_positive, LoyaltyCard, NewLoyaltyTransaction};
use tally_core::money::{Money, Points};

use crate::error::AppResult;
use crate::ports::{run_in_transaction, EventDispatcher, LoyaltyRepository, TransactionManager};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RedeemPointsInput {
    pub tenant_id: String,
    pub card_id: String,
    pub points: Points,
    #[serde(default)]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RedeemPointsOutput {
    /// `points ÷ redemption_rate`.
    pub discount_amount: Money,
    pub card: LoyaltyCard,
}

pub struct RedeemLoyaltyPointsUseCase {
    loyalty: Arc<dyn LoyaltyRepository>,
    tx: Arc<dyn TransactionManager>,
    events: Arc<dyn EventDispatcher>,
}

impl RedeemLoyaltyPointsUseCase {
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

    /// Debits the card and returns the discount the points are worth.
    ///
    /// Fails without changing the card when the balance is too low.
    pub async fn execute(&self, input: RedeemPointsInput) -> AppResult<RedeemPointsOutput> {
        ensure_points_positive(input.points)?;

        let output = run_in_transaction(self.tx.as_ref(), self.debit(&input)).await?;

        info!(
            card_id = %output.card.id,
            points = %input.points,
            discount_amount = %output.discount_amount,
            "Loyalty points redeemed"
        );

        self.events
            .dispatch(
                LoyaltyPointsRedeemed {
                    card_id: output.card.id.clone(),
                    tenant_id: output.card.tenant_id.clone(),
                    points: input.points,
                    discount_amount: output.discount_amount,
                    balance: output.card.points_balance,
                }
                .into(),
            )
            .await;

        Ok(output)
    }

    async fn debit(&self, input: &RedeemPointsInput) -> AppResult<RedeemPointsOutput> {
        let mut card = self
            .loyalty
            .find_card_by_id(&input.card_id)
            .await?
            .filter(|c| c.tenant_id == input.tenant_id)
            .ok_or_else(|| CoreError::not_found("Loyalty card", input.card_id.as_str()))?;

        let program = self
            .loyalty
            .find_by_id(&card.program_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Loyalty program", card.program_id.as_str()))?;

        let balance = card.debit(input.points)?;
        let discount_amount = program.discount_for(input.points)?;

        let card = self.loyalty.update_card_balance(&card.id, balance).await?;
        self.loyalty
            .create_transaction(NewLoyaltyTransaction::redemption(
                &card,
                input.points,
                input.reference.clone(),
            ))
            .await?;

        Ok(RedeemPointsOutput {
            discount_amount,
            card,
        })
    }
}
