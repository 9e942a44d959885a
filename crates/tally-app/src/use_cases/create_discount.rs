//! Creates a promotional discount code.

use std::sync::Arc;

use tracing::info;

use tally_core::discount::{NewDiscount, PosDiscount};
use tally_core::error::ValidationError;

use crate::error::{AppError, AppResult};
use crate::ports::{run_in_transaction, DiscountRepository, TransactionManager};

pub struct CreatePosDiscountUseCase {
    discounts: Arc<dyn DiscountRepository>,
    tx: Arc<dyn TransactionManager>,
}

impl CreatePosDiscountUseCase {
    pub fn new(discounts: Arc<dyn DiscountRepository>, tx: Arc<dyn TransactionManager>) -> Self {
        Self { discounts, tx }
    }

    /// Validates, uppercases the code and stores the discount.
    ///
    /// A code already used by the same tenant is rejected.
    pub async fn execute(&self, input: NewDiscount) -> AppResult<PosDiscount> {
        let input = input.validate()?;

        let work = async {
            let existing = self
                .discounts
                .find_by_code(&input.tenant_id, &input.code)
                .await?;
            if existing.is_some() {
                return Err(AppError::from(ValidationError::Duplicate {
                    field: "Discount code".to_string(),
                    value: input.code.clone(),
                }));
            }

            let created = self.discounts.create(input.clone()).await?;
            Ok::<_, AppError>(created)
        };
        let discount = run_in_transaction(self.tx.as_ref(), work).await?;

        info!(
            discount_id = %discount.id,
            code = %discount.code,
            "Discount code created"
        );
        Ok(discount)
    }
}
