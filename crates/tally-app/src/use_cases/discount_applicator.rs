//! Discount code lookup, validation and usage tracking for order placement.
//!
//! Split in two steps so the usage counter is only bumped once the rest of
//! the order has been accepted:
//!
//! ```text
//! resolve(code, total)  ─► DiscountApplication   (read-only)
//!        ...payment checks, order insert...
//! consume(application)  ─► times_used + 1         (guarded by usage_limit)
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use tally_core::discount::{normalize_code, DiscountApplication};
use tally_core::error::CoreError;
use tally_core::money::Money;

use crate::error::AppResult;
use crate::ports::DiscountRepository;

#[derive(Clone)]
pub struct DiscountCodeApplicator {
    discounts: Option<Arc<dyn DiscountRepository>>,
}

impl DiscountCodeApplicator {
    /// Without a repository every supplied code resolves as not found.
    pub fn new(discounts: Option<Arc<dyn DiscountRepository>>) -> Self {
        Self { discounts }
    }

    /// Validates `code` against `total` without touching storage.
    ///
    /// A missing or blank code yields [`DiscountApplication::none`].
    pub async fn resolve(
        &self,
        tenant_id: &str,
        code: Option<&str>,
        total: Money,
        now: DateTime<Utc>,
    ) -> AppResult<DiscountApplication> {
        let code = match code.map(normalize_code) {
            Some(code) if !code.is_empty() => code,
            _ => return Ok(DiscountApplication::none(total)),
        };

        let Some(repo) = &self.discounts else {
            debug!(code = %code, "Discount code given but no discount repository configured");
            return Err(CoreError::not_found("Discount code", code).into());
        };

        let discount = repo
            .find_by_code(tenant_id, &code)
            .await?
            .ok_or_else(|| CoreError::not_found("Discount code", code.as_str()))?;

        let application = discount.apply(total, now)?;
        debug!(
            code = %code,
            discount_amount = %application.discount_amount,
            "Discount code validated"
        );
        Ok(application)
    }

    /// Records one use of an applied code.
    pub async fn consume(&self, application: &DiscountApplication) -> AppResult<()> {
        let (Some(id), Some(repo)) = (&application.discount_code_id, &self.discounts) else {
            return Ok(());
        };

        if !repo.increment_usage(id).await? {
            return Err(CoreError::DiscountUsageLimitReached.into());
        }
        Ok(())
    }
}
