//! # Discount Repository
//!
//! ## Usage Counting
//! ```text
//! UPDATE pos_discounts SET times_used = times_used + 1
//! WHERE id = ? AND (usage_limit IS NULL OR times_used < usage_limit)
//!
//! 1 row  ──► true    counted
//! 0 rows ──► false   limit reached (or NotFound if the id is unknown)
//! ```
//!
//! The limit check and the increment are one statement, so two registers
//! can never both take the last use.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use tally_app::ports::DiscountRepository;
use tally_app::StoreResult;
use tally_core::discount::{DiscountType, NewDiscount, PosDiscount};

use super::{money, new_id};
use crate::error::{DbError, DbResult};
use crate::store::SqliteStore;

#[derive(sqlx::FromRow)]
struct DiscountRow {
    id: String,
    tenant_id: String,
    code: String,
    name: String,
    discount_type: DiscountType,
    value: String,
    usage_limit: Option<i64>,
    times_used: i64,
    expires_at: Option<DateTime<Utc>>,
    is_active: bool,
}

impl DiscountRow {
    fn into_discount(self) -> DbResult<PosDiscount> {
        Ok(PosDiscount {
            value: money("pos_discounts.value", &self.value)?,
            id: self.id,
            tenant_id: self.tenant_id,
            code: self.code,
            name: self.name,
            discount_type: self.discount_type,
            usage_limit: self.usage_limit,
            times_used: self.times_used,
            expires_at: self.expires_at,
            is_active: self.is_active,
        })
    }
}

#[async_trait]
impl DiscountRepository for SqliteStore {
    async fn find_by_code(
        &self,
        tenant_id: &str,
        code: &str,
    ) -> StoreResult<Option<PosDiscount>> {
        let mut conn = self.conn().await?;
        let row: Option<DiscountRow> = sqlx::query_as(
            r#"
            SELECT
                id, tenant_id, code, name, discount_type, value,
                usage_limit, times_used, expires_at, is_active
            FROM pos_discounts
            WHERE tenant_id = ?1 AND code = ?2
            "#,
        )
        .bind(tenant_id)
        .bind(code)
        .fetch_optional(&mut *conn)
        .await
        .map_err(DbError::from)?;

        Ok(row.map(DiscountRow::into_discount).transpose()?)
    }

    async fn increment_usage(&self, id: &str) -> StoreResult<bool> {
        let mut conn = self.conn().await?;
        let result = sqlx::query(
            r#"
            UPDATE pos_discounts
            SET times_used = times_used + 1
            WHERE id = ?1 AND (usage_limit IS NULL OR times_used < usage_limit)
            "#,
        )
        .bind(id)
        .execute(&mut *conn)
        .await
        .map_err(DbError::from)?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }

        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM pos_discounts WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(DbError::from)?;

        match exists {
            Some(_) => {
                debug!(discount_id = %id, "Usage limit reached");
                Ok(false)
            }
            None => Err(DbError::not_found("Discount", id).into()),
        }
    }

    async fn create(&self, discount: NewDiscount) -> StoreResult<PosDiscount> {
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

        let mut conn = self.conn().await?;
        sqlx::query(
            r#"
            INSERT INTO pos_discounts (
                id, tenant_id, code, name, discount_type, value,
                usage_limit, times_used, expires_at, is_active, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&discount.id)
        .bind(&discount.tenant_id)
        .bind(&discount.code)
        .bind(&discount.name)
        .bind(discount.discount_type)
        .bind(discount.value.to_string())
        .bind(discount.usage_limit)
        .bind(discount.times_used)
        .bind(discount.expires_at)
        .bind(discount.is_active)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await
        .map_err(DbError::from)?;

        debug!(id = %discount.id, code = %discount.code, "Discount inserted");
        Ok(discount)
    }
}

impl SqliteStore {
    /// Turns a discount code on or off.
    pub async fn set_discount_active(&self, id: &str, is_active: bool) -> DbResult<()> {
        let mut conn = self.conn().await?;
        let result = sqlx::query("UPDATE pos_discounts SET is_active = ?1 WHERE id = ?2")
            .bind(is_active)
            .bind(id)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Discount", id));
        }
        Ok(())
    }
}
