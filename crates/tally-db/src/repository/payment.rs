//! Payment rows, one per tender entry of an order.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use tally_app::ports::PaymentRepository;
use tally_app::StoreResult;
use tally_core::types::{NewPosOrderPayment, PaymentMethod, PosOrderPayment};

use super::{money, new_id, opt_money};
use crate::error::{DbError, DbResult};
use crate::store::SqliteStore;

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: String,
    order_id: String,
    payment_method: PaymentMethod,
    amount: String,
    tendered: Option<String>,
    change: Option<String>,
    created_at: DateTime<Utc>,
}

impl PaymentRow {
    fn into_payment(self) -> DbResult<PosOrderPayment> {
        Ok(PosOrderPayment {
            amount: money("pos_order_payments.amount", &self.amount)?,
            tendered: opt_money("pos_order_payments.tendered", self.tendered.as_deref())?,
            change: opt_money("pos_order_payments.change", self.change.as_deref())?,
            id: self.id,
            order_id: self.order_id,
            payment_method: self.payment_method,
            created_at: self.created_at,
        })
    }
}

#[async_trait]
impl PaymentRepository for SqliteStore {
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

        let mut conn = self.conn().await?;
        sqlx::query(
            r#"
            INSERT INTO pos_order_payments (
                id, order_id, payment_method, amount, tendered, change, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.order_id)
        .bind(payment.payment_method)
        .bind(payment.amount.to_string())
        .bind(payment.tendered.map(|m| m.to_string()))
        .bind(payment.change.map(|m| m.to_string()))
        .bind(payment.created_at)
        .execute(&mut *conn)
        .await
        .map_err(DbError::from)?;

        Ok(payment)
    }

    async fn list_by_order(&self, order_id: &str) -> StoreResult<Vec<PosOrderPayment>> {
        let mut conn = self.conn().await?;
        let rows: Vec<PaymentRow> = sqlx::query_as(
            r#"
            SELECT id, order_id, payment_method, amount, tendered, change, created_at
            FROM pos_order_payments
            WHERE order_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(order_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(DbError::from)?;

        Ok(rows
            .into_iter()
            .map(PaymentRow::into_payment)
            .collect::<DbResult<Vec<_>>>()?)
    }
}
