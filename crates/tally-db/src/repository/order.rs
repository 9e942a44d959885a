//! # Order Repository
//!
//! Orders and their frozen lines, plus per-tenant order numbering.
//!
//! ## Order Numbers
//! ```text
//! INSERT INTO order_sequences (tenant_id, last_value) VALUES (?, 1)
//!   ON CONFLICT (tenant_id) DO UPDATE SET last_value = last_value + 1
//!   RETURNING last_value                      ──►  POS-000042
//! ```
//!
//! The sequence row is written inside the caller's transaction, so a
//! rolled-back placement gives its number back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use tally_app::ports::OrderRepository;
use tally_app::StoreResult;
use tally_core::types::{NewPosOrder, OrderStatus, PosOrder, PosOrderLine};

use super::{money, new_id};
use crate::error::{DbError, DbResult};
use crate::store::SqliteStore;

pub fn format_order_number(sequence: i64) -> String {
    format!("POS-{:06}", sequence)
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: String,
    tenant_id: String,
    session_id: String,
    order_number: String,
    customer_id: Option<String>,
    status: OrderStatus,
    subtotal: String,
    discount_amount: String,
    tax_amount: String,
    total: String,
    discount_code_id: Option<String>,
    created_by: String,
    created_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, lines: Vec<PosOrderLine>) -> DbResult<PosOrder> {
        Ok(PosOrder {
            subtotal: money("pos_orders.subtotal", &self.subtotal)?,
            discount_amount: money("pos_orders.discount_amount", &self.discount_amount)?,
            tax_amount: money("pos_orders.tax_amount", &self.tax_amount)?,
            total: money("pos_orders.total", &self.total)?,
            id: self.id,
            tenant_id: self.tenant_id,
            session_id: self.session_id,
            order_number: self.order_number,
            customer_id: self.customer_id,
            status: self.status,
            discount_code_id: self.discount_code_id,
            created_by: self.created_by,
            lines,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct LineRow {
    product_id: String,
    product_name: String,
    unit_price: String,
    quantity: String,
    discount: String,
    tax_rate: String,
    gross_amount: String,
    tax_amount: String,
    line_total: String,
}

impl LineRow {
    fn into_line(self) -> DbResult<PosOrderLine> {
        Ok(PosOrderLine {
            unit_price: money("pos_order_lines.unit_price", &self.unit_price)?,
            quantity: money("pos_order_lines.quantity", &self.quantity)?,
            discount: money("pos_order_lines.discount", &self.discount)?,
            tax_rate: money("pos_order_lines.tax_rate", &self.tax_rate)?,
            gross_amount: money("pos_order_lines.gross_amount", &self.gross_amount)?,
            tax_amount: money("pos_order_lines.tax_amount", &self.tax_amount)?,
            line_total: money("pos_order_lines.line_total", &self.line_total)?,
            product_id: self.product_id,
            product_name: self.product_name,
        })
    }
}

impl SqliteStore {
    async fn fetch_order(&self, id: &str) -> DbResult<Option<PosOrder>> {
        let mut conn = self.conn().await?;

        let row: Option<OrderRow> = sqlx::query_as(
            r#"
            SELECT
                id, tenant_id, session_id, order_number, customer_id, status,
                subtotal, discount_amount, tax_amount, total,
                discount_code_id, created_by, created_at
            FROM pos_orders
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let lines: Vec<LineRow> = sqlx::query_as(
            r#"
            SELECT
                product_id, product_name, unit_price, quantity, discount, tax_rate,
                gross_amount, tax_amount, line_total
            FROM pos_order_lines
            WHERE order_id = ?1
            ORDER BY line_no
            "#,
        )
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;

        let lines = lines
            .into_iter()
            .map(LineRow::into_line)
            .collect::<DbResult<Vec<_>>>()?;

        row.into_order(lines).map(Some)
    }

    async fn insert_order(&self, order: NewPosOrder) -> DbResult<PosOrder> {
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

        debug!(id = %order.id, order_number = %order.order_number, "Inserting order");

        let mut conn = self.conn().await?;
        sqlx::query(
            r#"
            INSERT INTO pos_orders (
                id, tenant_id, session_id, order_number, customer_id, status,
                subtotal, discount_amount, tax_amount, total,
                discount_code_id, created_by, created_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6,
                ?7, ?8, ?9, ?10,
                ?11, ?12, ?13
            )
            "#,
        )
        .bind(&order.id)
        .bind(&order.tenant_id)
        .bind(&order.session_id)
        .bind(&order.order_number)
        .bind(&order.customer_id)
        .bind(order.status)
        .bind(order.subtotal.to_string())
        .bind(order.discount_amount.to_string())
        .bind(order.tax_amount.to_string())
        .bind(order.total.to_string())
        .bind(&order.discount_code_id)
        .bind(&order.created_by)
        .bind(order.created_at)
        .execute(&mut *conn)
        .await?;

        for (line_no, line) in order.lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO pos_order_lines (
                    order_id, line_no, product_id, product_name,
                    unit_price, quantity, discount, tax_rate,
                    gross_amount, tax_amount, line_total
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
            )
            .bind(&order.id)
            .bind(line_no as i64)
            .bind(&line.product_id)
            .bind(&line.product_name)
            .bind(line.unit_price.to_string())
            .bind(line.quantity.to_string())
            .bind(line.discount.to_string())
            .bind(line.tax_rate.to_string())
            .bind(line.gross_amount.to_string())
            .bind(line.tax_amount.to_string())
            .bind(line.line_total.to_string())
            .execute(&mut *conn)
            .await?;
        }

        Ok(order)
    }
}

#[async_trait]
impl OrderRepository for SqliteStore {
    async fn next_number(&self, tenant_id: &str) -> StoreResult<String> {
        let mut conn = self.conn().await?;
        let sequence: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO order_sequences (tenant_id, last_value) VALUES (?1, 1)
            ON CONFLICT (tenant_id) DO UPDATE SET last_value = last_value + 1
            RETURNING last_value
            "#,
        )
        .bind(tenant_id)
        .fetch_one(&mut *conn)
        .await
        .map_err(DbError::from)?;

        Ok(format_order_number(sequence))
    }

    async fn create(&self, order: NewPosOrder) -> StoreResult<PosOrder> {
        Ok(self.insert_order(order).await?)
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<PosOrder>> {
        Ok(self.fetch_order(id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::store;
    use tally_app::ports::{StoreTransaction, TransactionManager};
    use tally_core::money::Money;

    fn line(name: &str, price: &str) -> PosOrderLine {
        let price = Money::parse(price).unwrap();
        PosOrderLine {
            product_id: format!("p-{name}"),
            product_name: name.to_string(),
            unit_price: price,
            quantity: Money::from_int(1),
            discount: Money::zero(),
            tax_rate: Money::zero(),
            gross_amount: price,
            tax_amount: Money::zero(),
            line_total: price,
        }
    }

    #[test]
    fn test_format_order_number() {
        assert_eq!(format_order_number(1), "POS-000001");
        assert_eq!(format_order_number(1_234_567), "POS-1234567");
    }

    #[tokio::test]
    async fn test_numbers_are_per_tenant() {
        let store = store().await;

        assert_eq!(store.next_number("tenant-a").await.unwrap(), "POS-000001");
        assert_eq!(store.next_number("tenant-a").await.unwrap(), "POS-000002");
        assert_eq!(store.next_number("tenant-b").await.unwrap(), "POS-000001");
    }

    #[tokio::test]
    async fn test_rolled_back_number_is_reused() {
        let store = store().await;

        let tx = store.begin().await.unwrap();
        assert_eq!(store.next_number("tenant-a").await.unwrap(), "POS-000001");
        tx.rollback().await.unwrap();

        assert_eq!(store.next_number("tenant-a").await.unwrap(), "POS-000001");
    }

    #[tokio::test]
    async fn test_create_and_find_keeps_line_order() {
        let store = store().await;
        let session = store.open_session("tenant-1").await.unwrap();

        let created = OrderRepository::create(
            &store,
            NewPosOrder {
                tenant_id: "tenant-1".to_string(),
                session_id: session.id.clone(),
                order_number: "POS-000001".to_string(),
                customer_id: Some("cust-1".to_string()),
                status: OrderStatus::Paid,
                subtotal: Money::parse("15.5").unwrap(),
                discount_amount: Money::zero(),
                tax_amount: Money::zero(),
                total: Money::parse("15.5").unwrap(),
                discount_code_id: None,
                created_by: "cashier-1".to_string(),
                lines: vec![line("Tea", "3"), line("Cake", "12.5")],
            },
        )
        .await
        .unwrap();

        let found = OrderRepository::find_by_id(&store, &created.id)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(found.total.to_string(), "15.50000000");
        assert_eq!(found.customer_id.as_deref(), Some("cust-1"));
        let names: Vec<_> = found.lines.iter().map(|l| l.product_name.as_str()).collect();
        assert_eq!(names, vec!["Tea", "Cake"]);
        assert_eq!(found.lines[1].line_total, Money::parse("12.5").unwrap());
    }

    #[tokio::test]
    async fn test_only_paid_status_is_stored() {
        let store = store().await;
        let session = store.open_session("tenant-1").await.unwrap();

        let created = OrderRepository::create(
            &store,
            NewPosOrder {
                tenant_id: "tenant-1".to_string(),
                session_id: session.id.clone(),
                order_number: "POS-000001".to_string(),
                customer_id: None,
                status: OrderStatus::Paid,
                subtotal: Money::from_int(3),
                discount_amount: Money::zero(),
                tax_amount: Money::zero(),
                total: Money::from_int(3),
                discount_code_id: None,
                created_by: "cashier-1".to_string(),
                lines: vec![line("Tea", "3")],
            },
        )
        .await
        .unwrap();

        let mut conn = store.conn().await.unwrap();
        let voided = sqlx::query("UPDATE pos_orders SET status = 'voided' WHERE id = ?")
            .bind(&created.id)
            .execute(&mut *conn)
            .await;
        assert!(voided.is_err());
    }

    #[tokio::test]
    async fn test_find_missing_order() {
        let store = store().await;
        assert!(OrderRepository::find_by_id(&store, "missing")
            .await
            .unwrap()
            .is_none());
    }
}
