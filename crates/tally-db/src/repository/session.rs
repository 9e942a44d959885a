//! # Session Repository
//!
//! Register sessions. Opening and closing belong to register management;
//! order placement only reads a session and bumps its counters.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use tally_app::ports::SessionRepository;
use tally_app::StoreResult;
use tally_core::money::Money;
use tally_core::types::{PosSession, SessionStatus, SessionTotals};

use super::{money, new_id};
use crate::error::{DbError, DbResult};
use crate::store::SqliteStore;

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: String,
    tenant_id: String,
    status: SessionStatus,
    total_sales: String,
    order_count: i64,
    opened_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
}

impl SessionRow {
    fn into_session(self) -> DbResult<PosSession> {
        Ok(PosSession {
            total_sales: money("pos_sessions.total_sales", &self.total_sales)?,
            id: self.id,
            tenant_id: self.tenant_id,
            status: self.status,
            order_count: self.order_count,
            opened_at: self.opened_at,
            closed_at: self.closed_at,
        })
    }
}

const SELECT_SESSION: &str = r#"
    SELECT id, tenant_id, status, total_sales, order_count, opened_at, closed_at
    FROM pos_sessions
    WHERE id = ?1
"#;

impl SqliteStore {
    async fn fetch_session(&self, id: &str) -> DbResult<Option<PosSession>> {
        let mut conn = self.conn().await?;
        let row: Option<SessionRow> = sqlx::query_as(SELECT_SESSION)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        row.map(SessionRow::into_session).transpose()
    }

    /// Opens a register session with zeroed counters.
    pub async fn open_session(&self, tenant_id: &str) -> DbResult<PosSession> {
        let session = PosSession {
            id: new_id(),
            tenant_id: tenant_id.to_string(),
            status: SessionStatus::Open,
            total_sales: Money::zero(),
            order_count: 0,
            opened_at: Utc::now(),
            closed_at: None,
        };

        debug!(id = %session.id, tenant_id = %tenant_id, "Opening session");

        let mut conn = self.conn().await?;
        sqlx::query(
            r#"
            INSERT INTO pos_sessions (
                id, tenant_id, status, total_sales, order_count, opened_at, closed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&session.id)
        .bind(&session.tenant_id)
        .bind(session.status)
        .bind(session.total_sales.to_string())
        .bind(session.order_count)
        .bind(session.opened_at)
        .bind(session.closed_at)
        .execute(&mut *conn)
        .await?;

        Ok(session)
    }

    /// Closes a session so it stops accepting orders.
    pub async fn close_session(&self, id: &str) -> DbResult<PosSession> {
        {
            let mut conn = self.conn().await?;
            let result = sqlx::query(
                "UPDATE pos_sessions SET status = ?1, closed_at = ?2 WHERE id = ?3",
            )
            .bind(SessionStatus::Closed)
            .bind(Utc::now())
            .bind(id)
            .execute(&mut *conn)
            .await?;

            if result.rows_affected() == 0 {
                return Err(DbError::not_found("POS session", id));
            }
        }

        debug!(id = %id, "Session closed");
        self.fetch_session(id)
            .await?
            .ok_or_else(|| DbError::not_found("POS session", id))
    }
}

#[async_trait]
impl SessionRepository for SqliteStore {
    async fn find_by_id(&self, id: &str) -> StoreResult<Option<PosSession>> {
        Ok(self.fetch_session(id).await?)
    }

    async fn update_totals(&self, id: &str, totals: SessionTotals) -> StoreResult<PosSession> {
        {
            let mut conn = self.conn().await?;
            let result = sqlx::query(
                "UPDATE pos_sessions SET total_sales = ?1, order_count = ?2 WHERE id = ?3",
            )
            .bind(totals.total_sales.to_string())
            .bind(totals.order_count)
            .bind(id)
            .execute(&mut *conn)
            .await
            .map_err(DbError::from)?;

            if result.rows_affected() == 0 {
                return Err(DbError::not_found("POS session", id).into());
            }
        }

        Ok(self
            .fetch_session(id)
            .await?
            .ok_or_else(|| DbError::not_found("POS session", id))?)
    }
}
