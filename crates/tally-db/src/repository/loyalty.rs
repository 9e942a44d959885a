//! # Loyalty Repository
//!
//! Programs, cards and the points ledger.
//!
//! ```text
//! loyalty_programs ◄── loyalty_cards ◄── loyalty_transactions
//!   (per tenant)        (one per customer     (append-only, signed
//!                        per program)          points, balance_after)
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use tally_app::ports::LoyaltyRepository;
use tally_app::StoreResult;
use tally_core::loyalty::{
    LoyaltyCard, LoyaltyProgram, LoyaltyTransaction, LoyaltyTransactionType, NewLoyaltyCard,
    NewLoyaltyProgram, NewLoyaltyTransaction,
};
use tally_core::money::{Money, Points};

use super::{money, new_id};
use crate::error::{DbError, DbResult};
use crate::store::SqliteStore;

// =============================================================================
// Rows
// =============================================================================

#[derive(sqlx::FromRow)]
struct ProgramRow {
    id: String,
    tenant_id: String,
    name: String,
    points_per_currency_unit: String,
    redemption_rate: String,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl ProgramRow {
    fn into_program(self) -> DbResult<LoyaltyProgram> {
        Ok(LoyaltyProgram {
            points_per_currency_unit: money(
                "loyalty_programs.points_per_currency_unit",
                &self.points_per_currency_unit,
            )?,
            redemption_rate: money("loyalty_programs.redemption_rate", &self.redemption_rate)?,
            id: self.id,
            tenant_id: self.tenant_id,
            name: self.name,
            is_active: self.is_active,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CardRow {
    id: String,
    tenant_id: String,
    program_id: String,
    customer_id: String,
    points_balance: String,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl CardRow {
    fn into_card(self) -> DbResult<LoyaltyCard> {
        Ok(LoyaltyCard {
            points_balance: money("loyalty_cards.points_balance", &self.points_balance)?,
            id: self.id,
            tenant_id: self.tenant_id,
            program_id: self.program_id,
            customer_id: self.customer_id,
            is_active: self.is_active,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TransactionRow {
    id: String,
    tenant_id: String,
    card_id: String,
    transaction_type: LoyaltyTransactionType,
    points: String,
    balance_after: String,
    reference: Option<String>,
    created_at: DateTime<Utc>,
}

impl TransactionRow {
    fn into_transaction(self) -> DbResult<LoyaltyTransaction> {
        Ok(LoyaltyTransaction {
            points: money("loyalty_transactions.points", &self.points)?,
            balance_after: money("loyalty_transactions.balance_after", &self.balance_after)?,
            id: self.id,
            tenant_id: self.tenant_id,
            card_id: self.card_id,
            transaction_type: self.transaction_type,
            reference: self.reference,
            created_at: self.created_at,
        })
    }
}

const PROGRAM_COLUMNS: &str =
    "id, tenant_id, name, points_per_currency_unit, redemption_rate, is_active, created_at";

const CARD_COLUMNS: &str =
    "id, tenant_id, program_id, customer_id, points_balance, is_active, created_at";

// =============================================================================
// Queries
// =============================================================================

impl SqliteStore {
    async fn fetch_card(&self, id: &str) -> DbResult<Option<LoyaltyCard>> {
        let mut conn = self.conn().await?;
        let row: Option<CardRow> =
            sqlx::query_as(&format!("SELECT {CARD_COLUMNS} FROM loyalty_cards WHERE id = ?1"))
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?;
        row.map(CardRow::into_card).transpose()
    }

    async fn fetch_program(&self, id: &str) -> DbResult<Option<LoyaltyProgram>> {
        let mut conn = self.conn().await?;
        let row: Option<ProgramRow> = sqlx::query_as(&format!(
            "SELECT {PROGRAM_COLUMNS} FROM loyalty_programs WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
        row.map(ProgramRow::into_program).transpose()
    }

    /// Turns a loyalty program on or off.
    pub async fn set_program_active(&self, id: &str, is_active: bool) -> DbResult<()> {
        let mut conn = self.conn().await?;
        let result = sqlx::query("UPDATE loyalty_programs SET is_active = ?1 WHERE id = ?2")
            .bind(is_active)
            .bind(id)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Loyalty program", id));
        }
        Ok(())
    }
}

#[async_trait]
impl LoyaltyRepository for SqliteStore {
    async fn find_by_id(&self, id: &str) -> StoreResult<Option<LoyaltyProgram>> {
        Ok(self.fetch_program(id).await?)
    }

    async fn find_active_by_tenant(&self, tenant_id: &str) -> StoreResult<Option<LoyaltyProgram>> {
        let mut conn = self.conn().await?;
        let row: Option<ProgramRow> = sqlx::query_as(&format!(
            r#"
            SELECT {PROGRAM_COLUMNS}
            FROM loyalty_programs
            WHERE tenant_id = ?1 AND is_active = 1
            ORDER BY created_at, rowid
            LIMIT 1
            "#
        ))
        .bind(tenant_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(DbError::from)?;

        Ok(row.map(ProgramRow::into_program).transpose()?)
    }

    async fn create_program(&self, program: NewLoyaltyProgram) -> StoreResult<LoyaltyProgram> {
        let program = LoyaltyProgram {
            id: new_id(),
            tenant_id: program.tenant_id,
            name: program.name,
            points_per_currency_unit: program.points_per_currency_unit,
            redemption_rate: program.redemption_rate,
            is_active: program.is_active,
            created_at: Utc::now(),
        };

        let mut conn = self.conn().await?;
        sqlx::query(
            r#"
            INSERT INTO loyalty_programs (
                id, tenant_id, name, points_per_currency_unit, redemption_rate,
                is_active, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&program.id)
        .bind(&program.tenant_id)
        .bind(&program.name)
        .bind(program.points_per_currency_unit.to_string())
        .bind(program.redemption_rate.to_string())
        .bind(program.is_active)
        .bind(program.created_at)
        .execute(&mut *conn)
        .await
        .map_err(DbError::from)?;

        debug!(id = %program.id, "Loyalty program inserted");
        Ok(program)
    }

    async fn find_card_by_id(&self, id: &str) -> StoreResult<Option<LoyaltyCard>> {
        Ok(self.fetch_card(id).await?)
    }

    async fn find_card_by_customer(
        &self,
        tenant_id: &str,
        customer_id: &str,
        program_id: &str,
    ) -> StoreResult<Option<LoyaltyCard>> {
        let mut conn = self.conn().await?;
        let row: Option<CardRow> = sqlx::query_as(&format!(
            r#"
            SELECT {CARD_COLUMNS}
            FROM loyalty_cards
            WHERE tenant_id = ?1 AND customer_id = ?2 AND program_id = ?3
            "#
        ))
        .bind(tenant_id)
        .bind(customer_id)
        .bind(program_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(DbError::from)?;

        Ok(row.map(CardRow::into_card).transpose()?)
    }

    async fn create_card(&self, card: NewLoyaltyCard) -> StoreResult<LoyaltyCard> {
        let card = LoyaltyCard {
            id: new_id(),
            tenant_id: card.tenant_id,
            program_id: card.program_id,
            customer_id: card.customer_id,
            points_balance: Money::zero(),
            is_active: true,
            created_at: Utc::now(),
        };

        let mut conn = self.conn().await?;
        sqlx::query(
            r#"
            INSERT INTO loyalty_cards (
                id, tenant_id, program_id, customer_id, points_balance, is_active, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&card.id)
        .bind(&card.tenant_id)
        .bind(&card.program_id)
        .bind(&card.customer_id)
        .bind(card.points_balance.to_string())
        .bind(card.is_active)
        .bind(card.created_at)
        .execute(&mut *conn)
        .await
        .map_err(DbError::from)?;

        Ok(card)
    }

    async fn update_card_balance(&self, id: &str, balance: Points) -> StoreResult<LoyaltyCard> {
        {
            let mut conn = self.conn().await?;
            let result = sqlx::query("UPDATE loyalty_cards SET points_balance = ?1 WHERE id = ?2")
                .bind(balance.to_string())
                .bind(id)
                .execute(&mut *conn)
                .await
                .map_err(DbError::from)?;

            if result.rows_affected() == 0 {
                return Err(DbError::not_found("Loyalty card", id).into());
            }
        }

        Ok(self
            .fetch_card(id)
            .await?
            .ok_or_else(|| DbError::not_found("Loyalty card", id))?)
    }

    async fn create_transaction(
        &self,
        transaction: NewLoyaltyTransaction,
    ) -> StoreResult<LoyaltyTransaction> {
        let transaction = LoyaltyTransaction {
            id: new_id(),
            tenant_id: transaction.tenant_id,
            card_id: transaction.card_id,
            transaction_type: transaction.transaction_type,
            points: transaction.points,
            balance_after: transaction.balance_after,
            reference: transaction.reference,
            created_at: Utc::now(),
        };

        let mut conn = self.conn().await?;
        sqlx::query(
            r#"
            INSERT INTO loyalty_transactions (
                id, tenant_id, card_id, transaction_type, points, balance_after,
                reference, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&transaction.id)
        .bind(&transaction.tenant_id)
        .bind(&transaction.card_id)
        .bind(transaction.transaction_type)
        .bind(transaction.points.to_string())
        .bind(transaction.balance_after.to_string())
        .bind(&transaction.reference)
        .bind(transaction.created_at)
        .execute(&mut *conn)
        .await
        .map_err(DbError::from)?;

        Ok(transaction)
    }

    async fn list_transactions(&self, card_id: &str) -> StoreResult<Vec<LoyaltyTransaction>> {
        let mut conn = self.conn().await?;
        let rows: Vec<TransactionRow> = sqlx::query_as(
            r#"
            SELECT
                id, tenant_id, card_id, transaction_type, points, balance_after,
                reference, created_at
            FROM loyalty_transactions
            WHERE card_id = ?1
            ORDER BY created_at, rowid
            "#,
        )
        .bind(card_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(DbError::from)?;

        Ok(rows
            .into_iter()
            .map(TransactionRow::into_transaction)
            .collect::<DbResult<Vec<_>>>()?)
    }
}
