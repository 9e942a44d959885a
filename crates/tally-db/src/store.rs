//! # SQLite Store
//!
//! One object implementing every `tally-app` port over the pool.
//!
//! ## Transactions
//! ```text
//! begin()     wait for tx_lock, pool.begin(), park the sqlx Transaction
//! commit()    take the parked Transaction, COMMIT, release tx_lock
//! rollback()  take the parked Transaction, ROLLBACK, release tx_lock
//! drop        discard the parked Transaction (sqlx rolls it back), release tx_lock
//! ```
//!
//! While a transaction is parked every repository call runs on it, so
//! statements issued between `begin` and `commit` are part of the unit of
//! work. Otherwise a call borrows a pool connection for one statement
//! batch. `tx_lock` keeps a second unit of work from starting until the
//! first one ends.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqliteConnection, SqlitePool};
use tokio::sync::{MappedMutexGuard, Mutex as AsyncMutex, MutexGuard, OwnedMutexGuard};
use tracing::{debug, warn};

use tally_app::ports::{StoreTransaction, TransactionManager};
use tally_app::{StoreError, StoreResult};

use crate::error::{DbError, DbResult};

type Parked = Arc<AsyncMutex<Option<sqlx::Transaction<'static, Sqlite>>>>;

pub struct SqliteStore {
    pool: SqlitePool,
    tx_lock: Arc<AsyncMutex<()>>,
    active: Parked,
}

/// Connection for one repository call.
pub(crate) enum Conn<'a> {
    Transaction(MappedMutexGuard<'a, sqlx::Transaction<'static, Sqlite>>),
    Pooled(PoolConnection<Sqlite>),
}

impl Deref for Conn<'_> {
    type Target = SqliteConnection;

    fn deref(&self) -> &SqliteConnection {
        match self {
            Conn::Transaction(tx) => &***tx,
            Conn::Pooled(conn) => &**conn,
        }
    }
}

impl DerefMut for Conn<'_> {
    fn deref_mut(&mut self) -> &mut SqliteConnection {
        match self {
            Conn::Transaction(tx) => &mut ***tx,
            Conn::Pooled(conn) => &mut **conn,
        }
    }
}

impl SqliteStore {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        SqliteStore {
            pool,
            tx_lock: Arc::new(AsyncMutex::new(())),
            active: Arc::new(AsyncMutex::new(None)),
        }
    }

    /// The open transaction if there is one, else a pool connection.
    /// Executor: `&mut *conn`.
    pub(crate) async fn conn(&self) -> DbResult<Conn<'_>> {
        let idle = match MutexGuard::try_map(self.active.lock().await, Option::as_mut) {
            Ok(tx) => return Ok(Conn::Transaction(tx)),
            Err(idle) => idle,
        };
        // Not held while waiting on the pool: a transaction owner may need it
        drop(idle);

        Ok(Conn::Pooled(self.pool.acquire().await?))
    }

    pub fn in_transaction(&self) -> bool {
        self.tx_lock.try_lock().is_err()
    }
}

fn tx_error(statement: &str, err: sqlx::Error) -> StoreError {
    StoreError::Transaction(format!("{statement}: {}", DbError::from(err)))
}

#[async_trait]
impl TransactionManager for SqliteStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        let lock = self.tx_lock.clone().lock_owned().await;

        // Both drop on error or cancellation, so nothing stays locked
        let tx = self.pool.begin().await.map_err(|e| tx_error("BEGIN", e))?;
        *self.active.lock().await = Some(tx);

        debug!("SQLite transaction started");
        Ok(Box::new(SqliteTransaction {
            active: self.active.clone(),
            lock: Some(lock),
        }))
    }
}

struct SqliteTransaction {
    active: Parked,
    lock: Option<OwnedMutexGuard<()>>,
}

impl SqliteTransaction {
    async fn take(&mut self) -> StoreResult<sqlx::Transaction<'static, Sqlite>> {
        self.active
            .lock()
            .await
            .take()
            .ok_or_else(|| StoreError::Transaction("transaction already finished".to_string()))
    }
}

#[async_trait]
impl StoreTransaction for SqliteTransaction {
    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let mut this = self;
        let tx = this.take().await?;

        // A failed COMMIT drops `tx`, which rolls it back
        let result = tx.commit().await.map_err(|e| tx_error("COMMIT", e));
        this.lock.take();

        result?;
        debug!("SQLite transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        let mut this = self;
        let tx = this.take().await?;

        let result = tx.rollback().await.map_err(|e| tx_error("ROLLBACK", e));
        this.lock.take();

        if let Err(err) = &result {
            warn!(error = %err, "ROLLBACK failed");
        }
        debug!("SQLite transaction rolled back");
        result
    }
}

impl Drop for SqliteTransaction {
    fn drop(&mut self) {
        let Some(lock) = self.lock.take() else {
            return;
        };
        warn!("SQLite transaction dropped before commit, rolling back");

        match self.active.clone().try_lock_owned() {
            Ok(mut active) => {
                active.take();
                drop(lock);
            }
            // Another caller is mid-statement on the parked transaction
            Err(_) => match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    let active = self.active.clone();
                    runtime.spawn(async move {
                        active.lock().await.take();
                        drop(lock);
                    });
                }
                Err(_) => drop(lock),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::store;

    async fn count_sequences(store: &SqliteStore) -> i64 {
        let mut conn = store.conn().await.unwrap();
        sqlx::query_scalar("SELECT COUNT(*) FROM order_sequences")
            .fetch_one(&mut *conn)
            .await
            .unwrap()
    }

    async fn bump_sequence(store: &SqliteStore) {
        let mut conn = store.conn().await.unwrap();
        sqlx::query("INSERT INTO order_sequences (tenant_id, last_value) VALUES ('t', 1)")
            .execute(&mut *conn)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_begin_commit() {
        let store = store().await;

        let tx = store.begin().await.unwrap();
        assert!(store.in_transaction());
        bump_sequence(&store).await;
        tx.commit().await.unwrap();
        assert!(!store.in_transaction());
        assert_eq!(count_sequences(&store).await, 1);

        // Lock released: a second transaction can start
        let tx = store.begin().await.unwrap();
        tx.rollback().await.unwrap();
        assert!(!store.in_transaction());
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let store = store().await;

        let tx = store.begin().await.unwrap();
        bump_sequence(&store).await;
        tx.rollback().await.unwrap();

        assert_eq!(count_sequences(&store).await, 0);
    }

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() {
        let store = store().await;

        let tx = store.begin().await.unwrap();
        bump_sequence(&store).await;
        drop(tx);

        assert!(!store.in_transaction());
        assert_eq!(count_sequences(&store).await, 0);

        let tx = store.begin().await.unwrap();
        bump_sequence(&store).await;
        tx.commit().await.unwrap();
        assert_eq!(count_sequences(&store).await, 1);
    }
}
