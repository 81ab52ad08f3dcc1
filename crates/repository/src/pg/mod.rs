//! PostgreSQL implementation of the repository traits.
//!
//! A [`PgTx`] owns one pooled connection for the lifetime of a unit of work
//! and brackets it with `BEGIN`/`COMMIT`. Row locks are taken with
//! `SELECT ... FOR UPDATE`.

use async_trait::async_trait;
use deadpool_postgres::{Object, Pool};
use tokio_postgres::Row;
use tracing::warn;

use crate::{RepositoryError, Store, StoreTx};

mod carts;
mod catalog;
mod reviews;
mod transactions;
mod users;

/// PostgreSQL-backed [`Store`].
#[derive(Clone)]
pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, RepositoryError> {
        let conn = self.pool.get().await?;
        conn.batch_execute("BEGIN").await?;
        Ok(Box::new(PgTx { conn: Some(conn) }))
    }
}

/// Open PostgreSQL transaction on a dedicated pooled connection.
pub struct PgTx {
    conn: Option<Object>,
}

impl PgTx {
    fn conn(&self) -> Result<&Object, RepositoryError> {
        self.conn
            .as_ref()
            .ok_or_else(|| RepositoryError::Storage("unit of work already finished".into()))
    }

    async fn query_one_opt(
        &self,
        sql: &str,
        params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
    ) -> Result<Row, RepositoryError> {
        self.conn()?
            .query_opt(sql, params)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Executes a statement that must touch exactly one row.
    async fn execute_one(
        &self,
        sql: &str,
        params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
    ) -> Result<(), RepositoryError> {
        match self.conn()?.execute(sql, params).await? {
            0 => Err(RepositoryError::NotFound),
            _ => Ok(()),
        }
    }

    async fn finish(&mut self, statement: &str) -> Result<(), RepositoryError> {
        let conn = self
            .conn
            .take()
            .ok_or_else(|| RepositoryError::Storage("unit of work already finished".into()))?;
        conn.batch_execute(statement).await?;
        Ok(())
    }
}

#[async_trait]
impl StoreTx for PgTx {
    async fn commit(mut self: Box<Self>) -> Result<(), RepositoryError> {
        self.finish("COMMIT").await
    }

    async fn rollback(mut self: Box<Self>) -> Result<(), RepositoryError> {
        self.finish("ROLLBACK").await
    }
}

impl Drop for PgTx {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        // The connection must not go back to the pool inside an open transaction.
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = conn.batch_execute("ROLLBACK").await {
                        warn!("Rollback of abandoned unit of work failed: {e}");
                        drop(Object::take(conn));
                    }
                });
            }
            Err(_) => drop(Object::take(conn)),
        }
    }
}

fn rows_into<T>(
    rows: Vec<Row>,
    map: fn(&Row) -> Result<T, tokio_postgres::Error>,
) -> Result<Vec<T>, RepositoryError> {
    rows.iter().map(|r| map(r).map_err(RepositoryError::from)).collect()
}
