use async_trait::async_trait;
use model::{NewOrder, Order, PageRequest, Transaction};
use tokio_postgres::Row;

use super::{rows_into, PgTx};
use crate::{RepositoryError, TransactionsRepository};

const TRANSACTION_COLUMNS: &str =
    "id, user_id, total_price, status, payment_link, created_at, updated_at";
const ORDER_COLUMNS: &str =
    "id, transaction_id, user_id, bike_id, quantity, total_price, reviewed, created_at, updated_at";

fn transaction_from_row(row: &Row) -> Result<Transaction, tokio_postgres::Error> {
    Ok(Transaction {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        total_price: row.try_get("total_price")?,
        status: row.try_get("status")?,
        payment_link: row.try_get("payment_link")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        orders: Vec::new(),
    })
}

fn order_from_row(row: &Row) -> Result<Order, tokio_postgres::Error> {
    Ok(Order {
        id: row.try_get("id")?,
        transaction_id: row.try_get("transaction_id")?,
        user_id: row.try_get("user_id")?,
        bike_id: row.try_get("bike_id")?,
        quantity: row.try_get("quantity")?,
        total_price: row.try_get("total_price")?,
        reviewed: row.try_get("reviewed")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl TransactionsRepository for PgTx {
    async fn insert_transaction(
        &mut self,
        user_id: i64,
        total_price: i64,
    ) -> Result<Transaction, RepositoryError> {
        let query = format!(
            "INSERT INTO transactions (user_id, total_price)
             VALUES ($1, $2)
             RETURNING {TRANSACTION_COLUMNS}"
        );
        let row = self.query_one_opt(&query, &[&user_id, &total_price]).await?;
        Ok(transaction_from_row(&row)?)
    }

    async fn find_transaction(&mut self, id: i64) -> Result<Transaction, RepositoryError> {
        let query = format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = $1");
        let row = self.query_one_opt(&query, &[&id]).await?;
        Ok(transaction_from_row(&row)?)
    }

    async fn lock_transaction(&mut self, id: i64) -> Result<Transaction, RepositoryError> {
        let query =
            format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = $1 FOR UPDATE");
        let row = self.query_one_opt(&query, &[&id]).await?;
        Ok(transaction_from_row(&row)?)
    }

    async fn list_transactions(
        &mut self,
        page: PageRequest,
    ) -> Result<(Vec<Transaction>, i64), RepositoryError> {
        let conn = self.conn()?;
        let total: i64 = conn
            .query_one("SELECT COUNT(*) AS total FROM transactions", &[])
            .await?
            .try_get("total")?;
        let query = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions
             ORDER BY created_at DESC, id DESC
             LIMIT $1 OFFSET $2"
        );
        let rows = conn.query(&query, &[&page.limit, &page.offset()]).await?;
        Ok((rows_into(rows, transaction_from_row)?, total))
    }

    async fn list_user_transactions(
        &mut self,
        user_id: i64,
    ) -> Result<Vec<Transaction>, RepositoryError> {
        let query = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions
             WHERE user_id = $1
             ORDER BY created_at DESC, id DESC"
        );
        let rows = self.conn()?.query(&query, &[&user_id]).await?;
        rows_into(rows, transaction_from_row)
    }

    async fn update_transaction(
        &mut self,
        transaction: &Transaction,
    ) -> Result<(), RepositoryError> {
        self.execute_one(
            "UPDATE transactions
             SET total_price = $2, status = $3, payment_link = $4, updated_at = now()
             WHERE id = $1",
            &[
                &transaction.id,
                &transaction.total_price,
                &transaction.status,
                &transaction.payment_link,
            ],
        )
        .await
    }

    async fn delete_transaction(&mut self, id: i64) -> Result<(), RepositoryError> {
        self.execute_one("DELETE FROM transactions WHERE id = $1", &[&id]).await
    }

    async fn insert_order(&mut self, order: &NewOrder) -> Result<Order, RepositoryError> {
        let query = format!(
            "INSERT INTO orders (transaction_id, user_id, bike_id, quantity, total_price)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {ORDER_COLUMNS}"
        );
        let row = self
            .query_one_opt(
                &query,
                &[
                    &order.transaction_id,
                    &order.user_id,
                    &order.bike_id,
                    &order.quantity,
                    &order.total_price,
                ],
            )
            .await?;
        Ok(order_from_row(&row)?)
    }

    async fn find_order(&mut self, id: i64) -> Result<Order, RepositoryError> {
        let query = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let row = self.query_one_opt(&query, &[&id]).await?;
        Ok(order_from_row(&row)?)
    }

    async fn list_orders(&mut self, transaction_id: i64) -> Result<Vec<Order>, RepositoryError> {
        let query =
            format!("SELECT {ORDER_COLUMNS} FROM orders WHERE transaction_id = $1 ORDER BY id");
        let rows = self.conn()?.query(&query, &[&transaction_id]).await?;
        rows_into(rows, order_from_row)
    }

    async fn list_orders_for(
        &mut self,
        transaction_ids: &[i64],
    ) -> Result<Vec<Order>, RepositoryError> {
        if transaction_ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE transaction_id = ANY($1) ORDER BY id"
        );
        let rows = self.conn()?.query(&query, &[&transaction_ids]).await?;
        rows_into(rows, order_from_row)
    }

    async fn update_order(&mut self, order: &Order) -> Result<(), RepositoryError> {
        self.execute_one(
            "UPDATE orders SET bike_id = $2, quantity = $3, total_price = $4, updated_at = now()
             WHERE id = $1",
            &[&order.id, &order.bike_id, &order.quantity, &order.total_price],
        )
        .await
    }

    async fn set_order_reviewed(&mut self, id: i64, reviewed: bool) -> Result<(), RepositoryError> {
        self.execute_one(
            "UPDATE orders SET reviewed = $2, updated_at = now() WHERE id = $1",
            &[&id, &reviewed],
        )
        .await
    }
}
