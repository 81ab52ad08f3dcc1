use async_trait::async_trait;
use model::{Cart, CartItem};
use tokio_postgres::Row;

use super::{rows_into, PgTx};
use crate::{CartsRepository, RepositoryError};

const CART_COLUMNS: &str = "id, user_id, created_at, updated_at";
const ITEM_COLUMNS: &str = "id, cart_id, bike_id, quantity, created_at, updated_at";

fn cart_from_row(row: &Row) -> Result<Cart, tokio_postgres::Error> {
    Ok(Cart {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn item_from_row(row: &Row) -> Result<CartItem, tokio_postgres::Error> {
    Ok(CartItem {
        id: row.try_get("id")?,
        cart_id: row.try_get("cart_id")?,
        bike_id: row.try_get("bike_id")?,
        quantity: row.try_get("quantity")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl CartsRepository for PgTx {
    async fn insert_cart(&mut self, user_id: i64) -> Result<Cart, RepositoryError> {
        let query = format!("INSERT INTO carts (user_id) VALUES ($1) RETURNING {CART_COLUMNS}");
        let row = self.query_one_opt(&query, &[&user_id]).await?;
        Ok(cart_from_row(&row)?)
    }

    async fn find_cart_by_user(&mut self, user_id: i64) -> Result<Cart, RepositoryError> {
        let query = format!("SELECT {CART_COLUMNS} FROM carts WHERE user_id = $1");
        let row = self.query_one_opt(&query, &[&user_id]).await?;
        Ok(cart_from_row(&row)?)
    }

    async fn list_cart_items(&mut self, cart_id: i64) -> Result<Vec<CartItem>, RepositoryError> {
        let query = format!("SELECT {ITEM_COLUMNS} FROM cart_items WHERE cart_id = $1 ORDER BY id");
        let rows = self.conn()?.query(&query, &[&cart_id]).await?;
        rows_into(rows, item_from_row)
    }

    async fn find_cart_item(
        &mut self,
        cart_id: i64,
        bike_id: i64,
    ) -> Result<Option<CartItem>, RepositoryError> {
        let query =
            format!("SELECT {ITEM_COLUMNS} FROM cart_items WHERE cart_id = $1 AND bike_id = $2");
        let row = self.conn()?.query_opt(&query, &[&cart_id, &bike_id]).await?;
        Ok(row.as_ref().map(item_from_row).transpose()?)
    }

    async fn insert_cart_item(
        &mut self,
        cart_id: i64,
        bike_id: i64,
        quantity: i32,
    ) -> Result<CartItem, RepositoryError> {
        let query = format!(
            "INSERT INTO cart_items (cart_id, bike_id, quantity)
             VALUES ($1, $2, $3)
             RETURNING {ITEM_COLUMNS}"
        );
        let row = self.query_one_opt(&query, &[&cart_id, &bike_id, &quantity]).await?;
        Ok(item_from_row(&row)?)
    }

    async fn set_cart_item_quantity(
        &mut self,
        id: i64,
        quantity: i32,
    ) -> Result<CartItem, RepositoryError> {
        let query = format!(
            "UPDATE cart_items SET quantity = $2, updated_at = now()
             WHERE id = $1
             RETURNING {ITEM_COLUMNS}"
        );
        let row = self.query_one_opt(&query, &[&id, &quantity]).await?;
        Ok(item_from_row(&row)?)
    }

    async fn delete_cart_item(
        &mut self,
        cart_id: i64,
        bike_id: i64,
    ) -> Result<bool, RepositoryError> {
        let removed = self
            .conn()?
            .execute(
                "DELETE FROM cart_items WHERE cart_id = $1 AND bike_id = $2",
                &[&cart_id, &bike_id],
            )
            .await?;
        Ok(removed > 0)
    }
}
