//! Shopping carts. Each user has exactly one, created at registration.

use std::sync::Arc;

use model::{CartItem, CartLineView, CartView};
use repository::prelude::*;
use tracing::{debug, instrument};

use crate::pricing::{line_total, sum_totals};
use crate::{missing, ServiceError};

pub struct CartService {
    store: Arc<dyn Store>,
}

fn check_quantity(quantity: i32) -> Result<(), ServiceError> {
    if quantity <= 0 {
        return Err(ServiceError::Validation("quantity must be greater than zero".into()));
    }
    Ok(())
}

impl CartService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Current cart priced at today's catalog prices.
    #[instrument(skip(self))]
    pub async fn get_cart(&self, user_id: i64) -> Result<CartView, ServiceError> {
        let mut tx = self.store.begin().await?;
        let cart = tx.find_cart_by_user(user_id).await.map_err(missing("cart"))?;
        let items = tx.list_cart_items(cart.id).await?;

        let mut lines = Vec::with_capacity(items.len());
        for item in items {
            let bike = tx.find_bike(item.bike_id).await.map_err(missing("bike"))?;
            let total = line_total(bike.price, item.quantity)?;
            lines.push(CartLineView { item, bike, line_total: total });
        }
        tx.commit().await?;

        let total_price = sum_totals(lines.iter().map(|l| l.line_total))?;
        Ok(CartView { cart, lines, total_price })
    }

    /// Adds `quantity` units of a bike, merging into an existing line.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: i64,
        bike_id: i64,
        quantity: i32,
    ) -> Result<CartItem, ServiceError> {
        check_quantity(quantity)?;

        let mut tx = self.store.begin().await?;
        let cart = tx.find_cart_by_user(user_id).await.map_err(missing("cart"))?;
        tx.find_bike(bike_id).await.map_err(missing("bike"))?;

        let item = match tx.find_cart_item(cart.id, bike_id).await? {
            Some(existing) => {
                let merged = existing
                    .quantity
                    .checked_add(quantity)
                    .ok_or_else(|| ServiceError::Validation("quantity is out of range".into()))?;
                tx.set_cart_item_quantity(existing.id, merged).await?
            }
            None => tx.insert_cart_item(cart.id, bike_id, quantity).await?,
        };
        tx.commit().await?;

        debug!(cart_id = item.cart_id, bike_id, quantity = item.quantity, "Cart line saved");
        Ok(item)
    }

    /// Sets the quantity of an existing line.
    #[instrument(skip(self))]
    pub async fn update_item(
        &self,
        user_id: i64,
        bike_id: i64,
        quantity: i32,
    ) -> Result<CartItem, ServiceError> {
        check_quantity(quantity)?;

        let mut tx = self.store.begin().await?;
        let cart = tx.find_cart_by_user(user_id).await.map_err(missing("cart"))?;
        let existing = tx
            .find_cart_item(cart.id, bike_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("cart item not found".into()))?;
        let item = tx.set_cart_item_quantity(existing.id, quantity).await?;
        tx.commit().await?;
        Ok(item)
    }

    #[instrument(skip(self))]
    pub async fn remove_item(&self, user_id: i64, bike_id: i64) -> Result<(), ServiceError> {
        let mut tx = self.store.begin().await?;
        let cart = tx.find_cart_by_user(user_id).await.map_err(missing("cart"))?;
        if !tx.delete_cart_item(cart.id, bike_id).await? {
            return Err(ServiceError::NotFound("cart item not found".into()));
        }
        tx.commit().await?;
        Ok(())
    }
}
