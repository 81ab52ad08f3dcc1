//! Checkout workflow: order builder and transaction state machine.
//!
//! This module defines the [`CheckoutService`] trait and its implementation
//! [`CheckoutServiceImpl`]. A transaction is created `pending` together with
//! its order lines and a payment link, may be edited or deleted while
//! pending, and moves to `paid` exactly once, at which point stock is
//! decremented for every line.
//!
//! # Features
//! - Lines are repriced from the catalog; client totals are only checked.
//! - Header, lines, cart cleanup and payment link share one unit of work.
//! - Payment confirmation locks the transaction row, so concurrent
//!   confirmations serialize and stock moves once.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use model::{
    CheckoutLine, LineUpdate, Metadata, NewOrder, PageRequest, Transaction, TransactionStatus,
};
use payment::{PaymentGateway, PaymentRequest};
use repository::prelude::*;
use repository::RepositoryError;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::pricing::{price_line, sum_totals};
use crate::reconcile::{reconcile, stock_demand};
use crate::{missing, Caller, ServiceError};

/// A user's header plus their transactions, newest first.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UserTransactions {
    pub id: i64,
    pub username: String,
    pub transactions: Vec<Transaction>,
}

/// Business operations on transactions.
#[async_trait]
pub trait CheckoutService: Send + Sync {
    /// Creates a pending transaction from `lines` and returns its id.
    ///
    /// # Arguments
    /// * `user_id` - The buyer.
    /// * `lines` - Requested bikes, quantities and the totals the client expects.
    ///
    /// # Errors
    /// [`ServiceError::Validation`] for an empty line set, a bad quantity, a
    /// total that disagrees with the catalog, an unavailable bike or a
    /// quantity above stock; [`ServiceError::NotFound`] for an unknown user or
    /// bike; [`ServiceError::Upstream`] if no payment link could be obtained.
    /// Nothing is persisted on error.
    async fn create_transaction(
        &self,
        user_id: i64,
        lines: &[CheckoutLine],
    ) -> Result<i64, ServiceError>;

    /// Replaces bike, quantity and total of existing lines of a pending transaction.
    ///
    /// # Errors
    /// [`ServiceError::NotFound`] if the transaction is not the caller's or a
    /// line belongs elsewhere; [`ServiceError::InvalidState`] once paid;
    /// [`ServiceError::Validation`] if the edited lines together ask for more
    /// of a bike than is in stock.
    async fn update_transaction(
        &self,
        user_id: i64,
        transaction_id: i64,
        lines: &[LineUpdate],
    ) -> Result<Transaction, ServiceError>;

    /// Confirms payment: `pending → paid` and stock decrement per line.
    ///
    /// # Errors
    /// [`ServiceError::InvalidState`] if not pending;
    /// [`ServiceError::InsufficientStock`] if a line exceeds the bike's stock,
    /// in which case the transaction stays pending.
    async fn pay_transaction(
        &self,
        user_id: i64,
        transaction_id: i64,
    ) -> Result<Transaction, ServiceError>;

    /// Deletes a pending transaction and its lines.
    async fn delete_transaction(
        &self,
        user_id: i64,
        transaction_id: i64,
    ) -> Result<(), ServiceError>;

    /// Loads a transaction with its lines; visible to its owner and admins.
    async fn get_transaction(
        &self,
        caller: Caller,
        transaction_id: i64,
    ) -> Result<Transaction, ServiceError>;

    /// One page of all transactions, newest first.
    async fn list_transactions(
        &self,
        page: PageRequest,
    ) -> Result<(Vec<Transaction>, Metadata), ServiceError>;

    /// All transactions of `user_id`; visible to that user and admins.
    async fn user_transactions(
        &self,
        caller: Caller,
        user_id: i64,
    ) -> Result<UserTransactions, ServiceError>;
}

/// [`CheckoutService`] over a [`Store`] and a [`PaymentGateway`].
pub struct CheckoutServiceImpl {
    store: Arc<dyn Store>,
    gateway: Arc<dyn PaymentGateway>,
}

impl CheckoutServiceImpl {
    pub fn new(store: Arc<dyn Store>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { store, gateway }
    }

    fn validate_lines(lines: &[CheckoutLine]) -> Result<(), ServiceError> {
        if lines.is_empty() {
            return Err(ServiceError::Validation("at least one line is required".into()));
        }
        if let Some(line) = lines.iter().find(|l| l.quantity <= 0) {
            return Err(ServiceError::Validation(format!(
                "quantity for bike {} must be greater than zero",
                line.bike_id
            )));
        }
        Ok(())
    }

    /// Locks the caller's transaction. Other users' transactions read as missing.
    async fn lock_owned(
        tx: &mut dyn StoreTx,
        user_id: i64,
        transaction_id: i64,
    ) -> Result<Transaction, ServiceError> {
        let transaction = tx
            .lock_transaction(transaction_id)
            .await
            .map_err(missing("transaction"))?;
        if transaction.user_id != user_id {
            return Err(ServiceError::NotFound("transaction not found".into()));
        }
        Ok(transaction)
    }
}

/// Rejects demand above current stock. Payment re-checks under row locks.
async fn check_stock(
    tx: &mut dyn StoreTx,
    demand: &BTreeMap<i64, i32>,
) -> Result<(), ServiceError> {
    for (&bike_id, &wanted) in demand {
        let bike = tx.find_bike(bike_id).await.map_err(missing("bike"))?;
        if wanted > bike.stock {
            return Err(ServiceError::Validation(format!(
                "bike {} has {} in stock, {} requested",
                bike.id, bike.stock, wanted
            )));
        }
    }
    Ok(())
}

fn require_pending(transaction: &Transaction) -> Result<(), ServiceError> {
    if transaction.is_pending() {
        Ok(())
    } else {
        Err(ServiceError::InvalidState(format!(
            "transaction {} is already {}",
            transaction.id, transaction.status
        )))
    }
}

#[async_trait]
impl CheckoutService for CheckoutServiceImpl {
    #[instrument(skip(self, lines), fields(lines = lines.len()))]
    async fn create_transaction(
        &self,
        user_id: i64,
        lines: &[CheckoutLine],
    ) -> Result<i64, ServiceError> {
        Self::validate_lines(lines)?;

        let mut tx = self.store.begin().await?;
        let user = tx.find_user(user_id).await.map_err(missing("user"))?;
        let buyer_name = match tx.find_profile(user_id).await {
            Ok(profile) => profile
                .name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| user.username.clone()),
            Err(RepositoryError::NotFound) => user.username.clone(),
            Err(e) => return Err(e.into()),
        };

        let mut line_totals = Vec::with_capacity(lines.len());
        for line in lines {
            let bike = tx.find_bike(line.bike_id).await.map_err(missing("bike"))?;
            line_totals.push(price_line(&bike, line.quantity, line.total_price)?);
        }
        let demand = stock_demand(lines.iter().map(|l| (l.bike_id, l.quantity)))?;
        check_stock(tx.as_mut(), &demand).await?;
        let total = sum_totals(line_totals.iter().copied())?;

        let mut transaction = tx.insert_transaction(user_id, total).await?;
        for (line, line_total) in lines.iter().zip(&line_totals) {
            tx.insert_order(&NewOrder {
                transaction_id: transaction.id,
                user_id,
                bike_id: line.bike_id,
                quantity: line.quantity,
                total_price: *line_total,
            })
            .await?;
        }

        match tx.find_cart_by_user(user_id).await {
            Ok(cart) => {
                for line in lines {
                    tx.delete_cart_item(cart.id, line.bike_id).await?;
                }
            }
            Err(RepositoryError::NotFound) => warn!(user_id, "Buyer has no cart to clear"),
            Err(e) => return Err(e.into()),
        }

        let link = self
            .gateway
            .create_payment_link(&PaymentRequest {
                order_id: transaction.id,
                amount: total,
                buyer_name,
                buyer_email: user.email.clone(),
            })
            .await
            .inspect_err(|e| {
                warn!(transaction_id = transaction.id, "Payment link request failed: {e}")
            })?;

        transaction.payment_link = Some(link);
        tx.update_transaction(&transaction).await?;
        tx.commit().await?;

        info!(transaction_id = transaction.id, total, "Transaction created");
        Ok(transaction.id)
    }

    #[instrument(skip(self, lines), fields(lines = lines.len()))]
    async fn update_transaction(
        &self,
        user_id: i64,
        transaction_id: i64,
        lines: &[LineUpdate],
    ) -> Result<Transaction, ServiceError> {
        if lines.is_empty() {
            return Err(ServiceError::Validation("at least one line is required".into()));
        }

        let mut tx = self.store.begin().await?;
        let mut transaction = Self::lock_owned(tx.as_mut(), user_id, transaction_id).await?;
        require_pending(&transaction)?;

        let mut orders = tx.list_orders(transaction.id).await?;
        let mut total = transaction.total_price;
        for line in lines {
            let Some(order) = orders.iter_mut().find(|o| o.id == line.id) else {
                return Err(ServiceError::NotFound(format!(
                    "order line {} not found in transaction {}",
                    line.id, transaction.id
                )));
            };
            let bike = tx.find_bike(line.bike_id).await.map_err(missing("bike"))?;
            let new_total = price_line(&bike, line.quantity, line.total_price)?;
            total = sum_totals([total - order.total_price, new_total])?;

            order.bike_id = line.bike_id;
            order.quantity = line.quantity;
            order.total_price = new_total;
            tx.update_order(order).await?;
        }
        let demand = stock_demand(orders.iter().map(|o| (o.bike_id, o.quantity)))?;
        check_stock(tx.as_mut(), &demand).await?;

        transaction.total_price = total;
        tx.update_transaction(&transaction).await?;
        let mut updated = tx.find_transaction(transaction.id).await?;
        updated.orders = tx.list_orders(transaction.id).await?;
        tx.commit().await?;

        info!(transaction_id, total, "Transaction updated");
        Ok(updated)
    }

    #[instrument(skip(self))]
    async fn pay_transaction(
        &self,
        user_id: i64,
        transaction_id: i64,
    ) -> Result<Transaction, ServiceError> {
        let mut tx = self.store.begin().await?;
        let mut transaction = Self::lock_owned(tx.as_mut(), user_id, transaction_id).await?;
        require_pending(&transaction)?;

        let orders = tx.list_orders(transaction.id).await?;
        let demand = stock_demand(orders.iter().map(|o| (o.bike_id, o.quantity)))?;
        reconcile(tx.as_mut(), &demand).await?;

        transaction.status = TransactionStatus::Paid;
        tx.update_transaction(&transaction).await?;
        let mut paid = tx.find_transaction(transaction.id).await?;
        paid.orders = orders;
        tx.commit().await?;

        info!(transaction_id, "Transaction paid");
        Ok(paid)
    }

    #[instrument(skip(self))]
    async fn delete_transaction(
        &self,
        user_id: i64,
        transaction_id: i64,
    ) -> Result<(), ServiceError> {
        let mut tx = self.store.begin().await?;
        let transaction = Self::lock_owned(tx.as_mut(), user_id, transaction_id).await?;
        require_pending(&transaction)?;

        tx.delete_transaction(transaction.id).await?;
        tx.commit().await?;

        info!(transaction_id, "Transaction deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_transaction(
        &self,
        caller: Caller,
        transaction_id: i64,
    ) -> Result<Transaction, ServiceError> {
        let mut tx = self.store.begin().await?;
        let mut transaction = tx
            .find_transaction(transaction_id)
            .await
            .map_err(missing("transaction"))?;
        if !caller.can_access(transaction.user_id) {
            return Err(ServiceError::NotFound("transaction not found".into()));
        }
        transaction.orders = tx.list_orders(transaction.id).await?;
        tx.commit().await?;
        Ok(transaction)
    }

    #[instrument(skip(self))]
    async fn list_transactions(
        &self,
        page: PageRequest,
    ) -> Result<(Vec<Transaction>, Metadata), ServiceError> {
        let page = page.normalized();
        let mut tx = self.store.begin().await?;
        let (mut transactions, total) = tx.list_transactions(page).await?;
        attach_orders(tx.as_mut(), &mut transactions).await?;
        tx.commit().await?;
        Ok((transactions, Metadata::new(page, total)))
    }

    #[instrument(skip(self))]
    async fn user_transactions(
        &self,
        caller: Caller,
        user_id: i64,
    ) -> Result<UserTransactions, ServiceError> {
        if !caller.can_access(user_id) {
            return Err(ServiceError::Forbidden(
                "cannot view another user's transactions".into(),
            ));
        }
        let mut tx = self.store.begin().await?;
        let user = tx.find_user(user_id).await.map_err(missing("user"))?;
        let mut transactions = tx.list_user_transactions(user_id).await?;
        attach_orders(tx.as_mut(), &mut transactions).await?;
        tx.commit().await?;
        Ok(UserTransactions {
            id: user.id,
            username: user.username,
            transactions,
        })
    }
}

async fn attach_orders(
    tx: &mut dyn StoreTx,
    transactions: &mut [Transaction],
) -> Result<(), ServiceError> {
    let ids: Vec<i64> = transactions.iter().map(|t| t.id).collect();
    let mut by_transaction: HashMap<i64, Vec<_>> = HashMap::new();
    for order in tx.list_orders_for(&ids).await? {
        by_transaction.entry(order.transaction_id).or_default().push(order);
    }
    for transaction in transactions {
        transaction.orders = by_transaction.remove(&transaction.id).unwrap_or_default();
    }
    Ok(())
}
