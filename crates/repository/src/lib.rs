//! # Data Repository Layer
//!
//! This module provides repository traits for all entities (users, catalog,
//! carts, transactions with their order lines, reviews) and two storage
//! implementations: PostgreSQL ([`PgStore`]) and an in-memory store
//! ([`MemoryStore`]) with the same constraint semantics.
//!
//! Every operation runs inside a unit of work obtained from [`Store::begin`].
//! The returned [`StoreTx`] implements all repository traits; nothing it
//! writes is visible to others until [`StoreTx::commit`], and dropping it
//! without committing discards the work.

use async_trait::async_trait;
use model::{
    Bike, BikeFilter, Cart, CartItem, Category, NewBike, NewOrder, NewReview, NewUser, Order,
    PageRequest, Profile, Review, Transaction, User,
};
use thiserror::Error;
use tokio_postgres::error::SqlState;

mod memory;
mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

/// Brings every repository trait into scope for callers of [`StoreTx`].
pub mod prelude {
    pub use crate::{
        CartsRepository, CatalogRepository, ReviewsRepository, Store, StoreTx,
        TransactionsRepository, UsersRepository,
    };
}

/// # RepositoryError
///
/// Error types that can occur during repository operations.
///
/// Constraint violations are classified so the service layer can map them
/// onto business errors without looking at SQL state codes.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database-related errors, wrapping the underlying PostgreSQL error
    #[error("Database error: {0}")]
    Db(tokio_postgres::Error),
    /// Failed to obtain a connection from the pool.
    #[error("Pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),
    /// No result found.
    #[error("Not found")]
    NotFound,
    /// A unique constraint rejected the write.
    #[error("Conflict: {0}")]
    Conflict(String),
    /// A foreign key is dangling or still referenced.
    #[error("Invalid reference: {0}")]
    InvalidReference(String),
    /// The backing store failed outside of SQL (finished unit of work, injected fault).
    #[error("Storage failure: {0}")]
    Storage(String),
}

impl From<tokio_postgres::Error> for RepositoryError {
    fn from(err: tokio_postgres::Error) -> Self {
        let Some(db) = err.as_db_error() else {
            return RepositoryError::Db(err);
        };
        let what = db
            .constraint()
            .map(str::to_owned)
            .unwrap_or_else(|| db.message().to_owned());
        if db.code() == &SqlState::UNIQUE_VIOLATION {
            RepositoryError::Conflict(what)
        } else if db.code() == &SqlState::FOREIGN_KEY_VIOLATION {
            RepositoryError::InvalidReference(what)
        } else {
            RepositoryError::Db(err)
        }
    }
}

/// # UsersRepository
///
/// Accounts and their one-to-one profiles.
#[async_trait]
pub trait UsersRepository: Send {
    /// Inserts a user; duplicate username or email is a [`RepositoryError::Conflict`].
    async fn insert_user(&mut self, user: &NewUser) -> Result<User, RepositoryError>;
    async fn find_user(&mut self, id: i64) -> Result<User, RepositoryError>;
    async fn find_user_by_email(&mut self, email: &str) -> Result<User, RepositoryError>;
    async fn update_user_identity(
        &mut self,
        id: i64,
        username: &str,
        email: &str,
    ) -> Result<User, RepositoryError>;
    async fn update_user_role(&mut self, id: i64, role_id: i32) -> Result<User, RepositoryError>;
    /// Creates the empty profile of a freshly registered user.
    async fn insert_profile(&mut self, user_id: i64) -> Result<Profile, RepositoryError>;
    async fn find_profile(&mut self, user_id: i64) -> Result<Profile, RepositoryError>;
    async fn update_profile(&mut self, profile: &Profile) -> Result<Profile, RepositoryError>;
}

/// # CatalogRepository
///
/// Categories and bikes. This is the only place bike stock is written.
#[async_trait]
pub trait CatalogRepository: Send {
    async fn insert_category(&mut self, name: &str) -> Result<Category, RepositoryError>;
    async fn find_category(&mut self, id: i64) -> Result<Category, RepositoryError>;
    async fn list_categories(&mut self) -> Result<Vec<Category>, RepositoryError>;
    async fn rename_category(&mut self, id: i64, name: &str) -> Result<Category, RepositoryError>;
    /// Deletes the category and its bikes.
    async fn delete_category(&mut self, id: i64) -> Result<(), RepositoryError>;

    async fn insert_bike(&mut self, bike: &NewBike) -> Result<Bike, RepositoryError>;
    async fn find_bike(&mut self, id: i64) -> Result<Bike, RepositoryError>;
    /// Reads a bike and holds a row lock on it until the unit of work ends.
    async fn lock_bike(&mut self, id: i64) -> Result<Bike, RepositoryError>;
    /// Returns one page of in-stock bikes matching `filter` plus the total match count.
    async fn list_bikes(
        &mut self,
        filter: &BikeFilter,
        page: PageRequest,
    ) -> Result<(Vec<Bike>, i64), RepositoryError>;
    async fn update_bike(&mut self, bike: &Bike) -> Result<Bike, RepositoryError>;
    async fn set_bike_stock(&mut self, id: i64, stock: i32) -> Result<(), RepositoryError>;
    async fn delete_bike(&mut self, id: i64) -> Result<(), RepositoryError>;
}

/// # CartsRepository
///
/// Cart lines are addressed by the (cart, bike) pair, which is unique.
#[async_trait]
pub trait CartsRepository: Send {
    async fn insert_cart(&mut self, user_id: i64) -> Result<Cart, RepositoryError>;
    async fn find_cart_by_user(&mut self, user_id: i64) -> Result<Cart, RepositoryError>;
    async fn list_cart_items(&mut self, cart_id: i64) -> Result<Vec<CartItem>, RepositoryError>;
    async fn find_cart_item(
        &mut self,
        cart_id: i64,
        bike_id: i64,
    ) -> Result<Option<CartItem>, RepositoryError>;
    async fn insert_cart_item(
        &mut self,
        cart_id: i64,
        bike_id: i64,
        quantity: i32,
    ) -> Result<CartItem, RepositoryError>;
    async fn set_cart_item_quantity(
        &mut self,
        id: i64,
        quantity: i32,
    ) -> Result<CartItem, RepositoryError>;
    /// Returns whether a line was removed.
    async fn delete_cart_item(
        &mut self,
        cart_id: i64,
        bike_id: i64,
    ) -> Result<bool, RepositoryError>;
}

/// # TransactionsRepository
///
/// Transaction headers and their order lines. Header reads return
/// [`Transaction`] values with an empty `orders` collection.
#[async_trait]
pub trait TransactionsRepository: Send {
    /// Inserts a pending header without a payment link.
    async fn insert_transaction(
        &mut self,
        user_id: i64,
        total_price: i64,
    ) -> Result<Transaction, RepositoryError>;
    async fn find_transaction(&mut self, id: i64) -> Result<Transaction, RepositoryError>;
    /// Reads a header and holds a row lock on it until the unit of work ends.
    async fn lock_transaction(&mut self, id: i64) -> Result<Transaction, RepositoryError>;
    /// Newest first.
    async fn list_transactions(
        &mut self,
        page: PageRequest,
    ) -> Result<(Vec<Transaction>, i64), RepositoryError>;
    async fn list_user_transactions(
        &mut self,
        user_id: i64,
    ) -> Result<Vec<Transaction>, RepositoryError>;
    /// Persists total, status and payment link, and bumps `updated_at`.
    async fn update_transaction(
        &mut self,
        transaction: &Transaction,
    ) -> Result<(), RepositoryError>;
    /// Deletes the header and, by cascade, its lines.
    async fn delete_transaction(&mut self, id: i64) -> Result<(), RepositoryError>;

    async fn insert_order(&mut self, order: &NewOrder) -> Result<Order, RepositoryError>;
    async fn find_order(&mut self, id: i64) -> Result<Order, RepositoryError>;
    /// Lines of one transaction in creation order.
    async fn list_orders(&mut self, transaction_id: i64) -> Result<Vec<Order>, RepositoryError>;
    /// Lines of several transactions in creation order.
    async fn list_orders_for(
        &mut self,
        transaction_ids: &[i64],
    ) -> Result<Vec<Order>, RepositoryError>;
    /// Overwrites bike, quantity and total of a line.
    async fn update_order(&mut self, order: &Order) -> Result<(), RepositoryError>;
    async fn set_order_reviewed(&mut self, id: i64, reviewed: bool) -> Result<(), RepositoryError>;
}

/// # ReviewsRepository
///
/// At most one review exists per order line.
#[async_trait]
pub trait ReviewsRepository: Send {
    async fn insert_review(&mut self, review: &NewReview) -> Result<Review, RepositoryError>;
    async fn find_review(&mut self, id: i64) -> Result<Review, RepositoryError>;
    async fn list_reviews(&mut self, bike_id: Option<i64>) -> Result<Vec<Review>, RepositoryError>;
    async fn update_review(
        &mut self,
        id: i64,
        comment: &str,
        rating: i16,
    ) -> Result<Review, RepositoryError>;
    async fn delete_review(&mut self, id: i64) -> Result<(), RepositoryError>;
}

/// An open unit of work spanning every repository.
#[async_trait]
pub trait StoreTx:
    UsersRepository
    + CatalogRepository
    + CartsRepository
    + TransactionsRepository
    + ReviewsRepository
    + Send
{
    /// Makes all writes of this unit visible atomically.
    async fn commit(self: Box<Self>) -> Result<(), RepositoryError>;
    /// Discards all writes of this unit.
    async fn rollback(self: Box<Self>) -> Result<(), RepositoryError>;
}

/// Entry point of the storage layer.
#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, RepositoryError>;
}
