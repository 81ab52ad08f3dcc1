//! In-memory [`Store`] with the same constraint semantics as the SQL schema.
//!
//! Units of work are serialized: [`MemoryStore::begin`] takes the table lock
//! for the whole unit and works on a private copy that is published on
//! commit. Dropping a [`MemoryTx`] without committing discards the copy.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use model::{
    Bike, BikeFilter, Cart, CartItem, Category, NewBike, NewOrder, NewReview, NewUser, Order,
    PageRequest, Profile, Review, Transaction, TransactionStatus, User,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    CartsRepository, CatalogRepository, RepositoryError, ReviewsRepository, Store, StoreTx,
    TransactionsRepository, UsersRepository,
};

#[derive(Debug, Clone)]
struct Table<T> {
    rows: BTreeMap<i64, T>,
    seq: i64,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self { rows: BTreeMap::new(), seq: 0 }
    }
}

impl<T: Clone> Table<T> {
    fn insert_with(&mut self, build: impl FnOnce(i64) -> T) -> T {
        self.seq += 1;
        let row = build(self.seq);
        self.rows.insert(self.seq, row.clone());
        row
    }

    fn get(&self, id: i64) -> Result<&T, RepositoryError> {
        self.rows.get(&id).ok_or(RepositoryError::NotFound)
    }

    fn get_mut(&mut self, id: i64) -> Result<&mut T, RepositoryError> {
        self.rows.get_mut(&id).ok_or(RepositoryError::NotFound)
    }

    fn contains(&self, id: i64) -> bool {
        self.rows.contains_key(&id)
    }

    fn values(&self) -> impl Iterator<Item = &T> {
        self.rows.values()
    }
}

#[derive(Debug, Clone, Default)]
struct Tables {
    users: Table<User>,
    profiles: Table<Profile>,
    categories: Table<Category>,
    bikes: Table<Bike>,
    carts: Table<Cart>,
    cart_items: Table<CartItem>,
    transactions: Table<Transaction>,
    orders: Table<Order>,
    reviews: Table<Review>,
}

fn conflict(constraint: &str) -> RepositoryError {
    RepositoryError::Conflict(constraint.to_owned())
}

fn dangling(constraint: &str) -> RepositoryError {
    RepositoryError::InvalidReference(constraint.to_owned())
}

impl Tables {
    fn check_user_identity(
        &self,
        id: Option<i64>,
        username: &str,
        email: &str,
    ) -> Result<(), RepositoryError> {
        let others = || self.users.values().filter(move |u| Some(u.id) != id);
        if others().any(|u| u.username == username) {
            return Err(conflict("users_username_key"));
        }
        if others().any(|u| u.email == email) {
            return Err(conflict("users_email_key"));
        }
        Ok(())
    }

    fn check_bike(
        &self,
        id: Option<i64>,
        category_id: i64,
        name: &str,
    ) -> Result<(), RepositoryError> {
        if !self.categories.contains(category_id) {
            return Err(dangling("bikes_category_id_fkey"));
        }
        if self.bikes.values().any(|b| Some(b.id) != id && b.name == name) {
            return Err(conflict("bikes_name_key"));
        }
        Ok(())
    }

    fn with_rating(&self, mut bike: Bike) -> Bike {
        let ratings: Vec<f64> = self
            .reviews
            .values()
            .filter(|r| r.bike_id == bike.id)
            .map(|r| f64::from(r.rating))
            .collect();
        bike.rating = if ratings.is_empty() {
            0.0
        } else {
            ratings.iter().sum::<f64>() / ratings.len() as f64
        };
        bike
    }

    fn delete_bike_cascade(&mut self, id: i64) -> Result<(), RepositoryError> {
        if self.orders.values().any(|o| o.bike_id == id) {
            return Err(dangling("orders_bike_id_fkey"));
        }
        self.bikes.rows.remove(&id);
        self.cart_items.rows.retain(|_, item| item.bike_id != id);
        self.reviews.rows.retain(|_, review| review.bike_id != id);
        Ok(())
    }
}

/// Budget of order-line inserts before an injected failure; negative is unlimited.
#[derive(Debug)]
struct Faults {
    order_inserts: AtomicI64,
}

/// In-memory [`Store`] used by tests and the `memory` store backend.
#[derive(Clone)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    faults: Arc<Faults>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: Arc::new(Mutex::new(Tables::default())),
            faults: Arc::new(Faults { order_inserts: AtomicI64::new(-1) }),
        }
    }

    /// Lets the next `successes` order-line inserts through and fails every one after.
    pub fn fail_order_insert_after(&self, successes: i64) {
        self.faults.order_inserts.store(successes, Ordering::SeqCst);
    }

    /// Removes injected faults.
    pub fn clear_faults(&self) {
        self.faults.order_inserts.store(-1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, RepositoryError> {
        let guard = Arc::clone(&self.tables).lock_owned().await;
        let work = guard.clone();
        Ok(Box::new(MemoryTx { guard, work, faults: Arc::clone(&self.faults) }))
    }
}

/// Open unit of work on a [`MemoryStore`].
pub struct MemoryTx {
    guard: OwnedMutexGuard<Tables>,
    work: Tables,
    faults: Arc<Faults>,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn commit(mut self: Box<Self>) -> Result<(), RepositoryError> {
        let work = std::mem::take(&mut self.work);
        *self.guard = work;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), RepositoryError> {
        Ok(())
    }
}

#[async_trait]
impl UsersRepository for MemoryTx {
    async fn insert_user(&mut self, user: &NewUser) -> Result<User, RepositoryError> {
        self.work.check_user_identity(None, &user.username, &user.email)?;
        let now = Utc::now();
        Ok(self.work.users.insert_with(|id| User {
            id,
            role_id: user.role_id,
            username: user.username.clone(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            created_at: now,
            updated_at: now,
        }))
    }

    async fn find_user(&mut self, id: i64) -> Result<User, RepositoryError> {
        self.work.users.get(id).cloned()
    }

    async fn find_user_by_email(&mut self, email: &str) -> Result<User, RepositoryError> {
        self.work
            .users
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn update_user_identity(
        &mut self,
        id: i64,
        username: &str,
        email: &str,
    ) -> Result<User, RepositoryError> {
        self.work.users.get(id)?;
        self.work.check_user_identity(Some(id), username, email)?;
        let user = self.work.users.get_mut(id)?;
        user.username = username.to_owned();
        user.email = email.to_owned();
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn update_user_role(&mut self, id: i64, role_id: i32) -> Result<User, RepositoryError> {
        let user = self.work.users.get_mut(id)?;
        user.role_id = role_id;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn insert_profile(&mut self, user_id: i64) -> Result<Profile, RepositoryError> {
        if !self.work.users.contains(user_id) {
            return Err(dangling("profiles_user_id_fkey"));
        }
        if self.work.profiles.values().any(|p| p.user_id == user_id) {
            return Err(conflict("profiles_user_id_key"));
        }
        Ok(self.work.profiles.insert_with(|id| Profile {
            id,
            user_id,
            name: None,
            bio: None,
            age: None,
            gender: None,
        }))
    }

    async fn find_profile(&mut self, user_id: i64) -> Result<Profile, RepositoryError> {
        self.work
            .profiles
            .values()
            .find(|p| p.user_id == user_id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn update_profile(&mut self, profile: &Profile) -> Result<Profile, RepositoryError> {
        let stored = self
            .work
            .profiles
            .rows
            .values_mut()
            .find(|p| p.user_id == profile.user_id)
            .ok_or(RepositoryError::NotFound)?;
        stored.name = profile.name.clone();
        stored.bio = profile.bio.clone();
        stored.age = profile.age;
        stored.gender = profile.gender;
        Ok(stored.clone())
    }
}

#[async_trait]
impl CatalogRepository for MemoryTx {
    async fn insert_category(&mut self, name: &str) -> Result<Category, RepositoryError> {
        if self.work.categories.values().any(|c| c.name == name) {
            return Err(conflict("categories_name_key"));
        }
        let now = Utc::now();
        Ok(self.work.categories.insert_with(|id| Category {
            id,
            name: name.to_owned(),
            created_at: now,
            updated_at: now,
        }))
    }

    async fn find_category(&mut self, id: i64) -> Result<Category, RepositoryError> {
        self.work.categories.get(id).cloned()
    }

    async fn list_categories(&mut self) -> Result<Vec<Category>, RepositoryError> {
        Ok(self.work.categories.values().cloned().collect())
    }

    async fn rename_category(&mut self, id: i64, name: &str) -> Result<Category, RepositoryError> {
        self.work.categories.get(id)?;
        if self.work.categories.values().any(|c| c.id != id && c.name == name) {
            return Err(conflict("categories_name_key"));
        }
        let category = self.work.categories.get_mut(id)?;
        category.name = name.to_owned();
        category.updated_at = Utc::now();
        Ok(category.clone())
    }

    async fn delete_category(&mut self, id: i64) -> Result<(), RepositoryError> {
        self.work.categories.get(id)?;
        let bikes: Vec<i64> = self
            .work
            .bikes
            .values()
            .filter(|b| b.category_id == id)
            .map(|b| b.id)
            .collect();
        for bike in bikes {
            self.work.delete_bike_cascade(bike)?;
        }
        self.work.categories.rows.remove(&id);
        Ok(())
    }

    async fn insert_bike(&mut self, bike: &NewBike) -> Result<Bike, RepositoryError> {
        self.work.check_bike(None, bike.category_id, &bike.name)?;
        let now = Utc::now();
        Ok(self.work.bikes.insert_with(|id| Bike {
            id,
            category_id: bike.category_id,
            name: bike.name.clone(),
            brand: bike.brand.clone(),
            description: bike.description.clone(),
            year: bike.year,
            price: bike.price,
            image_url: bike.image_url.clone(),
            stock: bike.stock,
            is_available: bike.is_available,
            rating: 0.0,
            created_at: now,
            updated_at: now,
        }))
    }

    async fn find_bike(&mut self, id: i64) -> Result<Bike, RepositoryError> {
        let bike = self.work.bikes.get(id)?.clone();
        Ok(self.work.with_rating(bike))
    }

    async fn lock_bike(&mut self, id: i64) -> Result<Bike, RepositoryError> {
        // The whole store is already held by this unit of work.
        self.find_bike(id).await
    }

    async fn list_bikes(
        &mut self,
        filter: &BikeFilter,
        page: PageRequest,
    ) -> Result<(Vec<Bike>, i64), RepositoryError> {
        let matching: Vec<&Bike> = self.work.bikes.values().filter(|b| filter.matches(b)).collect();
        let total = matching.len() as i64;
        let bikes = matching
            .into_iter()
            .skip(usize::try_from(page.offset()).unwrap_or(0))
            .take(usize::try_from(page.limit).unwrap_or(0))
            .map(|b| self.work.with_rating(b.clone()))
            .collect();
        Ok((bikes, total))
    }

    async fn update_bike(&mut self, bike: &Bike) -> Result<Bike, RepositoryError> {
        self.work.bikes.get(bike.id)?;
        self.work.check_bike(Some(bike.id), bike.category_id, &bike.name)?;
        let stored = self.work.bikes.get_mut(bike.id)?;
        let created_at = stored.created_at;
        *stored = Bike { created_at, updated_at: Utc::now(), ..bike.clone() };
        let updated = stored.clone();
        Ok(self.work.with_rating(updated))
    }

    async fn set_bike_stock(&mut self, id: i64, stock: i32) -> Result<(), RepositoryError> {
        let bike = self.work.bikes.get_mut(id)?;
        bike.stock = stock;
        bike.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_bike(&mut self, id: i64) -> Result<(), RepositoryError> {
        self.work.bikes.get(id)?;
        self.work.delete_bike_cascade(id)
    }
}

#[async_trait]
impl CartsRepository for MemoryTx {
    async fn insert_cart(&mut self, user_id: i64) -> Result<Cart, RepositoryError> {
        if !self.work.users.contains(user_id) {
            return Err(dangling("carts_user_id_fkey"));
        }
        if self.work.carts.values().any(|c| c.user_id == user_id) {
            return Err(conflict("carts_user_id_key"));
        }
        let now = Utc::now();
        Ok(self.work.carts.insert_with(|id| Cart { id, user_id, created_at: now, updated_at: now }))
    }

    async fn find_cart_by_user(&mut self, user_id: i64) -> Result<Cart, RepositoryError> {
        self.work
            .carts
            .values()
            .find(|c| c.user_id == user_id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn list_cart_items(&mut self, cart_id: i64) -> Result<Vec<CartItem>, RepositoryError> {
        Ok(self.work.cart_items.values().filter(|i| i.cart_id == cart_id).cloned().collect())
    }

    async fn find_cart_item(
        &mut self,
        cart_id: i64,
        bike_id: i64,
    ) -> Result<Option<CartItem>, RepositoryError> {
        Ok(self
            .work
            .cart_items
            .values()
            .find(|i| i.cart_id == cart_id && i.bike_id == bike_id)
            .cloned())
    }

    async fn insert_cart_item(
        &mut self,
        cart_id: i64,
        bike_id: i64,
        quantity: i32,
    ) -> Result<CartItem, RepositoryError> {
        if !self.work.carts.contains(cart_id) {
            return Err(dangling("cart_items_cart_id_fkey"));
        }
        if !self.work.bikes.contains(bike_id) {
            return Err(dangling("cart_items_bike_id_fkey"));
        }
        if self.work.cart_items.values().any(|i| i.cart_id == cart_id && i.bike_id == bike_id) {
            return Err(conflict("cart_items_cart_id_bike_id_key"));
        }
        let now = Utc::now();
        Ok(self.work.cart_items.insert_with(|id| CartItem {
            id,
            cart_id,
            bike_id,
            quantity,
            created_at: now,
            updated_at: now,
        }))
    }

    async fn set_cart_item_quantity(
        &mut self,
        id: i64,
        quantity: i32,
    ) -> Result<CartItem, RepositoryError> {
        let item = self.work.cart_items.get_mut(id)?;
        item.quantity = quantity;
        item.updated_at = Utc::now();
        Ok(item.clone())
    }

    async fn delete_cart_item(
        &mut self,
        cart_id: i64,
        bike_id: i64,
    ) -> Result<bool, RepositoryError> {
        let before = self.work.cart_items.rows.len();
        self.work
            .cart_items
            .rows
            .retain(|_, i| !(i.cart_id == cart_id && i.bike_id == bike_id));
        Ok(self.work.cart_items.rows.len() < before)
    }
}

#[async_trait]
impl TransactionsRepository for MemoryTx {
    async fn insert_transaction(
        &mut self,
        user_id: i64,
        total_price: i64,
    ) -> Result<Transaction, RepositoryError> {
        if !self.work.users.contains(user_id) {
            return Err(dangling("transactions_user_id_fkey"));
        }
        let now = Utc::now();
        Ok(self.work.transactions.insert_with(|id| Transaction {
            id,
            user_id,
            total_price,
            status: TransactionStatus::Pending,
            payment_link: None,
            created_at: now,
            updated_at: now,
            orders: Vec::new(),
        }))
    }

    async fn find_transaction(&mut self, id: i64) -> Result<Transaction, RepositoryError> {
        self.work.transactions.get(id).cloned()
    }

    async fn lock_transaction(&mut self, id: i64) -> Result<Transaction, RepositoryError> {
        self.work.transactions.get(id).cloned()
    }

    async fn list_transactions(
        &mut self,
        page: PageRequest,
    ) -> Result<(Vec<Transaction>, i64), RepositoryError> {
        let mut all: Vec<Transaction> = self.work.transactions.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        let total = all.len() as i64;
        let page = all
            .into_iter()
            .skip(usize::try_from(page.offset()).unwrap_or(0))
            .take(usize::try_from(page.limit).unwrap_or(0))
            .collect();
        Ok((page, total))
    }

    async fn list_user_transactions(
        &mut self,
        user_id: i64,
    ) -> Result<Vec<Transaction>, RepositoryError> {
        let mut owned: Vec<Transaction> = self
            .work
            .transactions
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(owned)
    }

    async fn update_transaction(
        &mut self,
        transaction: &Transaction,
    ) -> Result<(), RepositoryError> {
        let stored = self.work.transactions.get_mut(transaction.id)?;
        stored.total_price = transaction.total_price;
        stored.status = transaction.status;
        stored.payment_link = transaction.payment_link.clone();
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_transaction(&mut self, id: i64) -> Result<(), RepositoryError> {
        self.work.transactions.get(id)?;
        self.work.transactions.rows.remove(&id);
        let orders: Vec<i64> = self
            .work
            .orders
            .values()
            .filter(|o| o.transaction_id == id)
            .map(|o| o.id)
            .collect();
        self.work.orders.rows.retain(|_, o| o.transaction_id != id);
        self.work.reviews.rows.retain(|_, r| !orders.contains(&r.order_id));
        Ok(())
    }

    async fn insert_order(&mut self, order: &NewOrder) -> Result<Order, RepositoryError> {
        let budget = self.faults.order_inserts.load(Ordering::SeqCst);
        if budget == 0 {
            return Err(RepositoryError::Storage("injected order insert failure".into()));
        }
        if budget > 0 {
            self.faults.order_inserts.fetch_sub(1, Ordering::SeqCst);
        }
        if !self.work.transactions.contains(order.transaction_id) {
            return Err(dangling("orders_transaction_id_fkey"));
        }
        if !self.work.users.contains(order.user_id) {
            return Err(dangling("orders_user_id_fkey"));
        }
        if !self.work.bikes.contains(order.bike_id) {
            return Err(dangling("orders_bike_id_fkey"));
        }
        let now = Utc::now();
        Ok(self.work.orders.insert_with(|id| Order {
            id,
            transaction_id: order.transaction_id,
            user_id: order.user_id,
            bike_id: order.bike_id,
            quantity: order.quantity,
            total_price: order.total_price,
            reviewed: false,
            created_at: now,
            updated_at: now,
        }))
    }

    async fn find_order(&mut self, id: i64) -> Result<Order, RepositoryError> {
        self.work.orders.get(id).cloned()
    }

    async fn list_orders(&mut self, transaction_id: i64) -> Result<Vec<Order>, RepositoryError> {
        Ok(self
            .work
            .orders
            .values()
            .filter(|o| o.transaction_id == transaction_id)
            .cloned()
            .collect())
    }

    async fn list_orders_for(
        &mut self,
        transaction_ids: &[i64],
    ) -> Result<Vec<Order>, RepositoryError> {
        Ok(self
            .work
            .orders
            .values()
            .filter(|o| transaction_ids.contains(&o.transaction_id))
            .cloned()
            .collect())
    }

    async fn update_order(&mut self, order: &Order) -> Result<(), RepositoryError> {
        if !self.work.bikes.contains(order.bike_id) {
            return Err(dangling("orders_bike_id_fkey"));
        }
        let stored = self.work.orders.get_mut(order.id)?;
        stored.bike_id = order.bike_id;
        stored.quantity = order.quantity;
        stored.total_price = order.total_price;
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn set_order_reviewed(&mut self, id: i64, reviewed: bool) -> Result<(), RepositoryError> {
        let order = self.work.orders.get_mut(id)?;
        order.reviewed = reviewed;
        order.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl ReviewsRepository for MemoryTx {
    async fn insert_review(&mut self, review: &NewReview) -> Result<Review, RepositoryError> {
        if !self.work.orders.contains(review.order_id) {
            return Err(dangling("reviews_order_id_fkey"));
        }
        if !self.work.bikes.contains(review.bike_id) {
            return Err(dangling("reviews_bike_id_fkey"));
        }
        if !self.work.users.contains(review.user_id) {
            return Err(dangling("reviews_user_id_fkey"));
        }
        if self.work.reviews.values().any(|r| r.order_id == review.order_id) {
            return Err(conflict("reviews_order_id_key"));
        }
        let now = Utc::now();
        Ok(self.work.reviews.insert_with(|id| Review {
            id,
            order_id: review.order_id,
            bike_id: review.bike_id,
            user_id: review.user_id,
            comment: review.comment.clone(),
            rating: review.rating,
            created_at: now,
            updated_at: now,
        }))
    }

    async fn find_review(&mut self, id: i64) -> Result<Review, RepositoryError> {
        self.work.reviews.get(id).cloned()
    }

    async fn list_reviews(&mut self, bike_id: Option<i64>) -> Result<Vec<Review>, RepositoryError> {
        Ok(self
            .work
            .reviews
            .values()
            .filter(|r| bike_id.is_none_or(|id| r.bike_id == id))
            .cloned()
            .collect())
    }

    async fn update_review(
        &mut self,
        id: i64,
        comment: &str,
        rating: i16,
    ) -> Result<Review, RepositoryError> {
        let review = self.work.reviews.get_mut(id)?;
        review.comment = comment.to_owned();
        review.rating = rating;
        review.updated_at = Utc::now();
        Ok(review.clone())
    }

    async fn delete_review(&mut self, id: i64) -> Result<(), RepositoryError> {
        self.work.reviews.get(id)?;
        self.work.reviews.rows.remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(name: &str) -> NewUser {
        NewUser {
            role_id: 2,
            username: name.into(),
            email: format!("{name}@mail.test"),
            password_hash: "hash".into(),
        }
    }

    fn new_bike(category_id: i64, name: &str, stock: i32) -> NewBike {
        NewBike {
            category_id,
            name: name.into(),
            brand: "Polygon".into(),
            description: String::new(),
            year: 2023,
            price: 1_000,
            image_url: "https://img.test/bike.png".into(),
            stock,
            is_available: true,
        }
    }

    #[tokio::test]
    async fn uncommitted_work_is_discarded() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_category("Gravel").await.unwrap();
        drop(tx);

        let mut tx = store.begin().await.unwrap();
        assert!(tx.list_categories().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn committed_work_is_visible() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let category = tx.insert_category("Gravel").await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.find_category(category.id).await.unwrap().name, "Gravel");
    }

    #[tokio::test]
    async fn unique_and_foreign_keys_are_enforced() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_user(&new_user("rider")).await.unwrap();
        let mut dup = new_user("other");
        dup.email = "rider@mail.test".into();
        assert!(matches!(
            tx.insert_user(&dup).await,
            Err(RepositoryError::Conflict(c)) if c == "users_email_key"
        ));

        assert!(matches!(
            tx.insert_bike(&new_bike(42, "Ghost", 1)).await,
            Err(RepositoryError::InvalidReference(_))
        ));
        assert!(matches!(tx.find_user(99).await, Err(RepositoryError::NotFound)));
    }

    #[tokio::test]
    async fn bikes_with_order_lines_cannot_be_deleted() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let user = tx.insert_user(&new_user("rider")).await.unwrap();
        let category = tx.insert_category("Road").await.unwrap();
        let bike = tx.insert_bike(&new_bike(category.id, "Aero", 3)).await.unwrap();
        let header = tx.insert_transaction(user.id, 1_000).await.unwrap();
        tx.insert_order(&NewOrder {
            transaction_id: header.id,
            user_id: user.id,
            bike_id: bike.id,
            quantity: 1,
            total_price: 1_000,
        })
        .await
        .unwrap();

        assert!(matches!(tx.delete_bike(bike.id).await, Err(RepositoryError::InvalidReference(_))));
        tx.delete_transaction(header.id).await.unwrap();
        assert!(tx.list_orders(header.id).await.unwrap().is_empty());
        tx.delete_bike(bike.id).await.unwrap();
    }

    #[tokio::test]
    async fn order_insert_fault_fires_after_budget() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let user = tx.insert_user(&new_user("rider")).await.unwrap();
        let category = tx.insert_category("Road").await.unwrap();
        let bike = tx.insert_bike(&new_bike(category.id, "Aero", 3)).await.unwrap();
        let header = tx.insert_transaction(user.id, 2_000).await.unwrap();
        let line = NewOrder {
            transaction_id: header.id,
            user_id: user.id,
            bike_id: bike.id,
            quantity: 1,
            total_price: 1_000,
        };

        store.fail_order_insert_after(1);
        assert!(tx.insert_order(&line).await.is_ok());
        assert!(matches!(tx.insert_order(&line).await, Err(RepositoryError::Storage(_))));
        store.clear_faults();
        assert!(tx.insert_order(&line).await.is_ok());
    }

    #[tokio::test]
    async fn listing_filters_and_paginates() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let category = tx.insert_category("MTB").await.unwrap();
        for (i, stock) in [2, 0, 5, 1].into_iter().enumerate() {
            tx.insert_bike(&new_bike(category.id, &format!("Trail {i}"), stock)).await.unwrap();
        }

        let page = PageRequest { limit: 2, page: 2 };
        let (bikes, total) = tx.list_bikes(&BikeFilter::default(), page).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(bikes.len(), 1);
        assert_eq!(bikes[0].name, "Trail 3");
    }

    #[tokio::test]
    async fn rating_averages_reviews() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let user = tx.insert_user(&new_user("rider")).await.unwrap();
        let category = tx.insert_category("Road").await.unwrap();
        let bike = tx.insert_bike(&new_bike(category.id, "Aero", 3)).await.unwrap();
        let header = tx.insert_transaction(user.id, 2_000).await.unwrap();
        for rating in [4, 5] {
            let order = tx
                .insert_order(&NewOrder {
                    transaction_id: header.id,
                    user_id: user.id,
                    bike_id: bike.id,
                    quantity: 1,
                    total_price: 1_000,
                })
                .await
                .unwrap();
            tx.insert_review(&NewReview {
                order_id: order.id,
                bike_id: bike.id,
                user_id: user.id,
                comment: "smooth".into(),
                rating,
            })
            .await
            .unwrap();
        }

        assert_eq!(tx.find_bike(bike.id).await.unwrap().rating, 4.5);
    }
}
