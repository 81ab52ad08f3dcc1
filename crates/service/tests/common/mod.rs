#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use model::{Bike, CheckoutLine, NewBike, NewUser, PageRequest, Profile, RoleMap, Transaction, User};
use payment::{PaymentError, PaymentGateway, PaymentRequest};
use repository::prelude::*;
use repository::MemoryStore;
use service::CheckoutServiceImpl;

pub const ROLES: RoleMap = RoleMap { admin_id: 1, user_id: 2 };

/// Gateway double that records requests and can be told to fail.
#[derive(Default)]
pub struct StubGateway {
    fail: AtomicBool,
    requests: Mutex<Vec<PaymentRequest>>,
}

impl StubGateway {
    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<PaymentRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn create_payment_link(&self, request: &PaymentRequest) -> Result<String, PaymentError> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(PaymentError::Rejected { status: 503, body: "maintenance".into() });
        }
        Ok(format!("https://pay.test/{}", request.order_id))
    }
}

pub struct Fixture {
    pub store: MemoryStore,
    pub gateway: Arc<StubGateway>,
    pub category_id: i64,
}

impl Fixture {
    pub async fn new() -> Self {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let category = tx.insert_category("Road").await.unwrap();
        tx.commit().await.unwrap();
        Self {
            store,
            gateway: Arc::new(StubGateway::default()),
            category_id: category.id,
        }
    }

    pub fn store(&self) -> Arc<dyn Store> {
        Arc::new(self.store.clone())
    }

    pub fn checkout(&self) -> CheckoutServiceImpl {
        CheckoutServiceImpl::new(self.store(), self.gateway.clone())
    }

    /// Inserts a user with an empty profile and cart.
    pub async fn user(&self, username: &str) -> User {
        let mut tx = self.store.begin().await.unwrap();
        let user = tx
            .insert_user(&NewUser {
                role_id: ROLES.user_id,
                username: username.into(),
                email: format!("{username}@mail.test"),
                password_hash: "unused".into(),
            })
            .await
            .unwrap();
        tx.insert_profile(user.id).await.unwrap();
        tx.insert_cart(user.id).await.unwrap();
        tx.commit().await.unwrap();
        user
    }

    pub async fn bike(&self, name: &str, price: i64, stock: i32) -> Bike {
        let mut tx = self.store.begin().await.unwrap();
        let bike = tx
            .insert_bike(&NewBike {
                category_id: self.category_id,
                name: name.into(),
                brand: "Polygon".into(),
                description: String::new(),
                year: 2024,
                price,
                image_url: format!("https://img.test/{name}.png"),
                stock,
                is_available: true,
            })
            .await
            .unwrap();
        tx.commit().await.unwrap();
        bike
    }

    pub async fn set_stock(&self, bike_id: i64, stock: i32) {
        let mut tx = self.store.begin().await.unwrap();
        tx.set_bike_stock(bike_id, stock).await.unwrap();
        tx.commit().await.unwrap();
    }

    pub async fn stock_of(&self, bike_id: i64) -> i32 {
        let mut tx = self.store.begin().await.unwrap();
        tx.find_bike(bike_id).await.unwrap().stock
    }

    pub async fn set_profile_name(&self, user_id: i64, name: &str) {
        let mut tx = self.store.begin().await.unwrap();
        let profile = tx.find_profile(user_id).await.unwrap();
        tx.update_profile(&Profile { name: Some(name.into()), ..profile }).await.unwrap();
        tx.commit().await.unwrap();
    }

    pub async fn add_to_cart(&self, user_id: i64, bike_id: i64, quantity: i32) {
        let mut tx = self.store.begin().await.unwrap();
        let cart = tx.find_cart_by_user(user_id).await.unwrap();
        tx.insert_cart_item(cart.id, bike_id, quantity).await.unwrap();
        tx.commit().await.unwrap();
    }

    pub async fn cart_bikes(&self, user_id: i64) -> Vec<i64> {
        let mut tx = self.store.begin().await.unwrap();
        let cart = tx.find_cart_by_user(user_id).await.unwrap();
        tx.list_cart_items(cart.id).await.unwrap().into_iter().map(|i| i.bike_id).collect()
    }

    pub async fn transactions(&self) -> Vec<Transaction> {
        let mut tx = self.store.begin().await.unwrap();
        tx.list_transactions(PageRequest { limit: 100, page: 1 }).await.unwrap().0
    }

    /// Order lines across the first hundred transaction ids, committed or not.
    pub async fn order_count(&self) -> usize {
        let ids: Vec<i64> = (1..=100).collect();
        let mut tx = self.store.begin().await.unwrap();
        tx.list_orders_for(&ids).await.unwrap().len()
    }
}

pub fn line(bike: &Bike, quantity: i32) -> CheckoutLine {
    CheckoutLine {
        bike_id: bike.id,
        quantity,
        total_price: bike.price * i64::from(quantity),
    }
}
