use serde::{Deserialize, Serialize};

use crate::entity::{Bike, Cart, CartItem, Gender};

/// One requested checkout line as sent by the client.
///
/// `total_price` is what the client believes the line costs; the server
/// reprices it from the catalog and rejects a mismatch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckoutLine {
    pub bike_id: i64,
    pub quantity: i32,
    pub total_price: i64,
}

/// Replacement values for an existing order line of a pending transaction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LineUpdate {
    pub id: i64,
    pub bike_id: i64,
    pub quantity: i32,
    pub total_price: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub role_id: i32,
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub age: Option<i16>,
    #[serde(default)]
    pub gender: Option<Gender>,
}

fn default_available() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewBike {
    pub category_id: i64,
    pub name: String,
    pub brand: String,
    #[serde(default)]
    pub description: String,
    pub year: i32,
    pub price: i64,
    pub image_url: String,
    pub stock: i32,
    #[serde(default = "default_available")]
    pub is_available: bool,
}

/// Partial bike edit; `None` keeps the current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BikeUpdate {
    pub category_id: Option<i64>,
    pub name: Option<String>,
    pub brand: Option<String>,
    pub description: Option<String>,
    pub year: Option<i32>,
    pub price: Option<i64>,
    pub image_url: Option<String>,
    pub stock: Option<i32>,
    pub is_available: Option<bool>,
}

impl BikeUpdate {
    /// Applies the present fields onto `bike`.
    pub fn apply(&self, bike: &mut Bike) {
        if let Some(category_id) = self.category_id {
            bike.category_id = category_id;
        }
        if let Some(name) = &self.name {
            bike.name = name.clone();
        }
        if let Some(brand) = &self.brand {
            bike.brand = brand.clone();
        }
        if let Some(description) = &self.description {
            bike.description = description.clone();
        }
        if let Some(year) = self.year {
            bike.year = year;
        }
        if let Some(price) = self.price {
            bike.price = price;
        }
        if let Some(image_url) = &self.image_url {
            bike.image_url = image_url.clone();
        }
        if let Some(stock) = self.stock {
            bike.stock = stock;
        }
        if let Some(is_available) = self.is_available {
            bike.is_available = is_available;
        }
    }
}

/// Catalog listing filters. Listings only ever show bikes in stock.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BikeFilter {
    pub category_id: Option<i64>,
    pub name: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub min_year: Option<i32>,
    pub max_year: Option<i32>,
}

impl BikeFilter {
    pub fn matches(&self, bike: &Bike) -> bool {
        if bike.stock <= 0 {
            return false;
        }
        if self.category_id.is_some_and(|id| id != bike.category_id) {
            return false;
        }
        if let Some(name) = &self.name {
            if !bike.name.to_lowercase().contains(&name.to_lowercase()) {
                return false;
            }
        }
        if self.min_price.is_some_and(|p| bike.price < p)
            || self.max_price.is_some_and(|p| bike.price > p)
        {
            return false;
        }
        if self.min_year.is_some_and(|y| bike.year < y)
            || self.max_year.is_some_and(|y| bike.year > y)
        {
            return false;
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewOrder {
    pub transaction_id: i64,
    pub user_id: i64,
    pub bike_id: i64,
    pub quantity: i32,
    pub total_price: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReview {
    pub order_id: i64,
    pub bike_id: i64,
    pub user_id: i64,
    pub comment: String,
    pub rating: i16,
}

/// Snapshot of a user's cart priced at current catalog prices.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CartView {
    pub cart: Cart,
    pub lines: Vec<CartLineView>,
    pub total_price: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CartLineView {
    pub item: CartItem,
    pub bike: Bike,
    pub line_total: i64,
}
