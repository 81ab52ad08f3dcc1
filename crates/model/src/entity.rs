use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};

/// Authorization role of a user.
///
/// Users store a numeric role id; [`RoleMap`] translates between the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::User => "USER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mapping between stored role ids and [`Role`] variants, resolved from configuration at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleMap {
    pub admin_id: i32,
    pub user_id: i32,
}

impl RoleMap {
    pub fn new(admin_id: i32, user_id: i32) -> Self {
        Self { admin_id, user_id }
    }

    /// Returns the role for a stored id, `None` for ids the deployment does not know.
    pub fn role_of(&self, role_id: i32) -> Option<Role> {
        if role_id == self.admin_id {
            Some(Role::Admin)
        } else if role_id == self.user_id {
            Some(Role::User)
        } else {
            None
        }
    }

    pub fn id_of(&self, role: Role) -> i32 {
        match role {
            Role::Admin => self.admin_id,
            Role::User => self.user_id,
        }
    }
}

/// Payment lifecycle of a [`Transaction`]. `Paid` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSql, FromSql)]
#[serde(rename_all = "lowercase")]
#[postgres(name = "transaction_status")]
pub enum TransactionStatus {
    #[postgres(name = "pending")]
    Pending,
    #[postgres(name = "paid")]
    Paid,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Paid => "paid",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "paid" => Ok(TransactionStatus::Paid),
            other => Err(format!("unknown transaction status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSql, FromSql)]
#[serde(rename_all = "UPPERCASE")]
#[postgres(name = "gender")]
pub enum Gender {
    #[postgres(name = "MALE")]
    Male,
    #[postgres(name = "FEMALE")]
    Female,
}

/// User account. The password hash never leaves the process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub role_id: i32,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    pub id: i64,
    pub user_id: i64,
    pub name: Option<String>,
    pub bio: Option<String>,
    pub age: Option<i16>,
    pub gender: Option<Gender>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Catalog entry. `rating` is the average review rating, 0 when unreviewed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bike {
    pub id: i64,
    pub category_id: i64,
    pub name: String,
    pub brand: String,
    pub description: String,
    pub year: i32,
    pub price: i64,
    pub image_url: String,
    pub stock: i32,
    pub is_available: bool,
    pub rating: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Cart {
    pub id: i64,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One (cart, bike) line. The pair is unique.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CartItem {
    pub id: i64,
    pub cart_id: i64,
    pub bike_id: i64,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Checkout aggregate: a header plus its ordered lines.
///
/// `total_price` equals the sum of the lines' `total_price`. Header-only loads
/// leave `orders` empty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    pub total_price: i64,
    pub status: TransactionStatus,
    pub payment_link: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub orders: Vec<Order>,
}

impl Transaction {
    /// Lines may only be edited, and payment confirmed, while pending.
    pub fn is_pending(&self) -> bool {
        self.status == TransactionStatus::Pending
    }
}

/// Line item of a [`Transaction`]. `total_price` is frozen at creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Order {
    pub id: i64,
    pub transaction_id: i64,
    pub user_id: i64,
    pub bike_id: i64,
    pub quantity: i32,
    pub total_price: i64,
    pub reviewed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Review of one purchased order line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Review {
    pub id: i64,
    pub order_id: i64,
    pub bike_id: i64,
    pub user_id: i64,
    pub comment: String,
    pub rating: i16,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
