//! Business logic layer of the bike marketplace.
//!
//! Every operation runs as one unit of work on a [`repository::Store`]:
//! writes become visible together on commit, and an error anywhere drops the
//! unit, which discards everything it wrote.
//!
//! The checkout workflow lives in [`checkout`]: the order builder, the
//! transaction state machine and, through [`reconcile`], stock bookkeeping on
//! payment confirmation.

use model::Role;
use payment::PaymentError;
use repository::RepositoryError;
use thiserror::Error;

pub mod account;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod pricing;
pub mod reconcile;
pub mod review;

pub use account::{AccountService, LoginOutput, Registered, RoleChange, UserSummary};
pub use cart::CartService;
pub use catalog::CatalogService;
pub use checkout::{CheckoutService, CheckoutServiceImpl, UserTransactions};
pub use review::ReviewService;

/// The error type shared by all services.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The request is malformed or violates a business rule.
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    /// A uniqueness rule or a live reference blocks the write.
    #[error("{0}")]
    Conflict(String),
    /// The entity is not in a state that allows the operation.
    #[error("{0}")]
    InvalidState(String),
    #[error("insufficient stock for bike {bike_id}: {available} available, {requested} requested")]
    InsufficientStock { bike_id: i64, available: i32, requested: i32 },
    /// The payment gateway failed.
    #[error("payment gateway failure: {0}")]
    Upstream(#[from] PaymentError),
    #[error("repository failure: {0}")]
    Repository(RepositoryError),
    /// Any other failure inside the service.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<RepositoryError> for ServiceError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => ServiceError::NotFound("resource not found".into()),
            RepositoryError::Conflict(constraint) => {
                ServiceError::Conflict(describe_conflict(&constraint))
            }
            RepositoryError::InvalidReference(constraint) => ServiceError::Conflict(format!(
                "operation blocked by related records ({constraint})"
            )),
            other => ServiceError::Repository(other),
        }
    }
}

fn describe_conflict(constraint: &str) -> String {
    match constraint {
        "users_username_key" => "username already taken".into(),
        "users_email_key" => "email already registered".into(),
        "categories_name_key" => "category name already exists".into(),
        "bikes_name_key" => "bike name already exists".into(),
        "reviews_order_id_key" => "order line already reviewed".into(),
        other => format!("duplicate value violates {other}"),
    }
}

/// Maps a repository `NotFound` onto a message naming the missing entity.
pub(crate) fn missing(what: &'static str) -> impl FnOnce(RepositoryError) -> ServiceError {
    move |err| match err {
        RepositoryError::NotFound => ServiceError::NotFound(format!("{what} not found")),
        other => other.into(),
    }
}

/// The authenticated principal on whose behalf an operation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: i64,
    pub role: Role,
}

impl Caller {
    pub fn new(user_id: i64, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Whether the caller may act on a resource owned by `owner_id`.
    pub fn can_access(&self, owner_id: i64) -> bool {
        self.is_admin() || self.user_id == owner_id
    }
}
