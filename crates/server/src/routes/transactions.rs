//! Checkout endpoints.
//!
//! `POST /api/transactions/{id}` takes the buyer's user id; every other
//! `{id}` here is a transaction id.

use axum::extract::State;
use axum::routing::{get, patch};
use axum::Router;
use model::{CheckoutLine, LineUpdate, PageRequest, Transaction};
use serde::Serialize;
use service::CheckoutService;
use tracing::warn;

use crate::error::ApiError;
use crate::extract::{AdminUser, ApiJson, ApiPath, ApiQuery, AuthUser};
use crate::response::WebSuccess;
use crate::AppState;

#[derive(Debug, Serialize)]
struct Created {
    transaction_id: i64,
}

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/transactions", get(list))
        .route(
            "/api/transactions/{id}",
            get(show).post(create).patch(update).delete(remove),
        )
        .route("/api/transactions/payment/{id}", patch(pay))
}

async fn create(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    ApiPath(user_id): ApiPath<i64>,
    ApiJson(lines): ApiJson<Vec<CheckoutLine>>,
) -> Result<WebSuccess<Created>, ApiError> {
    if caller.user_id != user_id {
        warn!(caller = caller.user_id, user_id, "Checkout attempted for another user");
        return Err(ApiError::forbidden("cannot check out for another user"));
    }
    let transaction_id = state.services.checkout.create_transaction(user_id, &lines).await?;
    Ok(WebSuccess::ok(Created { transaction_id }))
}

async fn show(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<WebSuccess<Transaction>, ApiError> {
    Ok(WebSuccess::ok(state.services.checkout.get_transaction(caller, id).await?))
}

async fn update(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(lines): ApiJson<Vec<LineUpdate>>,
) -> Result<WebSuccess<Transaction>, ApiError> {
    let transaction = state
        .services
        .checkout
        .update_transaction(caller.user_id, id, &lines)
        .await?;
    Ok(WebSuccess::ok(transaction))
}

async fn pay(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<WebSuccess<Transaction>, ApiError> {
    Ok(WebSuccess::ok(state.services.checkout.pay_transaction(caller.user_id, id).await?))
}

async fn remove(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<WebSuccess<()>, ApiError> {
    state.services.checkout.delete_transaction(caller.user_id, id).await?;
    Ok(WebSuccess::ok(()))
}

async fn list(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    ApiQuery(page): ApiQuery<PageRequest>,
) -> Result<WebSuccess<Vec<Transaction>>, ApiError> {
    let (transactions, metadata) = state.services.checkout.list_transactions(page).await?;
    Ok(WebSuccess::paged(transactions, metadata))
}
