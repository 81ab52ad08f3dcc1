use axum::extract::State;
use axum::routing::{delete, get, post};
use axum::Router;
use model::{CartItem, CartView};
use serde::Deserialize;

use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath, AuthUser};
use crate::response::WebSuccess;
use crate::AppState;

#[derive(Deserialize)]
struct ItemRequest {
    bike_id: i64,
    quantity: i32,
}

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/carts/current", get(current))
        .route("/api/carts/items", post(add).patch(update))
        .route("/api/carts/items/{bike_id}", delete(remove))
}

async fn current(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> Result<WebSuccess<CartView>, ApiError> {
    Ok(WebSuccess::ok(state.services.carts.get_cart(caller.user_id).await?))
}

async fn add(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    ApiJson(body): ApiJson<ItemRequest>,
) -> Result<WebSuccess<CartItem>, ApiError> {
    let item = state
        .services
        .carts
        .add_item(caller.user_id, body.bike_id, body.quantity)
        .await?;
    Ok(WebSuccess::ok(item))
}

async fn update(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    ApiJson(body): ApiJson<ItemRequest>,
) -> Result<WebSuccess<CartItem>, ApiError> {
    let item = state
        .services
        .carts
        .update_item(caller.user_id, body.bike_id, body.quantity)
        .await?;
    Ok(WebSuccess::ok(item))
}

async fn remove(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    ApiPath(bike_id): ApiPath<i64>,
) -> Result<WebSuccess<()>, ApiError> {
    state.services.carts.remove_item(caller.user_id, bike_id).await?;
    Ok(WebSuccess::ok(()))
}
