use axum::extract::State;
use axum::routing::{get, patch};
use axum::Router;
use model::{Profile, ProfileUpdate, Role};
use serde::Deserialize;
use service::{CheckoutService, RoleChange, UserSummary, UserTransactions};

use crate::error::ApiError;
use crate::extract::{AdminUser, ApiJson, ApiPath, AuthUser};
use crate::response::WebSuccess;
use crate::AppState;

#[derive(Deserialize)]
struct RoleRequest {
    user_id: i64,
    role: Role,
}

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/users/current", get(current))
        .route("/api/users/profile", get(profile).patch(update_profile))
        .route("/api/users/role", patch(update_role))
        .route("/api/users/{id}/transactions", get(transactions))
}

async fn current(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> Result<WebSuccess<UserSummary>, ApiError> {
    Ok(WebSuccess::ok(state.services.accounts.current_user(caller.user_id).await?))
}

async fn profile(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> Result<WebSuccess<Profile>, ApiError> {
    Ok(WebSuccess::ok(state.services.accounts.get_profile(caller.user_id).await?))
}

async fn update_profile(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    ApiJson(body): ApiJson<ProfileUpdate>,
) -> Result<WebSuccess<Profile>, ApiError> {
    let profile = state.services.accounts.update_profile(caller.user_id, &body).await?;
    Ok(WebSuccess::ok(profile))
}

async fn update_role(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    ApiJson(body): ApiJson<RoleRequest>,
) -> Result<WebSuccess<RoleChange>, ApiError> {
    let change = state.services.accounts.update_role(body.user_id, body.role).await?;
    Ok(WebSuccess::ok(change))
}

async fn transactions(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    ApiPath(user_id): ApiPath<i64>,
) -> Result<WebSuccess<UserTransactions>, ApiError> {
    let listing = state.services.checkout.user_transactions(caller, user_id).await?;
    Ok(WebSuccess::ok(listing))
}
