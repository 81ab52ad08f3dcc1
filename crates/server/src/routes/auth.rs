use axum::extract::State;
use axum::routing::post;
use axum::Router;
use serde::Deserialize;
use service::{LoginOutput, Registered};

use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::response::WebSuccess;
use crate::AppState;

#[derive(Deserialize)]
struct RegisterRequest {
    username: String,
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
}

async fn register(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> Result<WebSuccess<Registered>, ApiError> {
    let registered = state
        .services
        .accounts
        .register(&body.username, &body.email, &body.password)
        .await?;
    Ok(WebSuccess::created(registered))
}

async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<WebSuccess<LoginOutput>, ApiError> {
    let output = state.services.accounts.login(&body.email, &body.password).await?;
    Ok(WebSuccess::ok(output))
}
