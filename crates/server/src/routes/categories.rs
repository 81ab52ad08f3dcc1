use axum::extract::State;
use axum::routing::get;
use axum::Router;
use model::Category;
use serde::Deserialize;

use crate::error::ApiError;
use crate::extract::{AdminUser, ApiJson, ApiPath};
use crate::response::WebSuccess;
use crate::AppState;

#[derive(Deserialize)]
struct CategoryRequest {
    name: String,
}

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/categories", get(list).post(create))
        .route("/api/categories/{id}", get(show).patch(rename).delete(remove))
}

async fn list(State(state): State<AppState>) -> Result<WebSuccess<Vec<Category>>, ApiError> {
    Ok(WebSuccess::ok(state.services.catalog.list_categories().await?))
}

async fn show(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<WebSuccess<Category>, ApiError> {
    Ok(WebSuccess::ok(state.services.catalog.get_category(id).await?))
}

async fn create(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    ApiJson(body): ApiJson<CategoryRequest>,
) -> Result<WebSuccess<Category>, ApiError> {
    Ok(WebSuccess::created(state.services.catalog.create_category(&body.name).await?))
}

async fn rename(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<CategoryRequest>,
) -> Result<WebSuccess<Category>, ApiError> {
    Ok(WebSuccess::ok(state.services.catalog.rename_category(id, &body.name).await?))
}

async fn remove(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<WebSuccess<()>, ApiError> {
    state.services.catalog.delete_category(id).await?;
    Ok(WebSuccess::ok(()))
}
