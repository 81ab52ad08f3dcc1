use axum::extract::State;
use axum::routing::get;
use axum::Router;
use model::Review;
use serde::Deserialize;

use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath, ApiQuery, AuthUser};
use crate::response::WebSuccess;
use crate::AppState;

#[derive(Deserialize)]
struct ListQuery {
    bike_id: Option<i64>,
}

#[derive(Deserialize)]
struct CreateRequest {
    order_id: i64,
    comment: String,
    rating: i16,
}

#[derive(Deserialize)]
struct UpdateRequest {
    comment: String,
    rating: i16,
}

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/reviews", get(list).post(create))
        .route("/api/reviews/{id}", get(show).patch(update).delete(remove))
}

async fn list(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<WebSuccess<Vec<Review>>, ApiError> {
    Ok(WebSuccess::ok(state.services.reviews.list_reviews(query.bike_id).await?))
}

async fn show(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<WebSuccess<Review>, ApiError> {
    Ok(WebSuccess::ok(state.services.reviews.get_review(id).await?))
}

async fn create(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    ApiJson(body): ApiJson<CreateRequest>,
) -> Result<WebSuccess<Review>, ApiError> {
    let review = state
        .services
        .reviews
        .create_review(caller.user_id, body.order_id, &body.comment, body.rating)
        .await?;
    Ok(WebSuccess::created(review))
}

async fn update(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<UpdateRequest>,
) -> Result<WebSuccess<Review>, ApiError> {
    let review = state
        .services
        .reviews
        .update_review(caller.user_id, id, &body.comment, body.rating)
        .await?;
    Ok(WebSuccess::ok(review))
}

async fn remove(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<WebSuccess<()>, ApiError> {
    state.services.reviews.delete_review(caller, id).await?;
    Ok(WebSuccess::ok(()))
}
