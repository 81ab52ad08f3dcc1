use axum::extract::State;
use axum::routing::get;
use axum::Router;
use model::{Bike, BikeFilter, BikeUpdate, NewBike, PageRequest, DEFAULT_LIMIT};
use serde::Deserialize;

use crate::error::ApiError;
use crate::extract::{AdminUser, ApiJson, ApiPath, ApiQuery};
use crate::response::WebSuccess;
use crate::AppState;

/// Listing query: filters plus pagination, all optional.
#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    category_id: Option<i64>,
    name: Option<String>,
    min_price: Option<i64>,
    max_price: Option<i64>,
    min_year: Option<i32>,
    max_year: Option<i32>,
    limit: Option<i64>,
    page: Option<i64>,
}

impl ListQuery {
    fn split(self) -> (BikeFilter, PageRequest) {
        let filter = BikeFilter {
            category_id: self.category_id,
            name: self.name.filter(|name| !name.trim().is_empty()),
            min_price: self.min_price,
            max_price: self.max_price,
            min_year: self.min_year,
            max_year: self.max_year,
        };
        let page = PageRequest {
            limit: self.limit.unwrap_or(DEFAULT_LIMIT),
            page: self.page.unwrap_or(1),
        };
        (filter, page)
    }
}

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/bikes", get(list).post(create))
        .route("/api/bikes/{id}", get(show).patch(update).delete(remove))
}

async fn list(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<WebSuccess<Vec<Bike>>, ApiError> {
    let (filter, page) = query.split();
    let (bikes, metadata) = state.services.catalog.list_bikes(&filter, page).await?;
    Ok(WebSuccess::paged(bikes, metadata))
}

async fn show(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<WebSuccess<Bike>, ApiError> {
    Ok(WebSuccess::ok(state.services.catalog.get_bike(id).await?))
}

async fn create(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    ApiJson(body): ApiJson<NewBike>,
) -> Result<WebSuccess<Bike>, ApiError> {
    Ok(WebSuccess::created(state.services.catalog.create_bike(&body).await?))
}

async fn update(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<BikeUpdate>,
) -> Result<WebSuccess<Bike>, ApiError> {
    Ok(WebSuccess::ok(state.services.catalog.update_bike(id, &body).await?))
}

async fn remove(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<WebSuccess<()>, ApiError> {
    state.services.catalog.delete_bike(id).await?;
    Ok(WebSuccess::ok(()))
}
