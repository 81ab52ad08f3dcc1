use axum::Router;

use crate::AppState;

mod auth;
mod bikes;
mod carts;
mod categories;
mod reviews;
mod transactions;
mod users;

/// All `/api` routes.
pub(crate) fn api() -> Router<AppState> {
    Router::new()
        .merge(auth::routes())
        .merge(users::routes())
        .merge(categories::routes())
        .merge(bikes::routes())
        .merge(carts::routes())
        .merge(reviews::routes())
        .merge(transactions::routes())
}
