//! HTTP layer of the bike marketplace backend.
//!
//! Exposes the JSON API under `/api`, plus `/health` and `/metrics`. Every
//! response uses the `{code, message, payload, metadata?}` success envelope
//! or the `{code, errors}` error envelope.

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use auth::TokenService;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use service::{AccountService, CartService, CatalogService, CheckoutService, ReviewService};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::Notify;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

mod error;
mod extract;
mod metrics;
mod response;
mod routes;

pub use error::ApiError;
pub use metrics::Metrics;
pub use response::WebSuccess;

/// Business services the handlers call into.
pub struct Services {
    pub accounts: AccountService,
    pub catalog: CatalogService,
    pub carts: CartService,
    pub reviews: ReviewService,
    pub checkout: Arc<dyn CheckoutService>,
    pub tokens: TokenService,
}

/// Application state shared between request handlers.
#[derive(Clone)]
pub(crate) struct AppState {
    services: Arc<Services>,
    metrics: Arc<Metrics>,
}

/// Builds the full router: API routes, health, metrics and middleware.
pub fn router(services: Services) -> Result<Router> {
    let metrics = Arc::new(Metrics::new().context("Failed to register metrics")?);
    let state = AppState {
        services: Arc::new(services),
        metrics: metrics.clone(),
    };
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Ok(Router::new()
        .merge(routes::api())
        .route("/health", get(health))
        .route("/metrics", get(render_metrics))
        .fallback(not_found)
        .layer(axum::middleware::from_fn_with_state(metrics, metrics::track))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state))
}

async fn health() -> &'static str {
    "OK"
}

async fn render_metrics(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(text) => ([(CONTENT_TYPE, "text/plain; version=0.0.4")], text).into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response()
        }
    }
}

async fn not_found() -> ApiError {
    ApiError::not_found("route not found")
}

/// HTTP server bound to one port.
pub struct Server {
    port: u16,
    router: Router,
}

impl Server {
    pub fn new(port: u16, services: Services) -> Result<Self> {
        info!("Initializing HTTP server on port {}", port);
        Ok(Self {
            port,
            router: router(services)?,
        })
    }

    /// Serves until SIGINT/SIGTERM, then drains in-flight requests for at
    /// most `grace` before returning.
    pub async fn start(self, grace: Duration) -> Result<()> {
        let listener = TcpListener::bind(("0.0.0.0", self.port))
            .await
            .context("Failed to bind to port")?;
        info!("HTTP server listening on port {}", self.port);

        let signalled = Arc::new(Notify::new());
        let notify = signalled.clone();
        let server = axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown_signal().await;
                notify.notify_one();
            })
            .into_future();
        let mut server = std::pin::pin!(server);

        tokio::select! {
            res = &mut server => res.context("Server error")?,
            _ = signalled.notified() => {
                match tokio::time::timeout(grace, &mut server).await {
                    Ok(res) => res.context("Server error")?,
                    Err(_) => {
                        warn!(?grace, "Graceful shutdown timed out, dropping open connections")
                    }
                }
            }
        }

        info!("HTTP server shut down");
        Ok(())
    }
}

/// Waits for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
