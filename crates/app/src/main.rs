//! Bike marketplace backend.
//!
//! Loads configuration, opens the selected store (PostgreSQL with migrations
//! applied, or the in-memory store), wires the services and serves the HTTP
//! API until SIGINT/SIGTERM.

use std::sync::Arc;

use anyhow::{Context, Result};
use app_config::{AppConfig, StoreBackend};
use auth::TokenService;
use clap::{Parser, ValueEnum};
use model::RoleMap;
use payment::MidtransGateway;
use repository::{MemoryStore, PgStore, Store};
use server::{Server, Services};
use service::{AccountService, CartService, CatalogService, CheckoutServiceImpl, ReviewService};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Backend {
    Postgres,
    Memory,
}

impl From<Backend> for StoreBackend {
    fn from(backend: Backend) -> Self {
        match backend {
            Backend::Postgres => StoreBackend::Postgres,
            Backend::Memory => StoreBackend::Memory,
        }
    }
}

/// Command line overrides for the environment configuration.
#[derive(Debug, Parser)]
#[command(name = "bike-marketplace", about = "Bike marketplace REST backend")]
struct Args {
    /// Directory holding the SQL migrations.
    #[arg(long)]
    migrations_dir: Option<String>,
    /// HTTP port to listen on.
    #[arg(long)]
    port: Option<u16>,
    /// Storage backend.
    #[arg(long, value_enum)]
    store_backend: Option<Backend>,
}

impl Args {
    fn apply(self, config: &mut AppConfig) {
        if let Some(dir) = self.migrations_dir {
            config.migrations_dir = dir;
        }
        if let Some(port) = self.port {
            config.http_port = port;
        }
        if let Some(backend) = self.store_backend {
            config.store_backend = backend.into();
        }
    }
}

fn init_logger(default_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .context("Invalid log filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {e}"))
}

async fn open_store(config: &AppConfig) -> Result<Arc<dyn Store>> {
    match config.store_backend {
        StoreBackend::Postgres => {
            let pool = db::init_db_pool(config)
                .await
                .context("Failed to initialize database")?;
            info!("Database initialized successfully");
            Ok(Arc::new(PgStore::new(pool)))
        }
        StoreBackend::Memory => {
            warn!("Using the in-memory store; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = AppConfig::load().context("Failed to load configuration")?;
    args.apply(&mut config);
    init_logger(&config.log_level)?;

    info!(backend = ?config.store_backend, port = config.http_port, "Bike marketplace starting");
    if config.midtrans_server_key.is_empty() {
        warn!("MIDTRANS_SERVER_KEY is empty; payment link requests will be rejected");
    }

    let store = open_store(&config).await?;
    let gateway = MidtransGateway::new(
        &config.midtrans_base_url,
        &config.midtrans_server_key,
        config.payment_timeout,
    )
    .context("Failed to build payment gateway client")?;
    let tokens = TokenService::new(&config.api_secret, config.token_lifespan);
    let roles = RoleMap::new(config.admin_role_id, config.user_role_id);

    let services = Services {
        accounts: AccountService::new(store.clone(), tokens.clone(), roles),
        catalog: CatalogService::new(store.clone()),
        carts: CartService::new(store.clone()),
        reviews: ReviewService::new(store.clone()),
        checkout: Arc::new(CheckoutServiceImpl::new(store, Arc::new(gateway))),
        tokens,
    };

    Server::new(config.http_port, services)?
        .start(config.shutdown_timeout)
        .await?;

    info!("Application stopped");
    Ok(())
}
