use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

/// Storage backend the application runs against.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// PostgreSQL through the connection pool (production).
    Postgres,
    /// Process-local in-memory store, lost on restart (demos, local runs).
    Memory,
}

/// `AppConfig` holds all configuration parameters required by the application.
///
/// The configuration is loaded from environment variables (optionally via a `.env` file)
/// or uses default values if the variable is not set. Fields include database, HTTP server,
/// authentication and payment gateway settings. This struct is deserializable via Serde.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AppConfig {
    // --- Database settings ---
    /// Database hostname or service name (e.g. "postgres" in Docker Compose,
    /// "localhost" for local runs).
    pub db_host: String,
    /// Database port (default: 5432).
    pub db_port: u16,
    /// Database user.
    pub db_user: String,
    /// Database password.
    pub db_password: String,
    /// Database name.
    pub db_name: String,
    /// Maximum number of pooled connections.
    pub db_pool_size: usize,
    /// Directory holding the `.sql` migration files.
    pub migrations_dir: String,
    /// Which store implementation to wire in.
    pub store_backend: StoreBackend,

    // --- HTTP server ---
    /// The port on which the HTTP server will listen.
    pub http_port: u16,

    // --- Shutdown timeout ---
    /// Graceful shutdown timeout (human-friendly format, e.g. "5s", "1m").
    #[serde(deserialize_with = "deserialize_duration")]
    pub shutdown_timeout: Duration,

    // --- Logging ---
    /// Default tracing filter when `RUST_LOG` is not set.
    pub log_level: String,

    // --- Auth ---
    /// HMAC secret used to sign access tokens.
    pub api_secret: String,
    /// Lifetime of an issued access token (e.g. "1h").
    #[serde(deserialize_with = "deserialize_duration")]
    pub token_lifespan: Duration,
    /// Role id stored on administrator accounts.
    pub admin_role_id: i32,
    /// Role id stored on regular accounts.
    pub user_role_id: i32,

    // --- Payment gateway ---
    /// Midtrans server key (sent as the basic-auth user name).
    pub midtrans_server_key: String,
    /// Midtrans Snap base URL (sandbox by default).
    pub midtrans_base_url: String,
    /// Timeout for a single payment link request.
    #[serde(deserialize_with = "deserialize_duration")]
    pub payment_timeout: Duration,
}

/// Custom deserializer for human-readable durations like "5s", "1m", "1h".
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    let val = String::deserialize(deserializer)?;
    humantime::parse_duration(&val)
        .map_err(|e| D::Error::custom(format!("Invalid duration '{val}': {e}")))
}

impl AppConfig {
    /// Loads configuration from environment variables (and optionally from `.env` file).
    ///
    /// Fields not set via env will be filled with default values.
    ///
    /// # Errors
    /// Returns an error if environment variables are invalid or missing required values.
    pub fn load() -> Result<Self> {
        // Load from .env file (for Docker environment)
        dotenvy::dotenv().ok();

        Self::from_source(config::Environment::default().try_parsing(true))
    }

    /// Builds the configuration from defaults overlaid with the given source.
    pub fn from_source<S>(source: S) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let settings = config::Config::builder()
            // Database
            .set_default("db_host", "localhost")?
            .set_default("db_port", 5432)?
            .set_default("db_user", "bikes_user")?
            .set_default("db_password", "securepassword")?
            .set_default("db_name", "bikes_db")?
            .set_default("db_pool_size", 16)?
            .set_default("migrations_dir", "migrations")?
            .set_default("store_backend", "postgres")?
            // HTTP
            .set_default("http_port", 8081)?
            // Shutdown
            .set_default("shutdown_timeout", "5s")?
            // Logging
            .set_default("log_level", "info")?
            // Auth
            .set_default("api_secret", "change-me")?
            .set_default("token_lifespan", "1h")?
            .set_default("admin_role_id", 1)?
            .set_default("user_role_id", 2)?
            // Payment gateway
            .set_default("midtrans_server_key", "")?
            .set_default("midtrans_base_url", "https://app.sandbox.midtrans.com")?
            .set_default("payment_timeout", "10s")?
            .add_source(source)
            .build()?;

        let cfg: AppConfig = settings
            .try_deserialize()
            .context("Failed to load configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.admin_role_id == self.user_role_id {
            anyhow::bail!("admin_role_id and user_role_id must differ");
        }
        if self.api_secret.is_empty() {
            anyhow::bail!("api_secret must not be empty");
        }
        if self.db_pool_size == 0 {
            anyhow::bail!("db_pool_size must be at least 1");
        }
        Ok(())
    }
}
