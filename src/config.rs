use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use validator::Validate;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DATABASE_URL: &str = "sqlite::memory:";
const DEFAULT_CURRENCY: &str = "usd";
const DEFAULT_READ_PAGE_SIZE: u64 = 25;
const DEFAULT_WEBHOOK_TOLERANCE_SECS: u64 = 300;
const CONFIG_DIR: &str = "config";

/// Application configuration, layered from `config/*.toml` files and
/// `APP_`-prefixed environment variables.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default = "default_true")]
    pub auto_migrate: bool,

    /// ISO currency code used for payment intents
    #[serde(default = "default_currency")]
    #[validate(length(min = 3, max = 3, message = "currency must be 3 characters"))]
    pub currency: String,

    /// Per-request row cap of the order/product stores' page reads
    #[serde(default = "default_read_page_size")]
    #[validate(range(min = 1, max = 1000))]
    pub read_page_size: u64,

    /// Payment processor API key; intent creation is disabled without it
    #[serde(default)]
    pub payment_secret_key: Option<String>,

    /// Shared secret for webhook signature verification
    #[serde(default)]
    pub payment_webhook_secret: Option<String>,

    /// Accepted clock skew for webhook signatures, in seconds
    #[serde(default = "default_webhook_tolerance")]
    pub payment_webhook_tolerance_secs: u64,
}

fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}
fn default_host() -> String {
    DEFAULT_HOST.to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}
fn default_read_page_size() -> u64 {
    DEFAULT_READ_PAGE_SIZE
}
fn default_webhook_tolerance() -> u64 {
    DEFAULT_WEBHOOK_TOLERANCE_SECS
}
fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: true,
            currency: default_currency(),
            read_page_size: default_read_page_size(),
            payment_secret_key: None,
            payment_webhook_secret: None,
            payment_webhook_tolerance_secs: default_webhook_tolerance(),
        }
    }
}

/// Environment layer: flat keys bind as `APP_<KEY>` (APP_DATABASE_URL,
/// APP_PORT, ...).
fn env_source() -> Environment {
    Environment::with_prefix("APP").separator("__")
}

/// Loads and validates the configuration.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let cfg: AppConfig = Config::builder()
        .add_source(File::with_name(&format!("{CONFIG_DIR}/default")).required(false))
        .add_source(File::with_name(&format!("{CONFIG_DIR}/local")).required(false))
        .add_source(env_source())
        .build()?
        .try_deserialize()?;

    cfg.validate()
        .map_err(|e| ConfigError::Message(format!("invalid configuration: {e}")))?;
    Ok(cfg)
}

/// Installs the global tracing subscriber. `RUST_LOG` overrides `level`.
pub fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
