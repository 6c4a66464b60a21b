use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use validator::{Validate, ValidationError};

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_LOCK_RETRY_ATTEMPTS: u32 = 3;
const DEFAULT_LOCK_RETRY_BACKOFF_MS: u64 = 25;
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1024;
const DEFAULT_PRUNE_INTERVAL_SECS: u64 = 300;

/// Application configuration with validation.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port (1024-65535)
    #[serde(default = "default_port")]
    #[validate(range(min = 1024, max = 65535))]
    pub port: u16,

    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Back-order mode: points of sale may sell a variant even when no
    /// stock is available anywhere.
    #[serde(default)]
    pub allow_sale_without_stock: bool,

    /// Attempts before a contended stock-record mutation surfaces a
    /// concurrency conflict.
    #[serde(default = "default_lock_retry_attempts")]
    #[validate(range(min = 1, max = 10))]
    pub lock_retry_attempts: u32,

    /// Base backoff between lock retries, in milliseconds.
    #[serde(default = "default_lock_retry_backoff_ms")]
    pub lock_retry_backoff_ms: u64,

    /// Capacity of the mpsc event queue.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Interval of the background pass that prunes all-zero stock records.
    #[serde(default = "default_prune_interval_secs")]
    pub prune_interval_secs: u64,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_lock_retry_attempts() -> u32 {
    DEFAULT_LOCK_RETRY_ATTEMPTS
}
fn default_lock_retry_backoff_ms() -> u64 {
    DEFAULT_LOCK_RETRY_BACKOFF_MS
}
fn default_event_channel_capacity() -> usize {
    DEFAULT_EVENT_CHANNEL_CAPACITY
}
fn default_prune_interval_secs() -> u64 {
    DEFAULT_PRUNE_INTERVAL_SECS
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    match level {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ValidationError::new("invalid_log_level")),
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            environment: default_environment(),
            log_level: default_log_level(),
            log_json: false,
            allow_sale_without_stock: false,
            lock_retry_attempts: default_lock_retry_attempts(),
            lock_retry_backoff_ms: default_lock_retry_backoff_ms(),
            event_channel_capacity: default_event_channel_capacity(),
            prune_interval_secs: default_prune_interval_secs(),
        }
    }
}

impl AppConfig {
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Loads configuration from `config/default` (optional), an
/// environment-specific file (optional), and `APP__`-prefixed environment
/// variables, then validates the result.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let run_env = env::var("APP_ENV").unwrap_or_else(|_| DEFAULT_ENV.to_string());

    let cfg = Config::builder()
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app: AppConfig = cfg.try_deserialize()?;
    app.validate()
        .map_err(|e| ConfigError::Message(format!("invalid configuration: {}", e)))?;
    Ok(app)
}

/// Initializes the tracing subscriber. `RUST_LOG` wins over the configured
/// level when set; `try_init` keeps repeated calls (tests) harmless.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default_directive = format!("bodega_api={},tower_http=info", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    let registry = tracing_subscriber::registry().with(EnvFilter::new(filter_directive));
    if json {
        let _ = registry.with(fmt::layer().json()).try_init();
    } else {
        let _ = registry.with(fmt::layer()).try_init();
    }
}
