use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::info;
use validator::Validate;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_CACHE_BACKEND: &str = "in-memory";
const DEFAULT_MESSAGE_QUEUE_BACKEND: &str = "in-memory";
const DEFAULT_MESSAGE_QUEUE_NAMESPACE: &str = "resimart:mq";
const DEFAULT_MESSAGE_QUEUE_BLOCK_TIMEOUT_SECS: u64 = 5;
const DEFAULT_CART_LOCK_TTL_SECS: u64 = 900;
const DEFAULT_SESSION_TTL_SECS: u64 = 1800;
const DEFAULT_REDIRECT_TOKEN_TTL_SECS: u64 = 300;

/// Cache configuration
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct CacheConfig {
    /// Type of cache to use: "in-memory" or "redis"
    #[serde(default = "default_cache_backend")]
    pub backend: String,

    /// Redis connection URL for cache
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Default TTL (Time To Live) for cache entries in seconds
    #[serde(default)]
    pub default_ttl_secs: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: default_cache_backend(),
            redis_url: default_redis_url(),
            default_ttl_secs: Some(300),
        }
    }
}

/// Checkout coordination configuration
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct CheckoutConfig {
    /// Seconds a cart checkout lock is honored before it is treated as abandoned
    #[serde(default = "default_cart_lock_ttl_secs")]
    pub cart_lock_ttl_secs: u64,

    /// Seconds a pending checkout session survives while waiting for the gateway callback.
    /// Must not undercut the gateway's own session timeout.
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,

    /// Seconds a redirect token stays verifiable after the callback
    #[serde(default = "default_redirect_token_ttl_secs")]
    pub redirect_token_ttl_secs: u64,

    /// Front-end route the browser is redirected to after a successful payment
    #[serde(default = "default_frontend_success_url")]
    pub frontend_success_url: String,

    /// Front-end route the browser is redirected to after a failed payment
    #[serde(default = "default_frontend_failure_url")]
    pub frontend_failure_url: String,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            cart_lock_ttl_secs: default_cart_lock_ttl_secs(),
            session_ttl_secs: default_session_ttl_secs(),
            redirect_token_ttl_secs: default_redirect_token_ttl_secs(),
            frontend_success_url: default_frontend_success_url(),
            frontend_failure_url: default_frontend_failure_url(),
        }
    }
}

/// VNPay gateway configuration
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct VnpayConfig {
    /// Merchant terminal code issued by the gateway
    #[serde(default)]
    pub tmn_code: String,

    /// Shared HMAC secret used to sign and verify payment URLs
    #[serde(default)]
    pub hash_secret: String,

    /// Gateway payment endpoint the browser is redirected to
    #[serde(default = "default_vnpay_payment_url")]
    pub payment_url: String,

    /// Our callback URL the gateway round-trips the result to
    #[serde(default = "default_vnpay_return_url")]
    pub return_url: String,

    /// Locale passed to the hosted payment page
    #[serde(default = "default_vnpay_locale")]
    pub locale: String,

    /// Gateway order classification code
    #[serde(default = "default_vnpay_order_type")]
    pub order_type: String,
}

impl Default for VnpayConfig {
    fn default() -> Self {
        Self {
            tmn_code: String::new(),
            hash_secret: String::new(),
            payment_url: default_vnpay_payment_url(),
            return_url: default_vnpay_return_url(),
            locale: default_vnpay_locale(),
            order_type: default_vnpay_order_type(),
        }
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// Maximum database connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// Minimum database connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// Comma-separated list of allowed CORS origins
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Allow any origin when explicit origins are not configured
    #[serde(default)]
    pub cors_allow_any_origin: bool,

    /// Message queue backend: "in-memory" or "redis"
    #[serde(default = "default_message_queue_backend")]
    pub message_queue_backend: String,

    /// Key namespace for the redis message queue backend
    #[serde(default = "default_message_queue_namespace")]
    pub message_queue_namespace: String,

    /// Blocking-pop timeout for the redis message queue backend
    #[serde(default = "default_message_queue_block_timeout_secs")]
    pub message_queue_block_timeout_secs: u64,

    /// Cache configuration
    #[serde(default)]
    #[validate]
    pub cache: CacheConfig,

    /// Checkout coordination configuration
    #[serde(default)]
    #[validate]
    pub checkout: CheckoutConfig,

    /// VNPay gateway configuration
    #[serde(default)]
    #[validate]
    pub vnpay: VnpayConfig,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_cache_backend() -> String {
    DEFAULT_CACHE_BACKEND.to_string()
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_min_connections() -> u32 {
    1
}

fn default_message_queue_backend() -> String {
    DEFAULT_MESSAGE_QUEUE_BACKEND.to_string()
}

fn default_message_queue_namespace() -> String {
    DEFAULT_MESSAGE_QUEUE_NAMESPACE.to_string()
}

fn default_message_queue_block_timeout_secs() -> u64 {
    DEFAULT_MESSAGE_QUEUE_BLOCK_TIMEOUT_SECS
}

fn default_cart_lock_ttl_secs() -> u64 {
    DEFAULT_CART_LOCK_TTL_SECS
}

fn default_session_ttl_secs() -> u64 {
    DEFAULT_SESSION_TTL_SECS
}

fn default_redirect_token_ttl_secs() -> u64 {
    DEFAULT_REDIRECT_TOKEN_TTL_SECS
}

fn default_frontend_success_url() -> String {
    "http://localhost:3000/payment/success".to_string()
}

fn default_frontend_failure_url() -> String {
    "http://localhost:3000/payment/failure".to_string()
}

fn default_vnpay_payment_url() -> String {
    "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".to_string()
}

fn default_vnpay_return_url() -> String {
    "http://localhost:8080/api/v1/vnpay/payment-callback".to_string()
}

fn default_vnpay_locale() -> String {
    "vn".to_string()
}

fn default_vnpay_order_type() -> String {
    "other".to_string()
}

impl AppConfig {
    /// Minimal constructor used by tests and tooling; everything else takes defaults.
    pub fn new(
        database_url: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            database_url: database_url.into(),
            host: host.into(),
            port,
            environment: environment.into(),
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            message_queue_backend: default_message_queue_backend(),
            message_queue_namespace: default_message_queue_namespace(),
            message_queue_block_timeout_secs: default_message_queue_block_timeout_secs(),
            cache: CacheConfig::default(),
            checkout: CheckoutConfig::default(),
            vnpay: VnpayConfig::default(),
        }
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
            || self.environment.eq_ignore_ascii_case("dev")
            || self.environment.eq_ignore_ascii_case("test")
    }

    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration error: {0}")]
    ConfigError(#[from] ConfigError),

    #[error("Validation error: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Missing required setting: {0}")]
    MissingSetting(String),
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("resimart_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt().with_env_filter(filter_directive).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter_directive).try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Default config (config/default.toml)
/// 2. Environment-specific config (config/{env}.toml)
/// 3. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    // Support both RUN_ENV and APP_ENV for selecting config profile
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let config = Config::builder()
        .set_default("database_url", "sqlite://resimart.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;
    app_config.validate()?;

    // The gateway secret has no safe default. Refuse to start an online-payment
    // deployment without one outside development.
    if app_config.vnpay.hash_secret.is_empty() && !app_config.is_development() {
        return Err(AppConfigError::MissingSetting(
            "vnpay.hash_secret (APP__VNPAY__HASH_SECRET)".to_string(),
        ));
    }

    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_checkout_ttls() {
        let cfg = AppConfig::new("sqlite::memory:", "127.0.0.1", 18080, "test");
        assert_eq!(cfg.checkout.cart_lock_ttl_secs, 900);
        assert_eq!(cfg.checkout.session_ttl_secs, 1800);
        assert_eq!(cfg.checkout.redirect_token_ttl_secs, 300);
        assert!(cfg.is_development());
    }

    #[test]
    fn session_ttl_outlasts_redirect_token_ttl() {
        let cfg = CheckoutConfig::default();
        assert!(cfg.session_ttl_secs > cfg.redirect_token_ttl_secs);
    }
}
