use config::{Config, ConfigError, Environment, File};
use rust_decimal::{prelude::FromPrimitive, Decimal};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_ROYALTY_RATE: f64 = 0.15;
const DEFAULT_COMMISSION_RATE: f64 = 0.10;
const DEFAULT_CURRENCY: &str = "XOF";
const DEV_DEFAULT_JWT_SECRET: &str =
    "this_is_a_development_secret_key_that_is_at_least_64_characters_long_for_testing";

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// JWT secret shared with the identity provider (minimum 64 characters)
    #[validate(length(min = 64))]
    pub jwt_secret: String,

    /// Expected JWT issuer
    #[serde(default = "default_auth_issuer")]
    pub auth_issuer: String,

    /// Expected JWT audience
    #[serde(default = "default_auth_audience")]
    pub auth_audience: String,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    #[serde(default = "default_environment")]
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

    /// CORS: comma-separated list of allowed origins (production)
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Allow permissive CORS fallback outside development
    #[serde(default)]
    pub cors_allow_any_origin: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Royalty rate applied to each line total at order validation
    #[serde(default = "default_royalty_rate")]
    #[validate(custom = "validate_rate")]
    pub royalty_rate: f64,

    /// Commission rate applied to an order total at validation
    #[serde(default = "default_commission_rate")]
    #[validate(custom = "validate_rate")]
    pub commission_rate: f64,

    /// Currency code stamped on orders
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Event channel capacity for async event processing
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

fn default_auth_issuer() -> String {
    "editions-auth".to_string()
}
fn default_auth_audience() -> String {
    "editions-api".to_string()
}
fn default_host() -> String {
    "0.0.0.0".to_string()
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
fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_idle_timeout_secs() -> u64 {
    600
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}
fn default_royalty_rate() -> f64 {
    DEFAULT_ROYALTY_RATE
}
fn default_commission_rate() -> f64 {
    DEFAULT_COMMISSION_RATE
}
fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}
fn default_event_channel_capacity() -> usize {
    1024
}

fn validate_rate(rate: f64) -> Result<(), ValidationError> {
    if !rate.is_finite() || !(0.0..=1.0).contains(&rate) {
        let mut err = ValidationError::new("rate");
        err.message = Some("rates must be finite values between 0.0 and 1.0".into());
        return Err(err);
    }
    Ok(())
}

impl AppConfig {
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn royalty_rate_decimal(&self) -> Decimal {
        Decimal::from_f64(self.royalty_rate)
            .unwrap_or_else(|| Decimal::new(15, 2))
            .round_dp(4)
    }

    pub fn commission_rate_decimal(&self) -> Decimal {
        Decimal::from_f64(self.commission_rate)
            .unwrap_or_else(|| Decimal::new(10, 2))
            .round_dp(4)
    }

    /// Constraints that validator attributes cannot express on their own.
    pub fn validate_additional_constraints(&self) -> Result<(), ConfigError> {
        if !self.is_development() && self.jwt_secret.trim() == DEV_DEFAULT_JWT_SECRET {
            return Err(ConfigError::Message(
                "the development JWT secret must be overridden outside development".into(),
            ));
        }
        if !self.should_allow_permissive_cors()
            && self
                .cors_allowed_origins
                .as_deref()
                .map(|s| s.trim().is_empty())
                .unwrap_or(true)
        {
            return Err(ConfigError::Message(
                "set APP__CORS_ALLOWED_ORIGINS or APP__CORS_ALLOW_ANY_ORIGIN=true".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("configuration load error: {0}")]
    Load(#[from] ConfigError),
    #[error("configuration validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::fmt;

    let default_directive = format!("editions_api={},tower_http=debug", level);
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
        .set_default("database_url", "sqlite://editions.db?mode=rwc")
        .map_err(AppConfigError::Load)?
        .set_default("jwt_secret", DEV_DEFAULT_JWT_SECRET)
        .map_err(AppConfigError::Load)?
        .set_default("environment", DEFAULT_ENV)
        .map_err(AppConfigError::Load)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration security validation failed: {}", e);
        AppConfigError::Load(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn base_config() -> AppConfig {
        AppConfig {
            database_url: "sqlite::memory:".into(),
            jwt_secret: DEV_DEFAULT_JWT_SECRET.into(),
            auth_issuer: default_auth_issuer(),
            auth_audience: default_auth_audience(),
            host: default_host(),
            port: DEFAULT_PORT,
            environment: "development".into(),
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: true,
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            db_max_connections: 10,
            db_min_connections: 1,
            db_connect_timeout_secs: 30,
            db_idle_timeout_secs: 600,
            db_acquire_timeout_secs: 8,
            royalty_rate: DEFAULT_ROYALTY_RATE,
            commission_rate: DEFAULT_COMMISSION_RATE,
            currency: DEFAULT_CURRENCY.into(),
            event_channel_capacity: 1024,
        }
    }

    #[test]
    fn default_rates_convert_to_decimals() {
        let cfg = base_config();
        assert_eq!(cfg.royalty_rate_decimal(), dec!(0.15));
        assert_eq!(cfg.commission_rate_decimal(), dec!(0.10));
    }

    #[test]
    fn development_allows_permissive_cors() {
        let cfg = base_config();
        assert!(cfg.validate_additional_constraints().is_ok());
    }

    #[test]
    fn production_rejects_dev_secret() {
        let mut cfg = base_config();
        cfg.environment = "production".into();
        cfg.cors_allowed_origins = Some("https://editions.example".into());
        assert!(cfg.validate_additional_constraints().is_err());
    }

    #[test]
    fn production_requires_cors_origins() {
        let mut cfg = base_config();
        cfg.environment = "production".into();
        cfg.jwt_secret = "a".repeat(64);
        assert!(cfg.validate_additional_constraints().is_err());
        cfg.cors_allowed_origins = Some("https://editions.example".into());
        assert!(cfg.validate_additional_constraints().is_ok());
    }

    #[test]
    fn out_of_range_rate_fails_validation() {
        let mut cfg = base_config();
        cfg.royalty_rate = 1.5;
        assert!(cfg.validate().is_err());
    }
}
