//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

/// One year. The cache rejects lifetimes past a thousand years.
const MAX_PLAN_CACHE_TTL_MINUTES: u64 = 60 * 24 * 365;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub public_app_url: String,
    pub grok_api_key: Option<String>,
    pub grok_api_base: String,
    pub grok_model: String,
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub stripe_price_id: String,
    pub stripe_api_base: String,
    pub plan_cache_ttl: Duration,
    pub plan_cache_capacity: u64,
    pub analytics_capacity: usize,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let or_default =
            |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let required =
            |key: &str| lookup(key).ok_or_else(|| ConfigError::MissingVar(key.to_string()));

        // --- Load Server and Database Settings ---
        let bind_address_str = or_default("BIND_ADDRESS", "0.0.0.0:3000");
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = required("DATABASE_URL")?;

        let log_level_str = or_default("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let public_app_url = or_default("PUBLIC_APP_URL", "http://localhost:3000");

        // --- AI provider (optional) ---
        let grok_api_key = lookup("GROK_API_KEY").filter(|key| !key.trim().is_empty());
        let grok_api_base = or_default("GROK_API_BASE", "https://api.x.ai/v1");
        let grok_model = or_default("GROK_MODEL", "grok-beta");

        // --- Payment provider ---
        let stripe_secret_key = required("STRIPE_SECRET_KEY")?;
        let stripe_webhook_secret = required("STRIPE_WEBHOOK_SECRET")?;
        let stripe_price_id = required("STRIPE_PRICE_ID")?;
        let stripe_api_base = or_default("STRIPE_API_BASE", "https://api.stripe.com/v1");

        // --- In-memory services ---
        let ttl_minutes: u64 = parse_number(
            "PLAN_CACHE_TTL_MINUTES",
            &or_default("PLAN_CACHE_TTL_MINUTES", "1440"),
        )?;
        if ttl_minutes > MAX_PLAN_CACHE_TTL_MINUTES {
            return Err(ConfigError::InvalidValue(
                "PLAN_CACHE_TTL_MINUTES".to_string(),
                format!("'{}' exceeds {} minutes", ttl_minutes, MAX_PLAN_CACHE_TTL_MINUTES),
            ));
        }
        let plan_cache_ttl = Duration::from_secs(ttl_minutes * 60);
        let plan_cache_capacity: u64 =
            parse_number("PLAN_CACHE_CAPACITY", &or_default("PLAN_CACHE_CAPACITY", "10000"))?;
        let analytics_capacity: usize =
            parse_number("ANALYTICS_CAPACITY", &or_default("ANALYTICS_CAPACITY", "100"))?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            public_app_url,
            grok_api_key,
            grok_api_base,
            grok_model,
            stripe_secret_key,
            stripe_webhook_secret,
            stripe_price_id,
            stripe_api_base,
            plan_cache_ttl,
            plan_cache_capacity,
            analytics_capacity,
        })
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| {
        ConfigError::InvalidValue(key.to_string(), format!("'{}' is not a number", value))
    })
}
