use std::env;
use std::net::SocketAddr;

use stripe::Currency;
use thiserror::Error;
use tracing::{info, warn};

/// Keys that must be present (and not a build placeholder) before the service starts.
pub const REQUIRED_KEYS: [&str; 4] = [
    "STRIPE_SECRET_KEY",
    "DATABASE_URL",
    "JWT_SECRET",
    "COOKIE_SECRET",
];

/// Set to `1`/`true` to bypass validation during build-time invocations.
pub const SKIP_VALIDATION_KEY: &str = "SKIP_ENV_VALIDATION";

/// Values injected by build tooling that must never reach a running process.
const PLACEHOLDERS: [&str; 5] = [
    "placeholder",
    "build-placeholder",
    "supersecret",
    "changeme",
    "sk_test_placeholder",
];

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_POOL_SIZE: u32 = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variables: {}", .0.join(", "))]
    MissingKeys(Vec<&'static str>),
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

fn is_placeholder(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || PLACEHOLDERS.iter().any(|p| value.eq_ignore_ascii_case(p))
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true")
}

/// Checks every required key through `lookup` and reports all missing ones at once.
pub fn validate_with<F>(lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if lookup(SKIP_VALIDATION_KEY).is_some_and(|v| is_truthy(&v)) {
        warn!("Environment validation skipped via {SKIP_VALIDATION_KEY}");
        return Ok(());
    }

    let missing: Vec<&'static str> = REQUIRED_KEYS
        .iter()
        .copied()
        .filter(|key| lookup(*key).map_or(true, |v| is_placeholder(&v)))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::MissingKeys(missing))
    }
}

/// Validates the process environment. Call once at startup.
pub fn validate_env() -> Result<(), ConfigError> {
    validate_with(|key| env::var(key).ok())
}

/// Runtime configuration, read after [`validate_env`] has passed.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub stripe_secret_key: String,
    pub stripe_publishable_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,
    pub database_url: String,
    pub database_pool_size: u32,
    pub jwt_secret: String,
    pub cookie_secret: String,
    pub currency: Currency,
    pub bind_addr: SocketAddr,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &'static str| {
            optional(key).ok_or_else(|| ConfigError::MissingKeys(vec![key]))
        };

        let currency = match optional("CHECKOUT_CURRENCY") {
            Some(raw) => raw
                .to_lowercase()
                .parse::<Currency>()
                .map_err(|_| ConfigError::Invalid {
                    key: "CHECKOUT_CURRENCY",
                    reason: format!("unknown currency `{raw}`"),
                })?,
            None => Currency::USD,
        };

        let port = match optional("PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::Invalid {
                key: "PORT",
                reason: e.to_string(),
            })?,
            None => DEFAULT_PORT,
        };
        let host = optional("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let bind_addr = format!("{host}:{port}")
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                key: "HOST",
                reason: e.to_string(),
            })?;

        let database_pool_size = match optional("DATABASE_POOL_SIZE") {
            Some(raw) => raw.parse::<u32>().map_err(|e| ConfigError::Invalid {
                key: "DATABASE_POOL_SIZE",
                reason: e.to_string(),
            })?,
            None => DEFAULT_POOL_SIZE,
        };

        let config = Self {
            stripe_secret_key: required("STRIPE_SECRET_KEY")?,
            stripe_publishable_key: optional("STRIPE_PUBLISHABLE_KEY"),
            stripe_webhook_secret: optional("STRIPE_WEBHOOK_SECRET"),
            database_url: required("DATABASE_URL")?,
            database_pool_size,
            jwt_secret: required("JWT_SECRET")?,
            cookie_secret: required("COOKIE_SECRET")?,
            currency,
            bind_addr,
        };
        info!(
            "Loaded configuration: currency={}, bind_addr={}, webhook_enabled={}",
            config.currency,
            config.bind_addr,
            config.stripe_webhook_secret.is_some()
        );
        Ok(config)
    }
}
