//! Service configuration.
//!
//! Loads configuration from environment variables (and a `.env` file if present) with
//! sensible defaults.

use std::env;

use thiserror::Error;

use shopcart_cart::ValidationMode;
use shopcart_observability::LogFormat;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0} must be set")]
    Missing(&'static str),
}

/// Service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub api: ApiConfig,
    pub checkout: CheckoutConfig,
    pub store: StoreBackend,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

impl ApiConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckoutConfig {
    pub validation_mode: ValidationMode,
    /// Attempts to delete a cart once its reservations are committed.
    pub cart_delete_attempts: u32,
}

/// Where carts and inventory live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Postgres { database_url: String, max_connections: u32 },
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup (used by tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = lookup("SHOPCART_API_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse_or("SHOPCART_API_PORT", lookup("SHOPCART_API_PORT"), 8080u16)?;

        let validation_mode = match lookup("SHOPCART_VALIDATION_MODE") {
            None => ValidationMode::FailFast,
            Some(v) => match v.trim().to_lowercase().as_str() {
                "fail_fast" | "fail-fast" => ValidationMode::FailFast,
                "aggregate" => ValidationMode::Aggregate,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "SHOPCART_VALIDATION_MODE",
                        value: v,
                        reason: "expected fail_fast or aggregate".to_string(),
                    });
                }
            },
        };

        let cart_delete_attempts = parse_or(
            "SHOPCART_CART_DELETE_ATTEMPTS",
            lookup("SHOPCART_CART_DELETE_ATTEMPTS"),
            3u32,
        )?;
        if cart_delete_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "SHOPCART_CART_DELETE_ATTEMPTS",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let store = match lookup("SHOPCART_STORE").as_deref().map(str::trim) {
            None | Some("memory") => StoreBackend::Memory,
            Some("postgres") => StoreBackend::Postgres {
                database_url: lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?,
                max_connections: parse_or(
                    "SHOPCART_DB_MAX_CONNECTIONS",
                    lookup("SHOPCART_DB_MAX_CONNECTIONS"),
                    10u32,
                )?,
            },
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "SHOPCART_STORE",
                    value: other.to_string(),
                    reason: "expected memory or postgres".to_string(),
                });
            }
        };

        let log_format = match lookup("SHOPCART_LOG_FORMAT") {
            None => LogFormat::default(),
            Some(v) => v.parse::<LogFormat>().map_err(|reason| ConfigError::Invalid {
                key: "SHOPCART_LOG_FORMAT",
                value: v.clone(),
                reason,
            })?,
        };

        Ok(Self {
            api: ApiConfig { host, port },
            checkout: CheckoutConfig {
                validation_mode,
                cart_delete_attempts,
            },
            store,
            log_format,
        })
    }

    /// Deterministic configuration for tests: loopback, OS-assigned port, in-memory stores.
    pub fn test() -> Self {
        Self {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            checkout: CheckoutConfig {
                validation_mode: ValidationMode::FailFast,
                cart_delete_attempts: 3,
            },
            store: StoreBackend::Memory,
            log_format: LogFormat::Pretty,
        }
    }
}

fn parse_or<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(v) => v.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value: v.clone(),
            reason: e.to_string(),
        }),
    }
}
