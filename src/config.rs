use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::persistence::DatabaseConfig;

/// Runtime configuration for the service
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub database: DatabaseConfig,
    /// Bound on waiting for a user's exclusion domain
    pub lock_timeout: Duration,
    pub requests_per_minute: u32,
    /// Accepted bearer keys; empty disables authentication
    pub api_keys: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            database: DatabaseConfig::default(),
            lock_timeout: Duration::from_millis(5000),
            requests_per_minute: 600,
            api_keys: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AppConfig {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key lookup. Unparseable or out-of-range
    /// values are logged and the default is kept.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> AppConfig {
        let mut config = AppConfig::default();

        if let Some(addr) = var("BIND_ADDR") {
            config.bind_addr = parse_or(&addr, "BIND_ADDR", config.bind_addr, |_| true);
        }

        if let Some(url) = var("DATABASE_URL") {
            let url = url.trim();
            if url.is_empty() {
                tracing::warn!(
                    "Empty DATABASE_URL, using default: {}",
                    config.database.url
                );
            } else {
                config.database.url = url.to_string();
            }
        }

        if let Some(max) = var("DB_MAX_CONNECTIONS") {
            config.database.max_connections = parse_or(
                &max,
                "DB_MAX_CONNECTIONS",
                config.database.max_connections,
                |v| (1..=100).contains(v),
            );
        }

        if let Some(timeout) = var("DB_ACQUIRE_TIMEOUT_MS") {
            let ms = parse_or(
                &timeout,
                "DB_ACQUIRE_TIMEOUT_MS",
                config.database.acquire_timeout.as_millis() as u64,
                |v| (100..=60_000).contains(v),
            );
            config.database.acquire_timeout = Duration::from_millis(ms);
        }

        if let Some(timeout) = var("LOCK_TIMEOUT_MS") {
            let ms = parse_or(
                &timeout,
                "LOCK_TIMEOUT_MS",
                config.lock_timeout.as_millis() as u64,
                |v| (10..=60_000).contains(v),
            );
            config.lock_timeout = Duration::from_millis(ms);
        }

        if let Some(rpm) = var("REQUESTS_PER_MINUTE") {
            config.requests_per_minute = parse_or(
                &rpm,
                "REQUESTS_PER_MINUTE",
                config.requests_per_minute,
                |v| *v > 0,
            );
        }

        if let Some(keys) = var("API_KEYS") {
            config.api_keys = keys
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string)
                .collect();
        }

        config
    }
}

fn parse_or<T>(raw: &str, name: &str, default: T, valid: impl Fn(&T) -> bool) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match raw.trim().parse::<T>() {
        Ok(value) if valid(&value) => value,
        Ok(value) => {
            tracing::warn!(
                "Invalid {} value: {} (out of range), using default: {}",
                name,
                value,
                default
            );
            default
        }
        Err(e) => {
            tracing::warn!(
                "Failed to parse {} '{}': {}, using default: {}",
                name,
                raw,
                e,
                default
            );
            default
        }
    }
}
