//! Process configuration loaded from the environment.

use std::path::PathBuf;
use std::str::FromStr;

use tracing::warn;

use crate::api::server::ApiServerConfig;
use crate::notification::{DEFAULT_ROOM_CAPACITY, ListLimits, gateway};
use crate::Result;

/// Default SQLite location.
pub const DEFAULT_DATABASE_URL: &str = "sqlite:tutor_alerts.db?mode=rwc";

/// Everything the server binary needs to start.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    /// Pool size override; `None` uses the built-in default.
    pub database_max_connections: Option<u32>,
    pub api: ApiServerConfig,
    pub list_limits: ListLimits,
    pub room_capacity: usize,
    pub log_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            database_max_connections: None,
            api: ApiServerConfig::default(),
            list_limits: ListLimits::default(),
            room_capacity: DEFAULT_ROOM_CAPACITY,
            log_dir: None,
        }
    }
}

impl AppConfig {
    /// Load from the process environment.
    ///
    /// Unparseable values fall back to the default with a warning. List
    /// limits that make no sense fail with `Configuration`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(url) = get("DATABASE_URL") {
            config.database_url = url;
        }
        config.database_max_connections =
            parse_or_warn::<u32>("DATABASE_MAX_CONNECTIONS", get("DATABASE_MAX_CONNECTIONS"))
                .filter(|n| *n > 0);

        if let Some(bind_address) = get("API_BIND_ADDRESS") {
            config.api.bind_address = bind_address;
        }
        if let Some(port) = parse_or_warn::<u16>("API_PORT", get("API_PORT")) {
            config.api.port = port;
        }
        if let Some(enable_cors) = parse_or_warn::<bool>("API_ENABLE_CORS", get("API_ENABLE_CORS"))
        {
            config.api.enable_cors = enable_cors;
        }

        let default_limit =
            parse_or_warn::<u32>("NOTIFICATION_DEFAULT_LIMIT", get("NOTIFICATION_DEFAULT_LIMIT"))
                .unwrap_or(gateway::DEFAULT_LIST_LIMIT);
        let max_limit =
            parse_or_warn::<u32>("NOTIFICATION_MAX_LIMIT", get("NOTIFICATION_MAX_LIMIT"))
                .unwrap_or(gateway::MAX_LIST_LIMIT);
        config.list_limits = ListLimits::new(default_limit, max_limit)?;

        if let Some(capacity) =
            parse_or_warn::<usize>("DELIVERY_ROOM_CAPACITY", get("DELIVERY_ROOM_CAPACITY"))
        {
            config.room_capacity = capacity.max(1);
        }

        config.log_dir = get("LOG_DIR").map(PathBuf::from);

        Ok(config)
    }
}

fn parse_or_warn<T: FromStr>(key: &str, value: Option<String>) -> Option<T> {
    let value = value?;
    match value.trim().parse::<T>() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!(key = %key, value = %value, "Invalid value, using default");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<AppConfig> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.api.port, 12580);
        assert_eq!(config.list_limits.default_limit, 50);
        assert_eq!(config.list_limits.max_limit, 100);
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("API_PORT", "8080"),
            ("API_ENABLE_CORS", "false"),
            ("NOTIFICATION_DEFAULT_LIMIT", "20"),
            ("LOG_DIR", "/var/log/tutor-alerts"),
        ])
        .unwrap();
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.api.port, 8080);
        assert!(!config.api.enable_cors);
        assert_eq!(config.list_limits.default_limit, 20);
        assert_eq!(config.log_dir, Some(PathBuf::from("/var/log/tutor-alerts")));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = load(&[("API_PORT", "not-a-port"), ("DELIVERY_ROOM_CAPACITY", "lots")]).unwrap();
        assert_eq!(config.api.port, 12580);
        assert_eq!(config.room_capacity, DEFAULT_ROOM_CAPACITY);
    }

    #[test]
    fn test_nonsensical_limits_rejected() {
        let err = load(&[
            ("NOTIFICATION_DEFAULT_LIMIT", "200"),
            ("NOTIFICATION_MAX_LIMIT", "100"),
        ])
        .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
