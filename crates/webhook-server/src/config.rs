//! Configuration loaded from environment variables.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Default ledger retention.
pub const DEFAULT_WEBHOOK_RETENTION_DAYS: i64 = 30;

/// Webhook server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address.
    pub addr: SocketAddr,
    /// SQLite database URL.
    pub database_url: String,
    /// Root directory of stored receipt images.
    pub media_dir: PathBuf,
    /// Days a ledger row is kept after it was last seen.
    pub webhook_retention_days: i64,
    /// Period of the cleanup sweep.
    pub sweep_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8787)),
            database_url: "sqlite:gastos.db?mode=rwc".to_string(),
            media_dir: PathBuf::from("data/media"),
            webhook_retention_days: DEFAULT_WEBHOOK_RETENTION_DAYS,
            sweep_interval: Duration::from_secs(3600),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `GASTOS_ADDR` | Server bind address | `127.0.0.1:8787` |
    /// | `DATABASE_URL` | SQLite database URL | `sqlite:gastos.db?mode=rwc` |
    /// | `MEDIA_DIR` | Receipt image root | `data/media` |
    /// | `WEBHOOK_RETENTION_DAYS` | Ledger retention in days | `30` |
    /// | `SWEEP_INTERVAL_SECS` | Cleanup sweep period | `3600` |
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let addr = match env::var("GASTOS_ADDR") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidAddr(raw))?,
            Err(_) => defaults.addr,
        };

        let database_url = env::var("DATABASE_URL").unwrap_or(defaults.database_url);
        let media_dir = env::var("MEDIA_DIR").map(PathBuf::from).unwrap_or(defaults.media_dir);

        let webhook_retention_days =
            positive_var("WEBHOOK_RETENTION_DAYS")?.unwrap_or(defaults.webhook_retention_days);
        let sweep_interval = positive_var("SWEEP_INTERVAL_SECS")?
            .map(|secs| Duration::from_secs(secs as u64))
            .unwrap_or(defaults.sweep_interval);

        Ok(Self {
            addr,
            database_url,
            media_dir,
            webhook_retention_days,
            sweep_interval,
        })
    }
}

fn positive_var(key: &'static str) -> Result<Option<i64>, ConfigError> {
    match env::var(key) {
        Ok(raw) => match raw.trim().parse::<i64>() {
            Ok(value) if value > 0 => Ok(Some(value)),
            _ => Err(ConfigError::InvalidNumber { key, value: raw }),
        },
        Err(_) => Ok(None),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid GASTOS_ADDR format: {0}")]
    InvalidAddr(String),

    #[error("{key} must be a positive integer, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_env_scenarios() {
        use std::sync::Mutex;
        static ENV_LOCK: Mutex<()> = Mutex::new(());
        let _guard = ENV_LOCK.lock().unwrap();

        fn clear() {
            for key in [
                "GASTOS_ADDR",
                "DATABASE_URL",
                "MEDIA_DIR",
                "WEBHOOK_RETENTION_DAYS",
                "SWEEP_INTERVAL_SECS",
            ] {
                std::env::remove_var(key);
            }
        }

        clear();
        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.addr.to_string(), "127.0.0.1:8787");
        assert_eq!(config.database_url, "sqlite:gastos.db?mode=rwc");
        assert_eq!(config.media_dir, PathBuf::from("data/media"));
        assert_eq!(config.webhook_retention_days, 30);
        assert_eq!(config.sweep_interval, Duration::from_secs(3600));

        clear();
        std::env::set_var("GASTOS_ADDR", "0.0.0.0:9000");
        std::env::set_var("WEBHOOK_RETENTION_DAYS", "7");
        std::env::set_var("SWEEP_INTERVAL_SECS", "60");
        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.addr.port(), 9000);
        assert_eq!(config.webhook_retention_days, 7);
        assert_eq!(config.sweep_interval, Duration::from_secs(60));

        clear();
        std::env::set_var("GASTOS_ADDR", "localhost");
        assert!(matches!(ServerConfig::from_env(), Err(ConfigError::InvalidAddr(_))));

        clear();
        std::env::set_var("WEBHOOK_RETENTION_DAYS", "-1");
        assert!(matches!(
            ServerConfig::from_env(),
            Err(ConfigError::InvalidNumber {
                key: "WEBHOOK_RETENTION_DAYS",
                ..
            })
        ));

        clear();
    }
}
