/// Configuration management for Marketplace Service
///
/// Loads configuration from environment variables (and `.env` when present).
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub notifications: NotificationConfig,
    pub push: PushConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application environment (dev, staging, prod)
    pub env: String,
    pub host: String,
    pub http_port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL URL. The in-memory store is used when unset.
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Days an inbox entry is kept before the janitor removes it
    pub retention_days: i64,
    /// Seconds between janitor runs
    pub purge_interval_secs: u64,
}

/// FCM settings. Push delivery is disabled unless a key file is configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushConfig {
    pub fcm_project_id: Option<String>,
    pub fcm_credentials_path: Option<PathBuf>,
}

impl PushConfig {
    pub fn enabled(&self) -> bool {
        self.fcm_credentials_path.is_some()
    }
}

// Default values
fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    2
}

fn default_retention_days() -> i64 {
    30
}

fn default_purge_interval_secs() -> u64 {
    3600
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
            purge_interval_secs: default_purge_interval_secs(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let app = AppConfig {
            env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            http_port: parse_var("PORT")?.unwrap_or(8080),
        };

        let database = DatabaseConfig {
            url: std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            max_connections: parse_var("DB_MAX_CONNECTIONS")?
                .unwrap_or_else(default_max_connections),
            min_connections: parse_var("DB_MIN_CONNECTIONS")?
                .unwrap_or_else(default_min_connections),
        };
        if database.min_connections > database.max_connections {
            bail!(
                "DB_MIN_CONNECTIONS ({}) exceeds DB_MAX_CONNECTIONS ({})",
                database.min_connections,
                database.max_connections
            );
        }

        let notifications = NotificationConfig {
            retention_days: parse_var("NOTIFICATION_RETENTION_DAYS")?
                .unwrap_or_else(default_retention_days),
            purge_interval_secs: parse_var("NOTIFICATION_PURGE_INTERVAL_SECS")?
                .unwrap_or_else(default_purge_interval_secs),
        };
        if notifications.retention_days <= 0 {
            bail!("NOTIFICATION_RETENTION_DAYS must be positive");
        }
        if notifications.purge_interval_secs == 0 {
            bail!("NOTIFICATION_PURGE_INTERVAL_SECS must be positive");
        }

        let push = PushConfig {
            fcm_project_id: std::env::var("FCM_PROJECT_ID").ok(),
            fcm_credentials_path: std::env::var("FCM_CREDENTIALS_PATH")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
        };

        Ok(Config {
            app,
            database,
            notifications,
            push,
        })
    }
}

fn parse_var<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("invalid value for {}: {:?}", name, raw)),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 6] = [
        "PORT",
        "DATABASE_URL",
        "DB_MAX_CONNECTIONS",
        "DB_MIN_CONNECTIONS",
        "NOTIFICATION_RETENTION_DAYS",
        "FCM_CREDENTIALS_PATH",
    ];

    fn clear() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear();
        let config = Config::from_env().unwrap();
        assert_eq!(config.app.http_port, 8080);
        assert!(config.database.url.is_none());
        assert_eq!(config.database.max_connections, 20);
        assert_eq!(config.notifications.retention_days, 30);
        assert!(!config.push.enabled());
    }

    #[test]
    #[serial]
    fn test_rejects_bad_port() {
        clear();
        std::env::set_var("PORT", "not-a-port");
        let err = Config::from_env().unwrap_err();
        assert!(err.to_string().contains("PORT"));
        clear();
    }

    #[test]
    #[serial]
    fn test_rejects_inverted_pool_bounds() {
        clear();
        std::env::set_var("DB_MAX_CONNECTIONS", "2");
        std::env::set_var("DB_MIN_CONNECTIONS", "5");
        assert!(Config::from_env().is_err());
        clear();
    }
}
