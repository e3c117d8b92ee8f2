//! Runtime configuration read from the environment (and `.env` via `dotenv`).

use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("{key} must be a valid {expected}, got '{value}'")]
    Invalid {
        key: &'static str,
        expected: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub host: String,
    pub port: u16,
    pub media_root: PathBuf,
    pub session_secure: bool,
    pub session_days: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://screenbox.db?mode=rwc".to_string(),
            max_connections: 5,
            host: "0.0.0.0".to_string(),
            port: 3001,
            media_root: PathBuf::from("./media"),
            session_secure: false,
            session_days: 14,
        }
    }
}

impl AppConfig {
    #[tracing::instrument(name = "Load configuration from environment")]
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup, falling back to
    /// defaults for absent keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            max_connections: parse_or(&lookup, "DB_POOL_MAX", "positive integer", defaults.max_connections)?,
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "PORT", "port number", defaults.port)?,
            media_root: lookup("MEDIA_ROOT").map(PathBuf::from).unwrap_or(defaults.media_root),
            session_secure: parse_or(&lookup, "SESSION_SECURE", "boolean", defaults.session_secure)?,
            session_days: parse_or(&lookup, "SESSION_DAYS", "number of days", defaults.session_days)?,
        };

        tracing::debug!(
            host = %config.host,
            port = config.port,
            media_root = %config.media_root.display(),
            "Configuration loaded"
        );

        Ok(config)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, expected: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, expected, value }),
    }
}
