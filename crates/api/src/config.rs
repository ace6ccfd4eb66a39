use std::path::PathBuf;

use axum::http::HeaderValue;
use gaswatch_core::reading;

/// A configuration value that could not be used.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Connection details for the external replicated store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaConfig {
    pub url: String,
    /// Opaque token passed through to the store.
    pub auth: Option<String>,
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for running next to the sensors on a
/// local network.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `5000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    /// `*` allows any origin.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Snapshot file location (default: `data.json`).
    pub snapshot_path: PathBuf,
    /// Seconds between snapshots (default: `300`).
    pub snapshot_interval_secs: u64,
    /// Readings retained per device (default: `100`).
    pub history_capacity: usize,
    /// External store; mirroring is disabled when absent.
    pub replica: Option<ReplicaConfig>,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default      |
    /// |--------------------------|--------------|
    /// | `HOST`                   | `0.0.0.0`    |
    /// | `PORT`                   | `5000`       |
    /// | `CORS_ORIGINS`           | `*`          |
    /// | `REQUEST_TIMEOUT_SECS`   | `30`         |
    /// | `SNAPSHOT_PATH`          | `data.json`  |
    /// | `SNAPSHOT_INTERVAL_SECS` | `300`        |
    /// | `HISTORY_CAPACITY`       | `100`        |
    /// | `REPLICA_URL`            | unset        |
    /// | `REPLICA_AUTH`           | unset        |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        let host = var("HOST", "0.0.0.0");
        let port: u16 = parse("PORT", var("PORT", "5000"))?;

        let cors_origins: Vec<String> = var("CORS_ORIGINS", "*")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        for origin in cors_origins.iter().filter(|o| o.as_str() != "*") {
            HeaderValue::from_str(origin).map_err(|e| ConfigError::Invalid {
                name: "CORS_ORIGINS",
                value: origin.clone(),
                reason: e.to_string(),
            })?;
        }

        let request_timeout_secs: u64 =
            parse("REQUEST_TIMEOUT_SECS", var("REQUEST_TIMEOUT_SECS", "30"))?;
        let snapshot_path = PathBuf::from(var("SNAPSHOT_PATH", "data.json"));
        let snapshot_interval_secs: u64 =
            parse("SNAPSHOT_INTERVAL_SECS", var("SNAPSHOT_INTERVAL_SECS", "300"))?;
        if snapshot_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "SNAPSHOT_INTERVAL_SECS",
                value: "0".into(),
                reason: "must be greater than zero".into(),
            });
        }

        let history_capacity: usize = parse(
            "HISTORY_CAPACITY",
            var("HISTORY_CAPACITY", &reading::DEFAULT_CAPACITY.to_string()),
        )?;

        let replica = lookup("REPLICA_URL")
            .filter(|url| !url.trim().is_empty())
            .map(|url| ReplicaConfig {
                url,
                auth: lookup("REPLICA_AUTH").filter(|a| !a.is_empty()),
            });

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            snapshot_path,
            snapshot_interval_secs,
            history_capacity,
            replica,
        })
    }

    /// Whether `CORS_ORIGINS` allows every origin.
    pub fn cors_allows_any(&self) -> bool {
        self.cors_origins.is_empty() || self.cors_origins.iter().any(|o| o == "*")
    }
}

fn parse<T>(name: &'static str, value: String) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        name,
        reason: e.to_string(),
        value,
    })
}
