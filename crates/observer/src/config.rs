use gaswatch_core::types::DeviceId;
use gaswatch_core::window::TimeWindow;

use crate::error::ObserverError;

/// Connection details for the external replicated store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaConfig {
    pub url: String,
    /// Opaque token passed through to the store.
    pub auth: Option<String>,
}

/// Observer configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ObserverConfig {
    /// Origin service base URL (default: `http://localhost:5000`).
    pub origin_url: String,
    /// Device to follow. Required.
    pub device_id: DeviceId,
    /// External store; without it the observer keeps history in memory only.
    pub replica: Option<ReplicaConfig>,
    /// Look-back window for the periodic summary (default: `1h`).
    pub window: TimeWindow,
}

impl ObserverConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var        | Default                 |
    /// |----------------|-------------------------|
    /// | `ORIGIN_URL`   | `http://localhost:5000` |
    /// | `DEVICE_ID`    | required                |
    /// | `REPLICA_URL`  | unset                   |
    /// | `REPLICA_AUTH` | unset                   |
    /// | `WINDOW`       | `1h`                    |
    pub fn from_env() -> Result<Self, ObserverError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ObserverError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let origin_url = lookup("ORIGIN_URL")
            .unwrap_or_else(|| "http://localhost:5000".to_string())
            .trim_end_matches('/')
            .to_string();
        if !origin_url.starts_with("http://") && !origin_url.starts_with("https://") {
            return Err(ObserverError::Config(format!(
                "ORIGIN_URL must be an http(s) URL, got '{origin_url}'"
            )));
        }

        let device_id = lookup("DEVICE_ID")
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ObserverError::Config("DEVICE_ID is required".into()))?;

        let window = match lookup("WINDOW") {
            Some(raw) => raw
                .parse::<TimeWindow>()
                .map_err(|e| ObserverError::Config(format!("WINDOW: {e}")))?,
            None => TimeWindow::default(),
        };

        let replica = lookup("REPLICA_URL")
            .filter(|url| !url.trim().is_empty())
            .map(|url| ReplicaConfig {
                url,
                auth: lookup("REPLICA_AUTH").filter(|a| !a.is_empty()),
            });

        Ok(Self {
            origin_url,
            device_id,
            replica,
            window,
        })
    }

    /// Realtime endpoint derived from the origin URL.
    pub fn feed_url(&self) -> String {
        let rest = self
            .origin_url
            .strip_prefix("https://")
            .map(|rest| format!("wss://{rest}"))
            .or_else(|| {
                self.origin_url
                    .strip_prefix("http://")
                    .map(|rest| format!("ws://{rest}"))
            })
            .unwrap_or_else(|| self.origin_url.clone());
        format!("{rest}/ws")
    }
}
