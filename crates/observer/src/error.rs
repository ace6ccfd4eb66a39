use gaswatch_persistence::ReplicaError;

/// Errors raised while following a device.
///
/// None of these stop an observer: feed failures trigger a reconnect and
/// history failures leave the affected source empty.
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    /// The live feed connection failed or broke.
    #[error("Feed transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    /// An HTTP request to the origin failed (network, DNS, timeout, etc.).
    #[error("Origin request failed: {0}")]
    Origin(#[from] reqwest::Error),

    /// The origin returned a non-2xx status code.
    #[error("Origin returned HTTP {status}: {body}")]
    OriginStatus {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    #[error(transparent)]
    Replica(#[from] ReplicaError),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<serde_json::Error> for ObserverError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}
