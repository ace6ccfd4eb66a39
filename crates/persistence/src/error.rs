/// Failure talking to the external replicated store.
#[derive(Debug, thiserror::Error)]
pub enum ReplicaError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("Replica request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The store returned a non-2xx status code.
    #[error("Replica returned HTTP {0}")]
    Status(u16),

    #[error("Replica response could not be decoded: {0}")]
    Decode(String),

    #[error("Replica unavailable: {0}")]
    Unavailable(String),
}

/// Failure writing or reading durable state.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("Snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Replica(#[from] ReplicaError),
}
