use thiserror::Error;

#[derive(Debug, Error)]
pub enum HpsError {
    // ── Network / session ────────────────────────────────────────────────────
    #[error("not connected to server")]
    NotConnected,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("banned until {until:.0}: {reason}")]
    Banned { until: f64, reason: String },

    #[error("server error: {0}")]
    ServerError(String),

    #[error("request timed out waiting for server reply")]
    RequestTimeout,

    // ── Proof-of-work ────────────────────────────────────────────────────────
    #[error("proof-of-work time limit exceeded")]
    PowTimeout,

    // ── Content ──────────────────────────────────────────────────────────────
    #[error("content integrity check failed: expected {expected}, got {actual}")]
    IntegrityFailure { expected: String, actual: String },

    // ── Caller input ─────────────────────────────────────────────────────────
    #[error("{0}")]
    InvalidArgument(String),

    // ── Local persistence ────────────────────────────────────────────────────
    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for HpsError {
    fn from(e: serde_json::Error) -> Self {
        HpsError::Serialization(e.to_string())
    }
}
