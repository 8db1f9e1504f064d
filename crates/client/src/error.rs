/// Errors from a status or push source.
///
/// The gate treats every variant as transient: it logs and retries on the
/// next tick or reconnect.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-2xx status.
    #[error("Unexpected HTTP status {status}")]
    Status { status: u16 },

    /// The body did not match the expected shape.
    #[error("Malformed response: {0}")]
    Decode(String),

    /// The push socket could not be opened or broke.
    #[error("Push connection error: {0}")]
    Push(String),

    /// The configured API base is not a usable URL.
    #[error("Invalid URL: {0}")]
    Url(String),
}

/// Errors reported by [`StatusGate::start`](crate::StatusGate::start)
/// before any network activity.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    #[error("A job id is required to watch an analysis")]
    MissingJobId,
}
