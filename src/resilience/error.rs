use super::EndpointClass;
use thiserror::Error;

/// Failure of a call to a remote collaborator
///
/// The variant decides what happens next: transient failures and retryable
/// statuses are retried with backoff, everything else is returned at once.
/// All variants except [`RemoteError::CircuitOpen`] count against the
/// endpoint's circuit breaker.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    /// Connection reset, timeout and similar network trouble
    #[error("transient failure: {0}")]
    Transient(String),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// Request rejected for a reason retrying cannot fix
    #[error("permanent failure: {0}")]
    Permanent(String),

    /// The remote answered but no known response shape matched
    #[error("unparsable response: {0}")]
    Unparsable(String),

    #[error("circuit open for {endpoint}")]
    CircuitOpen { endpoint: EndpointClass },
}

impl RemoteError {
    /// Builds an error from a non-success HTTP status and response body
    pub fn from_status(status: u16, body: &str) -> Self {
        let message: String = body.chars().take(300).collect();
        RemoteError::Status { status, message }
    }

    /// Whether another attempt may succeed
    ///
    /// True for transient failures, 5xx and 429.
    pub fn is_retryable(&self) -> bool {
        match self {
            RemoteError::Transient(_) => true,
            RemoteError::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, RemoteError::CircuitOpen { .. })
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            return RemoteError::from_status(status.as_u16(), &e.to_string());
        }
        if e.is_decode() {
            return RemoteError::Unparsable(e.to_string());
        }
        if e.is_builder() || e.is_redirect() {
            return RemoteError::Permanent(e.to_string());
        }
        // timeouts, refused and reset connections, truncated bodies
        RemoteError::Transient(e.to_string())
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(e: serde_json::Error) -> Self {
        RemoteError::Unparsable(e.to_string())
    }
}
