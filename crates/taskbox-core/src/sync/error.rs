//! Transport error taxonomy.

use thiserror::Error;

/// Errors raised while exchanging a batch or probing the remote authority.
///
/// None of these is fatal to a cycle: a failed exchange becomes a failure
/// result for every entry of its batch and retries go through the outbox.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The exchange did not finish within its configured bound.
    #[error("exchange timed out")]
    Timeout,

    /// The remote authority could not be reached.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The remote authority answered with a non-success status.
    #[error("remote returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Truncated response body.
        body: String,
    },

    /// The response does not line up with the request.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// The response body is not the expected JSON shape.
    #[error("malformed response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_decode() {
            Self::Decode(error.to_string())
        } else {
            Self::Connection(error.to_string())
        }
    }
}
