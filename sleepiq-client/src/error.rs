//! Error types for the SleepIQ client

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while talking to the SleepIQ cloud API
#[derive(Debug, Error)]
pub enum ClientError {
    /// Login failed or the session was rejected again after a re-login
    ///
    /// Carries the remote error payload when the service provided one.
    /// Nothing else can proceed for this account until a login succeeds.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The account has no bed registered to it
    #[error("No bed registered to this account")]
    NoBed,

    /// The bed has no adjustable foundation attached
    ///
    /// This is an expected, permanent condition for a bed rather than a
    /// transient fault.
    #[error("No foundation detected: {0}")]
    NoFoundation(String),

    /// Network or HTTP transport error
    #[error("Network/HTTP error: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The service answered with an error status or error payload
    #[error("Remote error (HTTP {status}): {message}")]
    Remote {
        /// HTTP status code of the response
        status: u16,
        /// Message from the remote error payload, or the raw body
        message: String,
    },

    /// The response body could not be decoded
    #[error("Response parsing error: {0}")]
    Parse(String),
}

impl ClientError {
    /// Whether the failure is worth retrying on the next scheduled attempt
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ClientError::Request(_)
                | ClientError::Timeout(_)
                | ClientError::Remote { .. }
                | ClientError::Parse(_)
        )
    }

    /// Whether the bed reported that no foundation is attached
    pub fn is_no_foundation(&self) -> bool {
        matches!(self, ClientError::NoFoundation(_))
    }

    /// Whether the failure is an authentication problem
    pub fn is_auth(&self) -> bool {
        matches!(self, ClientError::Auth(_) | ClientError::NoBed)
    }

    pub(crate) fn from_transport(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            ClientError::Timeout(timeout)
        } else {
            ClientError::Request(err.to_string())
        }
    }
}

/// Type alias for results that can return a ClientError
pub type Result<T> = std::result::Result<T, ClientError>;
