//! Errors raised while talking to the control plane.

use thiserror::Error;

/// Failure of a single control-plane call.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The control plane could not be reached, or the connection broke.
    #[error("transport error: {0}")]
    Transport(String),

    /// The control plane refused a response body because it is too large.
    /// Retrying the same body cannot succeed.
    #[error("payload too large: {message}")]
    PayloadTooLarge {
        /// Size of the rejected body in bytes.
        size: usize,
        /// Message returned by the control plane.
        message: String,
    },

    /// The control plane answered with an unexpected status code.
    #[error("unexpected status {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, if readable.
        message: String,
    },

    /// The control plane answered, but the response could not be understood.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The outgoing request could not be built.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    /// Whether this is a network-level failure.
    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::Transport(_))
    }

    /// Whether the control plane rejected an oversized body.
    pub fn is_payload_too_large(&self) -> bool {
        matches!(self, ApiError::PayloadTooLarge { .. })
    }
}

impl From<hyper_util::client::legacy::Error> for ApiError {
    fn from(err: hyper_util::client::legacy::Error) -> Self {
        ApiError::Transport(err.to_string())
    }
}

impl From<hyper::Error> for ApiError {
    fn from(err: hyper::Error) -> Self {
        ApiError::Transport(err.to_string())
    }
}

impl From<http::Error> for ApiError {
    fn from(err: http::Error) -> Self {
        ApiError::InvalidRequest(err.to_string())
    }
}
