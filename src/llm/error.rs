//! Generation error types

use thiserror::Error;

/// Generation error with classification
#[derive(Debug, Error)]
#[error("{message}")]
pub struct GenerateError {
    pub kind: GenerateErrorKind,
    pub message: String,
}

impl GenerateError {
    pub fn new(kind: GenerateErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(GenerateErrorKind::Network, message)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(GenerateErrorKind::ServerError, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(GenerateErrorKind::InvalidRequest, message)
    }

    pub fn exhausted(message: impl Into<String>) -> Self {
        Self::new(GenerateErrorKind::Exhausted, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(GenerateErrorKind::Unknown, message)
    }
}

/// Error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerateErrorKind {
    /// Network issues, timeouts, dropped backend connections
    Network,
    /// Backend failure (5xx)
    ServerError,
    /// The snapshot or parameters were rejected (4xx)
    InvalidRequest,
    /// Backend out of capacity or memory (429, 503)
    Exhausted,
    /// Unknown error
    Unknown,
}
