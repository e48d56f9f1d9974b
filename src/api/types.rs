//! API request and response types

use serde::{Deserialize, Serialize};

/// Request to run one chat turn
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub user_input: String,
    /// Conversation to run the turn in; the shared default session when
    /// omitted
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Response for the non-streaming chat endpoint
#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub reply: String,
}

/// Response for the health endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
