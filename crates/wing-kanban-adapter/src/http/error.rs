/*
[INPUT]:  Error sources (HTTP, API, serialization, WebSocket, local storage)
[OUTPUT]: Structured error types with context and retry hints
[POS]:    Error handling layer - unified error types for entire crate
[UPDATE]: When adding new error sources or improving error messages
*/

use reqwest::StatusCode;
use thiserror::Error;

/// Main error type for the kanban adapter
#[derive(Error, Debug)]
pub enum KanbanError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response
    #[error("API error (code {code}): {message}")]
    Api { code: i32, message: String },

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Invalid response from server
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection or reply timeout
    #[error("Timeout after {duration}s")]
    Timeout { duration: u64 },

    /// Realtime server refused the channel join
    #[error("Subscription rejected for {topic}: {reason}")]
    SubscriptionRejected { topic: String, reason: String },

    /// Row addressed by id does not exist
    #[error("Task not found: {0}")]
    NotFound(String),

    /// Local backing storage failed
    #[error("Storage error: {0}")]
    Storage(String),
}

impl KanbanError {
    /// Check if the error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            KanbanError::Http(_)
            | KanbanError::Timeout { .. }
            | KanbanError::WebSocket(_)
            | KanbanError::InvalidResponse(_) => true,
            KanbanError::Api { code, .. } => *code == 429 || *code >= 500,
            _ => false,
        }
    }

    /// Create an API error from status code and message
    pub fn api_error(status: StatusCode, message: impl Into<String>) -> Self {
        KanbanError::Api {
            code: status.as_u16() as i32,
            message: message.into(),
        }
    }
}

/// Result type alias for kanban adapter operations
pub type Result<T> = std::result::Result<T, KanbanError>;
