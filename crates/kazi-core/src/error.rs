use thiserror::Error;

/// Application-wide error types for KaziLink.
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP request failed (fetching a listing page).
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// LLM API call failed.
    #[error("LLM error (HTTP {status_code}): {message}")]
    LlmError { message: String, status_code: u16 },

    /// HTML-to-Markdown conversion failed.
    #[error("Cleaner error: {0}")]
    CleanerError(String),

    /// Extracted JSON does not match the expected listing shape.
    #[error("Schema validation error: {0}")]
    SchemaValidationError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Database operation failed.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Required configuration is missing or malformed.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A source scraper did not finish within its collection deadline.
    #[error("Source '{platform}' timed out after {seconds} seconds")]
    SourceTimeout { platform: String, seconds: u64 },

    /// A source scraper panicked instead of returning.
    #[error("Source '{0}' panicked")]
    SourcePanicked(String),

    /// The run was cancelled before the operation finished.
    #[error("Cancelled")]
    Cancelled,
}

impl AppError {
    /// Returns true if the error came from the network layer rather than
    /// from the content the remote side returned.
    pub fn is_transport(&self) -> bool {
        match self {
            AppError::NetworkError(_)
            | AppError::Timeout(_)
            | AppError::RateLimitExceeded
            | AppError::SourceTimeout { .. } => true,
            AppError::LlmError { status_code, .. } => *status_code == 429 || *status_code >= 500,
            AppError::HttpError(msg) => {
                msg.contains("timeout") || msg.contains("connect") || msg.contains("reset")
            }
            _ => false,
        }
    }
}
