use std::result;

use thiserror::Error;

/// Error types for automater and E-utilities operations
#[derive(Error, Debug)]
pub enum AutomaterError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    /// JSON parsing failed
    #[error("JSON parsing failed: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Reading a response body or writing output failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic API error with HTTP status code
    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    /// A caller supplied an out-of-range or empty argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation is not allowed in the automater's current state
    #[error("Illegal state: {0}")]
    IllegalState(String),
}

pub type Result<T> = result::Result<T, AutomaterError>;

impl AutomaterError {
    /// Short description used in notices when a remote call fails
    pub fn failure_reason(&self) -> &str {
        match self {
            AutomaterError::RequestError(err) if err.is_timeout() => "Request timeout",
            AutomaterError::RequestError(err) if err.is_connect() => "Connection error",
            AutomaterError::RequestError(_) => "Network error",
            AutomaterError::ApiError { status, .. } => match status {
                429 => "Rate limit exceeded",
                500..=599 => "Server error",
                _ => "API error",
            },
            AutomaterError::JsonError(_) => "Invalid JSON response",
            AutomaterError::Io(_) => "Failed to read response",
            AutomaterError::InvalidArgument(_) => "Invalid input",
            AutomaterError::IllegalState(_) => "Illegal state",
        }
    }
}
