use thiserror::Error;

/// Custom error types for the session hub and its HTTP surface
#[derive(Debug, Error)]
pub enum HubError {
    /// External code-execution service errors
    #[error("Code execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Execution service returned an unusable response: {0}")]
    ExecutionResponseInvalid(String),

    /// External text-generation service errors
    #[error("Text generation failed: {0}")]
    GenerationFailed(String),

    #[error("{0} is not configured")]
    NotConfigured(String),

    /// Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Wire protocol errors
    #[error("Failed to serialize message: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    /// Generic errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Convenience type alias for Results using HubError
pub type Result<T> = std::result::Result<T, HubError>;

impl HubError {
    /// Helper to create Internal errors with context
    pub fn internal(msg: impl Into<String>) -> Self {
        HubError::Internal(msg.into())
    }

    /// Helper to create execution errors
    pub fn execution(msg: impl Into<String>) -> Self {
        HubError::ExecutionFailed(msg.into())
    }

    /// Helper to create generation errors
    pub fn generation(msg: impl Into<String>) -> Self {
        HubError::GenerationFailed(msg.into())
    }
}
