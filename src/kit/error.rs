// SPDX-License-Identifier: MIT

//! Typed error handling for opsflow-rs
//!
//! Every failure a step can hit (tool I/O, report serialization, uploads)
//! funnels into `OpsflowError` so the coordinator can log it with the
//! originating component and fold it into a `failed` result.

use thiserror::Error;

/// Top-level error type for opsflow-rs
#[derive(Debug, Error)]
pub enum OpsflowError {
    /// API errors from external services (Prometheus, Pushgateway, S3)
    #[error("API error from {provider}: {message}")]
    Api { provider: String, message: String },

    /// Configuration errors (missing env vars, invalid values)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Workflow-specific errors
    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    /// Object storage errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Generic error wrapper
    #[error("{0}")]
    Other(String),
}

/// Workflow-specific errors
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Unknown execution mode in configuration
    #[error("Invalid execution mode: {0}")]
    InvalidExecutionMode(String),

    /// A step failed and the run did not recover
    #[error("Component {component} failed: {message}")]
    StepFailed { component: String, message: String },

    /// The retry ceiling was hit
    #[error("Component {component} failed after {retries} retries: {message}")]
    RetriesExhausted {
        component: String,
        retries: u32,
        message: String,
    },

    /// A step panicked instead of returning an error
    #[error("Step panicked: {0}")]
    Panicked(String),
}

/// Object storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Bucket name missing or empty
    #[error("Bucket name is required")]
    MissingBucket,

    /// Object key missing or empty
    #[error("Object key is required")]
    MissingKey,

    /// Credentials not configured for the backend
    #[error("Credentials not configured for {0}")]
    MissingCredentials(String),

    /// Backend refused the object
    #[error("Upload rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Command could not be parsed (unknown action, bad params)
    #[error("Invalid storage command: {0}")]
    InvalidCommand(String),
}

impl OpsflowError {
    /// Create an API error
    pub fn api(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create from a generic error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

impl From<&str> for OpsflowError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

impl From<String> for OpsflowError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, OpsflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retries_exhausted_message() {
        let err = WorkflowError::RetriesExhausted {
            component: "monitoring".to_string(),
            retries: 3,
            message: "timeout".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Component monitoring failed after 3 retries: timeout"
        );
    }

    #[test]
    fn test_storage_error_wraps_into_top_level() {
        let err: OpsflowError = StorageError::MissingBucket.into();
        assert_eq!(err.to_string(), "Storage error: Bucket name is required");
    }

    #[test]
    fn test_string_conversion() {
        let err: OpsflowError = "boom".into();
        assert!(matches!(err, OpsflowError::Other(ref m) if m == "boom"));
    }
}
