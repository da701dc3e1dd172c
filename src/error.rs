//! Error types and handling for the course generator

use thiserror::Error;

/// Main error type for the course generator
#[derive(Error, Debug)]
pub enum CourseError {
    /// Configuration-related errors (missing credentials, bad ranges)
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Remote or in-memory store failures
    #[error("Store error: {message}")]
    Store { message: String },

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// JSON encoding/decoding errors
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
}

impl CourseError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new store error
    pub fn store<S: Into<String>>(message: S) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            CourseError::Config { message } => {
                format!("Configuration error: {message}. Please check your config file and credentials.")
            }
            CourseError::Store { .. } => {
                "Unable to talk to the course store. Please check the store URL and your connection."
                    .to_string()
            }
            CourseError::Io { .. } => {
                "File operation failed. Please check file paths and permissions.".to_string()
            }
            CourseError::Json { source } => format!("Malformed JSON: {source}"),
        }
    }
}

impl From<reqwest::Error> for CourseError {
    fn from(err: reqwest::Error) -> Self {
        CourseError::store(format!("HTTP request failed: {err}"))
    }
}

impl From<reqwest_middleware::Error> for CourseError {
    fn from(err: reqwest_middleware::Error) -> Self {
        CourseError::store(format!("HTTP request failed: {err}"))
    }
}
