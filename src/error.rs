//! Error types and handling for Pieuvre
//!
//! This module defines the error types used throughout the application,
//! providing consistent error handling and reporting.

use thiserror::Error;

/// Result type alias for Pieuvre operations
pub type Result<T> = std::result::Result<T, PieuvreError>;

/// Main error type for Pieuvre
#[derive(Debug, Error)]
pub enum PieuvreError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// HTTP/Web server errors
    #[error("Web server error: {message}")]
    Web { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Network-related errors
    #[error("Network error: {message}")]
    Network { message: String },

    /// Kraken API errors (HTTP status or GraphQL error envelope)
    #[error("API error: {message}")]
    Api { message: String },

    /// Authentication/authorization errors
    #[error("Authentication error: {message}")]
    Auth { message: String },

    /// Validation errors
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// Timeout errors
    #[error("Timeout error: {message}")]
    Timeout { message: String },

    /// Generic errors with context
    #[error("Error: {message}")]
    Generic { message: String },
}

impl PieuvreError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        PieuvreError::Config {
            message: message.into(),
        }
    }

    /// Create a new web error
    pub fn web<S: Into<String>>(message: S) -> Self {
        PieuvreError::Web {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        PieuvreError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        PieuvreError::Io {
            message: message.into(),
        }
    }

    /// Create a new network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        PieuvreError::Network {
            message: message.into(),
        }
    }

    /// Create a new API error
    pub fn api<S: Into<String>>(message: S) -> Self {
        PieuvreError::Api {
            message: message.into(),
        }
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        PieuvreError::Timeout {
            message: message.into(),
        }
    }

    /// Create a new auth error
    pub fn auth<S: Into<String>>(message: S) -> Self {
        PieuvreError::Auth {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn generic<S: Into<String>>(message: S) -> Self {
        PieuvreError::Generic {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for PieuvreError {
    fn from(err: std::io::Error) -> Self {
        PieuvreError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for PieuvreError {
    fn from(err: serde_yaml::Error) -> Self {
        PieuvreError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for PieuvreError {
    fn from(err: serde_json::Error) -> Self {
        PieuvreError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for PieuvreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PieuvreError::timeout(err.to_string())
        } else {
            PieuvreError::network(err.to_string())
        }
    }
}

impl From<chrono::ParseError> for PieuvreError {
    fn from(err: chrono::ParseError) -> Self {
        PieuvreError::Validation {
            field: "datetime".to_string(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = PieuvreError::config("test config error");
        assert!(matches!(err, PieuvreError::Config { .. }));

        let err = PieuvreError::auth("bad credentials");
        assert!(matches!(err, PieuvreError::Auth { .. }));

        let err = PieuvreError::validation("field", "test validation error");
        assert!(matches!(err, PieuvreError::Validation { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = PieuvreError::api("status 429");
        assert_eq!(format!("{}", err), "API error: status 429");

        let err = PieuvreError::validation("poll_interval_minutes", "out of range");
        assert_eq!(
            format!("{}", err),
            "Validation error: poll_interval_minutes - out of range"
        );
    }
}
