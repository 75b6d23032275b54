//! Error handling for the mission core
//!
//! Missing ids and exited objects are expected domain conditions and never
//! show up here. This type covers the failures that are real faults:
//! bad configuration, caller misuse of the evaluator surface, and internal
//! invariant violations.

use std::error::Error as StdError;
use std::fmt;

/// Main error type for the mission core
#[derive(Debug)]
pub enum MissionError {
    // Configuration Errors
    InvalidConfig {
        field: String,
        value: String,
        reason: String,
    },
    MissingConfig {
        field: String,
    },

    // System Errors
    IoError {
        path: String,
        error: String,
    },
    ParseError {
        value: String,
        expected_type: String,
    },
    SerializationError {
        context: String,
        error: String,
    },

    // Evaluator Errors
    UnknownOperation {
        name: String,
    },
    ResourceNotFound {
        resource_type: String,
        id: String,
    },

    // Registry Errors
    InvariantViolation {
        index: String,
        id: String,
        reason: String,
    },

    // Generic fallback for unexpected errors
    Internal {
        message: String,
    },
}

impl fmt::Display for MissionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissionError::InvalidConfig {
                field,
                value,
                reason,
            } => write!(f, "Invalid config: {} = {} ({})", field, value, reason),
            MissionError::MissingConfig { field } => {
                write!(f, "Missing required config: {}", field)
            }

            MissionError::IoError { path, error } => write!(f, "IO error for {}: {}", path, error),
            MissionError::ParseError {
                value,
                expected_type,
            } => write!(
                f,
                "Parse error: '{}' is not a valid {}",
                value, expected_type
            ),
            MissionError::SerializationError { context, error } => {
                write!(f, "Serialization error in {}: {}", context, error)
            }

            MissionError::UnknownOperation { name } => write!(f, "Unknown operation: {}", name),
            MissionError::ResourceNotFound { resource_type, id } => {
                write!(f, "Resource not found: {} '{}'", resource_type, id)
            }

            MissionError::InvariantViolation { index, id, reason } => write!(
                f,
                "Registry invariant violated in {} for '{}': {}",
                index, id, reason
            ),

            MissionError::Internal { message } => write!(f, "Internal error: {}", message),
        }
    }
}

impl StdError for MissionError {}

/// Type alias for Results in the mission core
pub type MissionResult<T> = Result<T, MissionError>;

// Conversion traits for common error types

impl From<std::io::Error> for MissionError {
    fn from(error: std::io::Error) -> Self {
        MissionError::IoError {
            path: String::new(),
            error: error.to_string(),
        }
    }
}

impl From<toml::de::Error> for MissionError {
    fn from(error: toml::de::Error) -> Self {
        MissionError::ParseError {
            value: error.message().to_string(),
            expected_type: "mission config".to_string(),
        }
    }
}

impl From<serde_json::Error> for MissionError {
    fn from(error: serde_json::Error) -> Self {
        MissionError::SerializationError {
            context: "json".to_string(),
            error: error.to_string(),
        }
    }
}

// Helper functions for common error patterns

/// Convert Option to Result with context
pub trait OptionExt<T> {
    fn ok_or_mission<F>(self, f: F) -> MissionResult<T>
    where
        F: FnOnce() -> MissionError;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_mission<F>(self, f: F) -> MissionResult<T>
    where
        F: FnOnce() -> MissionError,
    {
        self.ok_or_else(f)
    }
}

/// Extension trait for adding context to errors
pub trait ErrorContext<T> {
    fn context(self, msg: &str) -> MissionResult<T>;
    fn with_context<F>(self, f: F) -> MissionResult<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for Result<T, E>
where
    E: fmt::Display,
{
    fn context(self, msg: &str) -> MissionResult<T> {
        self.map_err(|e| MissionError::Internal {
            message: format!("{}: {}", msg, e),
        })
    }

    fn with_context<F>(self, f: F) -> MissionResult<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| MissionError::Internal {
            message: format!("{}: {}", f(), e),
        })
    }
}
