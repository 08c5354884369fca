use thiserror::Error;

use crate::api::ApiError;

/// Message shown for any failed analysis, whatever the underlying cause
pub const ANALYSIS_UNAVAILABLE_MESSAGE: &str =
    "Failed to get AI analysis. Please check your API key and try again.";

#[derive(Error, Debug)]
pub enum JournalError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid {field}: {message}")]
    ValidationError { field: String, message: String },

    #[error("Trade not found: {0}")]
    NotFound(String),

    #[error("Duplicate trade id: {0}")]
    DuplicateId(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Credential error: {0}")]
    CredentialError(String),

    #[error("{}", ANALYSIS_UNAVAILABLE_MESSAGE)]
    AnalysisUnavailable,

    #[error("An analysis is already in progress")]
    AnalysisInProgress,
}

impl JournalError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        JournalError::ValidationError {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl From<rusqlite::Error> for JournalError {
    fn from(err: rusqlite::Error) -> Self {
        JournalError::DatabaseError(err.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for JournalError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        JournalError::DatabaseError(format!("Connection lock poisoned: {}", err))
    }
}

impl From<ApiError> for JournalError {
    fn from(err: ApiError) -> Self {
        JournalError::CredentialError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, JournalError>;
