use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimitError(String),

    #[error("Invalid API response: {0}")]
    ParseError(String),

    #[error("Encryption error: {0}")]
    EncryptionError(String),

    #[error("Analysis API error: {code} - {message}")]
    ServiceError { code: String, message: String },

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Timeout: {0}")]
    TimeoutError(String),
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::ParseError(err.to_string())
    }
}

impl From<aes_gcm::Error> for ApiError {
    fn from(err: aes_gcm::Error) -> Self {
        ApiError::EncryptionError(err.to_string())
    }
}
