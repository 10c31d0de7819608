//! Error types for the completion service

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    /// The service rejected the request itself; retrying cannot help.
    #[error("Invalid completion request: {0}")]
    InvalidRequestError(String),

    /// Transport failure, decode failures included.
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Rate limit exceeded: {0}")]
    RateLimitError(String),

    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Completion service error: {0}")]
    ServerError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Terminal error after the attempt budget ran out.
    #[error("Completion service unavailable: {0}")]
    UnavailableError(String),

    #[error("Response contained no completions")]
    EmptyResponseError,
}

pub type LlmResult<T> = Result<T, LlmError>;

impl LlmError {
    /// Check whether a later attempt could plausibly succeed.
    ///
    /// HTTP status failures are classified into dedicated variants before
    /// they reach here, so a bare transport error counts as transient.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::RateLimitError(_) | LlmError::ServerError(_) => true,
            LlmError::HttpError(e) => e.status().map_or(true, |status| {
                status.is_server_error() || status == 429 || status == 408
            }),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(LlmError::RateLimitError("slow down".to_string()).is_transient());
        assert!(LlmError::ServerError("502".to_string()).is_transient());
        assert!(!LlmError::InvalidRequestError("bad shape".to_string()).is_transient());
        assert!(!LlmError::AuthError("bad key".to_string()).is_transient());
        assert!(!LlmError::EmptyResponseError.is_transient());
    }
}
