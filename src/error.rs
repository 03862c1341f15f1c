use thiserror::Error;

/// Failure of a call to an external service (completion, embeddings, GitHub).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Timeouts, rate limits, 5xx, and network errors. Worth retrying.
    #[error("transient service error: {0}")]
    Retryable(String),
    /// Authentication and other client errors. Retrying will not help.
    #[error("service error: {0}")]
    Fatal(String),
}

impl ServiceError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Retryable(_))
    }

    /// Classify an HTTP error status.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let message = format!("HTTP {}: {}", status, body.trim());
        if status.as_u16() == 429 || status.as_u16() == 408 || status.is_server_error() {
            ServiceError::Retryable(message)
        } else {
            ServiceError::Fatal(message)
        }
    }

    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_builder() {
            ServiceError::Fatal(err.to_string())
        } else {
            ServiceError::Retryable(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn status_classification() {
        assert!(ServiceError::from_status(StatusCode::TOO_MANY_REQUESTS, "").is_retryable());
        assert!(ServiceError::from_status(StatusCode::BAD_GATEWAY, "").is_retryable());
        assert!(!ServiceError::from_status(StatusCode::UNAUTHORIZED, "bad key").is_retryable());
        assert!(!ServiceError::from_status(StatusCode::BAD_REQUEST, "").is_retryable());
    }
}
