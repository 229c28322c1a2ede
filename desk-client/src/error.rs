//! Client error types

use thiserror::Error;

/// Client error type
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed (connect, timeout, body read)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with an error status
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Invalid response format
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Authentication required
    #[error("Authentication required")]
    Unauthorized,

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Client misconfigured (bad base URL)
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClientError {
    /// The server understood the request and refused it (4xx with a message).
    ///
    /// Returns the server's message; transport problems and 5xx return `None`.
    pub fn rejection_message(&self) -> Option<&str> {
        match self {
            Self::Api { status, message } if (400..500).contains(status) => Some(message),
            Self::NotFound(message) => Some(message),
            _ => None,
        }
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_message() {
        let err = ClientError::Api {
            status: 422,
            message: "Cannot move order from cancelled to confirmed".into(),
        };
        assert_eq!(
            err.rejection_message(),
            Some("Cannot move order from cancelled to confirmed")
        );

        let err = ClientError::Api {
            status: 503,
            message: "upstream down".into(),
        };
        assert_eq!(err.rejection_message(), None);
        assert_eq!(ClientError::Unauthorized.rejection_message(), None);
    }
}
