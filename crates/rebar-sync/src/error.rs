//! Error types for the synchronization client.
//!
//! A missing remote object is not an error — reads return `Option` and the
//! reconciler treats absence as a valid state. Everything here is fatal for
//! the invocation; no retries happen at this layer.

use thiserror::Error;

/// Error that can occur while synchronizing a resource.
#[derive(Debug, Error)]
pub enum RebarError {
    /// Caller input could not be turned into a valid payload.
    #[error("validation failed: {message}")]
    Validation { message: String },

    /// Endpoint configuration is unusable.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// The token exchange was rejected by the endpoint.
    #[error("authentication failed ({status}): {body}")]
    Auth { status: u16, body: String },

    /// A read received a non-success response other than not-found.
    #[error("endpoint returned {status}: {body}")]
    Transport { status: u16, body: String },

    /// The endpoint response body could not be decoded.
    #[error("failed to parse response: {message}")]
    Parse { message: String },

    /// Connection-level HTTP failure (DNS, TLS, timeout).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl RebarError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        RebarError::Validation {
            message: message.into(),
        }
    }

    /// Create an invalid-configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        RebarError::InvalidConfig {
            message: message.into(),
        }
    }

    /// Remote status code carried by this error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            RebarError::Auth { status, .. } | RebarError::Transport { status, .. } => Some(*status),
            RebarError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether this error happened before any transport call was made.
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            RebarError::Validation { .. } | RebarError::InvalidConfig { .. }
        )
    }
}

impl From<serde_json::Error> for RebarError {
    fn from(e: serde_json::Error) -> Self {
        RebarError::Parse {
            message: e.to_string(),
        }
    }
}

/// Result type for synchronization operations.
pub type RebarResult<T> = Result<T, RebarError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_accessor() {
        let err = RebarError::Auth {
            status: 401,
            body: "denied".to_string(),
        };
        assert_eq!(err.status(), Some(401));

        let err = RebarError::validation("bad netmask");
        assert_eq!(err.status(), None);
        assert!(err.is_local());
    }

    #[test]
    fn test_error_display() {
        let err = RebarError::Transport {
            status: 500,
            body: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "endpoint returned 500: boom");

        let err = RebarError::invalid_config("endpoint URL is required");
        assert_eq!(
            err.to_string(),
            "invalid configuration: endpoint URL is required"
        );
    }
}
