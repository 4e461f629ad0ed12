//! Error types and failure taxonomy for session coordination

use std::fmt;
use thiserror::Error;

/// Standard result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors surfaced by the coordinator's collaborators
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("{what} is unavailable in this environment")]
    Unavailable { what: String },

    #[error("Missing component: {0}")]
    MissingComponent(&'static str),
}

impl SessionError {
    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create an unavailable-platform error
    pub fn unavailable(what: impl Into<String>) -> Self {
        Self::Unavailable { what: what.into() }
    }
}

/// Failure of a single refresh call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    /// The backend explicitly rejected the session (HTTP 401)
    #[error("refresh rejected by backend")]
    Rejected,

    /// Network error, non-401 status, or malformed response body
    #[error("refresh failed: {0}")]
    Transient(String),
}

/// Classification of everything that can go wrong with a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionFailure {
    /// No token in either storage tier
    NoCredential,
    /// Decoded expiry is in the past
    LocallyExpired,
    /// Token could not be decoded; treated as expired
    MalformedToken,
    /// Backend answered a refresh with 401
    RefreshRejected,
    /// Refresh failed for any other reason
    RefreshTransient,
    /// Liveness signal could not be delivered
    HeartbeatFailure,
}

impl SessionFailure {
    /// Whether this failure moves the tab into the terminal expired state
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::NoCredential | Self::LocallyExpired | Self::MalformedToken | Self::RefreshRejected
        )
    }
}

impl From<&RefreshError> for SessionFailure {
    fn from(err: &RefreshError) -> Self {
        match err {
            RefreshError::Rejected => Self::RefreshRejected,
            RefreshError::Transient(_) => Self::RefreshTransient,
        }
    }
}

impl fmt::Display for SessionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NoCredential => "no credential",
            Self::LocallyExpired => "token expired",
            Self::MalformedToken => "malformed token",
            Self::RefreshRejected => "refresh rejected",
            Self::RefreshTransient => "transient refresh failure",
            Self::HeartbeatFailure => "heartbeat failure",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_corroborated_failures_are_terminal() {
        assert!(SessionFailure::NoCredential.is_terminal());
        assert!(SessionFailure::LocallyExpired.is_terminal());
        assert!(SessionFailure::MalformedToken.is_terminal());
        assert!(SessionFailure::RefreshRejected.is_terminal());
        assert!(!SessionFailure::RefreshTransient.is_terminal());
        assert!(!SessionFailure::HeartbeatFailure.is_terminal());
    }

    #[test]
    fn test_refresh_errors_classify() {
        assert_eq!(
            SessionFailure::from(&RefreshError::Rejected),
            SessionFailure::RefreshRejected
        );
        let transient = SessionFailure::from(&RefreshError::Transient("502".into()));
        assert_eq!(transient, SessionFailure::RefreshTransient);
        assert!(!transient.is_terminal());
    }

    #[test]
    fn test_error_display() {
        let err = SessionError::storage("quota exceeded");
        assert_eq!(err.to_string(), "Storage error: quota exceeded");

        let err = SessionError::unavailable("BroadcastChannel");
        assert_eq!(
            err.to_string(),
            "BroadcastChannel is unavailable in this environment"
        );
    }
}
