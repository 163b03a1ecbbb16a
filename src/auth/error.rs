use thiserror::Error;

use super::session::{SessionEvent, SessionState};

/// Errors raised by session operations and token storage.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    LoginRejected(String),
    #[error("{0}")]
    RegistrationRejected(String),
    #[error("No refresh token")]
    NoRefreshToken,
    #[error("Refresh rejected with status {status}")]
    RefreshRejected { status: u16 },
    #[error("Session expired")]
    SessionExpired,
    #[error("Invalid session transition: {event:?} while {state}")]
    InvalidTransition {
        state: SessionState,
        event: SessionEvent,
    },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<reqwest::Error> for AuthError {
    fn from(error: reqwest::Error) -> Self {
        Self::Network(error.to_string())
    }
}

impl From<std::io::Error> for AuthError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}
