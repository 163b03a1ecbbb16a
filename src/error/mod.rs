//! Error types for the gateway surface.

pub mod unified;

pub use unified::{ErrorCategory, RecoverySuggestion};

use thiserror::Error;

use crate::auth::AuthError;

/// Primary error type for gateway operations.
///
/// Non-2xx responses that are not part of the refresh flow are *not* errors:
/// `RequestGateway::send` hands them back to the caller untouched.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Registration failed: {0}")]
    Registration(String),

    #[error("Session expired")]
    SessionExpired,

    #[error("No refresh token; log in again to get one")]
    NoRefreshToken,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<reqwest::Error> for GatewayError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_builder() {
            Self::InvalidRequest(error.to_string())
        } else {
            Self::Transport(error.to_string())
        }
    }
}

impl From<AuthError> for GatewayError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::LoginRejected(message) => Self::Authentication(message),
            AuthError::RegistrationRejected(message) => Self::Registration(message),
            AuthError::NoRefreshToken => Self::NoRefreshToken,
            AuthError::SessionExpired | AuthError::RefreshRejected { .. } => Self::SessionExpired,
            AuthError::Network(message) => Self::Transport(message),
            AuthError::Io(message) => Self::Storage(message),
            AuthError::Serialization(message) => Self::Storage(message),
            other => Self::Authentication(other.to_string()),
        }
    }
}

impl GatewayError {
    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Authentication(_) | Self::Registration(_) | Self::NoRefreshToken => {
                ErrorCategory::Authentication
            }
            Self::SessionExpired => ErrorCategory::SessionExpired,
            Self::Transport(_) => ErrorCategory::Transport,
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::InvalidRequest(_) => ErrorCategory::InvalidRequest,
            Self::Storage(_) | Self::Io(_) => ErrorCategory::Storage,
            Self::Serialization(_) => ErrorCategory::Serialization,
        }
    }

    /// Whether repeating the same call could succeed without user action.
    pub fn is_retryable(&self) -> bool {
        matches!(self.category(), ErrorCategory::Transport)
    }

    /// Suggest recovery actions.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        if matches!(self, Self::NoRefreshToken) {
            return RecoverySuggestion::LogInAgain;
        }
        match self.category() {
            ErrorCategory::Authentication => RecoverySuggestion::CheckCredentials,
            ErrorCategory::SessionExpired => RecoverySuggestion::LogInAgain,
            ErrorCategory::Transport => RecoverySuggestion::RetryLater,
            ErrorCategory::Configuration | ErrorCategory::InvalidRequest => {
                RecoverySuggestion::CheckConfiguration
            }
            ErrorCategory::Storage => RecoverySuggestion::CheckStorage,
            ErrorCategory::Serialization => RecoverySuggestion::ReportBug,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, GatewayError>;
