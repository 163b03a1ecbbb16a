//! Error classification and recovery hints.

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    SessionExpired,
    Transport,
    InvalidRequest,
    Configuration,
    Storage,
    Serialization,
}

/// Suggested recovery action, for callers that decide which screen to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverySuggestion {
    /// The backend rejected the supplied email or password.
    CheckCredentials,
    /// The session was cleared; send the user back to a login view.
    LogInAgain,
    RetryLater,
    CheckConfiguration,
    CheckStorage,
    ReportBug,
}
