use serde::{Deserialize, Serialize};

/// Handle for the logged-in user.
///
/// The backend does not return a profile on login, so the id is the fixed
/// placeholder `"me"` and the email is whatever the user logged in with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub email: Option<String>,
}

impl Identity {
    pub(crate) const SELF_ID: &'static str = "me";

    pub fn with_email(email: impl Into<String>) -> Self {
        Self {
            id: Self::SELF_ID.to_string(),
            email: Some(email.into()),
        }
    }

    /// Identity for a session restored from storage, where only the token survived.
    pub fn restored() -> Self {
        Self {
            id: Self::SELF_ID.to_string(),
            email: None,
        }
    }
}

/// Body of the login and registration calls.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct CredentialsRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Success body of `POST /auth/login`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct LoginResponse {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

/// Success body of `POST /auth/refresh`. Rotating backends also send a new refresh token.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RefreshResponse {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}
