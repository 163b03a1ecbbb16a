//! Session state machine: login, registration, refresh and logout.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde_json::Value;
use strum::Display;

use super::error::AuthError;
use super::store::{
    TokenStore, TokenStoreExt, ACCESS_TOKEN_KEY, API_BASE_KEY, REFRESH_TOKEN_KEY,
};
use super::token::{CredentialsRequest, Identity, LoginResponse, RefreshResponse};
use crate::config::DEFAULT_API_BASE;
use crate::http::{error_message, parse_json_lenient, resolve_url};

const LOGIN_PATH: &str = "/auth/login";
const REGISTER_PATH: &str = "/auth/register";
const REFRESH_PATH: &str = "/auth/refresh";

/// Authentication state of a [`SessionManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum SessionState {
    Anonymous,
    Authenticated,
    RefreshingToken,
    Expired,
}

/// Inputs that move a session between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    LoginSucceeded,
    RefreshStarted,
    RefreshSucceeded,
    RefreshFailed,
    LoggedOut,
}

impl SessionState {
    /// Transition table. `None` means the event is not valid in this state.
    pub fn transition(self, event: SessionEvent) -> Option<SessionState> {
        use SessionEvent::*;
        use SessionState::*;
        match (self, event) {
            (Anonymous | Authenticated | RefreshingToken | Expired, LoginSucceeded) => {
                Some(Authenticated)
            }
            (Authenticated, RefreshStarted) => Some(RefreshingToken),
            (RefreshingToken, RefreshSucceeded) => Some(Authenticated),
            (RefreshingToken, RefreshFailed) => Some(Expired),
            (_, LoggedOut) => Some(Anonymous),
            _ => None,
        }
    }

    /// States in which an access token may be held.
    pub fn holds_credentials(self) -> bool {
        matches!(self, Self::Authenticated | Self::RefreshingToken)
    }
}

/// Read-only view of the session, for deciding between authenticated and
/// anonymous views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub identity: Option<Identity>,
    pub has_access_token: bool,
    pub has_refresh_token: bool,
    pub api_base: String,
    pub last_refresh: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
struct Session {
    state: SessionState,
    access_token: Option<String>,
    refresh_token: Option<String>,
    identity: Option<Identity>,
    api_base: String,
    /// Bumped on every credential change.
    generation: u64,
    last_refresh: Option<DateTime<Utc>>,
}

impl Session {
    fn apply(&mut self, event: SessionEvent) -> Result<(), AuthError> {
        let next = self
            .state
            .transition(event)
            .ok_or(AuthError::InvalidTransition {
                state: self.state,
                event,
            })?;
        tracing::debug!(from = %self.state, to = %next, ?event, "Session transition");
        self.state = next;
        Ok(())
    }

    fn clear_credentials(&mut self) {
        self.access_token = None;
        self.refresh_token = None;
        self.identity = None;
        self.last_refresh = None;
    }

    /// The outcome a waiter adopts when someone else changed the credentials.
    fn adopt(&self) -> Result<String, AuthError> {
        match (self.state, &self.access_token) {
            (SessionState::Authenticated, Some(token)) => Ok(token.clone()),
            _ => Err(AuthError::SessionExpired),
        }
    }
}

/// Owns the current session and is its only mutator.
///
/// Every credential change is mirrored to the [`TokenStore`] before the call
/// returns. Refreshes are serialized: concurrent callers that hit a 401 share
/// one refresh and its outcome (see [`SessionManager::refresh_since`]).
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use authgate::auth::{MemoryTokenStore, SessionManager};
///
/// # async fn example() -> Result<(), authgate::auth::AuthError> {
/// let session = SessionManager::new(
///     reqwest::Client::new(),
///     Arc::new(MemoryTokenStore::new()),
///     Some("http://localhost:5000".to_string()),
/// );
/// session.login("a@b.com", "pw").await?;
/// assert!(session.is_authenticated());
/// # Ok(())
/// # }
/// ```
pub struct SessionManager {
    client: reqwest::Client,
    store: Arc<dyn TokenStore>,
    inner: RwLock<Session>,
    refresh_gate: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("state", &self.state())
            .field("api_base", &self.api_base())
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Create a manager, restoring any session persisted in `store`.
    ///
    /// The API base is `api_base` when given, else the persisted `apiBase`,
    /// else [`DEFAULT_API_BASE`]. The resolved base is written back.
    pub fn new(
        client: reqwest::Client,
        store: Arc<dyn TokenStore>,
        api_base: Option<String>,
    ) -> Self {
        let access_token = store
            .get_as::<String>(ACCESS_TOKEN_KEY)
            .filter(|token| !token.is_empty());
        let refresh_token = store
            .get_as::<String>(REFRESH_TOKEN_KEY)
            .filter(|token| !token.is_empty());
        let api_base = api_base
            .filter(|base| !base.trim().is_empty())
            .or_else(|| store.get_as::<String>(API_BASE_KEY))
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        if let Err(error) = store.set_as(API_BASE_KEY, &api_base) {
            tracing::warn!(error = %error, "Failed to persist API base");
        }

        let restored = access_token.is_some() || refresh_token.is_some();
        if restored {
            tracing::debug!(%api_base, "Restored persisted session");
        }
        let session = Session {
            state: if restored {
                SessionState::Authenticated
            } else {
                SessionState::Anonymous
            },
            access_token,
            refresh_token,
            identity: restored.then(Identity::restored),
            api_base,
            generation: 0,
            last_refresh: None,
        };

        Self {
            client,
            store,
            inner: RwLock::new(session),
            refresh_gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn state(&self) -> SessionState {
        self.read().state
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().state.holds_credentials()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.read().identity.clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.read().access_token.clone()
    }

    pub fn has_refresh_token(&self) -> bool {
        self.read().refresh_token.is_some()
    }

    pub fn api_base(&self) -> String {
        self.read().api_base.clone()
    }

    /// Point the session at another backend. Persisted under `apiBase`.
    pub fn set_api_base(&self, api_base: impl Into<String>) -> Result<(), AuthError> {
        let api_base = api_base.into();
        let mut session = self.write();
        self.store.set_as(API_BASE_KEY, &api_base)?;
        tracing::info!(%api_base, "API base changed");
        session.api_base = api_base;
        Ok(())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let session = self.read();
        SessionSnapshot {
            state: session.state,
            identity: session.identity.clone(),
            has_access_token: session.access_token.is_some(),
            has_refresh_token: session.refresh_token.is_some(),
            api_base: session.api_base.clone(),
            last_refresh: session.last_refresh,
        }
    }

    /// Generation and access token, read together.
    pub(crate) fn credentials(&self) -> (u64, Option<String>) {
        let session = self.read();
        (session.generation, session.access_token.clone())
    }

    /// Exchange email and password for a token pair.
    pub async fn login(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let url = resolve_url(&self.api_base(), LOGIN_PATH)?;
        tracing::debug!(%url, "Logging in");
        let resp = self
            .client
            .post(url)
            .json(&CredentialsRequest { email, password })
            .send()
            .await?;
        let status = resp.status();
        let body = parse_json_lenient(&resp.bytes().await?);
        if !status.is_success() {
            let message = error_message(&body, "Login failed");
            tracing::warn!(status = status.as_u16(), %message, "Login rejected");
            return Err(AuthError::LoginRejected(message));
        }

        let tokens: LoginResponse = serde_json::from_value(body)
            .map_err(|e| AuthError::InvalidResponse(format!("login response: {e}")))?;
        let access_token = tokens
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                AuthError::InvalidResponse("login response missing access_token".to_string())
            })?;
        let refresh_token = tokens.refresh_token.filter(|token| !token.is_empty());
        let identity = Identity::with_email(email);

        let mut session = self.write();
        self.persist_tokens(Some(&access_token), refresh_token.as_deref())?;
        session.apply(SessionEvent::LoginSucceeded)?;
        session.access_token = Some(access_token);
        session.refresh_token = refresh_token;
        session.identity = Some(identity.clone());
        session.last_refresh = Some(Utc::now());
        session.generation += 1;
        tracing::info!(email, "Logged in");
        Ok(identity)
    }

    /// Create an account. Does not log in; returns the backend's success body.
    pub async fn register(&self, email: &str, password: &str) -> Result<Value, AuthError> {
        let url = resolve_url(&self.api_base(), REGISTER_PATH)?;
        tracing::debug!(%url, "Registering account");
        let resp = self
            .client
            .post(url)
            .json(&CredentialsRequest { email, password })
            .send()
            .await?;
        let status = resp.status();
        let body = parse_json_lenient(&resp.bytes().await?);
        if !status.is_success() {
            let message = error_message(&body, "Registration failed");
            tracing::warn!(status = status.as_u16(), %message, "Registration rejected");
            return Err(AuthError::RegistrationRejected(message));
        }
        tracing::info!(email, "Registered account");
        Ok(body)
    }

    /// Mint a new access token from the refresh token.
    ///
    /// On failure the session moves to `Expired` and persisted credentials are
    /// cleared.
    pub async fn refresh(&self) -> Result<String, AuthError> {
        let _gate = self.refresh_gate.lock().await;
        self.refresh_exclusive().await
    }

    /// Refresh on behalf of a request issued at `observed_generation`.
    ///
    /// If the credentials changed since then (another caller refreshed, logged
    /// in or out), no new refresh is made and the current outcome is adopted:
    /// the current access token, or `SessionExpired`.
    pub(crate) async fn refresh_since(&self, observed_generation: u64) -> Result<String, AuthError> {
        let _gate = self.refresh_gate.lock().await;
        {
            let session = self.read();
            if session.generation != observed_generation {
                tracing::debug!(
                    observed_generation,
                    current_generation = session.generation,
                    "Credentials changed while waiting; adopting current outcome"
                );
                return session.adopt();
            }
        }
        self.refresh_exclusive().await
    }

    /// Caller must hold `refresh_gate`.
    async fn refresh_exclusive(&self) -> Result<String, AuthError> {
        let (refresh_token, api_base, generation) = {
            let mut session = self.write();
            let refresh_token = session
                .refresh_token
                .clone()
                .ok_or(AuthError::NoRefreshToken)?;
            session.apply(SessionEvent::RefreshStarted)?;
            (refresh_token, session.api_base.clone(), session.generation)
        };

        tracing::debug!("Refreshing access token");
        let result = match self.request_refresh(&api_base, &refresh_token).await {
            Ok((access_token, rotated)) => self.finish_refresh(generation, access_token, rotated),
            Err(error) => Err(error),
        };
        result.or_else(|error| self.fail_refresh(generation, error))
    }

    async fn request_refresh(
        &self,
        api_base: &str,
        refresh_token: &str,
    ) -> Result<(String, Option<String>), AuthError> {
        let url = resolve_url(api_base, REFRESH_PATH)?;
        let resp = self
            .client
            .post(url)
            .bearer_auth(refresh_token)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AuthError::RefreshRejected {
                status: status.as_u16(),
            });
        }
        let body = parse_json_lenient(&resp.bytes().await?);
        let parsed: RefreshResponse = serde_json::from_value(body)
            .map_err(|e| AuthError::InvalidResponse(format!("refresh response: {e}")))?;
        let access_token = parsed
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                AuthError::InvalidResponse("refresh response missing access_token".to_string())
            })?;
        Ok((access_token, parsed.refresh_token.filter(|t| !t.is_empty())))
    }

    fn finish_refresh(
        &self,
        generation: u64,
        access_token: String,
        rotated_refresh: Option<String>,
    ) -> Result<String, AuthError> {
        let mut session = self.write();
        if session.generation != generation {
            // Login or logout landed mid-refresh; their credentials win.
            return session.adopt();
        }
        let refresh_token = rotated_refresh.or_else(|| session.refresh_token.clone());
        self.persist_tokens(Some(&access_token), refresh_token.as_deref())?;
        session.apply(SessionEvent::RefreshSucceeded)?;
        session.access_token = Some(access_token.clone());
        session.refresh_token = refresh_token;
        session.last_refresh = Some(Utc::now());
        session.generation += 1;
        tracing::info!("Access token refreshed");
        Ok(access_token)
    }

    fn fail_refresh(&self, generation: u64, error: AuthError) -> Result<String, AuthError> {
        let mut session = self.write();
        if session.generation != generation {
            tracing::debug!(error = %error, "Refresh failed after credentials changed; adopting them");
            return session.adopt();
        }
        tracing::warn!(error = %error, "Token refresh failed; clearing credentials");
        self.clear_persisted();
        if session.apply(SessionEvent::RefreshFailed).is_err() {
            session.state = SessionState::Expired;
        }
        session.clear_credentials();
        session.generation += 1;
        Err(error)
    }

    /// Drop all credentials. Idempotent and infallible; storage errors are logged.
    pub fn logout(&self) {
        let mut session = self.write();
        self.clear_session(&mut session);
    }

    /// Log out after a failed refresh, unless a login re-established the
    /// session in the meantime.
    pub(crate) fn logout_unless_reauthenticated(&self) {
        let mut session = self.write();
        if session.state.holds_credentials() {
            tracing::debug!(state = %session.state, "Session re-established after failed refresh");
            return;
        }
        self.clear_session(&mut session);
    }

    fn clear_session(&self, session: &mut Session) {
        self.clear_persisted();
        let changed = session.state != SessionState::Anonymous
            || session.access_token.is_some()
            || session.refresh_token.is_some()
            || session.identity.is_some();
        if !changed {
            return;
        }
        // LoggedOut is valid from every state.
        let _ = session.apply(SessionEvent::LoggedOut);
        session.clear_credentials();
        session.generation += 1;
        tracing::info!("Logged out");
    }

    fn persist_tokens(
        &self,
        access_token: Option<&str>,
        refresh_token: Option<&str>,
    ) -> Result<(), AuthError> {
        for (key, value) in [
            (ACCESS_TOKEN_KEY, access_token),
            (REFRESH_TOKEN_KEY, refresh_token),
        ] {
            match value {
                Some(value) => self.store.set_as(key, value)?,
                None => self.store.delete(key)?,
            }
        }
        Ok(())
    }

    fn clear_persisted(&self) {
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY] {
            if let Err(error) = self.store.delete(key) {
                tracing::warn!(key, error = %error, "Failed to clear persisted credential");
            }
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Session> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Session> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}
