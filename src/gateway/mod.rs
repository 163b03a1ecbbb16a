//! The gateway surface used by the rest of an application.

pub mod request;
pub mod upload;

pub use request::{
    retry_decision, Attempt, RequestBody, RequestDescriptor, RequestGateway, RequestOptions,
    RetryDecision,
};
pub use upload::{
    FormData, FormPart, ProgressCallback, ProgressTracker, UploadFailureKind, UploadGateway,
    UploadOptions, UploadOutcome, UploadResult,
};

use std::sync::Arc;

use serde_json::Value;

use crate::auth::{
    AuthError, FileTokenStore, Identity, SessionManager, SessionSnapshot, TokenStore,
    TokenStoreConfig,
};
use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
use crate::http::build_client;

/// Session, request and upload gateways sharing one client and one session.
///
/// # Example
/// ```no_run
/// use authgate::config::GatewayConfig;
/// use authgate::gateway::Gateway;
///
/// # async fn example() -> authgate::error::Result<()> {
/// let gateway = Gateway::from_config(&GatewayConfig::from_env()?)?;
/// gateway.login("a@b.com", "pw").await?;
/// let tasks: serde_json::Value = gateway.send("/tasks", Default::default()).await?.json().await?;
/// println!("{tasks}");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Gateway {
    session: Arc<SessionManager>,
    requests: RequestGateway,
    uploads: UploadGateway,
}

impl Gateway {
    /// Build a gateway persisting its session under `config.store_dir`.
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        let store = FileTokenStore::new(TokenStoreConfig::new(config.store_dir.clone()));
        Self::with_store(config, Arc::new(store))
    }

    /// Build a gateway on an explicit store.
    pub fn with_store(config: &GatewayConfig, store: Arc<dyn TokenStore>) -> Result<Self> {
        let client = build_client(config.request_timeout)?;
        let session = Arc::new(SessionManager::new(
            client.clone(),
            store,
            config.api_base.clone(),
        ));
        Ok(Self {
            requests: RequestGateway::new(client.clone(), session.clone()),
            uploads: UploadGateway::new(client, session.clone())
                .with_chunk_size(config.upload_chunk_size),
            session,
        })
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn requests(&self) -> &RequestGateway {
        &self.requests
    }

    pub fn uploads(&self) -> &UploadGateway {
        &self.uploads
    }

    pub async fn send(&self, path: &str, options: RequestOptions) -> Result<reqwest::Response> {
        self.requests.send(path, options).await
    }

    pub async fn upload(&self, path: &str, form: FormData, options: UploadOptions) -> UploadResult {
        self.uploads.upload(path, form, options).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Identity> {
        Ok(self.session.login(email, password).await?)
    }

    pub async fn register(&self, email: &str, password: &str) -> Result<Value> {
        Ok(self.session.register(email, password).await?)
    }

    /// Refresh the access token now.
    ///
    /// Without a refresh token nothing is sent and the session is untouched
    /// ([`GatewayError::NoRefreshToken`]). Any other failure leaves the
    /// session expired.
    pub async fn refresh(&self) -> Result<()> {
        match self.session.refresh().await {
            Ok(_) => Ok(()),
            Err(AuthError::NoRefreshToken) => Err(GatewayError::NoRefreshToken),
            Err(error) => {
                tracing::debug!(error = %error, "Explicit refresh failed");
                Err(GatewayError::SessionExpired)
            }
        }
    }

    pub fn logout(&self) {
        self.session.logout();
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.session.identity()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    pub fn api_base(&self) -> String {
        self.session.api_base()
    }

    pub fn set_api_base(&self, api_base: impl Into<String>) -> Result<()> {
        Ok(self.session.set_api_base(api_base)?)
    }
}
