//! Explicit wiring of the credential store, request pipeline, and session
//! manager. One context per signed-in client; nothing here is global.

use std::sync::Arc;

use tracing::{debug, info};

use crate::api::auth;
use crate::api::client::{ApiClient, ApiError};
use crate::api::AuthResponse;
use crate::core::config::Config;
use crate::core::credentials::{Credential, CredentialStore};
use crate::core::notify::Notifier;
use crate::core::session::SessionManager;
use crate::core::storage::DurableStore;

pub struct ClientContext {
    credentials: Arc<CredentialStore>,
    api: Arc<ApiClient>,
    sessions: SessionManager,
}

impl ClientContext {
    /// Restore credentials from `durable` and build a pipeline and session
    /// manager from `config`.
    pub fn create(
        config: &Config,
        durable: Box<dyn DurableStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, ApiError> {
        let credentials = Arc::new(CredentialStore::load(durable));
        let api = ApiClient::new(&config.api_settings(), credentials, notifier)?;
        Ok(Self::from_client(api, config.default_model()))
    }

    /// Build a context around an existing pipeline, sharing its credentials.
    pub fn from_client(api: ApiClient, default_model: &str) -> Self {
        let credentials = Arc::clone(api.credentials());
        let api = Arc::new(api);
        let sessions = SessionManager::new(api.clone(), default_model);
        debug!(base_url = api.base_url(), "client context created");
        Self {
            credentials,
            api,
            sessions,
        }
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn sessions_mut(&mut self) -> &mut SessionManager {
        &mut self.sessions
    }

    pub fn is_authenticated(&self) -> bool {
        self.credentials.is_authenticated()
    }

    /// Sign in and return the identity the backend confirmed.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<String, ApiError> {
        let response = auth::login(&self.api, username, password).await?;
        self.adopt(response, username)
    }

    /// Create an account; the backend signs the new user in directly.
    pub async fn register(&mut self, username: &str, password: &str) -> Result<String, ApiError> {
        let response = auth::register(&self.api, username, password).await?;
        self.adopt(response, username)
    }

    /// Forget the credential and all session state. The backend is not told.
    pub fn logout(&mut self) {
        self.credentials.set_credential(None);
        self.sessions.reset_state();
        info!("signed out");
    }

    /// Tear the context down. The stored credential survives for the next
    /// run; in-memory session state does not.
    pub fn dispose(mut self) {
        self.sessions.reset_state();
        debug!("client context disposed");
    }

    fn adopt(&mut self, response: AuthResponse, requested: &str) -> Result<String, ApiError> {
        if response.token.trim().is_empty() {
            return Err(ApiError::EmptyToken);
        }
        let identity = match response.username.trim() {
            "" => requested.trim().to_string(),
            name => name.to_string(),
        };
        self.credentials
            .set_credential(Some(Credential::new(response.token, identity.clone())));
        // A different user must not see the previous user's sessions
        self.sessions.reset_state();
        info!(identity = %identity, "signed in");
        Ok(identity)
    }
}
