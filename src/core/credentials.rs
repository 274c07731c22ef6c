//! In-memory credential state with write-through persistence.
//!
//! The store is shared (`Arc`) between the auth flow that mutates it and the
//! request pipeline that reads the derived bearer header on every call, so a
//! login or logout takes effect for the very next request.

use std::sync::RwLock;

use reqwest::header::HeaderValue;
use tracing::{debug, warn};

use crate::core::storage::{DurableStore, StoreError};

pub const TOKEN_KEY: &str = "token";
pub const USERNAME_KEY: &str = "username";

/// An authenticated identity: the bearer token and the user it belongs to.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
    pub identity: String,
}

impl Credential {
    pub fn new(token: impl Into<String>, identity: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            identity: identity.into(),
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("identity", &self.identity)
            .finish()
    }
}

#[derive(Default)]
struct CredentialState {
    credential: Option<Credential>,
    bearer: Option<HeaderValue>,
}

pub struct CredentialStore {
    durable: Box<dyn DurableStore>,
    state: RwLock<CredentialState>,
}

impl CredentialStore {
    /// Build a store over `durable` and restore whatever it already holds.
    ///
    /// If the durable store cannot be read, the process starts signed out
    /// and the stored entries are left untouched for the next run.
    pub fn load(durable: Box<dyn DurableStore>) -> Self {
        let restored = read_durable(durable.as_ref());
        let store = Self {
            durable,
            state: RwLock::new(CredentialState::default()),
        };
        match restored {
            Ok(credential) => store.set_credential(credential),
            Err(err) if err.is_recoverable() => {
                warn!("Credential store temporarily unavailable, starting signed out: {err}")
            }
            Err(err) => warn!("Failed to read stored credential, starting signed out: {err}"),
        }
        store
    }

    /// Replace the current credential. `None` logs the user out.
    ///
    /// Persistence is best-effort: a failed durable write is logged and
    /// otherwise ignored, since the in-memory value is authoritative for
    /// this process.
    pub fn set_credential(&self, credential: Option<Credential>) {
        let bearer = credential.as_ref().and_then(|c| bearer_header(&c.token));

        match &credential {
            Some(c) => {
                persist(self.durable.set(TOKEN_KEY, &c.token), TOKEN_KEY);
                persist(self.durable.set(USERNAME_KEY, &c.identity), USERNAME_KEY);
                debug!(identity = %c.identity, "credential set");
            }
            None => {
                persist(self.durable.remove(TOKEN_KEY), TOKEN_KEY);
                persist(self.durable.remove(USERNAME_KEY), USERNAME_KEY);
                debug!("credential cleared");
            }
        }

        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.credential = credential;
        state.bearer = bearer;
    }

    /// Snapshot of the in-memory credential. Never touches durable storage.
    pub fn credential(&self) -> Option<Credential> {
        self.read_state().credential.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.read_state().credential.is_some()
    }

    pub fn identity(&self) -> Option<String> {
        self.read_state()
            .credential
            .as_ref()
            .map(|c| c.identity.clone())
    }

    /// The `Authorization` header value derived from the current token.
    pub fn bearer_header(&self) -> Option<HeaderValue> {
        self.read_state().bearer.clone()
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, CredentialState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }
}

fn read_durable(durable: &dyn DurableStore) -> Result<Option<Credential>, StoreError> {
    let token = durable.get(TOKEN_KEY)?;
    let username = durable.get(USERNAME_KEY)?;

    Ok(match (token, username) {
        (Some(token), Some(username)) if !token.is_empty() => {
            Some(Credential::new(token, username))
        }
        (Some(_), _) => {
            warn!("Stored token has no matching username; discarding it");
            None
        }
        _ => None,
    })
}

fn bearer_header(token: &str) -> Option<HeaderValue> {
    match HeaderValue::from_str(&format!("Bearer {token}")) {
        Ok(mut value) => {
            value.set_sensitive(true);
            Some(value)
        }
        Err(_) => {
            warn!("Token contains characters not allowed in a header; requests will be unauthenticated");
            None
        }
    }
}

fn persist(result: Result<(), StoreError>, key: &str) {
    if let Err(err) = result {
        warn!("Failed to persist {key}: {err}");
    }
}
