//! Chat sessions, the active-session pointer, and the visible message log.

use std::error::Error as StdError;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::client::ApiError;

pub mod manager;
pub mod registry;


pub use manager::{PendingSend, SessionManager};
pub use registry::ModelRegistry;

pub const NEW_SESSION_TITLE: &str = "New Chat";

/// Placeholder ids carry this prefix until the backend confirms them.
pub const PLACEHOLDER_PREFIX: &str = "local-";

const TITLE_MAX_CHARS: usize = 40;

/// Where a session stands relative to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Created locally under a placeholder id the backend has not seen.
    Pending,
    /// A first send is in flight; the backend will confirm the real id.
    Confirming,
    /// Known to the backend under `id`.
    Active,
}

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: String,
    pub title: String,
    pub selected_model: String,
    pub last_updated: DateTime<Utc>,
    pub state: SessionState,
}

impl Session {
    pub fn placeholder(id: String, selected_model: String) -> Self {
        Self {
            id,
            title: NEW_SESSION_TITLE.to_string(),
            selected_model,
            last_updated: Utc::now(),
            state: SessionState::Pending,
        }
    }

    /// A session the backend listed. Its title is not known, so the id
    /// stands in until a message gives it a better one.
    pub fn discovered(id: String, selected_model: String) -> Self {
        Self {
            title: id.clone(),
            id,
            selected_model,
            last_updated: Utc::now(),
            state: SessionState::Active,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.state == SessionState::Active
    }

    pub fn touch(&mut self) {
        self.last_updated = Utc::now();
    }

    /// Name a fresh session after its first message.
    pub fn title_from(&mut self, content: &str) {
        if self.title != NEW_SESSION_TITLE {
            return;
        }
        let line = content.lines().next().unwrap_or_default().trim();
        if line.is_empty() {
            return;
        }
        let mut title: String = line.chars().take(TITLE_MAX_CHARS).collect();
        if line.chars().count() > TITLE_MAX_CHARS {
            title.push('…');
        }
        self.title = title;
    }
}

#[derive(Debug)]
pub enum SessionError {
    Api(ApiError),
    UnknownSession(String),
    /// The session was deleted; deleted ids are never reused.
    Deleted(String),
    /// The session is waiting for the backend to confirm its id.
    Confirming(String),
    UnknownModel(String),
}

impl SessionError {
    pub fn api(&self) -> Option<&ApiError> {
        match self {
            SessionError::Api(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Api(err) => write!(f, "{err}"),
            SessionError::UnknownSession(id) => write!(f, "No session with id '{id}'"),
            SessionError::Deleted(id) => write!(f, "Session '{id}' has been deleted"),
            SessionError::Confirming(id) => {
                write!(f, "Session '{id}' is still waiting for the server to confirm it")
            }
            SessionError::UnknownModel(model) => write!(f, "Model '{model}' is not available"),
        }
    }
}

impl StdError for SessionError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            SessionError::Api(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ApiError> for SessionError {
    fn from(err: ApiError) -> Self {
        SessionError::Api(err)
    }
}

/// A fresh placeholder id. Random so ids from separate runs never collide.
pub fn placeholder_id() -> String {
    let mut bytes = [0_u8; 8];
    if getrandom::fill(&mut bytes).is_err() {
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        bytes = nanos.to_le_bytes();
    }
    let hex: String = bytes.iter().map(|byte| format!("{byte:02x}")).collect();
    format!("{PLACEHOLDER_PREFIX}{hex}")
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn placeholder_ids_are_prefixed_and_distinct() {
        let a = placeholder_id();
        let b = placeholder_id();
        assert!(a.starts_with(PLACEHOLDER_PREFIX));
        assert_eq!(a.len(), PLACEHOLDER_PREFIX.len() + 16);
        assert_ne!(a, b);
    }

    #[test]
    fn title_comes_from_first_line_and_is_truncated() {
        let mut session = Session::placeholder("local-1".to_string(), "qwen3".to_string());
        session.title_from("   \nignored");
        assert_eq!(session.title, NEW_SESSION_TITLE);

        session.title_from("Explain the borrow checker to me like I am five years old please");
        assert_eq!(session.title.chars().count(), TITLE_MAX_CHARS + 1);
        assert!(session.title.ends_with('…'));

        // Only the first message names the session
        session.title_from("second message");
        assert!(session.title.starts_with("Explain"));
    }
}
