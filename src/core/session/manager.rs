use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use tracing::{debug, warn};

use super::{placeholder_id, ModelRegistry, Session, SessionError, SessionState};
use crate::api::client::ApiError;
use crate::api::{ChatBackend, ChatRequest, ChatResponse};
use crate::core::message::{DeliveryStatus, Message, MessageIds};

/// A send whose user message is already in the log, waiting for the
/// backend's answer. Produced by [`SessionManager::begin_send`] and settled
/// by [`SessionManager::complete_send`].
///
/// Dropping it unsettled abandons the send: a placeholder session it was
/// confirming becomes sendable and deletable again.
#[derive(Debug)]
pub struct PendingSend {
    session_id: String,
    message_id: String,
    request: ChatRequest,
    _in_flight: Option<Arc<()>>,
}

impl PendingSend {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn request(&self) -> &ChatRequest {
        &self.request
    }
}

/// The first send of a placeholder session. Alive while its `PendingSend` is.
struct InFlight {
    message_id: String,
    guard: Weak<()>,
}

/// Owns the session list, the active-session pointer, the message log of
/// the active session, and the model registry.
///
/// Operations that reach the backend take `&mut self`, so a manager runs
/// one operation at a time. Each one either commits its local changes after
/// the backend succeeds or leaves state as it was, with one exception: a
/// user message is shown before the backend acknowledges it and is marked
/// [`DeliveryStatus::Failed`] in place if the send fails.
pub struct SessionManager {
    backend: Arc<dyn ChatBackend>,
    sessions: Vec<Session>,
    active: Option<String>,
    messages: Vec<Message>,
    registry: ModelRegistry,
    configured_default: String,
    deleted: HashSet<String>,
    in_flight: HashMap<String, InFlight>,
    ids: MessageIds,
}

impl SessionManager {
    pub fn new(backend: Arc<dyn ChatBackend>, default_model: impl Into<String>) -> Self {
        let configured_default = default_model.into();
        Self {
            backend,
            sessions: Vec::new(),
            active: None,
            messages: Vec::new(),
            registry: ModelRegistry::new(configured_default.clone()),
            configured_default,
            deleted: HashSet::new(),
            in_flight: HashMap::new(),
            ids: MessageIds::new(),
        }
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn session(&self, id: &str) -> Option<&Session> {
        self.sessions.iter().find(|session| session.id == id)
    }

    pub fn active_session_id(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn active_session(&self) -> Option<&Session> {
        self.active.as_deref().and_then(|id| self.session(id))
    }

    /// The message log of the active session, oldest first.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn models(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn is_deleted(&self, id: &str) -> bool {
        self.deleted.contains(id)
    }

    fn position(&self, id: &str) -> Result<usize, SessionError> {
        if self.deleted.contains(id) {
            return Err(SessionError::Deleted(id.to_string()));
        }
        self.sessions
            .iter()
            .position(|session| session.id == id)
            .ok_or_else(|| SessionError::UnknownSession(id.to_string()))
    }

    pub async fn load_available_models(&mut self) -> Result<(), SessionError> {
        let models = self.backend.list_models().await?;
        debug!(count = models.len(), "loaded models");
        self.registry.replace(models);
        for session in &mut self.sessions {
            session.selected_model = self.registry.resolve(&session.selected_model);
        }
        Ok(())
    }

    /// Replace the session list with the backend's and open the first one.
    ///
    /// The first session's history is fetched before anything is committed,
    /// so a failure at either step leaves the previous state in place.
    /// Unconfirmed placeholders are dropped: the backend listing is the
    /// authoritative set.
    pub async fn load_sessions(&mut self) -> Result<(), SessionError> {
        let listed = self.backend.list_sessions().await?;
        let mut seen = HashSet::new();
        let ids: Vec<String> = listed
            .into_iter()
            .filter(|id| !self.deleted.contains(id) && seen.insert(id.clone()))
            .collect();

        let history = match ids.first() {
            Some(first) => Some(self.backend.fetch_history(first).await?),
            None => None,
        };

        let mut previous: HashMap<String, Session> = self
            .sessions
            .drain(..)
            .map(|session| (session.id.clone(), session))
            .collect();
        let default_model = self.registry.default_model().to_string();
        self.sessions = ids
            .iter()
            .map(|id| match previous.remove(id) {
                Some(mut session) => {
                    session.state = SessionState::Active;
                    session
                }
                None => Session::discovered(id.clone(), default_model.clone()),
            })
            .collect();
        self.in_flight.clear();

        match history {
            Some(entries) => {
                self.active = ids.first().cloned();
                self.messages = self.ids.history_messages(entries);
            }
            None => {
                self.active = None;
                self.messages.clear();
            }
        }
        debug!(count = self.sessions.len(), active = ?self.active, "loaded sessions");
        Ok(())
    }

    /// Show `id`. The log is emptied before the history request goes out and
    /// the pointer only moves once the history has arrived.
    pub async fn switch_session(&mut self, id: &str) -> Result<(), SessionError> {
        let index = self.position(id)?;
        self.messages.clear();

        // Placeholders have no remote history yet
        if self.sessions[index].is_confirmed() {
            let entries = self.backend.fetch_history(id).await?;
            self.messages = self.ids.history_messages(entries);
        }

        self.active = Some(id.to_string());
        Ok(())
    }

    /// Start a new conversation under a placeholder id and make it active.
    ///
    /// The backend learns about the session with its first message and may
    /// answer with a different id; see [`SessionManager::complete_send`].
    pub fn create_new_session(&mut self) -> &Session {
        let mut id = placeholder_id();
        while self.sessions.iter().any(|session| session.id == id) || self.deleted.contains(&id)
        {
            id = placeholder_id();
        }
        let session = Session::placeholder(id.clone(), self.registry.default_model().to_string());
        debug!(session = %id, "created session");
        self.sessions.insert(0, session);
        self.active = Some(id);
        self.messages.clear();
        &self.sessions[0]
    }

    /// Delete `id` remotely, then locally.
    ///
    /// If it was the active session, the pointer moves to the first remaining
    /// session, or to a brand-new session when none remain.
    pub async fn delete_session(&mut self, id: &str) -> Result<(), SessionError> {
        let index = self.position(id)?;
        self.release_abandoned(index);
        match self.sessions[index].state {
            SessionState::Confirming => return Err(SessionError::Confirming(id.to_string())),
            SessionState::Active => self.backend.delete_session(id).await?,
            SessionState::Pending => {}
        }

        self.sessions.remove(index);
        self.deleted.insert(id.to_string());
        debug!(session = %id, "deleted session");

        if self.active.as_deref() != Some(id) {
            return Ok(());
        }

        self.messages.clear();
        let next = self
            .sessions
            .first()
            .map(|session| (session.id.clone(), session.is_confirmed()));
        match next {
            Some((next_id, confirmed)) => {
                self.active = Some(next_id.clone());
                if confirmed {
                    // The delete itself succeeded; a failed refresh only
                    // leaves the log empty.
                    match self.backend.fetch_history(&next_id).await {
                        Ok(entries) => self.messages = self.ids.history_messages(entries),
                        Err(err) => warn!(session = %next_id, "Failed to load history: {err}"),
                    }
                }
            }
            None => {
                self.create_new_session();
            }
        }
        Ok(())
    }

    pub fn set_session_model(&mut self, id: &str, model: &str) -> Result<(), SessionError> {
        let index = self.position(id)?;
        if !self.registry.accepts(model) {
            return Err(SessionError::UnknownModel(model.to_string()));
        }
        self.sessions[index].selected_model = model.to_string();
        Ok(())
    }

    /// Send `content` to the active session (creating one if needed) and
    /// return the assistant's reply.
    pub async fn send_message(
        &mut self,
        content: &str,
        model_id: &str,
    ) -> Result<Message, SessionError> {
        let pending = self.begin_send(content, model_id)?;
        let result = self.backend.send_message(pending.request()).await;
        self.complete_send(pending, result)
    }

    /// First half of a send: append the user message as `Pending` and build
    /// the request. Nothing is sent.
    pub fn begin_send(&mut self, content: &str, model_id: &str) -> Result<PendingSend, SessionError> {
        if !self.registry.accepts(model_id) {
            return Err(SessionError::UnknownModel(model_id.to_string()));
        }

        let session_id = match self.active.clone() {
            Some(id) => id,
            None => self.create_new_session().id.clone(),
        };
        let index = self.position(&session_id)?;
        self.release_abandoned(index);

        let session = &mut self.sessions[index];
        let first_send = match session.state {
            SessionState::Confirming => return Err(SessionError::Confirming(session_id)),
            SessionState::Pending => {
                session.state = SessionState::Confirming;
                true
            }
            SessionState::Active => false,
        };
        session.selected_model = model_id.to_string();
        session.title_from(content);
        session.touch();

        let message = self.ids.user(content, Some(model_id.to_string()));
        let message_id = message.id.clone();
        self.messages.push(message);

        let in_flight = first_send.then(|| {
            let guard = Arc::new(());
            self.in_flight.insert(
                session_id.clone(),
                InFlight {
                    message_id: message_id.clone(),
                    guard: Arc::downgrade(&guard),
                },
            );
            guard
        });

        Ok(PendingSend {
            request: ChatRequest {
                message: content.to_string(),
                session_id: session_id.clone(),
                model_id: Some(model_id.to_string()),
            },
            session_id,
            message_id,
            _in_flight: in_flight,
        })
    }

    /// Second half of a send: settle the pending user message and, on
    /// success, reconcile the session id and append the reply.
    ///
    /// The log is only touched if it still holds the pending message, i.e.
    /// the user has not switched away in the meantime.
    pub fn complete_send(
        &mut self,
        pending: PendingSend,
        result: Result<ChatResponse, ApiError>,
    ) -> Result<Message, SessionError> {
        let PendingSend {
            session_id,
            message_id,
            request,
            _in_flight,
        } = pending;
        self.in_flight.remove(&session_id);
        let index = self
            .sessions
            .iter()
            .position(|session| session.id == session_id);

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                if let Some(session) = index.map(|i| &mut self.sessions[i]) {
                    if session.state == SessionState::Confirming {
                        session.state = SessionState::Pending;
                    }
                }
                self.set_status(&message_id, DeliveryStatus::Failed);
                return Err(err.into());
            }
        };

        if let Some(index) = index {
            let confirmed_id = match response.session_id.trim() {
                "" => session_id.clone(),
                id => id.to_string(),
            };
            self.confirm(index, &confirmed_id);
        }

        let model_id = response.model_id.or(request.model_id);
        let reply = self.ids.assistant(response.message, model_id);
        if self.set_status(&message_id, DeliveryStatus::Committed) {
            self.messages.push(reply.clone());
        }
        Ok(reply)
    }

    /// Forget all sessions, messages, and models. Used on logout; neither
    /// credentials nor the backend are touched.
    pub fn reset_state(&mut self) {
        self.sessions.clear();
        self.active = None;
        self.messages.clear();
        self.registry = ModelRegistry::new(self.configured_default.clone());
        self.deleted.clear();
        self.in_flight.clear();
    }

    /// Return a `Confirming` session whose `PendingSend` was dropped
    /// unsettled to `Pending`, marking its user message failed.
    fn release_abandoned(&mut self, index: usize) {
        if self.sessions[index].state != SessionState::Confirming {
            return;
        }
        let id = self.sessions[index].id.clone();
        let live = self
            .in_flight
            .get(&id)
            .is_some_and(|in_flight| in_flight.guard.strong_count() > 0);
        if live {
            return;
        }

        self.sessions[index].state = SessionState::Pending;
        if let Some(in_flight) = self.in_flight.remove(&id) {
            self.set_status(&in_flight.message_id, DeliveryStatus::Failed);
        }
        debug!(session = %id, "abandoned send released");
    }

    fn set_status(&mut self, message_id: &str, status: DeliveryStatus) -> bool {
        match self.messages.iter_mut().find(|message| message.id == message_id) {
            Some(message) => {
                message.status = status;
                true
            }
            None => false,
        }
    }

    /// Mark the session at `index` as known to the backend under
    /// `confirmed_id`, replacing its placeholder id everywhere.
    fn confirm(&mut self, index: usize, confirmed_id: &str) {
        let mut index = index;
        let placeholder = self.sessions[index].id.clone();
        // The backend handing out a deleted id means it exists again
        if self.deleted.remove(confirmed_id) {
            debug!(session = %confirmed_id, "deleted session id reused");
        }
        if placeholder != confirmed_id {
            if let Some(duplicate) = self
                .sessions
                .iter()
                .position(|session| session.id == confirmed_id)
            {
                self.sessions.remove(duplicate);
                if duplicate < index {
                    index -= 1;
                }
            }
            self.sessions[index].id = confirmed_id.to_string();
            if self.active.as_deref() == Some(placeholder.as_str()) {
                self.active = Some(confirmed_id.to_string());
            }
            debug!(placeholder = %placeholder, session = %confirmed_id, "session id confirmed");
        }
        let session = &mut self.sessions[index];
        session.state = SessionState::Active;
        session.touch();
    }
}
