use async_trait::async_trait;

use crate::api::client::{ApiClient, ApiError};
use crate::api::models::fetch_models;
use crate::api::{ChatRequest, ChatResponse, HistoryEntry};
use crate::utils::url::encode_path_segment;

/// Root of the chat resource, relative to the service base URL.
pub const CHAT_ROOT: &str = "chat";

/// The backend operations the session manager depends on.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn list_models(&self) -> Result<Vec<String>, ApiError>;
    async fn list_sessions(&self) -> Result<Vec<String>, ApiError>;
    async fn fetch_history(&self, session_id: &str) -> Result<Vec<HistoryEntry>, ApiError>;
    async fn send_message(&self, request: &ChatRequest) -> Result<ChatResponse, ApiError>;
    async fn delete_session(&self, session_id: &str) -> Result<(), ApiError>;
}

pub fn chat_path(suffix: &str) -> String {
    if suffix.is_empty() {
        CHAT_ROOT.to_string()
    } else {
        format!("{CHAT_ROOT}/{suffix}")
    }
}

#[async_trait]
impl ChatBackend for ApiClient {
    async fn list_models(&self) -> Result<Vec<String>, ApiError> {
        fetch_models(self).await
    }

    async fn list_sessions(&self) -> Result<Vec<String>, ApiError> {
        self.get(&chat_path("sessions")).await
    }

    async fn fetch_history(&self, session_id: &str) -> Result<Vec<HistoryEntry>, ApiError> {
        let path = chat_path(&format!("history/{}", encode_path_segment(session_id)));
        self.get(&path).await
    }

    async fn send_message(&self, request: &ChatRequest) -> Result<ChatResponse, ApiError> {
        self.post(&chat_path(""), request).await
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), ApiError> {
        let path = chat_path(&format!("session/{}", encode_path_segment(session_id)));
        self.delete(&path).await
    }
}
