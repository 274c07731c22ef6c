use serde::{Deserialize, Serialize};

pub mod auth;
pub mod chat;
pub mod client;
pub mod models;

pub use chat::ChatBackend;
pub use client::{ApiClient, ApiError, ApiSettings};

#[derive(Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub message: String,
    pub session_id: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub model_id: Option<String>,
}

/// One turn as returned by the history endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(default)]
    pub role: Option<String>,
    pub message: String,
    #[serde(default)]
    pub model_id: Option<String>,
}

/// Structured error body the backend attaches to rejected requests.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorPayload {
    #[serde(default)]
    pub message: Option<String>,
}
