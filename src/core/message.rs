use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::HistoryEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn is_user(self) -> bool {
        self == Role::User
    }

    pub fn is_assistant(self) -> bool {
        self == Role::Assistant
    }

    /// The role expected to follow this one in a paired transcript.
    pub fn next_turn(self) -> Self {
        match self {
            Role::User => Role::Assistant,
            Role::Assistant => Role::User,
        }
    }
}

impl AsRef<str> for Role {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl PartialEq<&str> for Role {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl TryFrom<&str> for Role {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            _ => Err(format!("invalid message role: {value}")),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl From<Role> for String {
    fn from(value: Role) -> Self {
        value.as_str().to_string()
    }
}

/// Where a message stands relative to the backend.
///
/// User messages are appended as `Pending` before the backend has seen
/// them, then settle to `Committed` or `Failed` once the send completes.
/// Messages loaded from history and assistant replies are always
/// `Committed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Committed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    pub status: DeliveryStatus,
}

impl Message {
    pub fn is_user(&self) -> bool {
        self.role.is_user()
    }

    pub fn is_assistant(&self) -> bool {
        self.role.is_assistant()
    }

    pub fn is_pending(&self) -> bool {
        self.status == DeliveryStatus::Pending
    }

    pub fn is_failed(&self) -> bool {
        self.status == DeliveryStatus::Failed
    }
}

/// Hands out message ids that stay unique for the lifetime of a manager,
/// no matter how quickly messages are appended.
#[derive(Debug, Default)]
pub struct MessageIds {
    next: u64,
}

impl MessageIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> String {
        self.next += 1;
        format!("msg-{}", self.next)
    }

    pub fn user(&mut self, content: impl Into<String>, model_id: Option<String>) -> Message {
        Message {
            id: self.next_id(),
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
            model_id,
            status: DeliveryStatus::Pending,
        }
    }

    pub fn assistant(&mut self, content: impl Into<String>, model_id: Option<String>) -> Message {
        Message {
            id: self.next_id(),
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
            model_id,
            status: DeliveryStatus::Committed,
        }
    }

    /// Convert a backend history listing into committed messages.
    ///
    /// The backend stores turns in user/assistant pairs and older servers
    /// omit the role field, so a missing or unrecognised role continues the
    /// alternation from the previous entry.
    pub fn history_messages(&mut self, entries: Vec<HistoryEntry>) -> Vec<Message> {
        let mut expected = Role::User;
        let now = Utc::now();
        entries
            .into_iter()
            .map(|entry| {
                let role = entry
                    .role
                    .as_deref()
                    .and_then(|role| Role::try_from(role).ok())
                    .unwrap_or(expected);
                expected = role.next_turn();
                Message {
                    id: self.next_id(),
                    role,
                    content: entry.message,
                    timestamp: now,
                    model_id: entry.model_id,
                    status: DeliveryStatus::Committed,
                }
            })
            .collect()
    }
}
