use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::Document;

/// Who produced a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Bot,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Bot => "bot",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message of a user's chat history, as materialized from a stored
/// document. Messages are immutable once written.
///
/// `timestamp` is assigned by the platform on create and is absent while the
/// write round-trip is still in flight, so readers must tolerate `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Document id. Assigned by the platform, not part of the stored fields.
    #[serde(default)]
    pub id: String,
    pub text: String,
    pub role: MessageRole,
    #[serde(default)]
    pub is_crisis: bool,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ChatMessage {
    /// Builds a message from a raw document, attaching the document's own id.
    pub fn from_document(doc: Document) -> Result<Self, serde_json::Error> {
        let mut message: ChatMessage = serde_json::from_value(doc.fields)?;
        message.id = doc.id;
        Ok(message)
    }
}

/// Profile record written once at registration, keyed 1:1 with the auth
/// account via `uid`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub created_at: DateTime<Utc>,
}

/// Identity reported by the authenticator on every auth-state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
}
