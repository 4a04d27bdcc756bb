use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Typed by a participant
    User,
    /// Generated by the service (greeting, bid events)
    System,
}

/// One entry in a conversation's append-only log. Messages are never edited;
/// they are removed only when the whole conversation is cleaned up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub text: String,
    pub kind: MessageKind,

    /// Server-assigned, strictly increasing within a conversation
    pub timestamp: DateTime<Utc>,
}
