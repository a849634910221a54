use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Row-level change events delivered over the change feed.
///
/// Delivery is at-least-once: consumers must tolerate seeing the same insert
/// twice and must key any merge by the row id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ChangeEvent {
    /// A new message row was inserted.
    MessageInsert {
        id: Uuid,
        conversation_id: Uuid,
        sender_id: Uuid,
        content: String,
        created_at: DateTime<Utc>,
    },

    /// A reaction row was inserted.
    ReactionAdd {
        message_id: Uuid,
        user_id: Uuid,
        emoji: String,
    },

    /// A reaction row was deleted.
    ReactionRemove {
        message_id: Uuid,
        user_id: Uuid,
        emoji: String,
    },
}

impl ChangeEvent {
    /// Returns the conversation this event is scoped to.
    ///
    /// Reaction events return `None`: the feed does not resolve which
    /// conversation a reacted message belongs to, so they are delivered
    /// system-wide and every open stream re-checks its own messages.
    pub fn conversation_id(&self) -> Option<Uuid> {
        match self {
            Self::MessageInsert {
                conversation_id, ..
            } => Some(*conversation_id),
            Self::ReactionAdd { .. } | Self::ReactionRemove { .. } => None,
        }
    }
}
