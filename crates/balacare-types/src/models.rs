use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Public identity of a user, shown next to posts, comments and chats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub role: ProfileRole,
    pub bio: Option<String>,
    pub city: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileRole {
    Parent,
    Specialist,
    Admin,
}

impl ProfileRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parent => "parent",
            Self::Specialist => "specialist",
            Self::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "parent" => Some(Self::Parent),
            "specialist" => Some(Self::Specialist),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

/// A community feed post. `like_count` and `comment_count` are stored
/// aggregates; `viewer_has_liked` is derived per viewer at query time and
/// never stored globally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub like_count: i64,
    pub comment_count: i64,
    pub viewer_has_liked: bool,
    pub created_at: DateTime<Utc>,
}

/// One comment on a post. `parent_id` is `None` for a root comment; the
/// parent graph forms a forest, reply depth is unbounded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub author_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A one-to-one message thread, identified independently of any message.
/// `updated_at` is the last-activity timestamp driving directory order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    /// Sender-local display flag only; never drives any logic.
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// A single raw reaction row. The store enforces at most one row per
/// (message, user, emoji) triple.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reaction {
    pub id: Uuid,
    pub message_id: Uuid,
    pub user_id: Uuid,
    pub emoji: String,
    pub created_at: DateTime<Utc>,
}
