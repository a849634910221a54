use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use balacare_db::{Database, StoreError};
use balacare_types::models::Profile;

use crate::{Auth, EngineError};

/// One row of the chats screen: the conversation plus the counterpart's
/// public identity. `other` is `None` when the counterpart's profile row is
/// gone.
#[derive(Debug, Clone)]
pub struct ConversationEntry {
    pub id: Uuid,
    pub updated_at: DateTime<Utc>,
    pub other: Option<Profile>,
}

/// Conversations the signed-in user participates in, most recently active
/// first.
pub fn list_conversations(db: &Database, auth: &Auth) -> Result<Vec<ConversationEntry>, EngineError> {
    let session = auth.require()?;
    let rows = db.list_conversations_for(session.user_id)?;
    Ok(rows
        .into_iter()
        .map(|(conversation, other)| ConversationEntry {
            id: conversation.id,
            updated_at: conversation.updated_at,
            other,
        })
        .collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A fresh conversation was created for the pair.
    Created(Uuid),
    /// The pair already had one; it is reused.
    Existing(Uuid),
}

impl StartOutcome {
    pub fn conversation_id(&self) -> Uuid {
        match *self {
            Self::Created(id) | Self::Existing(id) => id,
        }
    }
}

/// Open the one-to-one conversation with `target`, creating it if the pair
/// has none yet.
///
/// Starting a conversation with yourself is rejected before any store call.
/// The unordered pair carries a uniqueness constraint, so two users tapping
/// "message" at the same moment race to a single row: the loser's create
/// conflicts and resolves to the winner's conversation.
pub fn start_conversation(
    db: &Database,
    auth: &Auth,
    target: Uuid,
) -> Result<StartOutcome, EngineError> {
    let session = auth.require()?;
    if target == session.user_id {
        return Err(EngineError::Validation(
            "cannot start a conversation with yourself",
        ));
    }

    let id = Uuid::new_v4();
    match db.create_conversation(id, session.user_id, target, Utc::now()) {
        Ok(()) => {
            info!("conversation {} created between {} and {}", id, session.user_id, target);
            Ok(StartOutcome::Created(id))
        }
        Err(StoreError::UniqueViolation) => {
            debug!("pair ({}, {}) already has a conversation", session.user_id, target);
            let existing = db
                .find_conversation_by_pair(session.user_id, target)?
                .ok_or(StoreError::NotFound)?;
            Ok(StartOutcome::Existing(existing))
        }
        Err(err) => Err(err.into()),
    }
}
