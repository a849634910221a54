use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use balacare_db::Database;
use balacare_feed::Dispatcher;
use balacare_types::events::ChangeEvent;
use balacare_types::models::Message;

use crate::reactions::{self, ReactionSummary};
use crate::{Auth, EngineError};

/// Lifecycle of one open conversation view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// History fetch in flight; the view shows a loading indicator.
    Loading,
    /// History loaded, feed subscription active.
    Live,
    /// Subscription released, state discarded. Reopen to re-enter Loading.
    Closed,
}

/// What one applied change did to the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamUpdate {
    /// A new message was appended; scroll to latest.
    Appended(Uuid),
    /// Reaction summaries were recomputed.
    ReactionsRefreshed,
    /// The whole view was rebuilt after the feed lagged.
    Reloaded,
    /// Duplicate delivery or an event scoped to another conversation.
    Ignored,
}

/// Live, per-conversation ordered message list with reaction summaries.
///
/// One change-feed subscription covers both concerns: message inserts scoped
/// to this conversation are appended in place, and any reaction change
/// anywhere triggers a full recompute of this conversation's summaries.
/// Recomputing wholesale instead of patching incrementally trades work for
/// consistency; partial patches are where stale-state bugs live.
///
/// Exclusive ownership (`&mut self` on every merge path) means a slow refresh
/// can never overwrite the result of a newer one.
#[derive(Debug)]
pub struct LiveStream {
    conversation_id: Uuid,
    viewer: Uuid,
    messages: Vec<Message>,
    summaries: HashMap<Uuid, ReactionSummary>,
    events: Option<broadcast::Receiver<ChangeEvent>>,
    state: StreamState,
}

impl LiveStream {
    /// Open a conversation: subscribe first, then load history, so no insert
    /// can fall into the gap between the snapshot and the live feed.
    pub fn open(
        db: &Database,
        feed: &Dispatcher,
        auth: &Auth,
        conversation_id: Uuid,
    ) -> Result<Self, EngineError> {
        let session = auth.require()?;
        let events = feed.subscribe();

        let mut stream = Self {
            conversation_id,
            viewer: session.user_id,
            messages: Vec::new(),
            summaries: HashMap::new(),
            events: Some(events),
            state: StreamState::Loading,
        };
        stream.reload(db)?;
        stream.state = StreamState::Live;

        info!(
            "conversation {} live with {} messages",
            conversation_id,
            stream.messages.len()
        );
        Ok(stream)
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn conversation_id(&self) -> Uuid {
        self.conversation_id
    }

    /// Messages in server creation order, oldest first.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Reaction summary for one message, if it has any reactions.
    pub fn reactions(&self, message_id: Uuid) -> Option<&ReactionSummary> {
        self.summaries.get(&message_id)
    }

    /// Wait for the next feed event and merge it into the view.
    pub async fn next_change(&mut self, db: &Database) -> Result<StreamUpdate, EngineError> {
        let events = self.events.as_mut().ok_or(EngineError::StreamClosed)?;
        match events.recv().await {
            Ok(event) => self.apply(db, event),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!(
                    "feed lagged by {} events, reloading conversation {}",
                    missed, self.conversation_id
                );
                self.reload(db)?;
                Ok(StreamUpdate::Reloaded)
            }
            Err(broadcast::error::RecvError::Closed) => {
                self.close();
                Err(EngineError::StreamClosed)
            }
        }
    }

    /// Merge one feed event. Exposed for callers driving their own receive
    /// loop.
    pub fn apply(&mut self, db: &Database, event: ChangeEvent) -> Result<StreamUpdate, EngineError> {
        if self.state != StreamState::Live {
            return Err(EngineError::StreamClosed);
        }

        match event {
            ChangeEvent::MessageInsert {
                id,
                conversation_id,
                sender_id,
                content,
                created_at,
            } => {
                if conversation_id != self.conversation_id {
                    return Ok(StreamUpdate::Ignored);
                }
                // the feed is at-least-once; appends are keyed by id
                if self.messages.iter().any(|m| m.id == id) {
                    warn!("duplicate delivery of message {}, dropping", id);
                    return Ok(StreamUpdate::Ignored);
                }
                self.messages.push(Message {
                    id,
                    conversation_id,
                    sender_id,
                    content,
                    is_read: false,
                    created_at,
                });
                Ok(StreamUpdate::Appended(id))
            }
            ChangeEvent::ReactionAdd { .. } | ChangeEvent::ReactionRemove { .. } => {
                // reaction events are system-wide; recompute this
                // conversation's summaries wholesale
                self.refresh_reactions(db)?;
                Ok(StreamUpdate::ReactionsRefreshed)
            }
        }
    }

    /// Send a message to this conversation.
    ///
    /// The caller clears its input immediately, but the message is not
    /// appended locally: it shows up when the insert event echoes back
    /// through the feed. A slow feed therefore shows a gap between the tap
    /// and the bubble. Sending also bumps the conversation's activity
    /// timestamp so the directory reorders.
    pub fn send_message(
        &self,
        db: &Database,
        feed: &Dispatcher,
        auth: &Auth,
        text: &str,
    ) -> Result<Uuid, EngineError> {
        let session = auth.require()?;
        let content = text.trim();
        if content.is_empty() {
            return Err(EngineError::Validation("message must not be empty"));
        }

        let message = Message {
            id: Uuid::new_v4(),
            conversation_id: self.conversation_id,
            sender_id: session.user_id,
            content: content.to_string(),
            is_read: false,
            created_at: Utc::now(),
        };
        db.insert_message(&message)?;
        db.touch_conversation(self.conversation_id, message.created_at)?;

        feed.publish(ChangeEvent::MessageInsert {
            id: message.id,
            conversation_id: message.conversation_id,
            sender_id: message.sender_id,
            content: message.content,
            created_at: message.created_at,
        });
        Ok(message.id)
    }

    /// Release the feed subscription and discard the view state.
    pub fn close(&mut self) {
        if self.events.take().is_some() {
            info!("conversation {} stream closed", self.conversation_id);
        }
        self.state = StreamState::Closed;
        self.messages.clear();
        self.summaries.clear();
    }

    /// Full rebuild: history ascending plus one summarization pass.
    fn reload(&mut self, db: &Database) -> Result<(), EngineError> {
        let messages = db.list_messages(self.conversation_id)?;
        let ids: Vec<Uuid> = messages.iter().map(|m| m.id).collect();
        let rows = db.list_reactions_for_messages(&ids)?;

        self.messages = messages;
        self.summaries = reactions::summarize(self.viewer, &rows);
        Ok(())
    }

    /// Recompute reaction summaries for the current message list.
    fn refresh_reactions(&mut self, db: &Database) -> Result<(), EngineError> {
        let ids: Vec<Uuid> = self.messages.iter().map(|m| m.id).collect();
        let rows = db.list_reactions_for_messages(&ids)?;
        self.summaries = reactions::summarize(self.viewer, &rows);
        Ok(())
    }
}
