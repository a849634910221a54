use std::collections::{HashMap, HashSet};

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use balacare_db::{Database, StoreError};
use balacare_feed::Dispatcher;
use balacare_types::events::ChangeEvent;
use balacare_types::models::Reaction;

use crate::{Auth, EngineError};

/// Aggregated view of one message's reactions: emoji to count, plus which
/// emojis the viewer contributed (for highlighting). Recomputed from the raw
/// rows on every refresh, never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReactionSummary {
    counts: HashMap<String, usize>,
    viewer_emojis: HashSet<String>,
}

impl ReactionSummary {
    pub fn count(&self, emoji: &str) -> usize {
        self.counts.get(emoji).copied().unwrap_or(0)
    }

    pub fn counts(&self) -> impl Iterator<Item = (&str, usize)> {
        self.counts.iter().map(|(emoji, &n)| (emoji.as_str(), n))
    }

    pub fn viewer_reacted(&self, emoji: &str) -> bool {
        self.viewer_emojis.contains(emoji)
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// Group raw reaction rows by message. Aggregation is order-independent:
/// only the counts matter, not the sequence the rows arrived in.
pub fn summarize(viewer: Uuid, rows: &[Reaction]) -> HashMap<Uuid, ReactionSummary> {
    let mut map: HashMap<Uuid, ReactionSummary> = HashMap::new();
    for row in rows {
        let summary = map.entry(row.message_id).or_default();
        *summary.counts.entry(row.emoji.clone()).or_insert(0) += 1;
        if row.user_id == viewer {
            summary.viewer_emojis.insert(row.emoji.clone());
        }
    }
    map
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Added,
    Removed,
}

/// Toggle `emoji` on a message for the signed-in user.
///
/// The insert is attempted first; the unique constraint on
/// (message, user, emoji) turns a repeat into a conflict, which is consumed
/// here as a delete. The conflict never reaches the caller.
pub fn toggle_reaction(
    db: &Database,
    feed: &Dispatcher,
    auth: &Auth,
    message_id: Uuid,
    emoji: &str,
) -> Result<ToggleOutcome, EngineError> {
    let session = auth.require()?;
    if emoji.trim().is_empty() {
        return Err(EngineError::Validation("reaction emoji must not be empty"));
    }

    let reaction = Reaction {
        id: Uuid::new_v4(),
        message_id,
        user_id: session.user_id,
        emoji: emoji.to_string(),
        created_at: Utc::now(),
    };

    match db.insert_reaction(&reaction) {
        Ok(()) => {
            feed.publish(ChangeEvent::ReactionAdd {
                message_id,
                user_id: session.user_id,
                emoji: emoji.to_string(),
            });
            Ok(ToggleOutcome::Added)
        }
        Err(StoreError::UniqueViolation) => {
            debug!(
                "reaction {} by {} on {} already present, toggling off",
                emoji, session.user_id, message_id
            );
            let removed = db.delete_reaction(message_id, session.user_id, emoji)?;
            if removed {
                // confirmed gone; only now tell the feed
                feed.publish(ChangeEvent::ReactionRemove {
                    message_id,
                    user_id: session.user_id,
                    emoji: emoji.to_string(),
                });
            }
            Ok(ToggleOutcome::Removed)
        }
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reaction(message: Uuid, user: Uuid, emoji: &str) -> Reaction {
        Reaction {
            id: Uuid::new_v4(),
            message_id: message,
            user_id: user,
            emoji: emoji.into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn summarize_counts_per_emoji() {
        let m1 = Uuid::new_v4();
        let u1 = Uuid::new_v4();
        let u2 = Uuid::new_v4();

        let rows = vec![
            reaction(m1, u1, "❤️"),
            reaction(m1, u2, "❤️"),
            reaction(m1, u1, "🔥"),
        ];

        let summaries = summarize(u1, &rows);
        let summary = &summaries[&m1];
        assert_eq!(summary.count("❤️"), 2);
        assert_eq!(summary.count("🔥"), 1);
        assert_eq!(summary.count("👍"), 0);
    }

    #[test]
    fn summarize_marks_viewer_emojis() {
        let m1 = Uuid::new_v4();
        let viewer = Uuid::new_v4();
        let other = Uuid::new_v4();

        let rows = vec![reaction(m1, viewer, "❤️"), reaction(m1, other, "🔥")];

        let summaries = summarize(viewer, &rows);
        let summary = &summaries[&m1];
        assert!(summary.viewer_reacted("❤️"));
        assert!(!summary.viewer_reacted("🔥"));
    }

    #[test]
    fn summarize_is_order_independent() {
        let m1 = Uuid::new_v4();
        let u1 = Uuid::new_v4();
        let u2 = Uuid::new_v4();

        let mut rows = vec![
            reaction(m1, u1, "❤️"),
            reaction(m1, u2, "❤️"),
            reaction(m1, u1, "🔥"),
        ];
        let forward = summarize(u1, &rows);
        rows.reverse();
        let backward = summarize(u1, &rows);

        assert_eq!(forward, backward);
    }

    #[test]
    fn summarize_groups_by_message() {
        let m1 = Uuid::new_v4();
        let m2 = Uuid::new_v4();
        let u1 = Uuid::new_v4();

        let rows = vec![reaction(m1, u1, "❤️"), reaction(m2, u1, "❤️")];

        let summaries = summarize(u1, &rows);
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[&m1].count("❤️"), 1);
        assert_eq!(summaries[&m2].count("❤️"), 1);
    }
}
