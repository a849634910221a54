use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;
use uuid::Uuid;

use balacare_types::models::{Comment, Conversation, Message, Post, Profile, ProfileRole, Reaction};

use crate::error::{Result, StoreError};
use crate::Database;

impl Database {
    // -- Profiles --

    pub fn upsert_profile(&self, profile: &Profile) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO profiles (id, full_name, avatar_url, role, bio, city, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                     full_name = excluded.full_name,
                     avatar_url = excluded.avatar_url,
                     role = excluded.role,
                     bio = excluded.bio,
                     city = excluded.city",
                rusqlite::params![
                    profile.id,
                    profile.full_name,
                    profile.avatar_url,
                    profile.role.as_str(),
                    profile.bio,
                    profile.city,
                    profile.created_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_profile(&self, id: Uuid) -> Result<Option<Profile>> {
        self.with_conn(|conn| {
            let row = conn
                .prepare(
                    "SELECT id, full_name, avatar_url, role, bio, city, created_at
                     FROM profiles WHERE id = ?1",
                )?
                .query_row([id], profile_from_row)
                .optional()?;
            Ok(row)
        })
    }

    // -- Posts --

    pub fn insert_post(&self, post: &Post) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO posts (id, author_id, content, like_count, comment_count, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    post.id,
                    post.author_id,
                    post.content,
                    post.like_count,
                    post.comment_count,
                    post.created_at,
                ],
            )?;
            Ok(())
        })
    }

    /// Feed query, newest first. `viewer` resolves the per-viewer liked flag;
    /// `None` (signed out) marks nothing as liked.
    pub fn list_posts(&self, viewer: Option<Uuid>) -> Result<Vec<Post>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT p.id, p.author_id, p.content, p.like_count, p.comment_count,
                        p.created_at, l.user_id IS NOT NULL
                 FROM posts p
                 LEFT JOIN likes l ON l.post_id = p.id AND l.user_id = ?1
                 ORDER BY p.created_at DESC, p.id",
            )?;

            let rows = stmt
                .query_map([viewer], post_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_post(&self, id: Uuid, viewer: Option<Uuid>) -> Result<Option<Post>> {
        self.with_conn(|conn| {
            let row = conn
                .prepare(
                    "SELECT p.id, p.author_id, p.content, p.like_count, p.comment_count,
                            p.created_at, l.user_id IS NOT NULL
                     FROM posts p
                     LEFT JOIN likes l ON l.post_id = p.id AND l.user_id = ?2
                     WHERE p.id = ?1",
                )?
                .query_row(rusqlite::params![id, viewer], post_from_row)
                .optional()?;
            Ok(row)
        })
    }

    pub fn set_post_like_count(&self, post_id: Uuid, like_count: i64) -> Result<()> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE posts SET like_count = ?2 WHERE id = ?1",
                rusqlite::params![post_id, like_count],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
    }

    pub fn bump_comment_count(&self, post_id: Uuid) -> Result<()> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE posts SET comment_count = comment_count + 1 WHERE id = ?1",
                [post_id],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
    }

    // -- Likes --

    pub fn like_exists(&self, post_id: Uuid, user_id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let row: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM likes WHERE post_id = ?1 AND user_id = ?2",
                    rusqlite::params![post_id, user_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(row.is_some())
        })
    }

    pub fn insert_like(&self, post_id: Uuid, user_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO likes (post_id, user_id, created_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![post_id, user_id, at],
            )?;
            Ok(())
        })
    }

    pub fn delete_like(&self, post_id: Uuid, user_id: Uuid) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM likes WHERE post_id = ?1 AND user_id = ?2",
                rusqlite::params![post_id, user_id],
            )?;
            Ok(())
        })
    }

    pub fn count_likes(&self, post_id: Uuid) -> Result<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM likes WHERE post_id = ?1",
                [post_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    // -- Comments --

    pub fn insert_comment(&self, comment: &Comment) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO comments (id, post_id, parent_id, author_id, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    comment.id,
                    comment.post_id,
                    comment.parent_id,
                    comment.author_id,
                    comment.content,
                    comment.created_at,
                ],
            )?;
            Ok(())
        })
    }

    /// All comments for a post, ascending by creation time. The flat order is
    /// what the tree builder relies on for sibling ordering.
    pub fn list_comments_for_post(&self, post_id: Uuid) -> Result<Vec<Comment>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, post_id, parent_id, author_id, content, created_at
                 FROM comments
                 WHERE post_id = ?1
                 ORDER BY created_at ASC, id",
            )?;

            let rows = stmt
                .query_map([post_id], comment_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Conversations --

    /// Create a one-to-one conversation between `a` and `b`.
    ///
    /// The canonical pair key carries a UNIQUE constraint, so a second create
    /// for the same pair fails with `UniqueViolation` regardless of argument
    /// order; callers resolve that to the existing conversation.
    pub fn create_conversation(
        &self,
        id: Uuid,
        a: Uuid,
        b: Uuid,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute(
                "INSERT INTO conversations (id, pair_key, updated_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![id, pair_key(a, b), at],
            )?;
            tx.execute(
                "INSERT INTO conversation_participants (conversation_id, user_id) VALUES (?1, ?2)",
                rusqlite::params![id, a],
            )?;
            tx.execute(
                "INSERT INTO conversation_participants (conversation_id, user_id) VALUES (?1, ?2)",
                rusqlite::params![id, b],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn find_conversation_by_pair(&self, a: Uuid, b: Uuid) -> Result<Option<Uuid>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id FROM conversations WHERE pair_key = ?1",
                    [pair_key(a, b)],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Conversations `user_id` participates in, most recently active first,
    /// each joined with the other participant's profile when it still exists.
    pub fn list_conversations_for(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<(Conversation, Option<Profile>)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.updated_at,
                        o.id, o.full_name, o.avatar_url, o.role, o.bio, o.city, o.created_at
                 FROM conversations c
                 JOIN conversation_participants me
                     ON me.conversation_id = c.id AND me.user_id = ?1
                 LEFT JOIN conversation_participants them
                     ON them.conversation_id = c.id AND them.user_id != ?1
                 LEFT JOIN profiles o ON o.id = them.user_id
                 ORDER BY c.updated_at DESC, c.id",
            )?;

            let rows = stmt
                .query_map([user_id], |row| {
                    let conversation = Conversation {
                        id: row.get(0)?,
                        updated_at: row.get(1)?,
                    };
                    let other = match row.get::<_, Option<Uuid>>(2)? {
                        Some(id) => Some(Profile {
                            id,
                            full_name: row.get(3)?,
                            avatar_url: row.get(4)?,
                            role: role_from_row(row, 5)?,
                            bio: row.get(6)?,
                            city: row.get(7)?,
                            created_at: row.get(8)?,
                        }),
                        None => None,
                    };
                    Ok((conversation, other))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn touch_conversation(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE conversations SET updated_at = ?2 WHERE id = ?1",
                rusqlite::params![id, at],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
    }

    // -- Messages --

    pub fn insert_message(&self, message: &Message) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, conversation_id, sender_id, content, is_read, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    message.id,
                    message.conversation_id,
                    message.sender_id,
                    message.content,
                    message.is_read,
                    message.created_at,
                ],
            )?;
            Ok(())
        })
    }

    /// Full history of one conversation, ascending by creation time.
    pub fn list_messages(&self, conversation_id: Uuid) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, conversation_id, sender_id, content, is_read, created_at
                 FROM messages
                 WHERE conversation_id = ?1
                 ORDER BY created_at ASC, id",
            )?;

            let rows = stmt
                .query_map([conversation_id], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Reactions --

    /// Insert a reaction row. A repeat of an existing (message, user, emoji)
    /// triple surfaces as `UniqueViolation`; the caller turns that into a
    /// delete. Deliberately not a toggle at this layer.
    pub fn insert_reaction(&self, reaction: &Reaction) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO reactions (id, message_id, user_id, emoji, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    reaction.id,
                    reaction.message_id,
                    reaction.user_id,
                    reaction.emoji,
                    reaction.created_at,
                ],
            )?;
            Ok(())
        })
    }

    /// Remove one (message, user, emoji) row. Returns whether a row was
    /// actually deleted.
    pub fn delete_reaction(&self, message_id: Uuid, user_id: Uuid, emoji: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM reactions WHERE message_id = ?1 AND user_id = ?2 AND emoji = ?3",
                rusqlite::params![message_id, user_id, emoji],
            )?;
            Ok(changed > 0)
        })
    }

    /// Batch-fetch reactions for a set of message ids.
    pub fn list_reactions_for_messages(&self, message_ids: &[Uuid]) -> Result<Vec<Reaction>> {
        if message_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (1..=message_ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT id, message_id, user_id, emoji, created_at
                 FROM reactions WHERE message_id IN ({})",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::types::ToSql> = message_ids
                .iter()
                .map(|id| id as &dyn rusqlite::types::ToSql)
                .collect();

            let rows = stmt
                .query_map(params.as_slice(), reaction_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

/// Canonical key for an unordered participant pair.
fn pair_key(a: Uuid, b: Uuid) -> String {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    format!("{}:{}", lo, hi)
}

fn profile_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Profile> {
    Ok(Profile {
        id: row.get(0)?,
        full_name: row.get(1)?,
        avatar_url: row.get(2)?,
        role: role_from_row(row, 3)?,
        bio: row.get(4)?,
        city: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn role_from_row(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<ProfileRole> {
    let raw: String = row.get(idx)?;
    ProfileRole::parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("unknown profile role: {raw}").into(),
        )
    })
}

fn post_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        author_id: row.get(1)?,
        content: row.get(2)?,
        like_count: row.get(3)?,
        comment_count: row.get(4)?,
        created_at: row.get(5)?,
        viewer_has_liked: row.get(6)?,
    })
}

fn comment_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        post_id: row.get(1)?,
        parent_id: row.get(2)?,
        author_id: row.get(3)?,
        content: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn message_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender_id: row.get(2)?,
        content: row.get(3)?,
        is_read: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn reaction_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Reaction> {
    Ok(Reaction {
        id: row.get(0)?,
        message_id: row.get(1)?,
        user_id: row.get(2)?,
        emoji: row.get(3)?,
        created_at: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use balacare_types::models::ProfileRole;

    fn profile(name: &str) -> Profile {
        Profile {
            id: Uuid::new_v4(),
            full_name: Some(name.into()),
            avatar_url: None,
            role: ProfileRole::Parent,
            bio: None,
            city: None,
            created_at: Utc::now(),
        }
    }

    fn setup_two_users(db: &Database) -> (Uuid, Uuid) {
        let a = profile("a");
        let b = profile("b");
        db.upsert_profile(&a).unwrap();
        db.upsert_profile(&b).unwrap();
        (a.id, b.id)
    }

    #[test]
    fn duplicate_reaction_reports_unique_violation() {
        let db = Database::open_in_memory().unwrap();
        let (a, b) = setup_two_users(&db);
        let conv = Uuid::new_v4();
        db.create_conversation(conv, a, b, Utc::now()).unwrap();

        let message = Message {
            id: Uuid::new_v4(),
            conversation_id: conv,
            sender_id: a,
            content: "hi".into(),
            is_read: false,
            created_at: Utc::now(),
        };
        db.insert_message(&message).unwrap();

        let reaction = Reaction {
            id: Uuid::new_v4(),
            message_id: message.id,
            user_id: b,
            emoji: "❤️".into(),
            created_at: Utc::now(),
        };
        db.insert_reaction(&reaction).unwrap();

        let repeat = Reaction {
            id: Uuid::new_v4(),
            ..reaction
        };
        assert!(matches!(
            db.insert_reaction(&repeat),
            Err(StoreError::UniqueViolation)
        ));
    }

    #[test]
    fn pair_key_is_order_independent() {
        let db = Database::open_in_memory().unwrap();
        let (a, b) = setup_two_users(&db);

        db.create_conversation(Uuid::new_v4(), a, b, Utc::now())
            .unwrap();

        // The same pair in the opposite order collides.
        assert!(matches!(
            db.create_conversation(Uuid::new_v4(), b, a, Utc::now()),
            Err(StoreError::UniqueViolation)
        ));
        assert!(db.find_conversation_by_pair(b, a).unwrap().is_some());
    }

    #[test]
    fn messages_come_back_ascending() {
        let db = Database::open_in_memory().unwrap();
        let (a, b) = setup_two_users(&db);
        let conv = Uuid::new_v4();
        db.create_conversation(conv, a, b, Utc::now()).unwrap();

        let base = Utc::now();
        for i in [2i64, 0, 1] {
            let message = Message {
                id: Uuid::new_v4(),
                conversation_id: conv,
                sender_id: a,
                content: format!("m{i}"),
                is_read: false,
                created_at: base + chrono::Duration::seconds(i),
            };
            db.insert_message(&message).unwrap();
        }

        let history = db.list_messages(conv).unwrap();
        let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["m0", "m1", "m2"]);
    }
}
