use rusqlite::Connection;
use tracing::info;

use crate::Result;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS profiles (
            id          BLOB PRIMARY KEY,
            full_name   TEXT,
            avatar_url  TEXT,
            role        TEXT NOT NULL DEFAULT 'parent',
            bio         TEXT,
            city        TEXT,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS posts (
            id              BLOB PRIMARY KEY,
            author_id       BLOB NOT NULL REFERENCES profiles(id),
            content         TEXT NOT NULL,
            like_count      INTEGER NOT NULL DEFAULT 0,
            comment_count   INTEGER NOT NULL DEFAULT 0,
            created_at      TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_posts_created
            ON posts(created_at);

        CREATE TABLE IF NOT EXISTS comments (
            id          BLOB PRIMARY KEY,
            post_id     BLOB NOT NULL REFERENCES posts(id),
            parent_id   BLOB,
            author_id   BLOB NOT NULL REFERENCES profiles(id),
            content     TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_comments_post
            ON comments(post_id, created_at);

        CREATE TABLE IF NOT EXISTS likes (
            post_id     BLOB NOT NULL REFERENCES posts(id),
            user_id     BLOB NOT NULL REFERENCES profiles(id),
            created_at  TEXT NOT NULL,
            PRIMARY KEY (post_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS conversations (
            id          BLOB PRIMARY KEY,
            pair_key    TEXT NOT NULL UNIQUE,
            updated_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS conversation_participants (
            conversation_id BLOB NOT NULL REFERENCES conversations(id),
            user_id         BLOB NOT NULL REFERENCES profiles(id),
            UNIQUE(conversation_id, user_id)
        );

        CREATE INDEX IF NOT EXISTS idx_participants_user
            ON conversation_participants(user_id);

        CREATE TABLE IF NOT EXISTS messages (
            id              BLOB PRIMARY KEY,
            conversation_id BLOB NOT NULL REFERENCES conversations(id),
            sender_id       BLOB NOT NULL REFERENCES profiles(id),
            content         TEXT NOT NULL,
            is_read         INTEGER NOT NULL DEFAULT 0,
            created_at      TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_conversation
            ON messages(conversation_id, created_at);

        CREATE TABLE IF NOT EXISTS reactions (
            id          BLOB PRIMARY KEY,
            message_id  BLOB NOT NULL REFERENCES messages(id),
            user_id     BLOB NOT NULL REFERENCES profiles(id),
            emoji       TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            UNIQUE(message_id, user_id, emoji)
        );

        CREATE INDEX IF NOT EXISTS idx_reactions_message
            ON reactions(message_id);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
