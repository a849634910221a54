pub mod error;
pub mod migrations;
pub mod queries;

pub use error::{Result, StoreError};

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::info;

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-process database for tests. WAL does not apply to `:memory:`.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        f(&conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reopen_preserves_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("balacare.db");

        let id = uuid::Uuid::new_v4();
        {
            let db = Database::open(&path).unwrap();
            let profile = balacare_types::models::Profile {
                id,
                full_name: Some("Aigerim".into()),
                avatar_url: None,
                role: balacare_types::models::ProfileRole::Parent,
                bio: None,
                city: Some("Almaty".into()),
                created_at: chrono::Utc::now(),
            };
            db.upsert_profile(&profile).unwrap();
        }

        let db = Database::open(&path).unwrap();
        let profile = db.get_profile(id).unwrap().unwrap();
        assert_eq!(profile.full_name.as_deref(), Some("Aigerim"));
    }
}
