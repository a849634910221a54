use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Structured failures from the relational store.
///
/// `UniqueViolation` is load-bearing: callers branch on it to turn a repeated
/// reaction insert into a delete and a duplicate conversation create into a
/// lookup of the existing row.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An insert hit a UNIQUE or PRIMARY KEY constraint.
    #[error("unique constraint violated")]
    UniqueViolation,

    /// The targeted row does not exist.
    #[error("row not found")]
    NotFound,

    /// The connection mutex was poisoned by a panicking holder.
    #[error("database lock poisoned")]
    LockPoisoned,

    #[error(transparent)]
    Sqlite(rusqlite::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(e, _) = &err {
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
            {
                return Self::UniqueViolation;
            }
        }
        Self::Sqlite(err)
    }
}
