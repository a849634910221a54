use balacare_db::StoreError;
use thiserror::Error;

/// Failure surface of every engine operation.
///
/// Nothing here is fatal to the process. The caller owns presentation:
/// `Validation` is surfaced inline, `Store` as a dismissible error with a
/// manual re-trigger (no operation retries automatically, so a send that may
/// already have landed is never re-issued).
#[derive(Debug, Error)]
pub enum EngineError {
    /// Rejected before any store call was issued.
    #[error("{0}")]
    Validation(&'static str),

    /// A write was attempted without a signed-in session.
    #[error("not signed in")]
    Unauthorized,

    /// The message stream is closed and can no longer deliver changes.
    #[error("message stream is closed")]
    StreamClosed,

    #[error(transparent)]
    Store(#[from] StoreError),
}
