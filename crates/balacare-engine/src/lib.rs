pub mod comment_tree;
pub mod directory;
pub mod error;
pub mod feed_view;
pub mod reactions;
pub mod session;
pub mod stream;

pub use error::EngineError;
pub use session::{Auth, Session};
