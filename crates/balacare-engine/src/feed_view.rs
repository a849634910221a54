use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use balacare_db::{Database, StoreError};
use balacare_types::models::{Comment, Post};

use crate::{Auth, EngineError};

/// In-memory post list for the community feed screen, owned by that screen.
///
/// Like and comment counters follow a two-phase contract: the mutation
/// round-trips to the store for the authoritative result first, then a pure
/// transition applies it here. The view never guesses a +1/-1 on its own, so
/// rapid double-taps cannot drift the count.
#[derive(Debug, Clone)]
pub struct FeedView {
    posts: Vec<Post>,
}

impl FeedView {
    /// Load the feed newest-first with the viewer's like marks resolved.
    /// Signed-out visitors can read; nothing is marked liked for them.
    pub fn load(db: &Database, auth: &Auth) -> Result<Self, EngineError> {
        let posts = db.list_posts(auth.user_id())?;
        Ok(Self { posts })
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn post(&self, id: Uuid) -> Option<&Post> {
        self.posts.iter().find(|p| p.id == id)
    }

    /// Apply a server-confirmed like toggle to one post. Sibling posts and
    /// list order are untouched. Returns false if the post is not in the
    /// view.
    pub fn apply_like_toggle(&mut self, post_id: Uuid, now_liked: bool, new_count: i64) -> bool {
        match self.posts.iter_mut().find(|p| p.id == post_id) {
            Some(post) => {
                post.like_count = new_count;
                post.viewer_has_liked = now_liked;
                true
            }
            None => false,
        }
    }

    /// One comment landed on `post_id`: bump its counter by exactly one.
    pub fn apply_comment_added(&mut self, post_id: Uuid) -> bool {
        match self.posts.iter_mut().find(|p| p.id == post_id) {
            Some(post) => {
                post.comment_count += 1;
                true
            }
            None => false,
        }
    }
}

/// Server-confirmed result of a like toggle, ready for
/// [`FeedView::apply_like_toggle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeOutcome {
    pub now_liked: bool,
    pub like_count: i64,
}

/// Toggle the signed-in user's like on a post.
///
/// Read-then-write against the like rows, then an authoritative recount that
/// is persisted on the post before being returned. Each tap round-trips; the
/// caller applies the confirmed pair to its view.
pub fn toggle_like(db: &Database, auth: &Auth, post_id: Uuid) -> Result<LikeOutcome, EngineError> {
    let session = auth.require()?;

    let now_liked = if db.like_exists(post_id, session.user_id)? {
        db.delete_like(post_id, session.user_id)?;
        false
    } else {
        match db.insert_like(post_id, session.user_id, Utc::now()) {
            Ok(()) => true,
            // the row landed between the check and the insert; already liked
            Err(StoreError::UniqueViolation) => {
                debug!("like for {} already present", post_id);
                true
            }
            Err(err) => return Err(err.into()),
        }
    };

    let like_count = db.count_likes(post_id)?;
    db.set_post_like_count(post_id, like_count)?;
    Ok(LikeOutcome {
        now_liked,
        like_count,
    })
}

/// Validate and store a new comment (a reply when `parent_id` is set),
/// bumping the post's stored comment counter. The caller applies
/// [`FeedView::apply_comment_added`] on success.
pub fn add_comment(
    db: &Database,
    auth: &Auth,
    post_id: Uuid,
    parent_id: Option<Uuid>,
    text: &str,
) -> Result<Comment, EngineError> {
    let session = auth.require()?;
    let content = text.trim();
    if content.is_empty() {
        return Err(EngineError::Validation("comment must not be empty"));
    }

    let comment = Comment {
        id: Uuid::new_v4(),
        post_id,
        parent_id,
        author_id: session.user_id,
        content: content.to_string(),
        created_at: Utc::now(),
    };
    db.insert_comment(&comment)?;
    db.bump_comment_count(post_id)?;
    Ok(comment)
}

/// Publish a new post to the community feed.
pub fn create_post(db: &Database, auth: &Auth, text: &str) -> Result<Post, EngineError> {
    let session = auth.require()?;
    let content = text.trim();
    if content.is_empty() {
        return Err(EngineError::Validation("post must not be empty"));
    }

    let post = Post {
        id: Uuid::new_v4(),
        author_id: session.user_id,
        content: content.to_string(),
        like_count: 0,
        comment_count: 0,
        viewer_has_liked: false,
        created_at: Utc::now(),
    };
    db.insert_post(&post)?;
    Ok(post)
}
