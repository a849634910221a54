/// Integration tests for the community feed: posts, like consistency,
/// comments and thread building against a real store.
use anyhow::Result;
use uuid::Uuid;

use balacare_db::Database;
use balacare_engine::comment_tree;
use balacare_engine::feed_view::{self, FeedView};
use balacare_engine::{Auth, EngineError};
use balacare_types::models::{Profile, ProfileRole};

fn profile(name: &str) -> Profile {
    Profile {
        id: Uuid::new_v4(),
        full_name: Some(name.into()),
        avatar_url: None,
        role: ProfileRole::Parent,
        bio: None,
        city: Some("Almaty".into()),
        created_at: chrono::Utc::now(),
    }
}

fn setup() -> (Database, Auth) {
    let db = Database::open_in_memory().unwrap();
    let author = profile("Elena");
    db.upsert_profile(&author).unwrap();
    (db, Auth::signed_in(author))
}

#[test]
fn feed_loads_newest_first_with_viewer_like_marks() -> Result<()> {
    let (db, elena) = setup();

    let first = feed_view::create_post(&db, &elena, "Looking for a speech therapist")?;
    let second = feed_view::create_post(&db, &elena, "Great session today!")?;
    feed_view::toggle_like(&db, &elena, first.id)?;

    let view = FeedView::load(&db, &elena)?;
    assert_eq!(view.posts().len(), 2);
    assert_eq!(view.posts()[0].id, second.id);
    assert_eq!(view.posts()[1].id, first.id);
    assert!(view.post(first.id).unwrap().viewer_has_liked);
    assert_eq!(view.post(first.id).unwrap().like_count, 1);

    // a signed-out visitor sees the count but no liked mark
    let anonymous = FeedView::load(&db, &Auth::SignedOut)?;
    assert_eq!(anonymous.post(first.id).unwrap().like_count, 1);
    assert!(!anonymous.post(first.id).unwrap().viewer_has_liked);
    Ok(())
}

#[test]
fn like_round_trip_confirms_count_before_applying() -> Result<()> {
    let (db, elena) = setup();
    let post = feed_view::create_post(&db, &elena, "Has anyone tried hippotherapy?")?;

    // five other parents like the post first
    for i in 0..5 {
        let parent = profile(&format!("parent {i}"));
        db.upsert_profile(&parent)?;
        feed_view::toggle_like(&db, &Auth::signed_in(parent), post.id)?;
    }

    let mut view = FeedView::load(&db, &elena)?;
    assert_eq!(view.post(post.id).unwrap().like_count, 5);

    let outcome = feed_view::toggle_like(&db, &elena, post.id)?;
    assert!(outcome.now_liked);
    assert_eq!(outcome.like_count, 6);
    view.apply_like_toggle(post.id, outcome.now_liked, outcome.like_count);
    assert_eq!(view.post(post.id).unwrap().like_count, 6);
    assert!(view.post(post.id).unwrap().viewer_has_liked);

    let outcome = feed_view::toggle_like(&db, &elena, post.id)?;
    assert!(!outcome.now_liked);
    assert_eq!(outcome.like_count, 5);
    view.apply_like_toggle(post.id, outcome.now_liked, outcome.like_count);
    assert_eq!(view.post(post.id).unwrap().like_count, 5);
    assert!(!view.post(post.id).unwrap().viewer_has_liked);
    Ok(())
}

#[test]
fn comments_build_a_thread_and_bump_the_counter() -> Result<()> {
    let (db, elena) = setup();
    let replier = profile("Aisha");
    db.upsert_profile(&replier)?;
    let aisha = Auth::signed_in(replier);

    let post = feed_view::create_post(&db, &elena, "Which kindergarten accepts ASD kids?")?;

    let root = feed_view::add_comment(&db, &elena, post.id, None, "We go to the one on Abay ave")?;
    let reply = feed_view::add_comment(&db, &aisha, post.id, Some(root.id), "How are the teachers?")?;
    let nested =
        feed_view::add_comment(&db, &elena, post.id, Some(reply.id), "Very patient with ours")?;

    let tree = comment_tree::load_thread(&db, post.id)?;
    assert_eq!(tree.len(), 3);

    let flat: Vec<(Uuid, usize)> = tree.walk().map(|(c, d)| (c.id, d)).collect();
    assert_eq!(flat, vec![(root.id, 0), (reply.id, 1), (nested.id, 2)]);

    // the stored aggregate moved with every insert
    let stored = db.get_post(post.id, None)?.unwrap();
    assert_eq!(stored.comment_count, 3);

    // and the in-memory view transition matches it
    let mut view = FeedView::load(&db, &elena)?;
    assert_eq!(view.post(post.id).unwrap().comment_count, 3);
    assert!(view.apply_comment_added(post.id));
    assert_eq!(view.post(post.id).unwrap().comment_count, 4);
    Ok(())
}

#[test]
fn thread_promotes_orphaned_replies_to_roots() -> Result<()> {
    let (db, elena) = setup();
    let post = feed_view::create_post(&db, &elena, "Sensory toys that worked for you?")?;

    feed_view::add_comment(&db, &elena, post.id, None, "Weighted blanket")?;
    // the parent this reply points at was never fetched for this post
    feed_view::add_comment(&db, &elena, post.id, Some(Uuid::new_v4()), "Seconding this")?;

    let tree = comment_tree::load_thread(&db, post.id)?;
    assert_eq!(tree.roots().len(), 2);
    assert_eq!(tree.walk().count(), 2);
    Ok(())
}

#[test]
fn writes_require_a_session_and_content() {
    let (db, elena) = setup();
    let post = feed_view::create_post(&db, &elena, "First post").unwrap();

    let err = feed_view::create_post(&db, &Auth::SignedOut, "hello").unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized));

    let err = feed_view::toggle_like(&db, &Auth::SignedOut, post.id).unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized));

    let err = feed_view::add_comment(&db, &elena, post.id, None, "  \n ").unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let err = feed_view::create_post(&db, &elena, "").unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    // nothing landed in the store
    let stored = db.get_post(post.id, None).unwrap().unwrap();
    assert_eq!(stored.comment_count, 0);
    assert_eq!(stored.like_count, 0);
}
