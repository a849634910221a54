use std::collections::{HashMap, HashSet};

use tracing::warn;
use uuid::Uuid;

use balacare_db::Database;
use balacare_types::models::Comment;

use crate::EngineError;

/// Index of a node inside its [`CommentTree`] arena.
pub type NodeId = usize;

/// The reply forest of one post.
///
/// Comments are stored in an arena in fetch order (ascending `created_at`);
/// children are kept as index lists bucketed by parent, so sibling order at
/// every level is the fetch order. Pure data, no rendering concern.
#[derive(Debug, Clone)]
pub struct CommentTree {
    comments: Vec<Comment>,
    children: Vec<Vec<NodeId>>,
    roots: Vec<NodeId>,
}

impl CommentTree {
    /// Build the forest from the flat rows of one post.
    ///
    /// A comment whose parent is not in the set (the parent was hidden after
    /// the reply landed) is promoted to a root rather than dropped. A parent
    /// cycle in corrupt data cannot hang the builder or its walk.
    pub fn build(comments: Vec<Comment>) -> Self {
        let index: HashMap<Uuid, NodeId> = comments
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id, i))
            .collect();

        let mut children: Vec<Vec<NodeId>> = vec![Vec::new(); comments.len()];
        let mut roots: Vec<NodeId> = Vec::new();

        for (i, comment) in comments.iter().enumerate() {
            match comment.parent_id {
                None => roots.push(i),
                Some(parent) => match index.get(&parent) {
                    Some(&p) if p != i => children[p].push(i),
                    _ => {
                        warn!(
                            "comment {} replies to missing parent {}, promoting to root",
                            comment.id, parent
                        );
                        roots.push(i);
                    }
                },
            }
        }

        Self {
            comments,
            children,
            roots,
        }
    }

    pub fn len(&self) -> usize {
        self.comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.children[id]
    }

    pub fn comment(&self, id: NodeId) -> &Comment {
        &self.comments[id]
    }

    /// Depth-first walk over the forest yielding `(node, depth)`.
    ///
    /// Iterative, and each node is visited at most once, so a cycle in the
    /// parent graph degrades to unreachable nodes instead of a hang.
    pub fn walk(&self) -> Walk<'_> {
        let mut stack: Vec<(NodeId, usize)> =
            self.roots.iter().rev().map(|&id| (id, 0)).collect();
        stack.reserve(self.comments.len().saturating_sub(stack.len()));
        Walk {
            tree: self,
            stack,
            visited: HashSet::new(),
        }
    }
}

pub struct Walk<'a> {
    tree: &'a CommentTree,
    stack: Vec<(NodeId, usize)>,
    visited: HashSet<NodeId>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = (&'a Comment, usize);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((id, depth)) = self.stack.pop() {
            if !self.visited.insert(id) {
                continue;
            }
            for &child in self.tree.children(id).iter().rev() {
                self.stack.push((child, depth + 1));
            }
            return Some((self.tree.comment(id), depth));
        }
        None
    }
}

/// Fetch a post's comments and build its reply forest.
pub fn load_thread(db: &Database, post_id: Uuid) -> Result<CommentTree, EngineError> {
    let comments = db.list_comments_for_post(post_id)?;
    Ok(CommentTree::build(comments))
}
