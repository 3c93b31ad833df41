use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;

use crate::{
    models::{CommentRecord, UserView},
    roles::Role,
};

/// Deepest nesting level a thread can reach. Top-level comments are level 1.
pub const MAX_REPLY_DEPTH: usize = 32;

/// CommentNode
///
/// One comment in a blog's thread, with its author denormalized and its
/// replies in store order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CommentNode {
    pub id: i64,
    pub content: String,
    pub author: UserView,
    pub is_moderated: bool,
    pub parent_id: Option<i64>,
    #[schema(no_recursion)]
    pub replies: Vec<CommentNode>,
}

/// Builds the visible comment forest for a viewer.
///
/// `viewer` is `None` for anonymous requests, which are treated as guests.
/// Guests only get moderated comments, and the filter runs on the flat set
/// before assembly: a reply whose ancestor was filtered out is unreachable and
/// therefore dropped with it. Comments whose parent is not in the working set
/// (orphans) are dropped the same way, together with their subtrees.
///
/// Assembly stops at `MAX_REPLY_DEPTH`; anything nested deeper is left out.
pub fn build_tree(records: &[CommentRecord], viewer: Option<Role>) -> Vec<CommentNode> {
    let role = viewer.unwrap_or(Role::Guest);

    let visible: Vec<&CommentRecord> = records
        .iter()
        .filter(|record| role.sees_unmoderated() || record.comment.is_moderated)
        .collect();

    // Arena index: comment id -> position in `visible`.
    let index: HashMap<i64, usize> = visible
        .iter()
        .enumerate()
        .map(|(pos, record)| (record.comment.id, pos))
        .collect();

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); visible.len()];
    let mut roots = Vec::new();

    for (pos, record) in visible.iter().enumerate() {
        match record.comment.parent_id {
            None => roots.push(pos),
            Some(parent_id) => {
                if let Some(&parent_pos) = index.get(&parent_id) {
                    children[parent_pos].push(pos);
                }
            }
        }
    }

    roots
        .into_iter()
        .map(|pos| assemble(pos, 1, &visible, &children))
        .collect()
}

// Only nodes reachable from a root are ever visited, so a parent cycle in bad
// data can never be entered.
fn assemble(
    pos: usize,
    depth: usize,
    visible: &[&CommentRecord],
    children: &[Vec<usize>],
) -> CommentNode {
    let record = visible[pos];
    let replies = if depth < MAX_REPLY_DEPTH {
        children[pos]
            .iter()
            .map(|&child| assemble(child, depth + 1, visible, children))
            .collect()
    } else {
        Vec::new()
    };

    CommentNode {
        id: record.comment.id,
        content: record.comment.content.clone(),
        author: record.author.clone(),
        is_moderated: record.comment.is_moderated,
        parent_id: record.comment.parent_id,
        replies,
    }
}

/// Total number of nodes in a forest.
pub fn count_nodes(forest: &[CommentNode]) -> usize {
    let mut pending: Vec<&CommentNode> = forest.iter().collect();
    let mut count = 0;
    while let Some(node) = pending.pop() {
        count += 1;
        pending.extend(node.replies.iter());
    }
    count
}
