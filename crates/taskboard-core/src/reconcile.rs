//! Comment tree reconciler.
//!
//! Pure functions that compute the optimistic effect of a mutation on a
//! cached value. Inputs are borrowed and never modified; every function
//! returns a fresh value so the caller can keep the original as a rollback
//! snapshot.
//!
//! The comment tree has exactly two levels: top-level comments, each with a
//! flat list of direct replies. Nothing here recurses past that depth.

use std::cmp::Ordering;

use tracing::trace;

use crate::model::{
    Comment, CommentId, CommentTree, ReactionAggregate, SortOrder, TaskDetail, TaskPatch,
};

/// How far [`map_matching`] looks for matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    /// Only the top-level list.
    TopLevel,
    /// Top-level comments and their direct replies.
    WithReplies,
}

/// Rebuild `tree`, replacing each comment for which `matches` holds with
/// `update(comment)`.
///
/// With [`Depth::WithReplies`], the replies of a top-level comment are only
/// visited when that comment itself did not match.
pub fn map_matching<P, F>(tree: &[Comment], depth: Depth, matches: P, update: F) -> CommentTree
where
    P: Fn(&Comment) -> bool,
    F: Fn(&Comment) -> Comment,
{
    tree.iter()
        .map(|comment| {
            if matches(comment) {
                return update(comment);
            }
            if depth == Depth::WithReplies && !comment.replies.is_empty() {
                let mut rebuilt = comment.clone();
                rebuilt.replies = comment
                    .replies
                    .iter()
                    .map(|reply| {
                        if matches(reply) {
                            update(reply)
                        } else {
                            reply.clone()
                        }
                    })
                    .collect();
                return rebuilt;
            }
            comment.clone()
        })
        .collect()
}

/// Locate a comment at either level.
#[must_use]
pub fn find_comment<'a>(tree: &'a [Comment], id: &CommentId) -> Option<&'a Comment> {
    tree.iter().find_map(|comment| {
        if &comment.id == id {
            Some(comment)
        } else {
            comment.replies.iter().find(|reply| &reply.id == id)
        }
    })
}

fn by_created_at(sort: SortOrder) -> impl Fn(&Comment, &Comment) -> Ordering {
    move |a, b| match sort {
        SortOrder::Asc => a.created_at.cmp(&b.created_at),
        SortOrder::Desc => b.created_at.cmp(&a.created_at),
    }
}

/// Append a new top-level comment and re-sort the list by creation time.
///
/// The sort is stable, so comments with equal timestamps keep their
/// relative order and the new comment lands after its ties.
#[must_use]
pub fn apply_create_top_level(tree: &[Comment], comment: Comment, sort: SortOrder) -> CommentTree {
    let mut next = Vec::with_capacity(tree.len() + 1);
    next.extend_from_slice(tree);
    next.push(comment);
    next.sort_by(by_created_at(sort));
    next
}

/// Put `reply` at the front of the reply list of the top-level comment
/// `parent_id`. Replies are always newest first regardless of the
/// top-level sort order. If no top-level comment matches, the tree is
/// returned unchanged.
#[must_use]
pub fn apply_create_reply(tree: &[Comment], parent_id: &CommentId, reply: &Comment) -> CommentTree {
    map_matching(
        tree,
        Depth::TopLevel,
        |c| &c.id == parent_id,
        |parent| {
            let mut parent = parent.clone();
            parent.replies.insert(0, reply.clone());
            parent
        },
    )
}

/// Toggle the acting user's `emoji` reaction on comment `comment_id`,
/// which may be a top-level comment or a reply.
#[must_use]
pub fn apply_toggle_reaction(
    tree: &[Comment],
    comment_id: &CommentId,
    emoji: &str,
    acting_user_id: &str,
) -> CommentTree {
    trace!(comment = %comment_id, emoji, user = acting_user_id, "optimistic reaction toggle");
    map_matching(
        tree,
        Depth::WithReplies,
        |c| &c.id == comment_id,
        |target| {
            let mut target = target.clone();
            target.reactions = toggle_aggregates(&target.reactions, emoji);
            target
        },
    )
}

/// Predict the aggregate list after the acting user toggles `emoji`.
///
/// Mirrors the server's add-or-remove of a unique (comment, user, emoji)
/// row:
///
/// | existing aggregate            | result                          |
/// |-------------------------------|---------------------------------|
/// | reacted, `count == 1`         | removed                         |
/// | reacted, `count > 1`          | `count - 1`, not reacted        |
/// | not reacted                   | `count + 1`, reacted            |
/// | none                          | appended `{count: 1, reacted}`  |
#[must_use]
pub fn toggle_aggregates(aggregates: &[ReactionAggregate], emoji: &str) -> Vec<ReactionAggregate> {
    let Some(pos) = aggregates.iter().position(|a| a.emoji == emoji) else {
        let mut next = aggregates.to_vec();
        next.push(ReactionAggregate {
            emoji: emoji.to_string(),
            count: 1,
            user_reacted: true,
        });
        return next;
    };

    let existing = &aggregates[pos];
    let mut next = aggregates.to_vec();
    if existing.user_reacted {
        if existing.count <= 1 {
            next.remove(pos);
        } else {
            next[pos].count -= 1;
            next[pos].user_reacted = false;
        }
    } else {
        next[pos].count += 1;
        next[pos].user_reacted = true;
    }
    next
}

/// Merge the present fields of `patch` into a cached task.
#[must_use]
pub fn apply_task_patch(detail: &TaskDetail, patch: &TaskPatch) -> TaskDetail {
    let mut next = detail.clone();
    patch.apply_to(&mut next.task);
    next
}
