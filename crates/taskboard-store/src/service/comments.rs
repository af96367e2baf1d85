use rusqlite::{OptionalExtension, Row, params};
use std::collections::HashMap;
use taskboard_core::model::{
    Author, Comment, CommentId, CommentTree, NewComment, SortOrder, User,
};

use super::reactions::{ReactionRow, aggregate_reactions};
use super::{Store, new_id, timestamp, user_from_row, validate};
use crate::error::ServiceError;

const COMMENT_COLUMNS: &str = "c.comment_id, c.content, c.task_id, c.parent_id, \
     c.created_at_us, c.updated_at_us, u.user_id, u.name, u.email";

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    let author = user_from_row(row, 6)?;
    Ok(Comment {
        id: CommentId::Persisted(row.get(0)?),
        content: row.get(1)?,
        user_id: author.id.clone(),
        user: Author::from(&author),
        task_id: row.get(2)?,
        parent_id: row.get(3)?,
        created_at: timestamp(row, 4)?,
        updated_at: timestamp(row, 5)?,
        reactions: Vec::new(),
        replies: Vec::new(),
    })
}

/// Group flat rows (oldest first) into top-level comments carrying their
/// replies newest first, then order the top level by `sort`.
fn build_tree(rows: Vec<Comment>, sort: SortOrder) -> CommentTree {
    let mut top: CommentTree = Vec::new();
    let mut position = HashMap::new();
    let mut replies = Vec::new();

    for comment in rows {
        match comment.parent_id.clone() {
            None => {
                if let CommentId::Persisted(id) = &comment.id {
                    position.insert(id.clone(), top.len());
                }
                top.push(comment);
            }
            Some(parent) => replies.push((parent, comment)),
        }
    }

    for (parent, reply) in replies.into_iter().rev() {
        if let Some(&idx) = position.get(&parent) {
            top[idx].replies.push(reply);
        }
    }

    if sort == SortOrder::Desc {
        top.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }
    top
}

impl Store {
    /// Comment tree of a task.
    ///
    /// Top-level comments follow `sort` by creation time, ties in insertion
    /// order. Replies are newest first. Reaction aggregates are relative to
    /// `user`.
    ///
    /// # Errors
    ///
    /// Returns `Task not found` unless the task is visible to `user`.
    pub fn list_comments(
        &self,
        user: &User,
        project_id: &str,
        task_id: &str,
        sort: SortOrder,
    ) -> Result<CommentTree, ServiceError> {
        self.require_task(&user.id, project_id, task_id)?;

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COMMENT_COLUMNS}
             FROM comments c JOIN users u ON u.user_id = c.user_id
             WHERE c.task_id = ?1
             ORDER BY c.created_at_us ASC, c.rowid ASC"
        ))?;
        let mut rows = stmt
            .query_map([task_id], comment_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut reactions = self.reaction_rows_for_task(task_id)?;
        for comment in &mut rows {
            if let Some(found) = comment.id.as_persisted().and_then(|id| reactions.remove(id)) {
                comment.reactions = aggregate_reactions(&found, &user.id);
            }
        }

        tracing::debug!(task_id, count = rows.len(), %sort, "listed comments");
        Ok(build_tree(rows, sort))
    }

    /// Post a comment, or a reply when `comment.parent_id` is set.
    ///
    /// # Errors
    ///
    /// Fails validation on blank content, with `Parent comment not found`
    /// when the parent is not in the same task, and with
    /// [`ServiceError::NestedReply`] when the parent is itself a reply.
    pub fn create_comment(
        &self,
        user: &User,
        project_id: &str,
        task_id: &str,
        comment: &NewComment,
    ) -> Result<Comment, ServiceError> {
        let content = validate::required(&comment.content, "Comment content is required")?;
        self.require_task(&user.id, project_id, task_id)?;

        if let Some(parent_id) = comment.parent_id.as_deref() {
            let parent: Option<(String, Option<String>)> = self
                .conn
                .query_row(
                    "SELECT task_id, parent_id FROM comments WHERE comment_id = ?1",
                    [parent_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            match parent {
                Some((parent_task, _)) if parent_task != task_id => {
                    return Err(ServiceError::NotFound("Parent comment not found"));
                }
                None => return Err(ServiceError::NotFound("Parent comment not found")),
                Some((_, Some(_))) => return Err(ServiceError::NestedReply),
                Some((_, None)) => {}
            }
        }

        let id = new_id();
        let now = self.now_us();
        self.conn.execute(
            "INSERT INTO comments (comment_id, task_id, user_id, parent_id, content,
                                   created_at_us, updated_at_us)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![id, task_id, user.id, comment.parent_id, content, now],
        )?;
        tracing::info!(
            comment_id = %id,
            task_id,
            reply = comment.parent_id.is_some(),
            "created comment"
        );
        self.load_comment(user, task_id, &id)
    }

    /// Replace the content of one of `user`'s comments.
    ///
    /// The returned comment carries its reactions but not its replies.
    ///
    /// # Errors
    ///
    /// Returns `Comment not found` unless `user` wrote the comment.
    pub fn update_comment(
        &self,
        user: &User,
        project_id: &str,
        task_id: &str,
        comment_id: &str,
        content: &str,
    ) -> Result<Comment, ServiceError> {
        let content = validate::required(content, "Comment content is required")?;
        self.require_own_comment(user, project_id, task_id, comment_id)?;
        self.conn.execute(
            "UPDATE comments SET content = ?1, updated_at_us = ?2 WHERE comment_id = ?3",
            params![content, self.now_us(), comment_id],
        )?;
        tracing::info!(comment_id, "updated comment");
        self.load_comment(user, task_id, comment_id)
    }

    /// Delete one of `user`'s comments with its replies and reactions.
    ///
    /// # Errors
    ///
    /// Returns `Comment not found` unless `user` wrote the comment.
    pub fn delete_comment(
        &self,
        user: &User,
        project_id: &str,
        task_id: &str,
        comment_id: &str,
    ) -> Result<(), ServiceError> {
        self.require_own_comment(user, project_id, task_id, comment_id)?;
        self.conn
            .execute("DELETE FROM comments WHERE comment_id = ?1", [comment_id])?;
        tracing::info!(comment_id, "deleted comment");
        Ok(())
    }

    /// Fail with `Comment not found` unless the comment is in `task_id`.
    pub(super) fn require_comment(
        &self,
        user: &User,
        project_id: &str,
        task_id: &str,
        comment_id: &str,
    ) -> Result<(), ServiceError> {
        self.require_task(&user.id, project_id, task_id)?;
        self.conn
            .query_row(
                "SELECT 1 FROM comments WHERE comment_id = ?1 AND task_id = ?2",
                params![comment_id, task_id],
                |_| Ok(()),
            )
            .optional()?
            .ok_or(ServiceError::NotFound("Comment not found"))
    }

    fn require_own_comment(
        &self,
        user: &User,
        project_id: &str,
        task_id: &str,
        comment_id: &str,
    ) -> Result<(), ServiceError> {
        self.require_task(&user.id, project_id, task_id)?;
        self.conn
            .query_row(
                "SELECT 1 FROM comments WHERE comment_id = ?1 AND task_id = ?2 AND user_id = ?3",
                params![comment_id, task_id, user.id],
                |_| Ok(()),
            )
            .optional()?
            .ok_or(ServiceError::NotFound("Comment not found"))
    }

    fn load_comment(
        &self,
        user: &User,
        task_id: &str,
        comment_id: &str,
    ) -> Result<Comment, ServiceError> {
        let mut comment = self
            .conn
            .query_row(
                &format!(
                    "SELECT {COMMENT_COLUMNS}
                     FROM comments c JOIN users u ON u.user_id = c.user_id
                     WHERE c.comment_id = ?1 AND c.task_id = ?2"
                ),
                params![comment_id, task_id],
                comment_from_row,
            )
            .optional()?
            .ok_or(ServiceError::NotFound("Comment not found"))?;
        comment.reactions = aggregate_reactions(&self.reaction_rows(comment_id)?, &user.id);
        Ok(comment)
    }

    fn reaction_rows_for_task(
        &self,
        task_id: &str,
    ) -> Result<HashMap<String, Vec<ReactionRow>>, ServiceError> {
        let mut stmt = self.conn.prepare(
            "SELECT r.comment_id, r.emoji, r.user_id
             FROM reactions r JOIN comments c ON c.comment_id = r.comment_id
             WHERE c.task_id = ?1
             ORDER BY r.rowid ASC",
        )?;
        let mut grouped: HashMap<String, Vec<ReactionRow>> = HashMap::new();
        let rows = stmt.query_map([task_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                ReactionRow {
                    emoji: row.get(1)?,
                    user_id: row.get(2)?,
                },
            ))
        })?;
        for row in rows {
            let (comment_id, reaction) = row?;
            grouped.entry(comment_id).or_default().push(reaction);
        }
        Ok(grouped)
    }
}

#[cfg(test)]
mod tests {
    use taskboard_core::model::{CommentTree, NewComment, SortOrder, User};

    use crate::error::ServiceError;
    use crate::service::Store;
    use crate::service::test_support::{store, task, user};

    fn post(store: &Store, ada: &User, p: &str, t: &str, content: &str) -> String {
        store
            .create_comment(
                ada,
                p,
                t,
                &NewComment {
                    content: content.into(),
                    parent_id: None,
                },
            )
            .expect("create comment")
            .id
            .to_string()
    }

    fn reply(
        store: &Store,
        ada: &User,
        p: &str,
        t: &str,
        parent: &str,
        content: &str,
    ) -> Result<String, ServiceError> {
        store
            .create_comment(
                ada,
                p,
                t,
                &NewComment {
                    content: content.into(),
                    parent_id: Some(parent.into()),
                },
            )
            .map(|c| c.id.to_string())
    }

    fn contents(tree: &CommentTree) -> Vec<&str> {
        tree.iter().map(|c| c.content.as_str()).collect()
    }

    #[test]
    fn list_respects_sort_order() {
        let store = store();
        let (ada, p, t) = task(&store);
        post(&store, &ada, &p, &t, "first");
        post(&store, &ada, &p, &t, "second");
        post(&store, &ada, &p, &t, "third");

        let desc = store.list_comments(&ada, &p, &t, SortOrder::Desc).expect("desc");
        assert_eq!(contents(&desc), ["third", "second", "first"]);
        let asc = store.list_comments(&ada, &p, &t, SortOrder::Asc).expect("asc");
        assert_eq!(contents(&asc), ["first", "second", "third"]);
    }

    #[test]
    fn replies_nest_under_parent_newest_first() {
        let store = store();
        let (ada, p, t) = task(&store);
        let parent = post(&store, &ada, &p, &t, "question");
        reply(&store, &ada, &p, &t, &parent, "early answer").expect("reply");
        reply(&store, &ada, &p, &t, &parent, "late answer").expect("reply");

        let tree = store.list_comments(&ada, &p, &t, SortOrder::Desc).expect("list");
        assert_eq!(tree.len(), 1);
        assert_eq!(contents(&tree[0].replies), ["late answer", "early answer"]);
        assert!(tree[0].replies.iter().all(|r| r.parent_id.as_deref() == Some(parent.as_str())));
    }

    #[test]
    fn nested_replies_are_rejected() {
        let store = store();
        let (ada, p, t) = task(&store);
        let parent = post(&store, &ada, &p, &t, "question");
        let child = reply(&store, &ada, &p, &t, &parent, "answer").expect("reply");

        assert!(matches!(
            reply(&store, &ada, &p, &t, &child, "too deep"),
            Err(ServiceError::NestedReply)
        ));
        assert!(matches!(
            reply(&store, &ada, &p, &t, "missing", "orphan"),
            Err(ServiceError::NotFound("Parent comment not found"))
        ));
    }

    #[test]
    fn blank_content_is_rejected_and_content_is_trimmed() {
        let store = store();
        let (ada, p, t) = task(&store);
        let err = store
            .create_comment(
                &ada,
                &p,
                &t,
                &NewComment {
                    content: "   ".into(),
                    parent_id: None,
                },
            )
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(m) if m == "Comment content is required"));

        post(&store, &ada, &p, &t, "  padded  ");
        let tree = store.list_comments(&ada, &p, &t, SortOrder::Desc).expect("list");
        assert_eq!(tree[0].content, "padded");
        assert_eq!(tree[0].user.name, "Ada");
    }

    #[test]
    fn only_the_author_can_edit_or_delete() {
        let store = store();
        let (ada, p, t) = task(&store);
        let id = post(&store, &ada, &p, &t, "mine");
        let bob = user(&store, "Bob");

        assert!(matches!(
            store.update_comment(&bob, &p, &t, &id, "hijacked"),
            Err(ServiceError::NotFound(_))
        ));

        let edited = store.update_comment(&ada, &p, &t, &id, " edited ").expect("edit");
        assert_eq!(edited.content, "edited");
        assert!(edited.updated_at > edited.created_at);

        store.delete_comment(&ada, &p, &t, &id).expect("delete");
        assert!(store.list_comments(&ada, &p, &t, SortOrder::Desc).expect("list").is_empty());
        assert!(matches!(
            store.delete_comment(&ada, &p, &t, &id),
            Err(ServiceError::NotFound("Comment not found"))
        ));
    }

    #[test]
    fn deleting_a_parent_removes_its_replies() {
        let store = store();
        let (ada, p, t) = task(&store);
        let parent = post(&store, &ada, &p, &t, "question");
        reply(&store, &ada, &p, &t, &parent, "answer").expect("reply");

        store.delete_comment(&ada, &p, &t, &parent).expect("delete");
        let remaining: i64 = store
            .conn()
            .query_row("SELECT COUNT(*) FROM comments", [], |row| row.get(0))
            .expect("count");
        assert_eq!(remaining, 0);
    }
}
