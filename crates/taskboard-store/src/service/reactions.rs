use rusqlite::{OptionalExtension, params};
use taskboard_core::model::{ReactionAction, ReactionAggregate, ToggleReactionResponse, User};

use super::{Store, new_id, validate};
use crate::error::ServiceError;

/// One stored reaction, as needed for aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionRow {
    pub emoji: String,
    pub user_id: String,
}

/// Collapse reaction rows into per-emoji aggregates.
///
/// Aggregates appear in the order their emoji was first seen in `rows`;
/// `user_reacted` is set when any row for that emoji belongs to `user_id`.
#[must_use]
pub fn aggregate_reactions(rows: &[ReactionRow], user_id: &str) -> Vec<ReactionAggregate> {
    let mut aggregates: Vec<ReactionAggregate> = Vec::new();
    for row in rows {
        let idx = if let Some(idx) = aggregates.iter().position(|a| a.emoji == row.emoji) {
            idx
        } else {
            aggregates.push(ReactionAggregate {
                emoji: row.emoji.clone(),
                count: 0,
                user_reacted: false,
            });
            aggregates.len() - 1
        };
        let aggregate = &mut aggregates[idx];
        aggregate.count += 1;
        aggregate.user_reacted |= row.user_id == user_id;
    }
    aggregates
}

impl Store {
    /// Add `user`'s `emoji` reaction to a comment, or remove it if present.
    ///
    /// # Errors
    ///
    /// Fails validation on a blank emoji and with `Comment not found` when
    /// the comment is not in the task.
    pub fn toggle_reaction(
        &self,
        user: &User,
        project_id: &str,
        task_id: &str,
        comment_id: &str,
        emoji: &str,
    ) -> Result<ToggleReactionResponse, ServiceError> {
        let emoji = validate::required(emoji, "Emoji is required")?;
        self.require_comment(user, project_id, task_id, comment_id)?;

        let tx = self.conn.unchecked_transaction()?;
        let existing: Option<String> = tx
            .query_row(
                "SELECT reaction_id FROM reactions
                 WHERE comment_id = ?1 AND user_id = ?2 AND emoji = ?3",
                params![comment_id, user.id, emoji],
                |row| row.get(0),
            )
            .optional()?;

        let action = if let Some(reaction_id) = existing {
            tx.execute("DELETE FROM reactions WHERE reaction_id = ?1", [reaction_id])?;
            ReactionAction::Removed
        } else {
            tx.execute(
                "INSERT INTO reactions (reaction_id, comment_id, user_id, emoji, created_at_us)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![new_id(), comment_id, user.id, emoji, self.now_us()],
            )?;
            ReactionAction::Added
        };
        tx.commit()?;

        tracing::info!(comment_id, %emoji, action = action.as_str(), "toggled reaction");
        Ok(ToggleReactionResponse { action })
    }

    /// Reaction aggregates of one comment relative to `user`.
    ///
    /// # Errors
    ///
    /// Returns `Comment not found` when the comment is not in the task.
    pub fn reactions_for_comment(
        &self,
        user: &User,
        project_id: &str,
        task_id: &str,
        comment_id: &str,
    ) -> Result<Vec<ReactionAggregate>, ServiceError> {
        self.require_comment(user, project_id, task_id, comment_id)?;
        Ok(aggregate_reactions(&self.reaction_rows(comment_id)?, &user.id))
    }

    pub(super) fn reaction_rows(&self, comment_id: &str) -> Result<Vec<ReactionRow>, ServiceError> {
        let mut stmt = self.conn.prepare(
            "SELECT emoji, user_id FROM reactions WHERE comment_id = ?1 ORDER BY rowid ASC",
        )?;
        let rows = stmt
            .query_map([comment_id], |row| {
                Ok(ReactionRow {
                    emoji: row.get(0)?,
                    user_id: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}
