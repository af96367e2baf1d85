use anyhow::{Result, bail};
use clap::Args;
use serde::Serialize;
use std::io::Write;
use taskboard_core::model::{CommentId, ReactionAction, ReactionAggregate, SortOrder};
use taskboard_core::mutation::{Outcome, ToggleReaction};
use taskboard_core::reconcile::find_comment;

use crate::context::Context;
use crate::output::render_mode;

/// Toggle your emoji reaction on a comment.
#[derive(Args, Debug)]
#[command(
    after_help = "EXAMPLES:\n    # React, then run again to take it back\n    tb react <project> <task> <comment> 👍"
)]
pub struct ReactArgs {
    pub project: String,
    pub task: String,
    pub comment: String,
    pub emoji: String,

    /// Thread order used for the cached view. Defaults to config.
    #[arg(long)]
    pub sort: Option<SortOrder>,
}

#[derive(Debug, Serialize)]
struct ReactOutput {
    ok: bool,
    action: ReactionAction,
    comment_id: String,
    reactions: Vec<ReactionAggregate>,
}

pub fn run_react(args: &ReactArgs, ctx: &Context) -> Result<()> {
    let sort = args.sort.unwrap_or_else(|| ctx.default_sort());
    let comment_id = CommentId::persisted(args.comment.as_str());

    let output = ctx.with_backend(|b| {
        let mut executor = ctx.executor(b)?;
        executor.read_comments(b, &args.project, &args.task, sort)?;

        let mutation = ToggleReaction {
            project_id: args.project.clone(),
            task_id: args.task.clone(),
            sort,
            comment_id: comment_id.clone(),
            emoji: args.emoji.clone(),
        };
        // A blank emoji fails validation, so a toggle never reports Skipped.
        let response = match executor.execute(b, mutation)? {
            Outcome::Committed(response) => response,
            Outcome::Skipped => bail!("reaction toggle was skipped"),
        };
        executor.refetch_stale(b);

        let tree = executor.read_comments(b, &args.project, &args.task, sort)?;
        let reactions = find_comment(&tree, &comment_id)
            .map(|c| c.reactions.clone())
            .unwrap_or_default();
        Ok(ReactOutput {
            ok: true,
            action: response.action,
            comment_id: args.comment.clone(),
            reactions,
        })
    })?;

    render_mode(
        ctx.output,
        &output,
        |o, w| {
            write!(w, "{}", o.action.as_str())?;
            for r in &o.reactions {
                write!(w, "  {}×{}", r.emoji, r.count)?;
            }
            writeln!(w)
        },
        |o, w| {
            let verb = match o.action {
                ReactionAction::Added => "Added",
                ReactionAction::Removed => "Removed",
            };
            writeln!(w, "✓ {verb} {} on comment {}", args.emoji, o.comment_id)?;
            for r in &o.reactions {
                let mark = if r.user_reacted { " (you)" } else { "" };
                writeln!(w, "  {} {}{mark}", r.emoji, r.count)?;
            }
            Ok(())
        },
    )
}
