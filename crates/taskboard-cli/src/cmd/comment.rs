//! `tb comment`: threaded discussion on a task.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;
use std::io::Write;
use taskboard_core::backend::Backend;
use taskboard_core::model::{Comment, CommentId, CommentTree, SortOrder};
use taskboard_core::mutation::{CreateComment, CreateReply, MutationExecutor};

use super::short_time;
use crate::context::Context;
use crate::output::{pretty_section, render, render_mode, render_success};

#[derive(Args, Debug)]
pub struct CommentArgs {
    #[command(subcommand)]
    pub command: CommentCommand,
}

#[derive(Subcommand, Debug)]
pub enum CommentCommand {
    #[command(about = "Show the comment thread of a task")]
    List {
        project: String,
        task: String,

        /// asc (oldest first) or desc (newest first). Defaults to config.
        #[arg(long)]
        sort: Option<SortOrder>,
    },

    #[command(
        about = "Add a top-level comment",
        after_help = "EXAMPLES:\n    tb comment add <project> <task> \"Looks good to me\""
    )]
    Add {
        project: String,
        task: String,
        content: String,

        #[arg(long)]
        sort: Option<SortOrder>,
    },

    #[command(about = "Reply to a top-level comment")]
    Reply {
        project: String,
        task: String,
        /// ID of the comment being answered. Replies cannot be nested.
        parent: String,
        content: String,

        #[arg(long)]
        sort: Option<SortOrder>,
    },

    #[command(about = "Edit one of your comments")]
    Edit {
        project: String,
        task: String,
        comment: String,
        content: String,
    },

    #[command(about = "Delete one of your comments and its replies")]
    Delete {
        project: String,
        task: String,
        comment: String,
    },
}

#[derive(Debug, Serialize)]
struct PostOutput {
    ok: bool,
    skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    comment: Option<Comment>,
    comments: CommentTree,
}

fn reaction_summary(c: &Comment) -> String {
    c.reactions
        .iter()
        .map(|r| {
            if r.user_reacted {
                format!("{}×{}*", r.emoji, r.count)
            } else {
                format!("{}×{}", r.emoji, r.count)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn comment_pretty(c: &Comment, indent: &str, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(
        w,
        "{indent}{} · {} · {}",
        c.user.name,
        short_time(c.created_at),
        c.id
    )?;
    for line in c.content.lines() {
        writeln!(w, "{indent}  {line}")?;
    }
    if !c.reactions.is_empty() {
        writeln!(w, "{indent}  {}", reaction_summary(c))?;
    }
    Ok(())
}

fn tree_pretty(tree: &[Comment], w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, &format!("Comments ({})", tree.len()))?;
    for c in tree {
        comment_pretty(c, "", w)?;
        for reply in &c.replies {
            comment_pretty(reply, "    ↳ ", w)?;
        }
        writeln!(w)?;
    }
    Ok(())
}

fn tree_text(tree: &[Comment], w: &mut dyn Write) -> std::io::Result<()> {
    for c in tree {
        comment_line(c, w)?;
        for reply in &c.replies {
            comment_line(reply, w)?;
        }
    }
    Ok(())
}

fn comment_line(c: &Comment, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(
        w,
        "{}  {}  {}  {}  {}",
        c.id,
        c.parent_id.as_deref().unwrap_or("-"),
        c.user.email,
        c.content.replace('\n', " "),
        reaction_summary(c)
    )
}

pub fn run_comment(args: &CommentArgs, ctx: &Context) -> Result<()> {
    match &args.command {
        CommentCommand::List {
            project,
            task,
            sort,
        } => {
            let sort = sort.unwrap_or_else(|| ctx.default_sort());
            let tree = ctx.with_backend(|b| Ok(b.list_comments(project, task, sort)?))?;
            render_mode(ctx.output, &tree, |t, w| tree_text(t, w), |t, w| tree_pretty(t, w))
        }
        CommentCommand::Add {
            project,
            task,
            content,
            sort,
        } => {
            let sort = sort.unwrap_or_else(|| ctx.default_sort());
            let output = post(ctx, project, task, sort, |executor, b| {
                let mutation = CreateComment {
                    project_id: project.clone(),
                    task_id: task.clone(),
                    sort,
                    content: content.clone(),
                };
                Ok(executor.execute(b, mutation)?.committed())
            })?;
            render_post(ctx, &output)
        }
        CommentCommand::Reply {
            project,
            task,
            parent,
            content,
            sort,
        } => {
            let sort = sort.unwrap_or_else(|| ctx.default_sort());
            let output = post(ctx, project, task, sort, |executor, b| {
                let mutation = CreateReply {
                    project_id: project.clone(),
                    task_id: task.clone(),
                    sort,
                    parent_id: CommentId::persisted(parent.as_str()),
                    content: content.clone(),
                };
                Ok(executor.execute(b, mutation)?.committed())
            })?;
            render_post(ctx, &output)
        }
        CommentCommand::Edit {
            project,
            task,
            comment,
            content,
        } => {
            let updated =
                ctx.with_backend(|b| Ok(b.update_comment(project, task, comment, content)?))?;
            render(ctx.output, &updated, |c, w| {
                writeln!(w, "✓ Updated comment {}", c.id)?;
                comment_pretty(c, "", w)
            })
        }
        CommentCommand::Delete {
            project,
            task,
            comment,
        } => {
            ctx.with_backend(|b| Ok(b.delete_comment(project, task, comment)?))?;
            render_success(ctx.output, &format!("Deleted comment {comment}"))
        }
    }
}

/// Prime the thread, run one comment mutation, then refetch so the output
/// shows server state.
fn post(
    ctx: &Context,
    project: &str,
    task: &str,
    sort: SortOrder,
    run: impl FnOnce(&mut MutationExecutor, &dyn Backend) -> Result<Option<Comment>>,
) -> Result<PostOutput> {
    ctx.with_backend(|b| {
        let mut executor = ctx.executor(b)?;
        executor.read_comments(b, project, task, sort)?;

        let comment = run(&mut executor, b)?;
        let refreshed = executor.refetch_stale(b);
        tracing::debug!(refreshed, "refetched after comment mutation");

        let comments = executor.read_comments(b, project, task, sort)?;
        Ok(PostOutput {
            ok: true,
            skipped: comment.is_none(),
            comment,
            comments,
        })
    })
}

fn render_post(ctx: &Context, output: &PostOutput) -> Result<()> {
    render_mode(
        ctx.output,
        output,
        |o, w| match &o.comment {
            Some(c) => comment_line(c, w),
            None => writeln!(w, "skipped"),
        },
        |o, w| {
            match &o.comment {
                Some(c) => writeln!(w, "✓ Posted comment {}", c.id)?,
                None => writeln!(w, "Nothing to post: comment is empty")?,
            }
            if ctx.quiet {
                return Ok(());
            }
            tree_pretty(&o.comments, w)
        },
    )
}
