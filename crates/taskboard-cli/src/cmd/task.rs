//! `tb task`: tasks within a project. `update` runs as an optimistic
//! mutation through the executor.

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Args, Subcommand};
use serde::Serialize;
use std::io::Write;
use taskboard_core::model::{NewTask, Priority, Task, TaskDetail, TaskPatch, TaskStatus};
use taskboard_core::mutation::UpdateTask;

use super::short_time;
use crate::context::Context;
use crate::output::{pretty_kv, pretty_section, render, render_mode, render_success};

#[derive(Args, Debug)]
pub struct TaskArgs {
    #[command(subcommand)]
    pub command: TaskCommand,
}

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    #[command(about = "List the tasks of a project, newest first")]
    List { project: String },

    #[command(about = "Show one task")]
    Show { project: String, task: String },

    #[command(
        about = "Create a task",
        after_help = "EXAMPLES:\n    tb task create <project> --title \"Write docs\" --priority high --due 2025-06-30"
    )]
    Create(TaskCreateArgs),

    #[command(
        about = "Edit fields of a task",
        after_help = "EXAMPLES:\n    # Move a task along\n    tb task update <project> <task> --status in-progress\n\n    # Drop the due date\n    tb task update <project> <task> --clear-due"
    )]
    Update(TaskUpdateArgs),

    #[command(about = "Delete a task with its comments")]
    Delete { project: String, task: String },
}

#[derive(Args, Debug)]
pub struct TaskCreateArgs {
    pub project: String,

    #[arg(long)]
    pub title: String,

    #[arg(long)]
    pub description: Option<String>,

    /// todo, in-progress, done or cancelled.
    #[arg(long, default_value = "todo")]
    pub status: TaskStatus,

    /// low, medium, high or urgent.
    #[arg(long, default_value = "medium")]
    pub priority: Priority,

    /// Due date as YYYY-MM-DD.
    #[arg(long)]
    pub due: Option<NaiveDate>,
}

#[derive(Args, Debug)]
pub struct TaskUpdateArgs {
    pub project: String,
    pub task: String,

    #[arg(long)]
    pub title: Option<String>,

    #[arg(long, conflicts_with = "clear_description")]
    pub description: Option<String>,

    #[arg(long)]
    pub clear_description: bool,

    #[arg(long)]
    pub status: Option<TaskStatus>,

    #[arg(long)]
    pub priority: Option<Priority>,

    #[arg(long, conflicts_with = "clear_due")]
    pub due: Option<NaiveDate>,

    #[arg(long)]
    pub clear_due: bool,
}

impl TaskUpdateArgs {
    fn patch(&self) -> TaskPatch {
        TaskPatch {
            title: self.title.clone(),
            description: if self.clear_description {
                Some(None)
            } else {
                self.description.clone().map(Some)
            },
            status: self.status,
            priority: self.priority,
            due_date: if self.clear_due {
                Some(None)
            } else {
                self.due.map(Some)
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct UpdateOutput {
    ok: bool,
    changed: bool,
    task: Task,
}

fn task_line(t: &Task, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(
        w,
        "{}  {}  {}  {}  {}",
        t.id,
        t.status,
        t.priority,
        t.due_date.map_or_else(|| "-".to_string(), |d| d.to_string()),
        t.title
    )
}

fn task_pretty(t: &Task, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, &t.title)?;
    pretty_kv(w, "ID", &t.id)?;
    pretty_kv(w, "Status", t.status.label())?;
    pretty_kv(w, "Priority", t.priority.label())?;
    if let Some(due) = t.due_date {
        pretty_kv(w, "Due", due.to_string())?;
    }
    if let Some(description) = &t.description {
        pretty_kv(w, "Description", description)?;
    }
    pretty_kv(w, "Updated", short_time(t.updated_at))
}

pub fn run_task(args: &TaskArgs, ctx: &Context) -> Result<()> {
    match &args.command {
        TaskCommand::List { project } => {
            let tasks = ctx.with_backend(|b| Ok(b.list_tasks(project)?))?;
            render_mode(
                ctx.output,
                &tasks,
                |ts, w| {
                    for t in ts {
                        task_line(t, w)?;
                    }
                    Ok(())
                },
                |ts, w| {
                    pretty_section(w, &format!("Tasks ({})", ts.len()))?;
                    for t in ts {
                        writeln!(w, "{:<38} [{}] {}", t.id, t.status.label(), t.title)?;
                    }
                    Ok(())
                },
            )
        }
        TaskCommand::Show { project, task } => {
            let detail: TaskDetail = ctx.with_backend(|b| Ok(b.get_task(project, task)?))?;
            render(ctx.output, &detail, |d, w| {
                task_pretty(&d.task, w)?;
                pretty_kv(w, "Project", &d.project.name)
            })
        }
        TaskCommand::Create(create) => {
            let new_task = NewTask {
                title: create.title.clone(),
                description: create.description.clone(),
                status: create.status,
                priority: create.priority,
                due_date: create.due,
            };
            let task = ctx.with_backend(|b| Ok(b.create_task(&create.project, &new_task)?))?;
            render(ctx.output, &task, |t, w| {
                if ctx.quiet {
                    writeln!(w, "{}", t.id)
                } else {
                    writeln!(w, "✓ Created task {} ({})", t.title, t.id)
                }
            })
        }
        TaskCommand::Update(update) => run_update(update, ctx),
        TaskCommand::Delete { project, task } => {
            ctx.with_backend(|b| Ok(b.delete_task(project, task)?))?;
            render_success(ctx.output, &format!("Deleted task {task}"))
        }
    }
}

fn run_update(args: &TaskUpdateArgs, ctx: &Context) -> Result<()> {
    let output = ctx.with_backend(|b| {
        let mut executor = ctx.executor(b)?;
        let cached = executor.read_task(b, &args.project, &args.task)?;
        let mutation = UpdateTask::new(&args.project, &args.task, args.patch());

        let out = match executor.execute(b, mutation)?.committed() {
            Some(task) => UpdateOutput {
                ok: true,
                changed: true,
                task,
            },
            None => UpdateOutput {
                ok: true,
                changed: false,
                task: cached.task,
            },
        };
        executor.refetch_stale(b);
        Ok(out)
    })?;

    render_mode(
        ctx.output,
        &output,
        |o, w| task_line(&o.task, w),
        |o, w| {
            if o.changed {
                writeln!(w, "✓ Updated task {}", o.task.id)?;
            } else {
                writeln!(w, "Nothing to change")?;
            }
            task_pretty(&o.task, w)
        },
    )
}
