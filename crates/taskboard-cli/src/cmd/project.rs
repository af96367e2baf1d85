//! `tb project`: list, inspect and edit projects.

use anyhow::Result;
use clap::{Args, Subcommand};
use std::io::Write;
use taskboard_core::model::{Project, ProjectInput};

use super::short_time;
use crate::context::Context;
use crate::output::{pretty_kv, pretty_rule, pretty_section, render, render_mode, render_success};

#[derive(Args, Debug)]
pub struct ProjectArgs {
    #[command(subcommand)]
    pub command: ProjectCommand,
}

#[derive(Subcommand, Debug)]
pub enum ProjectCommand {
    #[command(about = "List your projects, most recently updated first")]
    List,

    #[command(about = "Show a project and its tasks")]
    Show {
        /// Project ID.
        id: String,
    },

    #[command(
        about = "Create a project",
        after_help = "EXAMPLES:\n    tb project create \"Roadmap\" --description \"Q3 planning\""
    )]
    Create {
        name: String,

        #[arg(long)]
        description: Option<String>,
    },

    #[command(about = "Rename a project or change its description")]
    Update {
        id: String,

        #[arg(long)]
        name: Option<String>,

        /// New description; an empty string clears it.
        #[arg(long)]
        description: Option<String>,
    },

    #[command(about = "Delete a project with all of its tasks and comments")]
    Delete { id: String },
}

fn project_line(p: &Project, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(w, "{}  {}  {}", p.id, p.name, p.updated_at.to_rfc3339())
}

pub fn run_project(args: &ProjectArgs, ctx: &Context) -> Result<()> {
    match &args.command {
        ProjectCommand::List => {
            let projects = ctx.with_backend(|b| Ok(b.list_projects()?))?;
            render_mode(
                ctx.output,
                &projects,
                |ps, w| {
                    for p in ps {
                        project_line(p, w)?;
                    }
                    Ok(())
                },
                |ps, w| {
                    pretty_section(w, &format!("Projects ({})", ps.len()))?;
                    for p in ps {
                        writeln!(w, "{:<38} {}", p.id, p.name)?;
                    }
                    Ok(())
                },
            )
        }
        ProjectCommand::Show { id } => {
            let detail = ctx.with_backend(|b| Ok(b.get_project(id)?))?;
            render(ctx.output, &detail, |d, w| {
                pretty_section(w, &d.project.name)?;
                pretty_kv(w, "ID", &d.project.id)?;
                if let Some(description) = &d.project.description {
                    pretty_kv(w, "Description", description)?;
                }
                pretty_kv(w, "Updated", short_time(d.project.updated_at))?;
                pretty_rule(w)?;
                for t in &d.tasks {
                    writeln!(w, "{}  [{}] {}", t.id, t.status.label(), t.title)?;
                }
                Ok(())
            })
        }
        ProjectCommand::Create { name, description } => {
            let input = ProjectInput {
                name: name.clone(),
                description: description.clone(),
            };
            let project = ctx.with_backend(|b| Ok(b.create_project(&input)?))?;
            render(ctx.output, &project, |p, w| {
                if ctx.quiet {
                    writeln!(w, "{}", p.id)
                } else {
                    writeln!(w, "✓ Created project {} ({})", p.name, p.id)
                }
            })
        }
        ProjectCommand::Update {
            id,
            name,
            description,
        } => {
            let project = ctx.with_backend(|b| {
                let current = b.get_project(id)?.project;
                let input = ProjectInput {
                    name: name.clone().unwrap_or(current.name),
                    description: description.clone().or(current.description),
                };
                Ok(b.update_project(id, &input)?)
            })?;
            render(ctx.output, &project, |p, w| {
                writeln!(w, "✓ Updated project {} ({})", p.name, p.id)
            })
        }
        ProjectCommand::Delete { id } => {
            ctx.with_backend(|b| Ok(b.delete_project(id)?))?;
            render_success(ctx.output, &format!("Deleted project {id}"))
        }
    }
}
