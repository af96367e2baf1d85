#![forbid(unsafe_code)]

mod cmd;
mod context;
mod output;
mod session;

use clap::{CommandFactory, Parser, Subcommand};
use context::Context;
use output::{CliError, OutputMode, render_error};
use std::env;
use std::path::PathBuf;
use taskboard_core::config::{self, Overrides};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "tb: projects, tasks and threaded task discussion",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Output format: pretty, text or json.
    #[arg(long, global = true)]
    format: Option<String>,

    /// Session token (overrides TASKBOARD_SESSION and the saved session).
    #[arg(long, global = true)]
    session: Option<String>,

    /// Path to the local store.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Base URL of a taskboard server; commands go over HTTP instead of the
    /// local store.
    #[arg(long, global = true)]
    remote: Option<String>,

    /// Suppress non-essential output.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            json: self.json,
            format: self.format.clone(),
            database: self.db.clone(),
            remote: self.remote.clone(),
        }
    }

    /// Best guess at the output mode when config resolution itself failed.
    fn fallback_output(&self) -> OutputMode {
        if self.json || self.format.as_deref() == Some("json") {
            OutputMode::Json
        } else {
            OutputMode::Pretty
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Account",
        about = "Create an account in the local store and sign in",
        after_help = "EXAMPLES:\n    tb register --name \"Ada Lovelace\" --email ada@example.com"
    )]
    Register(cmd::auth::RegisterArgs),

    #[command(next_help_heading = "Account", about = "Sign in to the local store")]
    Login(cmd::auth::LoginArgs),

    #[command(next_help_heading = "Account", about = "Forget the saved session")]
    Logout,

    #[command(next_help_heading = "Account", about = "Show the signed-in user")]
    Whoami,

    #[command(next_help_heading = "Work", about = "Manage projects")]
    Project(cmd::project::ProjectArgs),

    #[command(next_help_heading = "Work", about = "Manage tasks within a project")]
    Task(cmd::task::TaskArgs),

    #[command(next_help_heading = "Discussion", about = "Comment on a task")]
    Comment(cmd::comment::CommentArgs),

    #[command(next_help_heading = "Discussion", about = "Toggle an emoji reaction on a comment")]
    React(cmd::react::ReactArgs),

    #[command(
        next_help_heading = "Setup",
        about = "Generate shell completions",
        after_help = "EXAMPLES:\n    tb completions zsh > ~/.zfunc/_tb"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("TASKBOARD_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "taskboard=debug,info"
        } else {
            "taskboard=info,warn"
        })
    });

    let format = env::var("TASKBOARD_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = config::resolve_config(cli.overrides())?;
    let output = config
        .resolved_output
        .parse::<OutputMode>()
        .map_err(anyhow::Error::msg)?;
    let token = session::resolve_token(cli.session.as_deref());
    let ctx = Context::new(config, output, cli.quiet, token);

    match &cli.command {
        Commands::Register(args) => cmd::auth::run_register(args, &ctx),
        Commands::Login(args) => cmd::auth::run_login(args, &ctx),
        Commands::Logout => cmd::auth::run_logout(&ctx),
        Commands::Whoami => cmd::auth::run_whoami(&ctx),
        Commands::Project(args) => cmd::project::run_project(args, &ctx),
        Commands::Task(args) => cmd::task::run_task(args, &ctx),
        Commands::Comment(args) => cmd::comment::run_comment(args, &ctx),
        Commands::React(args) => cmd::react::run_react(args, &ctx),
        Commands::Completions(args) => {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command)
        }
    }
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    if cli.verbose {
        info!("Verbose mode enabled");
    }

    if let Err(err) = run(&cli) {
        let mode = config::resolve_config(cli.overrides())
            .ok()
            .and_then(|c| c.resolved_output.parse().ok())
            .unwrap_or_else(|| cli.fallback_output());
        if render_error(mode, &CliError::from(&err)).is_err() {
            eprintln!("error: {err:#}");
        }
        std::process::exit(1);
    }
}
