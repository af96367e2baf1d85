//! `tb register`, `tb login`, `tb logout` and `tb whoami`.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::io::Write;
use taskboard_core::model::User;

use crate::context::Context;
use crate::output::{pretty_kv, render, render_mode, render_success};
use crate::session::{self, SavedSession};

#[derive(Args, Debug)]
pub struct RegisterArgs {
    /// Display name.
    #[arg(long)]
    pub name: String,

    /// Account email; must be unique.
    #[arg(long)]
    pub email: String,
}

#[derive(Args, Debug)]
pub struct LoginArgs {
    #[arg(long)]
    pub email: String,
}

#[derive(Debug, Serialize)]
struct SignedIn<'a> {
    ok: bool,
    user: &'a User,
    token: &'a str,
}

pub fn run_register(args: &RegisterArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let (user, token) = store.register(&args.name, &args.email)?;
    remember(ctx, user, token)
}

pub fn run_login(args: &LoginArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let (user, token) = store.login(&args.email)?;
    remember(ctx, user, token)
}

fn remember(ctx: &Context, user: User, token: String) -> Result<()> {
    if let Some(path) = session::session_path() {
        session::save_session(
            &path,
            &SavedSession {
                token: token.clone(),
                user: user.clone(),
            },
        )?;
    }

    let out = SignedIn {
        ok: true,
        user: &user,
        token: &token,
    };
    render_mode(
        ctx.output,
        &out,
        |o, w| writeln!(w, "{}  {}  {}", o.user.id, o.user.email, o.token),
        |o, w| writeln!(w, "✓ Signed in as {} <{}>", o.user.display_name(), o.user.email),
    )
}

pub fn run_logout(ctx: &Context) -> Result<()> {
    if !ctx.is_remote() {
        if let Some(token) = ctx.token() {
            ctx.open_store()?.logout(token)?;
        }
    }
    if let Some(path) = session::session_path() {
        session::clear_session(&path)?;
    }
    render_success(ctx.output, "Signed out")
}

pub fn run_whoami(ctx: &Context) -> Result<()> {
    let user = ctx.with_backend(|backend| Ok(backend.current_user()?))?;
    render(ctx.output, &user, |u, w| {
        pretty_kv(w, "ID", &u.id)?;
        pretty_kv(w, "Name", u.display_name())?;
        pretty_kv(w, "Email", &u.email)
    })
}
