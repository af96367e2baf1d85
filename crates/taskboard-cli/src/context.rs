//! Per-invocation state: resolved config, output mode, session token, and
//! the backend commands talk to.

use anyhow::{Result, bail};
use std::time::Duration;
use taskboard_core::backend::{Backend, HttpBackend};
use taskboard_core::config::EffectiveConfig;
use taskboard_core::model::SortOrder;
use taskboard_core::mutation::MutationExecutor;
use taskboard_store::{LocalBackend, Store};
use tracing::debug;

use crate::output::OutputMode;

pub struct Context {
    pub config: EffectiveConfig,
    pub output: OutputMode,
    pub quiet: bool,
    token: Option<String>,
}

impl Context {
    pub const fn new(
        config: EffectiveConfig,
        output: OutputMode,
        quiet: bool,
        token: Option<String>,
    ) -> Self {
        Self {
            config,
            output,
            quiet,
            token,
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub const fn default_sort(&self) -> SortOrder {
        self.config.user.comments.default_sort
    }

    pub const fn is_remote(&self) -> bool {
        self.config.server_url.is_some()
    }

    /// Open the local store. Account commands need it even when a token is
    /// already known.
    pub fn open_store(&self) -> Result<Store> {
        if let Some(url) = &self.config.server_url {
            bail!("this command needs the local store, but a remote server is configured ({url})");
        }
        debug!(path = %self.config.database.display(), "opening local store");
        Store::open(&self.config.database)
    }

    /// Run `f` against the configured backend: the remote server when a URL
    /// is set, otherwise the local store.
    pub fn with_backend<T>(&self, f: impl FnOnce(&dyn Backend) -> Result<T>) -> Result<T> {
        if let Some(url) = &self.config.server_url {
            let timeout = Duration::from_secs(self.config.user.server.timeout_secs);
            let mut backend = HttpBackend::new(url, timeout);
            if let Some(token) = &self.token {
                backend = backend.with_session(token.clone());
            }
            debug!(url, "using remote backend");
            return f(&backend);
        }

        let store = self.open_store()?;
        let backend = LocalBackend::new(&store, self.token.clone());
        f(&backend)
    }

    /// An executor signed in as the session user.
    pub fn executor(&self, backend: &dyn Backend) -> Result<MutationExecutor> {
        let user = backend.current_user()?;
        let mut executor =
            MutationExecutor::new().with_stale_after(self.config.user.cache.stale_after());
        executor.sign_in(user);
        Ok(executor)
    }
}
