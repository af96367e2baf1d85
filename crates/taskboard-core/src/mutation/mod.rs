//! Optimistic mutation engine.
//!
//! A [`Mutation`] describes one user-initiated write: which cache entry it
//! touches, how to predict its effect locally, and which backend call makes
//! it real. The [`MutationExecutor`] runs it through
//!
//! ```text
//! Idle -> OptimisticApplied -> NetworkPending -> Committed | RolledBack
//! ```
//!
//! Validation happens before anything else: a rejected mutation leaves the
//! cache untouched and never reaches the network.

pub mod comments;
pub mod executor;
pub mod notify;
pub mod task;

pub use comments::{CreateComment, CreateReply, ToggleReaction};
pub use executor::{Dispatched, InFlight, MutationExecutor, MutationState, Outcome};
pub use notify::{Level, Notice, Notifier, RecordingNotifier, TracingNotifier};
pub use task::UpdateTask;

use chrono::{DateTime, Utc};

use crate::backend::Backend;
use crate::cache::{CacheValue, QueryKey};
use crate::error::{BackendError, MutationError};
use crate::model::{LocalId, User};

/// Result of validating a mutation's input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    Proceed,
    /// Nothing to do (e.g. blank content). Not an error.
    Skip,
}

/// Inputs available while computing an optimistic value.
#[derive(Debug)]
pub struct OptimisticContext<'a> {
    user: &'a User,
    now: DateTime<Utc>,
    next_local_id: &'a mut u64,
}

impl<'a> OptimisticContext<'a> {
    pub(crate) const fn new(
        user: &'a User,
        now: DateTime<Utc>,
        next_local_id: &'a mut u64,
    ) -> Self {
        Self {
            user,
            now,
            next_local_id,
        }
    }

    #[must_use]
    pub const fn user(&self) -> &User {
        self.user
    }

    #[must_use]
    pub const fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// A session-unique id for a record that only exists locally.
    pub const fn allocate_id(&mut self) -> LocalId {
        *self.next_local_id += 1;
        LocalId(*self.next_local_id)
    }
}

pub trait Mutation {
    type Output;

    /// Short name used in logs.
    const NAME: &'static str;

    /// Notice shown to the user when the mutation rolls back.
    const FAILURE_MESSAGE: &'static str;

    /// Cache entry this mutation writes to.
    fn key(&self) -> QueryKey;

    /// Validate input before any state changes.
    ///
    /// # Errors
    ///
    /// Returns an error when the input can never succeed.
    fn check(&self) -> Result<Check, MutationError> {
        Ok(Check::Proceed)
    }

    /// Predicted value for [`Self::key`], given what is cached now.
    /// `None` means "leave the cache alone".
    fn apply(&self, current: Option<&CacheValue>, cx: &mut OptimisticContext<'_>)
    -> Option<CacheValue>;

    /// The single authoritative request.
    ///
    /// # Errors
    ///
    /// Propagates the backend failure unchanged.
    fn send(&self, backend: &dyn Backend) -> Result<Self::Output, BackendError>;
}
