//! Drives mutations through optimistic apply, dispatch and settlement.
//!
//! The executor is single-threaded. Each step runs to completion before the
//! next one starts; the only gap between steps is the network request made
//! by [`InFlight::dispatch`]. Callers that want to interleave several
//! mutations (or simulate responses arriving out of order) can hold several
//! [`InFlight`] values at once and settle them in any order.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use chrono::Duration;
use tracing::{debug, warn};

use super::notify::{Notice, Notifier, TracingNotifier};
use super::{Check, Mutation, OptimisticContext};
use crate::backend::Backend;
use crate::cache::{CacheValue, FetchOutcome, FetchTicket, QueryCache, QueryKey, fetch_query};
use crate::clock::{Clock, SystemClock};
use crate::error::{BackendError, MutationError};
use crate::model::{CommentTree, SortOrder, TaskDetail, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationState {
    Idle,
    OptimisticApplied,
    NetworkPending,
    Committed,
    RolledBack,
}

impl fmt::Display for MutationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::OptimisticApplied => "optimistic-applied",
            Self::NetworkPending => "network-pending",
            Self::Committed => "committed",
            Self::RolledBack => "rolled-back",
        })
    }
}

/// What [`MutationExecutor::execute`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Committed(T),
    /// Input was empty; nothing was applied or sent.
    Skipped,
}

impl<T> Outcome<T> {
    pub fn committed(self) -> Option<T> {
        match self {
            Self::Committed(value) => Some(value),
            Self::Skipped => None,
        }
    }
}

/// A mutation whose optimistic value is in the cache and whose request has
/// not been sent yet. Must be passed to [`InFlight::dispatch`] or
/// [`InFlight::resolve`] and then settled.
#[must_use = "an in-flight mutation must be dispatched and settled"]
#[derive(Debug)]
pub struct InFlight<M> {
    mutation: M,
    key: QueryKey,
    seq: u64,
    snapshot: Option<CacheValue>,
    wrote: bool,
}

/// A mutation whose request has completed, waiting to be settled.
#[must_use = "a dispatched mutation must be settled"]
pub struct Dispatched<M: Mutation> {
    inner: InFlight<M>,
    result: Result<M::Output, BackendError>,
}

impl<M: Mutation> fmt::Debug for Dispatched<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatched")
            .field("mutation", &M::NAME)
            .field("key", &self.inner.key)
            .field("seq", &self.inner.seq)
            .field("ok", &self.result.is_ok())
            .finish()
    }
}

impl<M: Mutation> InFlight<M> {
    #[must_use]
    pub const fn key(&self) -> &QueryKey {
        &self.key
    }

    #[must_use]
    pub const fn seq(&self) -> u64 {
        self.seq
    }

    /// Cache value captured immediately before the optimistic write.
    #[must_use]
    pub const fn snapshot(&self) -> Option<&CacheValue> {
        self.snapshot.as_ref()
    }

    /// Send the mutation's one request. A panic inside the backend is
    /// converted into a failed response so the mutation still rolls back.
    pub fn dispatch(self, backend: &dyn Backend) -> Dispatched<M> {
        debug!(
            mutation = M::NAME,
            key = %self.key,
            seq = self.seq,
            state = %MutationState::NetworkPending,
            "dispatching"
        );
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.mutation.send(backend)))
            .unwrap_or_else(|payload| {
                let detail = payload
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(BackendError::Server {
                    status: 500,
                    message: format!("backend panicked: {detail}"),
                })
            });
        self.resolve(result)
    }

    /// Attach a response obtained elsewhere.
    pub const fn resolve(self, result: Result<M::Output, BackendError>) -> Dispatched<M> {
        Dispatched {
            inner: self,
            result,
        }
    }
}

impl<M: Mutation> Dispatched<M> {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Owns the query cache for one session and runs mutations against it.
pub struct MutationExecutor<N = TracingNotifier, C = SystemClock> {
    cache: QueryCache,
    session: Option<User>,
    notifier: N,
    clock: C,
    next_local_id: u64,
}

impl Default for MutationExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl MutationExecutor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache: QueryCache::default(),
            session: None,
            notifier: TracingNotifier,
            clock: SystemClock,
            next_local_id: 0,
        }
    }
}

impl<N: Notifier, C: Clock> MutationExecutor<N, C> {
    pub fn with_notifier<M: Notifier>(self, notifier: M) -> MutationExecutor<M, C> {
        MutationExecutor {
            cache: self.cache,
            session: self.session,
            notifier,
            clock: self.clock,
            next_local_id: self.next_local_id,
        }
    }

    pub fn with_clock<D: Clock>(self, clock: D) -> MutationExecutor<N, D> {
        MutationExecutor {
            cache: self.cache,
            session: self.session,
            notifier: self.notifier,
            clock,
            next_local_id: self.next_local_id,
        }
    }

    #[must_use]
    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.cache = QueryCache::new(stale_after);
        self
    }

    // -----------------------------------------------------------------------
    // Session lifecycle
    // -----------------------------------------------------------------------

    /// Start a session. Switching users drops everything cached for the
    /// previous one.
    pub fn sign_in(&mut self, user: User) {
        if self.session.as_ref().is_some_and(|u| u.id != user.id) {
            self.cache.clear();
        }
        debug!(user = %user.id, "session started");
        self.session = Some(user);
    }

    pub fn sign_out(&mut self) {
        self.cache.clear();
        self.session = None;
        debug!("session ended");
    }

    #[must_use]
    pub const fn session(&self) -> Option<&User> {
        self.session.as_ref()
    }

    #[must_use]
    pub const fn cache(&self) -> &QueryCache {
        &self.cache
    }

    #[must_use]
    pub const fn notifier(&self) -> &N {
        &self.notifier
    }

    pub const fn notifier_mut(&mut self) -> &mut N {
        &mut self.notifier
    }

    /// Seed or overwrite a cache entry as if it had just been fetched.
    pub fn prime(&mut self, key: QueryKey, value: CacheValue) {
        let now = self.clock.now();
        self.cache.set(key, value, now);
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Validate `mutation`, cancel outstanding fetches for its key, capture
    /// the rollback snapshot and write the optimistic value.
    ///
    /// Returns `Ok(None)` when the mutation is a no-op.
    ///
    /// # Errors
    ///
    /// [`MutationError::Invalid`] or [`MutationError::PendingTarget`] from
    /// validation, [`MutationError::Unauthenticated`] without a session. In
    /// every error case the cache is untouched.
    pub fn begin<M: Mutation>(
        &mut self,
        mutation: M,
    ) -> Result<Option<InFlight<M>>, MutationError> {
        if mutation.check()? == Check::Skip {
            debug!(mutation = M::NAME, "skipped empty mutation");
            return Ok(None);
        }
        let Some(user) = self.session.as_ref() else {
            return Err(MutationError::Unauthenticated);
        };

        let key = mutation.key();
        let seq = self.cache.begin_mutation(&key);
        let snapshot = self.cache.get(&key).cloned();

        let now = self.clock.now();
        let mut cx = OptimisticContext::new(user, now, &mut self.next_local_id);
        let optimistic = mutation.apply(snapshot.as_ref(), &mut cx);
        let wrote = optimistic.is_some();
        if let Some(value) = optimistic {
            self.cache.write_optimistic(&key, value, now);
        }

        debug!(
            mutation = M::NAME,
            %key,
            seq,
            wrote,
            state = %MutationState::OptimisticApplied,
            "optimistic value applied"
        );

        Ok(Some(InFlight {
            mutation,
            key,
            seq,
            snapshot,
            wrote,
        }))
    }

    /// Commit or roll back a completed mutation.
    ///
    /// On success the key is marked for refetch once no other mutation for
    /// it is in flight. On any failure the key's value is restored to the
    /// snapshot taken in [`Self::begin`] and exactly one error notice is
    /// raised.
    ///
    /// # Errors
    ///
    /// [`MutationError::RolledBack`] carrying the backend failure.
    pub fn settle<M: Mutation>(
        &mut self,
        dispatched: Dispatched<M>,
    ) -> Result<M::Output, MutationError> {
        let Dispatched { inner, result } = dispatched;
        match result {
            Ok(output) => {
                self.cache.finish_mutation(&inner.key, inner.seq, true);
                debug!(
                    mutation = M::NAME,
                    key = %inner.key,
                    seq = inner.seq,
                    state = %MutationState::Committed,
                    "mutation committed"
                );
                Ok(output)
            }
            Err(source) => {
                if inner.wrote {
                    self.cache.restore(&inner.key, inner.snapshot);
                }
                self.cache.finish_mutation(&inner.key, inner.seq, false);
                warn!(
                    mutation = M::NAME,
                    key = %inner.key,
                    seq = inner.seq,
                    error = %source,
                    state = %MutationState::RolledBack,
                    "mutation rolled back"
                );
                self.notifier.notify(Notice::error(M::FAILURE_MESSAGE));
                Err(MutationError::RolledBack {
                    message: M::FAILURE_MESSAGE,
                    source,
                })
            }
        }
    }

    /// Run `mutation` start to finish against `backend`.
    ///
    /// # Errors
    ///
    /// See [`Self::begin`] and [`Self::settle`].
    pub fn execute<M: Mutation>(
        &mut self,
        backend: &dyn Backend,
        mutation: M,
    ) -> Result<Outcome<M::Output>, MutationError> {
        let Some(in_flight) = self.begin(mutation)? else {
            return Ok(Outcome::Skipped);
        };
        let dispatched = in_flight.dispatch(backend);
        self.settle(dispatched).map(Outcome::Committed)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Cached value for `key`, fetched first when missing or stale.
    ///
    /// While a mutation for `key` is in flight the optimistic value is
    /// returned as-is.
    ///
    /// # Errors
    ///
    /// Propagates fetch failures.
    pub fn read(
        &mut self,
        backend: &dyn Backend,
        key: &QueryKey,
    ) -> Result<CacheValue, BackendError> {
        let now = self.clock.now();
        if let Some(value) = self.cache.get(key) {
            if !self.cache.is_stale(key, now) || self.cache.in_flight(key) > 0 {
                return Ok(value.clone());
            }
        }

        let ticket = self.cache.begin_fetch(key);
        let value = fetch_query(backend, key)?;
        match self.complete_fetch(ticket, value.clone()) {
            FetchOutcome::Applied => Ok(value),
            FetchOutcome::Discarded => Ok(self.cache.get(key).cloned().unwrap_or(value)),
        }
    }

    /// # Errors
    ///
    /// Propagates fetch failures.
    pub fn read_comments(
        &mut self,
        backend: &dyn Backend,
        project_id: &str,
        task_id: &str,
        sort: SortOrder,
    ) -> Result<CommentTree, BackendError> {
        let key = QueryKey::comments(project_id, task_id, sort);
        match self.read(backend, &key)? {
            CacheValue::Comments(tree) => Ok(tree),
            CacheValue::Task(_) => Err(BackendError::Decode(format!("{key} holds a task"))),
        }
    }

    /// # Errors
    ///
    /// Propagates fetch failures.
    pub fn read_task(
        &mut self,
        backend: &dyn Backend,
        project_id: &str,
        task_id: &str,
    ) -> Result<TaskDetail, BackendError> {
        let key = QueryKey::task(project_id, task_id);
        match self.read(backend, &key)? {
            CacheValue::Task(detail) => Ok(detail),
            CacheValue::Comments(_) => Err(BackendError::Decode(format!("{key} holds comments"))),
        }
    }

    /// Take a ticket for a fetch the caller performs itself.
    pub fn begin_fetch(&mut self, key: &QueryKey) -> FetchTicket {
        self.cache.begin_fetch(key)
    }

    pub fn complete_fetch(&mut self, ticket: FetchTicket, value: CacheValue) -> FetchOutcome {
        let now = self.clock.now();
        self.cache.complete_fetch(ticket, value, now)
    }

    /// Refetch every invalidated entry that has no mutation in flight.
    /// Returns how many entries were refreshed; failures are logged and the
    /// entry stays invalidated.
    pub fn refetch_stale(&mut self, backend: &dyn Backend) -> usize {
        let mut refreshed = 0;
        for key in self.cache.stale_keys() {
            let ticket = self.cache.begin_fetch(&key);
            match fetch_query(backend, &key) {
                Ok(value) => {
                    if self.complete_fetch(ticket, value) == FetchOutcome::Applied {
                        refreshed += 1;
                    }
                }
                Err(err) => warn!(%key, error = %err, "background refetch failed"),
            }
        }
        refreshed
    }
}
