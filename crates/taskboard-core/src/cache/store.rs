//! Entry storage and ordering rules for the query cache.
//!
//! Each key carries a small amount of bookkeeping next to its value:
//!
//! - a **generation**, bumped whenever a fetch result must no longer be
//!   accepted (an optimistic write started, or a mutation settled);
//! - a **mutation sequence**, incremented by every mutation that targets the
//!   key;
//! - an **in-flight count** of mutations that have applied optimistically
//!   but not yet settled, plus a `dirty` flag.
//!
//! A fetch takes a [`FetchTicket`] before it starts. The result is applied
//! only if the key's generation is unchanged and no mutation is in flight.
//! Settled mutations do not invalidate immediately: the key is invalidated
//! once the last in-flight mutation for it settles, so a refetch can never
//! land between two overlapping optimistic writes. A key turns dirty when a
//! mutation commits, or when one rolls back while another is still in
//! flight: its snapshot then holds the other's optimistic write, so only a
//! refetch can recover server state.
//!
//! Generations come from one counter shared by every key and never repeat.
//! Bookkeeping for a key with nothing cached and nothing in flight is
//! dropped, and a ticket whose key has no bookkeeping is discarded.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use super::{CacheValue, QueryKey};

#[derive(Debug, Clone)]
struct Entry {
    value: CacheValue,
    fetched_at: DateTime<Utc>,
    invalidated: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct KeyState {
    generation: u64,
    latest_seq: u64,
    in_flight: u32,
    dirty: bool,
}

/// Permission to apply one fetch result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    key: QueryKey,
    generation: u64,
    seq: u64,
}

impl FetchTicket {
    #[must_use]
    pub const fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Mutation sequence number the fetch was started after.
    #[must_use]
    pub const fn seq(&self) -> u64 {
        self.seq
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied,
    /// The ticket was cancelled or overtaken by a mutation.
    Discarded,
}

/// Query cache for one client session.
#[derive(Debug)]
pub struct QueryCache {
    entries: HashMap<QueryKey, Entry>,
    keys: HashMap<QueryKey, KeyState>,
    epoch: u64,
    stale_after: Duration,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(Duration::minutes(5))
    }
}

impl QueryCache {
    #[must_use]
    pub fn new(stale_after: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            keys: HashMap::new(),
            epoch: 0,
            stale_after,
        }
    }

    #[must_use]
    pub const fn stale_after(&self) -> Duration {
        self.stale_after
    }

    // -----------------------------------------------------------------------
    // Plain key/value access
    // -----------------------------------------------------------------------

    #[must_use]
    pub fn get(&self, key: &QueryKey) -> Option<&CacheValue> {
        self.entries.get(key).map(|e| &e.value)
    }

    /// Store a fresh value for `key`.
    pub fn set(&mut self, key: QueryKey, value: CacheValue, now: DateTime<Utc>) {
        self.entries.insert(
            key,
            Entry {
                value,
                fetched_at: now,
                invalidated: false,
            },
        );
    }

    /// Mark `key` stale so the next read or [`Self::stale_keys`] pass
    /// refetches it. Returns `false` when nothing is cached for `key`.
    pub fn invalidate(&mut self, key: &QueryKey) -> bool {
        self.entries.get_mut(key).is_some_and(|entry| {
            entry.invalidated = true;
            debug!(%key, "cache entry invalidated");
            true
        })
    }

    /// Missing, invalidated, or older than the stale window.
    #[must_use]
    pub fn is_stale(&self, key: &QueryKey, now: DateTime<Utc>) -> bool {
        self.entries
            .get(key)
            .is_none_or(|e| e.invalidated || now - e.fetched_at >= self.stale_after)
    }

    #[must_use]
    pub fn is_invalidated(&self, key: &QueryKey) -> bool {
        self.entries.get(key).is_some_and(|e| e.invalidated)
    }

    /// Invalidated entries that are ready to be refetched.
    #[must_use]
    pub fn stale_keys(&self) -> Vec<QueryKey> {
        let mut keys: Vec<QueryKey> = self
            .entries
            .iter()
            .filter(|(key, entry)| entry.invalidated && self.in_flight(key) == 0)
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort_by_key(ToString::to_string);
        keys
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry and all bookkeeping. Tickets taken before the clear
    /// are discarded.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.keys.clear();
        self.epoch += 1;
    }

    /// Number of keys carrying ordering bookkeeping.
    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.keys.len()
    }

    fn state_mut(&mut self, key: &QueryKey) -> &mut KeyState {
        let epoch = self.epoch;
        self.keys.entry(key.clone()).or_insert_with(|| KeyState {
            generation: epoch,
            ..KeyState::default()
        })
    }

    fn next_generation(&mut self) -> u64 {
        self.epoch += 1;
        self.epoch
    }

    // -----------------------------------------------------------------------
    // Fetch ordering
    // -----------------------------------------------------------------------

    pub fn begin_fetch(&mut self, key: &QueryKey) -> FetchTicket {
        let state = self.state_mut(key);
        FetchTicket {
            key: key.clone(),
            generation: state.generation,
            seq: state.latest_seq,
        }
    }

    /// Apply a fetch result if its ticket is still valid.
    pub fn complete_fetch(
        &mut self,
        ticket: FetchTicket,
        value: CacheValue,
        now: DateTime<Utc>,
    ) -> FetchOutcome {
        let current = self.keys.get(&ticket.key).copied();
        let valid = current.is_some_and(|state| {
            state.generation == ticket.generation
                && state.latest_seq == ticket.seq
                && state.in_flight == 0
        });
        if !valid {
            warn!(
                key = %ticket.key,
                ticket_seq = ticket.seq,
                latest_seq = current.map_or(0, |s| s.latest_seq),
                "discarding stale fetch result"
            );
            return FetchOutcome::Discarded;
        }
        self.set(ticket.key, value, now);
        FetchOutcome::Applied
    }

    /// Invalidate every outstanding fetch ticket for `key`.
    pub fn cancel_fetches(&mut self, key: &QueryKey) {
        let generation = self.next_generation();
        self.state_mut(key).generation = generation;
    }

    // -----------------------------------------------------------------------
    // Mutation ordering
    // -----------------------------------------------------------------------

    /// Register a mutation against `key`: cancels outstanding fetches and
    /// returns the mutation's sequence number.
    pub fn begin_mutation(&mut self, key: &QueryKey) -> u64 {
        let generation = self.next_generation();
        let state = self.state_mut(key);
        state.generation = generation;
        state.latest_seq += 1;
        state.in_flight += 1;
        debug!(%key, seq = state.latest_seq, in_flight = state.in_flight, "mutation started");
        state.latest_seq
    }

    /// Replace the value for `key` without touching its freshness.
    pub fn write_optimistic(&mut self, key: &QueryKey, value: CacheValue, now: DateTime<Utc>) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.value = value;
        } else {
            self.set(key.clone(), value, now);
        }
    }

    /// Put back a snapshot taken by [`Self::get`]. `None` removes the entry.
    pub fn restore(&mut self, key: &QueryKey, snapshot: Option<CacheValue>) {
        match snapshot {
            Some(value) => {
                if let Some(entry) = self.entries.get_mut(key) {
                    entry.value = value;
                } else {
                    // Only reachable if the entry was cleared mid-flight.
                    self.entries.insert(
                        key.clone(),
                        Entry {
                            value,
                            fetched_at: DateTime::<Utc>::MIN_UTC,
                            invalidated: true,
                        },
                    );
                }
            }
            None => {
                self.entries.remove(key);
            }
        }
    }

    /// Settle one mutation. When the last in-flight mutation for `key`
    /// settles and the key is dirty, the entry is invalidated.
    ///
    /// A rollback that settles while another mutation is still in flight
    /// marks the key dirty: the snapshot it restored was taken after the
    /// other mutation's optimistic write.
    pub fn finish_mutation(&mut self, key: &QueryKey, seq: u64, committed: bool) {
        let generation = self.next_generation();
        let Some(state) = self.keys.get_mut(key) else {
            return;
        };
        state.in_flight = state.in_flight.saturating_sub(1);
        state.generation = generation;
        state.dirty |= committed || state.in_flight > 0;
        debug!(
            %key,
            seq,
            committed,
            in_flight = state.in_flight,
            dirty = state.dirty,
            "mutation settled"
        );
        if state.in_flight > 0 {
            return;
        }

        let dirty = std::mem::take(&mut state.dirty);
        if !self.entries.contains_key(key) {
            self.keys.remove(key);
        } else if dirty {
            self.invalidate(key);
        }
    }

    #[must_use]
    pub fn in_flight(&self, key: &QueryKey) -> u32 {
        self.keys.get(key).map_or(0, |s| s.in_flight)
    }

    #[must_use]
    pub fn latest_seq(&self, key: &QueryKey) -> u64 {
        self.keys.get(key).map_or(0, |s| s.latest_seq)
    }
}
