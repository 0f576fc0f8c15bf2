//! At-most-once lookups per email
//!
//! The first request for an email creates a shared [`Resolution`], submits
//! exactly one lookup for it (using that request's commit id) and stores
//! it in the in-flight map before anyone waits on it. Later requests for
//! the same email get the same `Resolution`, whether the lookup is still
//! running or finished long ago, so every caller sees the same handle or
//! the same error.
//!
//! Entries are never evicted during a run. Failures stay here and are not
//! retried; only successes make it into the persistent [`EmailCache`].
//!
//! [`EmailCache`]: crate::cache::EmailCache

use super::pool::{Ticket, WorkerPool};
use crate::config::EmailFilter;
use crate::github::{IdentityResolver, LookupError, LookupResult};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// The single lookup attempt for one email in one run.
pub struct Resolution {
    email: String,
    /// Commit id actually sent to the resolver
    commit: String,
    ticket: Option<Ticket<LookupResult<String>>>,
    outcome: OnceLock<LookupResult<String>>,
}

impl Resolution {
    fn pending(email: &str, commit: &str, ticket: Ticket<LookupResult<String>>) -> Self {
        Self {
            email: email.to_string(),
            commit: commit.to_string(),
            ticket: Some(ticket),
            outcome: OnceLock::new(),
        }
    }

    fn settled(email: &str, commit: &str, outcome: LookupResult<String>) -> Self {
        Self {
            email: email.to_string(),
            commit: commit.to_string(),
            ticket: None,
            outcome: OnceLock::from(outcome),
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// The representative commit id for this email.
    pub fn commit(&self) -> &str {
        &self.commit
    }

    pub fn is_settled(&self) -> bool {
        self.outcome.get().is_some()
    }

    /// Block until the lookup finishes. Concurrent waiters block on the
    /// same receive and all get a clone of the one outcome.
    pub fn wait(&self) -> LookupResult<String> {
        self.outcome
            .get_or_init(|| match &self.ticket {
                Some(ticket) => ticket.recv().unwrap_or(Err(LookupError::WorkerLost)),
                None => Err(LookupError::WorkerLost),
            })
            .clone()
    }
}

/// Coalesces lookups by email and runs them on a bounded pool.
pub struct Deduplicator {
    resolver: Arc<dyn IdentityResolver>,
    pool: WorkerPool,
    skip: Option<EmailFilter>,
    inflight: DashMap<String, Arc<Resolution>>,
    submitted: AtomicUsize,
    coalesced: AtomicUsize,
    excluded: AtomicUsize,
}

impl Deduplicator {
    /// `lookup_workers` caps concurrent resolver calls.
    pub fn new(
        resolver: Arc<dyn IdentityResolver>,
        lookup_workers: usize,
        skip: Option<EmailFilter>,
    ) -> Self {
        Self {
            resolver,
            pool: WorkerPool::new("lookup", lookup_workers),
            skip,
            inflight: DashMap::new(),
            submitted: AtomicUsize::new(0),
            coalesced: AtomicUsize::new(0),
            excluded: AtomicUsize::new(0),
        }
    }

    /// Get the shared resolution for `email`, starting it with `commit`
    /// if this is the first request. Never blocks on the lookup itself.
    pub fn submit(&self, email: &str, commit: &str) -> Arc<Resolution> {
        if let Some(existing) = self.inflight.get(email) {
            self.coalesced.fetch_add(1, Ordering::Relaxed);
            return Arc::clone(existing.value());
        }

        // Check-then-insert under the shard lock for this key only
        match self.inflight.entry(email.to_string()) {
            Entry::Occupied(existing) => {
                self.coalesced.fetch_add(1, Ordering::Relaxed);
                Arc::clone(existing.get())
            }
            Entry::Vacant(slot) => {
                let resolution = Arc::new(self.start(email, commit));
                slot.insert(Arc::clone(&resolution));
                resolution
            }
        }
    }

    /// Resolve `email`, blocking until its single lookup completes.
    pub fn resolve(&self, email: &str, commit: &str) -> LookupResult<String> {
        self.submit(email, commit).wait()
    }

    fn start(&self, email: &str, commit: &str) -> Resolution {
        if self.skip.as_ref().is_some_and(|f| f.matches(email)) {
            debug!("Skipping lookup for excluded email {}", email);
            self.excluded.fetch_add(1, Ordering::Relaxed);
            return Resolution::settled(email, commit, Err(LookupError::Excluded));
        }

        debug!("Looking up {} via commit {}", email, commit);
        self.submitted.fetch_add(1, Ordering::Relaxed);
        let resolver = Arc::clone(&self.resolver);
        let sha = commit.to_string();
        let ticket = self.pool.submit(move || resolver.resolve(&sha));
        Resolution::pending(email, commit, ticket)
    }

    /// Lookups handed to the resolver.
    pub fn submitted(&self) -> usize {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Requests answered by an existing resolution.
    pub fn coalesced(&self) -> usize {
        self.coalesced.load(Ordering::Relaxed)
    }

    /// Emails rejected by the skip filter.
    pub fn excluded(&self) -> usize {
        self.excluded.load(Ordering::Relaxed)
    }

    pub fn peak_concurrency(&self) -> usize {
        self.pool.peak_concurrency()
    }
}
