//! Author resolution pipeline
//!
//! Ties the history source, the email cache and the identity resolver
//! together:
//!
//! ```text
//! paths ──► history pool (git log, ≤ history_workers)
//!              │ (commit, email) per record
//!              ▼
//!          EmailCache ── hit ──────────────────────────┐
//!              │ miss                                  │
//!              ▼                                       ▼
//!          Deduplicator ──► lookup pool (≤ lookup_workers) ──► AuthorSet
//! ```
//!
//! All paths are in flight at once; the two pools are what bound the
//! number of `git` processes and HTTP requests. Histories are consumed in
//! completion order, results are returned in input order.
//!
//! The cache always wins: an email already cached is never looked up
//! again, even if the mapping is stale.

pub mod dedup;
pub mod pool;

pub use dedup::{Deduplicator, Resolution};
pub use pool::{Ticket, WorkerPool};

use crate::cache::EmailCache;
use crate::config::{RepoSlug, ResolveOptions};
use crate::error::{AuthorsError, AuthorsResult};
use crate::git::{CommitRecord, GitLog, HistorySource};
use crate::github::{GitHubClient, IdentityResolver, LookupFailure};
use crossbeam_channel::unbounded;
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Handles attributed to one input path, sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorSet {
    pub path: PathBuf,
    pub authors: BTreeSet<String>,
}

impl AuthorSet {
    pub fn contains(&self, handle: &str) -> bool {
        self.authors.contains(handle)
    }

    pub fn len(&self) -> usize {
        self.authors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.authors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.authors.iter().map(String::as_str)
    }
}

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub paths: usize,
    pub commits: usize,
    pub cache_hits: usize,
    /// Resolver calls issued
    pub lookups: usize,
    /// Cache misses answered by an existing resolution
    pub coalesced: usize,
    pub excluded: usize,
    /// Distinct (commit, email) failures reported
    pub failures: usize,
}

/// A commit waiting on its handle.
enum Pending {
    Cached(String),
    Lookup {
        commit: String,
        email: String,
        resolution: Arc<Resolution>,
    },
}

/// Resolves author handles for repository paths.
pub struct AuthorResolver {
    history: Arc<dyn HistorySource>,
    identity: Arc<dyn IdentityResolver>,
    options: ResolveOptions,
}

impl AuthorResolver {
    pub fn new(
        history: Arc<dyn HistorySource>,
        identity: Arc<dyn IdentityResolver>,
        options: ResolveOptions,
    ) -> Self {
        Self {
            history,
            identity,
            options,
        }
    }

    /// `git log` + GitHub resolver for the repository containing `workdir`.
    pub fn for_repository(
        repo: &RepoSlug,
        workdir: &Path,
        options: ResolveOptions,
    ) -> AuthorsResult<Self> {
        let history = GitLog::discover(workdir, options.git_bin.clone())?;
        let client = GitHubClient::new(repo.clone(), options.token.resolve());
        if !client.is_authenticated() {
            debug!("No GitHub token configured, using unauthenticated requests");
        }
        Ok(Self::new(Arc::new(history), Arc::new(client), options))
    }

    pub fn options(&self) -> &ResolveOptions {
        &self.options
    }

    /// One [`AuthorSet`] per input path, in input order. `cache` is read
    /// for hits and receives every successful lookup.
    pub fn resolve_authors<P: AsRef<Path>>(
        &self,
        paths: &[P],
        cache: &EmailCache,
    ) -> AuthorsResult<Vec<AuthorSet>> {
        self.resolve_authors_with_stats(paths, cache)
            .map(|(sets, _)| sets)
    }

    pub fn resolve_authors_with_stats<P: AsRef<Path>>(
        &self,
        paths: &[P],
        cache: &EmailCache,
    ) -> AuthorsResult<(Vec<AuthorSet>, RunStats)> {
        let opts = &self.options;
        let mut stats = RunStats {
            paths: paths.len(),
            ..Default::default()
        };

        let history_pool = WorkerPool::new("history", opts.history_workers);
        let dedup = Deduplicator::new(
            Arc::clone(&self.identity),
            opts.lookup_workers,
            opts.skip_email.clone(),
        );

        // Fan out one history job per path occurrence
        let (tx, rx) = unbounded::<(usize, AuthorsResult<Vec<CommitRecord>>)>();
        for (idx, path) in paths.iter().enumerate() {
            let path = path.as_ref().to_path_buf();
            let source = Arc::clone(&self.history);
            let follow = opts.follow_renames;
            let tx = tx.clone();
            history_pool.execute(move || {
                let _ = tx.send((idx, source.commits(&path, follow)));
            });
        }
        drop(tx);

        // Start lookups as soon as each history arrives
        let mut pending: Vec<Option<Vec<Pending>>> = (0..paths.len()).map(|_| None).collect();
        for _ in 0..paths.len() {
            let (idx, records) = rx
                .recv()
                .map_err(|_| AuthorsError::PoolClosed("history"))?;
            let records = match records {
                Ok(records) => records,
                Err(e) => {
                    keep_resolved(&pending, cache);
                    return Err(e);
                }
            };
            debug!(
                "{}: {} commits",
                paths[idx].as_ref().display(),
                records.len()
            );
            stats.commits += records.len();
            pending[idx] = Some(
                records
                    .into_iter()
                    .map(|record| match cache.get(&record.email) {
                        Some(handle) => {
                            stats.cache_hits += 1;
                            Pending::Cached(handle)
                        }
                        None => Pending::Lookup {
                            resolution: dedup.submit(&record.email, &record.commit),
                            commit: record.commit,
                            email: record.email,
                        },
                    })
                    .collect(),
            );
        }

        // Collect in input order
        let mut reported: HashSet<(String, String)> = HashSet::new();
        let mut results = Vec::with_capacity(paths.len());
        for (path, commits) in paths.iter().zip(pending) {
            let mut set = AuthorSet {
                path: path.as_ref().to_path_buf(),
                authors: BTreeSet::new(),
            };
            for item in commits.into_iter().flatten() {
                match item {
                    Pending::Cached(handle) => {
                        set.authors.insert(handle);
                    }
                    Pending::Lookup {
                        commit,
                        email,
                        resolution,
                    } => match resolution.wait() {
                        Ok(handle) => {
                            cache.set(email, handle.clone());
                            set.authors.insert(handle);
                        }
                        Err(error) => {
                            if reported.insert((commit.clone(), email.clone())) {
                                stats.failures += 1;
                                (opts.on_error)(&LookupFailure {
                                    commit,
                                    email,
                                    error,
                                });
                            }
                        }
                    },
                }
            }
            results.push(set);
        }

        stats.lookups = dedup.submitted();
        stats.coalesced = dedup.coalesced();
        stats.excluded = dedup.excluded();
        info!(
            "Resolved {} paths: {} commits, {} cache hits, {} lookups ({} coalesced), {} failures",
            stats.paths,
            stats.commits,
            stats.cache_hits,
            stats.lookups,
            stats.coalesced,
            stats.failures
        );

        Ok((results, stats))
    }
}

/// Cache every successful lookup already started, so an aborted batch does
/// not spend them again on the next run.
fn keep_resolved(pending: &[Option<Vec<Pending>>], cache: &EmailCache) {
    for item in pending.iter().flatten().flatten() {
        if let Pending::Lookup {
            email, resolution, ..
        } = item
        {
            if let Ok(handle) = resolution.wait() {
                cache.set(email.as_str(), handle);
            }
        }
    }
}

/// Validate `repo`, then resolve `paths` inside the repository at `workdir`.
///
/// An invalid `owner/name` fails before any process is spawned.
pub fn resolve_authors<P: AsRef<Path>>(
    repo: &str,
    workdir: &Path,
    paths: &[P],
    cache: &EmailCache,
    options: ResolveOptions,
) -> AuthorsResult<Vec<AuthorSet>> {
    let slug = RepoSlug::parse(repo)?;
    AuthorResolver::for_repository(&slug, workdir, options)?.resolve_authors(paths, cache)
}
