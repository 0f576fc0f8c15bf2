//! repo-authors - resolve the GitHub accounts behind repository paths
//!
//! For each path, the commit history (commit id + author email) is read
//! with `git log`, and every distinct email is turned into an account
//! handle with at most one GitHub lookup per run. Results are cached by
//! email so later runs skip known authors entirely.
//!
//! # Example
//!
//! ```no_run
//! use repo_authors::{cache, resolve_authors, ResolveOptions};
//! use std::path::Path;
//!
//! let cache_path = Path::new("authors-cache.json");
//! let cache = cache::load_cache_or_default(cache_path)?;
//! let sets = resolve_authors(
//!     "rust-lang/cargo",
//!     Path::new("."),
//!     &["src/cargo/lib.rs", "src/bin"],
//!     &cache,
//!     ResolveOptions::default(),
//! )?;
//! for set in &sets {
//!     println!("{}: {:?}", set.path.display(), set.authors);
//! }
//! cache::save_cache(cache_path, &cache)?;
//! # Ok::<(), repo_authors::AuthorsError>(())
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod git;
pub mod github;
pub mod resolve;

pub use cache::EmailCache;
pub use config::{EmailFilter, RepoSlug, ResolveOptions, TokenSetting};
pub use error::{AuthorsError, AuthorsResult};
pub use git::{CommitRecord, GitLog, HistorySource};
pub use github::{GitHubClient, IdentityResolver, LookupError, LookupFailure};
pub use resolve::{resolve_authors, AuthorResolver, AuthorSet, RunStats};
