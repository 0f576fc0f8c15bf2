//! Commit identity lookups
//!
//! Turns a commit id into the account handle that authored it. The
//! resolver only needs the [`IdentityResolver`] trait; [`GitHubClient`]
//! implements it against the GitHub REST API.
//!
//! # Environment Variables
//!
//! - `GITHUB_TOKEN` / `GH_TOKEN`: optional bearer token, raises the rate limit

mod client;

pub use client::{extract_handle, GitHubClient, DEFAULT_API_BASE};

use thiserror::Error;

/// Why a single lookup failed. Cloned to every caller waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("API request failed: {0}")]
    Request(String),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited by API (status {status})")]
    RateLimited { status: u16 },

    #[error("No account linked to commit {commit}")]
    MissingHandle { commit: String },

    #[error("Failed to parse API response: {0}")]
    Parse(String),

    #[error("Email excluded from lookup")]
    Excluded,

    #[error("Lookup worker stopped before answering")]
    WorkerLost,
}

pub type LookupResult<T> = Result<T, LookupError>;

/// A failed resolution as reported to the error callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupFailure {
    pub commit: String,
    pub email: String,
    pub error: LookupError,
}

/// Resolves a commit to the handle of its author.
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, commit: &str) -> LookupResult<String>;
}
