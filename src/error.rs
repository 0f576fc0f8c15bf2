//! Error types for author resolution
//!
//! Fatal errors (bad configuration, history extraction, cache files) are
//! `AuthorsError`. Per-email lookup failures are recoverable and live in
//! [`crate::github::LookupError`] instead.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort an operation
#[derive(Error, Debug)]
pub enum AuthorsError {
    #[error("Invalid repository '{0}': expected owner/name")]
    InvalidRepo(String),

    #[error("Path does not exist: {}", .0.display())]
    PathNotFound(PathBuf),

    #[error("Not a git repository: {}", .0.display())]
    NotARepository(PathBuf),

    #[error("Failed to run '{bin}': {source}")]
    Spawn {
        bin: String,
        #[source]
        source: std::io::Error,
    },

    #[error("git log failed for {} (status {status}): {stderr}", .path.display())]
    Vcs {
        path: PathBuf,
        status: i32,
        stderr: String,
    },

    #[error("Cache file {} is empty", .0.display())]
    EmptyCache(PathBuf),

    #[error("Failed to access cache file {}: {source}", .path.display())]
    CacheIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cache file {} is not a list of [email, handle] pairs: {source}", .path.display())]
    CacheParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid config {}: {message}", .path.display())]
    Config { path: PathBuf, message: String },

    #[error("{0} worker pool stopped before the task completed")]
    PoolClosed(&'static str),
}

pub type AuthorsResult<T> = Result<T, AuthorsError>;
