//! Git history extraction
//!
//! Provides the commit history (commit id + author email) of repository
//! paths. The resolver only depends on the [`HistorySource`] trait;
//! [`GitLog`] is the implementation backed by the `git` binary.
//!
//! # Example
//!
//! ```no_run
//! use repo_authors::git::{GitLog, HistorySource};
//! use std::path::Path;
//!
//! let log = GitLog::discover(Path::new("."), "git").unwrap();
//! let commits = log.commits(Path::new("src/main.rs"), true).unwrap();
//! ```

pub mod history;

pub use history::GitLog;

use crate::error::AuthorsResult;
use std::path::Path;

/// One commit touching a path, as reported by the history source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommitRecord {
    pub commit: String,
    pub email: String,
}

impl CommitRecord {
    pub fn new(commit: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            commit: commit.into(),
            email: email.into(),
        }
    }
}

/// Produces the history of a single path.
pub trait HistorySource: Send + Sync {
    /// Commits touching `path`, newest first.
    ///
    /// `follow_renames` only applies to single files; directory
    /// histories always cover everything beneath them.
    fn commits(&self, path: &Path, follow_renames: bool) -> AuthorsResult<Vec<CommitRecord>>;
}

/// Parse `git log --format="%H %ae"` output.
///
/// Empty lines are ignored and lines without exactly two space-separated
/// fields are skipped.
pub fn parse_log_output(output: &str) -> Vec<CommitRecord> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let mut fields = line.split(' ');
            match (fields.next(), fields.next(), fields.next()) {
                (Some(commit), Some(email), None) if !commit.is_empty() && !email.is_empty() => {
                    Some(CommitRecord::new(commit, email))
                }
                _ => None,
            }
        })
        .collect()
}
