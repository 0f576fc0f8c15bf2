//! Commit history via the `git` binary
//!
//! Runs `git log --format="%H %ae"` per path. The repository working
//! directory is located with libgit2 so relative paths resolve the same
//! way no matter where the process was started.

use super::{parse_log_output, CommitRecord, HistorySource};
use crate::error::{AuthorsError, AuthorsResult};
use git2::Repository;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// `git log` backed history source.
#[derive(Debug, Clone)]
pub struct GitLog {
    git_bin: String,
    workdir: PathBuf,
}

impl GitLog {
    pub fn new(workdir: impl Into<PathBuf>, git_bin: impl Into<String>) -> Self {
        Self {
            git_bin: git_bin.into(),
            workdir: workdir.into(),
        }
    }

    /// Find the repository containing `path` (or any subdirectory).
    pub fn discover(path: &Path, git_bin: impl Into<String>) -> AuthorsResult<Self> {
        let repo = Repository::discover(path)
            .map_err(|_| AuthorsError::NotARepository(path.to_path_buf()))?;
        let workdir = repo.workdir().unwrap_or(repo.path()).to_path_buf();
        debug!("Opened git repository at {:?}", workdir);
        Ok(Self::new(workdir, git_bin))
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn git_bin(&self) -> &str {
        &self.git_bin
    }

    /// Relative paths are taken from the working directory.
    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workdir.join(path)
        }
    }
}

impl HistorySource for GitLog {
    fn commits(&self, path: &Path, follow_renames: bool) -> AuthorsResult<Vec<CommitRecord>> {
        let full_path = self.resolve_path(path);
        let metadata = std::fs::metadata(&full_path)
            .map_err(|_| AuthorsError::PathNotFound(full_path.clone()))?;

        let mut cmd = Command::new(&self.git_bin);
        cmd.arg("-C")
            .arg(&self.workdir)
            .args(["log", "--format=%H %ae"]);
        // git rejects --follow for anything but a single file
        if follow_renames && metadata.is_file() {
            cmd.arg("--follow");
        }
        cmd.arg("--").arg(&full_path);

        let output = cmd.output().map_err(|source| AuthorsError::Spawn {
            bin: self.git_bin.clone(),
            source,
        })?;

        if !output.status.success() {
            return Err(AuthorsError::Vcs {
                path: full_path,
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let records = parse_log_output(&String::from_utf8_lossy(&output.stdout));
        debug!("{} commits for {}", records.len(), full_path.display());
        Ok(records)
    }
}
