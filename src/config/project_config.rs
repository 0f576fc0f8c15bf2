//! Project-level configuration support
//!
//! Loads optional defaults from `repo-authors.toml` in the repository root.
//!
//! # Configuration Format
//!
//! ```toml
//! # repo-authors.toml
//!
//! [defaults]
//! follow_renames = true
//! history_workers = 10
//! lookup_workers = 64
//! git_bin = "git"
//! cache_file = ".authors-cache.json"
//! skip_noreply = true
//! exclude_emails = ["\\[bot\\]@"]
//! ```

use crate::config::options::{EmailFilter, ResolveOptions};
use crate::error::{AuthorsError, AuthorsResult};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const CONFIG_FILE_NAME: &str = "repo-authors.toml";

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    #[serde(default)]
    pub defaults: Defaults,
}

/// Values applied when the matching CLI flag is absent
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Defaults {
    pub follow_renames: Option<bool>,
    pub history_workers: Option<usize>,
    pub lookup_workers: Option<usize>,
    pub git_bin: Option<String>,
    /// Relative paths are taken from the repository root
    pub cache_file: Option<PathBuf>,
    #[serde(default)]
    pub skip_noreply: bool,
    #[serde(default)]
    pub exclude_emails: Vec<String>,
}

impl ProjectConfig {
    /// Overlay these defaults onto `options`.
    pub fn apply(&self, options: &mut ResolveOptions) -> Result<(), regex::Error> {
        let d = &self.defaults;
        if let Some(follow) = d.follow_renames {
            options.follow_renames = follow;
        }
        if let Some(n) = d.history_workers.filter(|n| *n > 0) {
            options.history_workers = n;
        }
        if let Some(n) = d.lookup_workers.filter(|n| *n > 0) {
            options.lookup_workers = n;
        }
        if let Some(bin) = &d.git_bin {
            options.git_bin = bin.clone();
        }
        if let Some(filter) = self.email_filter()? {
            options.skip_email = Some(filter);
        }
        Ok(())
    }

    /// Combined exclusion filter, if any rule is configured.
    pub fn email_filter(&self) -> Result<Option<EmailFilter>, regex::Error> {
        let d = &self.defaults;
        let patterns = (!d.exclude_emails.is_empty())
            .then(|| EmailFilter::from_patterns(d.exclude_emails.as_slice()))
            .transpose()?;
        let noreply = d.skip_noreply.then(EmailFilter::noreply);
        Ok(match (noreply, patterns) {
            (Some(a), Some(b)) => Some(a.or(b)),
            (a, b) => a.or(b),
        })
    }

    pub fn cache_file(&self, repo_root: &Path) -> Option<PathBuf> {
        self.defaults
            .cache_file
            .as_ref()
            .map(|p| if p.is_absolute() { p.clone() } else { repo_root.join(p) })
    }
}

/// Parse a config file.
pub fn load_toml_config(path: &Path) -> AuthorsResult<ProjectConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| AuthorsError::Config {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    toml::from_str(&content).map_err(|e| AuthorsError::Config {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Load `repo-authors.toml` from the repository root.
///
/// A missing or malformed file yields the defaults.
pub fn load_project_config(repo_root: &Path) -> ProjectConfig {
    let toml_path = repo_root.join(CONFIG_FILE_NAME);
    if !toml_path.exists() {
        return ProjectConfig::default();
    }
    match load_toml_config(&toml_path) {
        Ok(config) => {
            debug!("Loaded project config from {}", toml_path.display());
            config
        }
        Err(e) => {
            warn!("{}", e);
            ProjectConfig::default()
        }
    }
}
