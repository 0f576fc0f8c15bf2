//! Configuration for author resolution
//!
//! This module handles:
//! - Repository identifier validation (`owner/name`)
//! - Run options (worker limits, rename following, credentials)
//! - Email exclusion policy
//! - Project-level defaults (repo-authors.toml)

mod options;
mod project_config;

pub use options::{
    log_failure, EmailFilter, ErrorCallback, RepoSlug, ResolveOptions, TokenSetting,
    DEFAULT_HISTORY_WORKERS, DEFAULT_LOOKUP_WORKERS, TOKEN_ENV_VARS,
};
pub use project_config::{
    load_project_config, load_toml_config, Defaults, ProjectConfig, CONFIG_FILE_NAME,
};
