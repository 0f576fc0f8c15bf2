//! Cache path utilities - uses ~/.cache/repo-authors/<owner>/<name>.json

use crate::config::RepoSlug;
use std::path::PathBuf;

/// Get the base cache directory.
/// Uses ~/.cache/repo-authors on Unix, %LOCALAPPDATA%/repo-authors on Windows.
pub fn get_cache_dir() -> PathBuf {
    let base = if cfg!(windows) {
        std::env::var("LOCALAPPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|_| dirs::cache_dir().unwrap_or_else(|| PathBuf::from(".")))
    } else {
        dirs::cache_dir().unwrap_or_else(|| {
            // Fallback to ~/.cache
            dirs::home_dir()
                .map(|h| h.join(".cache"))
                .unwrap_or_else(|| PathBuf::from("."))
        })
    };

    base.join("repo-authors")
}

/// Get the default email cache file for a repository.
pub fn default_cache_path(repo: &RepoSlug) -> PathBuf {
    get_cache_dir()
        .join(repo.owner())
        .join(format!("{}.json", repo.name()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cache_path_format() {
        let repo = RepoSlug::parse("rust-lang/cargo").unwrap();
        let path = default_cache_path(&repo);
        let shown = path.to_string_lossy();
        assert!(shown.contains("repo-authors"));
        assert!(path.ends_with("rust-lang/cargo.json"));
    }
}
