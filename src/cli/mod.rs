//! CLI command definition and handler

use anyhow::{Context, Result};
use clap::Parser;
use repo_authors::cache::{default_cache_path, load_cache_or_default, save_cache};
use repo_authors::config::load_project_config;
use repo_authors::{
    AuthorResolver, AuthorSet, EmailCache, EmailFilter, GitHubClient, GitLog, RepoSlug,
    ResolveOptions, TokenSetting,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Parse and validate a worker count (1-256)
fn parse_workers(s: &str) -> Result<usize, String> {
    let n: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if n == 0 {
        Err("workers must be at least 1".to_string())
    } else if n > 256 {
        Err("workers cannot exceed 256".to_string())
    } else {
        Ok(n)
    }
}

/// List the GitHub accounts that authored files in a repository
#[derive(Parser, Debug)]
#[command(name = "repo-authors")]
#[command(
    version,
    about = "Resolve the GitHub accounts that authored files in a git repository",
    after_help = "\
Examples:
  repo-authors octo/hello src/main.rs            Authors of one file
  repo-authors octo/hello src docs --format json JSON output for scripting
  repo-authors octo/hello README.md --no-follow  Ignore history before renames
  repo-authors octo/hello . --skip-noreply       Never look up noreply emails

A token in GITHUB_TOKEN or GH_TOKEN is used when present."
)]
pub struct Cli {
    /// Repository on GitHub (owner/name)
    pub repo: String,

    /// Files or directories to resolve
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Local checkout of the repository; relative paths start here
    #[arg(long, short = 'C', default_value = ".")]
    pub workdir: PathBuf,

    /// Email cache file (default: ~/.cache/repo-authors/<owner>/<name>.json)
    #[arg(long)]
    pub cache: Option<PathBuf>,

    /// Do not read or write the email cache
    #[arg(long, conflicts_with = "cache")]
    pub no_cache: bool,

    /// Do not follow file renames
    #[arg(long)]
    pub no_follow: bool,

    /// Max concurrent git processes (1-256)
    #[arg(long, value_parser = parse_workers)]
    pub history_workers: Option<usize>,

    /// Max concurrent GitHub requests (1-256)
    #[arg(long, value_parser = parse_workers)]
    pub lookup_workers: Option<usize>,

    /// git binary to run
    #[arg(long, value_name = "BIN")]
    pub git: Option<String>,

    /// GitHub token (default: $GITHUB_TOKEN or $GH_TOKEN)
    #[arg(long)]
    pub token: Option<String>,

    /// Send unauthenticated requests even if a token is set
    #[arg(long, conflicts_with = "token")]
    pub no_token: bool,

    /// Never look up emails at noreply domains
    #[arg(long)]
    pub skip_noreply: bool,

    /// Never look up emails matching this regex (repeatable)
    #[arg(long = "exclude-email", value_name = "REGEX")]
    pub exclude_emails: Vec<String>,

    /// Output format: text, json
    #[arg(long, short = 'f', default_value = "text", value_parser = ["text", "json"])]
    pub format: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "warn", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,
}

#[derive(Serialize)]
struct JsonEntry<'a> {
    path: String,
    authors: Vec<&'a str>,
}

impl Cli {
    /// Project defaults overlaid with command-line flags.
    fn options(&self, repo_root: &Path) -> Result<(ResolveOptions, Option<PathBuf>)> {
        let project = load_project_config(repo_root);
        let mut options = ResolveOptions::default();
        project
            .apply(&mut options)
            .context("Invalid exclude_emails pattern in project config")?;

        if self.no_follow {
            options.follow_renames = false;
        }
        if let Some(n) = self.history_workers {
            options.history_workers = n;
        }
        if let Some(n) = self.lookup_workers {
            options.lookup_workers = n;
        }
        if let Some(bin) = &self.git {
            options.git_bin = bin.clone();
        }
        options.token = match (&self.token, self.no_token) {
            (_, true) => TokenSetting::Disabled,
            (Some(token), false) => TokenSetting::Explicit(token.clone()),
            (None, false) => TokenSetting::FromEnv,
        };

        let mut filters = Vec::new();
        if self.skip_noreply {
            filters.push(EmailFilter::noreply());
        }
        if !self.exclude_emails.is_empty() {
            filters.push(
                EmailFilter::from_patterns(self.exclude_emails.as_slice())
                    .context("Invalid --exclude-email pattern")?,
            );
        }
        for filter in filters {
            options.skip_email = Some(match options.skip_email.take() {
                Some(existing) => existing.or(filter),
                None => filter,
            });
        }

        Ok((options, project.cache_file(repo_root)))
    }

    fn cache_path(&self, repo: &RepoSlug, configured: Option<PathBuf>) -> Option<PathBuf> {
        if self.no_cache {
            return None;
        }
        Some(
            self.cache
                .clone()
                .or(configured)
                .unwrap_or_else(|| default_cache_path(repo)),
        )
    }
}

pub fn run(cli: Cli) -> Result<()> {
    // Reject a bad slug before touching git or the network
    let repo = RepoSlug::parse(&cli.repo)?;

    let repo_root = GitLog::discover(&cli.workdir, "git")?.workdir().to_path_buf();
    let (options, configured_cache) = cli.options(&repo_root)?;
    debug!("Options: {:?}", options);

    let cache_path = cli.cache_path(&repo, configured_cache);
    let cache = match &cache_path {
        Some(path) => load_cache_or_default(path)?,
        None => EmailCache::new(),
    };

    // Relative paths are taken from --workdir
    let base = std::env::current_dir()
        .context("Failed to read current directory")?
        .join(&cli.workdir);
    let paths: Vec<PathBuf> = cli.paths.iter().map(|p| base.join(p)).collect();

    let history = GitLog::new(&repo_root, options.git_bin.clone());
    let client = GitHubClient::new(repo.clone(), options.token.resolve());
    let resolver = AuthorResolver::new(Arc::new(history), Arc::new(client), options);

    let (sets, stats) = resolver.resolve_authors_with_stats(&paths, &cache)?;
    info!("{:?}", stats);

    print_results(&cli.format, &cli.paths, &sets)?;

    if let Some(path) = &cache_path {
        save_cache(path, &cache)?;
    }
    Ok(())
}

fn print_results(format: &str, shown: &[PathBuf], sets: &[AuthorSet]) -> Result<()> {
    if format == "json" {
        let entries: Vec<JsonEntry> = shown
            .iter()
            .zip(sets)
            .map(|(path, set)| JsonEntry {
                path: path.display().to_string(),
                authors: set.iter().collect(),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    for (path, set) in shown.iter().zip(sets) {
        let authors: Vec<&str> = set.iter().collect();
        println!("{}: {}", path.display(), authors.join(", "));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("repo-authors").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_parse_workers_bounds() {
        assert_eq!(parse_workers("8"), Ok(8));
        assert!(parse_workers("0").is_err());
        assert!(parse_workers("257").is_err());
        assert!(parse_workers("many").is_err());
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = parse(&[
            "octo/hello",
            "a.rs",
            "--no-follow",
            "--history-workers",
            "2",
            "--git",
            "/opt/git",
            "--no-token",
            "--exclude-email",
            "^ci@",
            "--skip-noreply",
        ]);
        let dir = tempfile::tempdir().unwrap();
        let (opts, configured) = cli.options(dir.path()).unwrap();

        assert!(!opts.follow_renames);
        assert_eq!(opts.history_workers, 2);
        assert_eq!(opts.lookup_workers, ResolveOptions::default().lookup_workers);
        assert_eq!(opts.git_bin, "/opt/git");
        assert_eq!(opts.token, TokenSetting::Disabled);
        let skip = opts.skip_email.as_ref().unwrap();
        assert!(skip.matches("ci@example.com"));
        assert!(skip.matches("1+x@users.noreply.github.com"));
        assert!(!skip.matches("alice@example.com"));
        assert!(configured.is_none());
    }

    #[test]
    fn test_cache_path_selection() {
        let repo = RepoSlug::parse("octo/hello").unwrap();

        let cli = parse(&["octo/hello", "a.rs", "--cache", "mine.json"]);
        assert_eq!(cli.cache_path(&repo, None), Some(PathBuf::from("mine.json")));

        let cli = parse(&["octo/hello", "a.rs"]);
        assert_eq!(
            cli.cache_path(&repo, Some(PathBuf::from("/repo/c.json"))),
            Some(PathBuf::from("/repo/c.json"))
        );
        assert_eq!(cli.cache_path(&repo, None), Some(default_cache_path(&repo)));

        let cli = parse(&["octo/hello", "a.rs", "--no-cache"]);
        assert_eq!(cli.cache_path(&repo, None), None);
    }

    #[test]
    fn test_requires_paths_and_rejects_conflicts() {
        let argv = |args: &[&str]| {
            Cli::try_parse_from(std::iter::once("repo-authors").chain(args.iter().copied()))
        };
        assert!(argv(&["octo/hello"]).is_err());
        assert!(argv(&["octo/hello", "a", "--token", "t", "--no-token"]).is_err());
        assert!(argv(&["octo/hello", "a", "--format", "xml"]).is_err());
    }
}
