//! Run options for author resolution

use crate::error::{AuthorsError, AuthorsResult};
use crate::github::LookupFailure;
use regex::Regex;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Default cap on concurrent `git log` processes.
pub const DEFAULT_HISTORY_WORKERS: usize = 10;
/// Default cap on concurrent commit lookups.
pub const DEFAULT_LOOKUP_WORKERS: usize = 64;

/// Environment variables consulted for a token, in order.
pub const TOKEN_ENV_VARS: [&str; 2] = ["GITHUB_TOKEN", "GH_TOKEN"];

static SLUG_PATTERN: OnceLock<Regex> = OnceLock::new();

fn slug_pattern() -> &'static Regex {
    SLUG_PATTERN.get_or_init(|| {
        Regex::new(r"^([A-Za-z0-9_.-]+)/([A-Za-z0-9_.-]+)$").expect("valid regex")
    })
}

/// A validated `owner/name` repository identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoSlug {
    owner: String,
    name: String,
}

impl RepoSlug {
    pub fn parse(input: &str) -> AuthorsResult<Self> {
        let invalid = || AuthorsError::InvalidRepo(input.to_string());
        let caps = slug_pattern().captures(input).ok_or_else(invalid)?;
        let (owner, name) = (&caps[1], &caps[2]);
        if [owner, name].iter().any(|part| *part == "." || *part == "..") {
            return Err(invalid());
        }
        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl std::str::FromStr for RepoSlug {
    type Err = AuthorsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Where the lookup credential comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TokenSetting {
    /// Read `GITHUB_TOKEN`, then `GH_TOKEN`
    #[default]
    FromEnv,
    Explicit(String),
    /// Unauthenticated requests only
    Disabled,
}

impl TokenSetting {
    pub fn resolve(&self) -> Option<String> {
        match self {
            TokenSetting::FromEnv => TOKEN_ENV_VARS
                .iter()
                .filter_map(|var| std::env::var(var).ok())
                .find(|token| !token.trim().is_empty()),
            TokenSetting::Explicit(token) if !token.trim().is_empty() => Some(token.clone()),
            TokenSetting::Explicit(_) | TokenSetting::Disabled => None,
        }
    }
}

/// Predicate selecting emails that must never reach the resolver.
#[derive(Clone)]
pub struct EmailFilter(Arc<dyn Fn(&str) -> bool + Send + Sync>);

impl EmailFilter {
    pub fn new(predicate: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(predicate))
    }

    /// Matches emails whose domain mentions `noreply` (any case).
    pub fn noreply() -> Self {
        Self::new(|email| {
            email
                .rsplit_once('@')
                .is_some_and(|(_, domain)| domain.to_ascii_lowercase().contains("noreply"))
        })
    }

    /// Matches emails hitting any of the given regular expressions.
    pub fn from_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Self, regex::Error> {
        let compiled = patterns
            .iter()
            .map(|p| Regex::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(move |email| compiled.iter().any(|re| re.is_match(email))))
    }

    /// Either filter matching is enough.
    pub fn or(self, other: EmailFilter) -> Self {
        Self::new(move |email| self.matches(email) || other.matches(email))
    }

    pub fn matches(&self, email: &str) -> bool {
        (self.0)(email)
    }
}

impl fmt::Debug for EmailFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EmailFilter(..)")
    }
}

/// Callback receiving every recoverable lookup failure.
pub type ErrorCallback = Arc<dyn Fn(&LookupFailure) + Send + Sync>;

/// Default callback: log to stderr through tracing.
pub fn log_failure() -> ErrorCallback {
    Arc::new(|failure: &LookupFailure| {
        tracing::warn!(
            "Could not resolve {} (commit {}): {}",
            failure.email,
            failure.commit,
            failure.error
        );
    })
}

/// Options for one resolution run.
#[derive(Clone)]
pub struct ResolveOptions {
    /// Pass `--follow` for single-file paths
    pub follow_renames: bool,
    /// Max concurrent history extractions
    pub history_workers: usize,
    /// Max concurrent identity lookups
    pub lookup_workers: usize,
    /// VCS binary name or path
    pub git_bin: String,
    pub token: TokenSetting,
    pub skip_email: Option<EmailFilter>,
    pub on_error: ErrorCallback,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            follow_renames: true,
            history_workers: DEFAULT_HISTORY_WORKERS,
            lookup_workers: DEFAULT_LOOKUP_WORKERS,
            git_bin: "git".to_string(),
            token: TokenSetting::default(),
            skip_email: None,
            on_error: log_failure(),
        }
    }
}

impl ResolveOptions {
    pub fn with_error_callback(
        mut self,
        callback: impl Fn(&LookupFailure) + Send + Sync + 'static,
    ) -> Self {
        self.on_error = Arc::new(callback);
        self
    }
}

impl fmt::Debug for ResolveOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print the token itself
        let token = match self.token {
            TokenSetting::FromEnv => "env",
            TokenSetting::Explicit(_) => "explicit",
            TokenSetting::Disabled => "disabled",
        };
        f.debug_struct("ResolveOptions")
            .field("follow_renames", &self.follow_renames)
            .field("history_workers", &self.history_workers)
            .field("lookup_workers", &self.lookup_workers)
            .field("git_bin", &self.git_bin)
            .field("token", &token)
            .field("skip_email", &self.skip_email)
            .finish_non_exhaustive()
    }
}
