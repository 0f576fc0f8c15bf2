//! GitHub REST client for commit author lookups
//!
//! Uses ureq (sync HTTP); lookups run on the resolver's worker pool.

use super::{IdentityResolver, LookupError, LookupResult};
use crate::config::RepoSlug;
use serde::Deserialize;
use tracing::debug;

pub const DEFAULT_API_BASE: &str = "https://api.github.com";

const USER_AGENT: &str = concat!("repo-authors/", env!("CARGO_PKG_VERSION"));

#[derive(Deserialize)]
struct CommitResponse {
    author: Option<CommitAuthor>,
}

#[derive(Deserialize)]
struct CommitAuthor {
    login: Option<String>,
}

/// Pull the author login out of a `GET /repos/{o}/{r}/commits/{sha}` body.
pub fn extract_handle(body: &str, commit: &str) -> LookupResult<String> {
    let resp: CommitResponse =
        serde_json::from_str(body).map_err(|e| LookupError::Parse(e.to_string()))?;
    resp.author
        .and_then(|a| a.login)
        .filter(|login| !login.is_empty())
        .ok_or_else(|| LookupError::MissingHandle {
            commit: commit.to_string(),
        })
}

/// Map an HTTP status to a lookup error, passing successful bodies through.
///
/// 429, or 403 with an exhausted `x-ratelimit-remaining`, is a rate limit.
fn classify(status: u16, remaining: Option<&str>, body: String) -> LookupResult<String> {
    let exhausted = remaining.is_some_and(|v| v.trim() == "0");
    if status == 429 || (status == 403 && exhausted) {
        return Err(LookupError::RateLimited { status });
    }
    if status >= 400 {
        return Err(LookupError::Api {
            status,
            message: body,
        });
    }
    Ok(body)
}

/// Commit lookup client for one repository
pub struct GitHubClient {
    repo: RepoSlug,
    api_base: String,
    token: Option<String>,
    agent: ureq::Agent,
}

fn make_agent() -> ureq::Agent {
    ureq::config::Config::builder()
        .http_status_as_error(false) // Status codes are mapped to LookupError below
        .timeout_global(Some(std::time::Duration::from_secs(30)))
        .build()
        .new_agent()
}

impl GitHubClient {
    pub fn new(repo: RepoSlug, token: Option<String>) -> Self {
        Self {
            repo,
            api_base: DEFAULT_API_BASE.to_string(),
            token,
            agent: make_agent(),
        }
    }

    /// Point at a GitHub Enterprise (or test) server.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn repo(&self) -> &RepoSlug {
        &self.repo
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    pub fn commit_url(&self, commit: &str) -> String {
        format!(
            "{}/repos/{}/{}/commits/{}",
            self.api_base,
            self.repo.owner(),
            self.repo.name(),
            commit
        )
    }
}

impl IdentityResolver for GitHubClient {
    fn resolve(&self, commit: &str) -> LookupResult<String> {
        let url = self.commit_url(commit);
        debug!("GET {}", url);

        let mut req = self
            .agent
            .get(&url)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", USER_AGENT)
            .header("X-GitHub-Api-Version", "2022-11-28");

        if let Some(token) = &self.token {
            req = req.header("Authorization", &format!("Bearer {}", token));
        }

        let response = req
            .call()
            .map_err(|e| LookupError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let remaining = response
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response
            .into_body()
            .read_to_string()
            .map_err(|e| LookupError::Request(e.to_string()))?;

        let body = classify(status, remaining.as_deref(), body)?;
        extract_handle(&body, commit)
    }
}
