use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `GET /user` and `GET /users/{login}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubUser {
    pub id: i64,
    pub login: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub html_url: Option<String>,
    pub bio: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub blog: Option<String>,
    #[serde(default)]
    pub public_repos: u32,
    #[serde(default)]
    pub followers: u32,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoOwner {
    pub login: String,
}

/// One entry of `GET /users/{login}/repos`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubRepository {
    pub id: i64,
    pub name: String,
    pub full_name: String,
    pub owner: RepoOwner,
    pub description: Option<String>,
    pub html_url: String,
    pub language: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub fork: bool,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub stargazers_count: u32,
    #[serde(default)]
    pub forks_count: u32,
    pub pushed_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

/// `GET /repos/{owner}/{repo}/languages`: language name → bytes of code.
pub type LanguageBytes = HashMap<String, u64>;

/// A repository together with the per-repository data fetched in the fan-out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryDetail {
    pub repo: GitHubRepository,
    pub languages: LanguageBytes,
    pub commit_count: u32,
}

/// One entry of `GET /users/{login}/events/public`. Only the fields the
/// activity summary needs are decoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub repo: EventRepo,
    #[serde(default)]
    pub payload: serde_json::Value,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRepo {
    pub name: String,
}

/// Aggregated public activity over the most recent page of events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivitySummary {
    pub push_events: u32,
    pub commits_pushed: u32,
    pub pull_requests_opened: u32,
    pub issues_opened: u32,
    pub reviews: u32,
    pub repositories_touched: u32,
}

/// Everything the CV pipeline knows about a GitHub account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubProfile {
    pub user: GitHubUser,
    pub repositories: Vec<RepositoryDetail>,
    pub activity: ActivitySummary,
    /// Full names of repositories dropped because their calls failed.
    pub skipped_repos: Vec<String>,
}

/// Last observed `x-ratelimit-*` headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitInfo {
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: Option<DateTime<Utc>>,
}
