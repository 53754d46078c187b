//! Profile aggregation: user → ranked repositories → per-repository fan-out → events.
//!
//! The fan-out is best-effort. A repository whose languages or commit count
//! cannot be fetched is logged and left out; it is never retried beyond the
//! client's own GET retries.

use std::collections::HashSet;
use std::time::Duration;

use futures::future::join_all;
use tracing::{info, warn};

use crate::github::client::GitHubClient;
use crate::github::errors::GitHubError;
use crate::github::models::{
    ActivitySummary, GitHubEvent, GitHubProfile, GitHubRepository, RepositoryDetail,
};

/// Upper bound on repositories listed before ranking.
const LIST_LIMIT: usize = 100;
/// API calls made per repository in the fan-out (languages + commits).
const CALLS_PER_REPO: u32 = 2;

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub max_repos: usize,
    pub include_forks: bool,
    /// Delay between consecutive fan-out dispatches.
    pub dispatch_delay: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            max_repos: 10,
            include_forks: false,
            dispatch_delay: Duration::from_millis(100),
        }
    }
}

/// Fetches everything the CV needs for `login`.
///
/// Only the user lookup and the repository listing are fatal; per-repository
/// and event failures degrade the profile instead.
pub async fn fetch_profile(
    client: &GitHubClient,
    login: &str,
    options: &FetchOptions,
) -> Result<GitHubProfile, GitHubError> {
    let user = client.get_user(login).await?;
    let listed = client.list_repos(&user.login, LIST_LIMIT).await?;

    let mut ranked = rank_repositories(listed, options.include_forks);
    let budget = fan_out_budget(client, options.max_repos);
    if budget < options.max_repos.min(ranked.len()) {
        warn!(
            login = %user.login,
            requested = options.max_repos,
            allowed = budget,
            "GitHub rate limit budget is low, shrinking repository fan-out"
        );
    }
    ranked.truncate(budget);

    let (repositories, skipped_repos) =
        fetch_repository_details(client, &user.login, ranked, options.dispatch_delay).await;

    let activity = match client.list_public_events(&user.login).await {
        Ok(events) => summarize_events(&events),
        Err(e) => {
            warn!(login = %user.login, error = %e, "Failed to fetch public events, skipping activity");
            ActivitySummary::default()
        }
    };

    info!(
        login = %user.login,
        repositories = repositories.len(),
        skipped = skipped_repos.len(),
        "GitHub profile aggregated"
    );

    Ok(GitHubProfile {
        user,
        repositories,
        activity,
        skipped_repos,
    })
}

/// Drops forks unless requested, then orders by stars and most recent push.
pub fn rank_repositories(
    repos: Vec<GitHubRepository>,
    include_forks: bool,
) -> Vec<GitHubRepository> {
    let mut kept: Vec<GitHubRepository> = repos
        .into_iter()
        .filter(|r| include_forks || !r.fork)
        .collect();

    kept.sort_by(|a, b| {
        b.stargazers_count
            .cmp(&a.stargazers_count)
            .then_with(|| b.pushed_at.cmp(&a.pushed_at))
            .then_with(|| a.name.cmp(&b.name))
    });
    kept
}

/// How many repositories the remaining rate-limit budget allows, never below 1.
fn fan_out_budget(client: &GitHubClient, requested: usize) -> usize {
    match client.rate_limit() {
        Some(info) => {
            let affordable = (info.remaining / CALLS_PER_REPO) as usize;
            requested.min(affordable).max(1)
        }
        None => requested,
    }
}

/// Fetches languages and commit counts for every repository concurrently.
/// Dispatch `i` starts after `i * dispatch_delay`. Output keeps input order.
async fn fetch_repository_details(
    client: &GitHubClient,
    login: &str,
    repos: Vec<GitHubRepository>,
    dispatch_delay: Duration,
) -> (Vec<RepositoryDetail>, Vec<String>) {
    let tasks = repos.into_iter().enumerate().map(|(i, repo)| async move {
        if i > 0 {
            tokio::time::sleep(dispatch_delay * i as u32).await;
        }
        let owner = repo.owner.login.clone();
        let (languages, commits) = tokio::join!(
            client.get_languages(&owner, &repo.name),
            client.count_commits(&owner, &repo.name, login),
        );
        match (languages, commits) {
            (Ok(languages), Ok(commit_count)) => Ok(RepositoryDetail {
                repo,
                languages,
                commit_count,
            }),
            (Err(e), _) | (_, Err(e)) => Err((repo.full_name, e)),
        }
    });

    let mut details = Vec::new();
    let mut skipped = Vec::new();
    for result in join_all(tasks).await {
        match result {
            Ok(detail) => details.push(detail),
            Err((full_name, e)) => {
                warn!(repo = %full_name, error = %e, "Skipping repository after fetch failure");
                skipped.push(full_name);
            }
        }
    }
    (details, skipped)
}

/// Counts the activity signals the CV reports from one page of public events.
pub fn summarize_events(events: &[GitHubEvent]) -> ActivitySummary {
    let mut summary = ActivitySummary::default();
    let mut repos: HashSet<&str> = HashSet::new();

    for event in events {
        repos.insert(event.repo.name.as_str());
        let action = event.payload.get("action").and_then(|a| a.as_str());
        match event.event_type.as_str() {
            "PushEvent" => {
                summary.push_events += 1;
                let commits = event
                    .payload
                    .get("size")
                    .and_then(|s| s.as_u64())
                    .or_else(|| {
                        event
                            .payload
                            .get("commits")
                            .and_then(|c| c.as_array())
                            .map(|c| c.len() as u64)
                    })
                    .unwrap_or(0);
                summary.commits_pushed += commits as u32;
            }
            "PullRequestEvent" if action == Some("opened") => summary.pull_requests_opened += 1,
            "IssuesEvent" if action == Some("opened") => summary.issues_opened += 1,
            "PullRequestReviewEvent" => summary.reviews += 1,
            _ => {}
        }
    }

    summary.repositories_touched = repos.len() as u32;
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::models::{EventRepo, RepoOwner};
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use wiremock::matchers::{method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn repo(name: &str, stars: u32, fork: bool) -> GitHubRepository {
        GitHubRepository {
            id: stars as i64,
            name: name.to_string(),
            full_name: format!("octocat/{name}"),
            owner: RepoOwner {
                login: "octocat".to_string(),
            },
            description: None,
            html_url: format!("https://github.com/octocat/{name}"),
            language: Some("Rust".to_string()),
            topics: vec![],
            fork,
            archived: false,
            stargazers_count: stars,
            forks_count: 0,
            pushed_at: Some(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()),
            created_at: None,
        }
    }

    fn event(kind: &str, repo: &str, payload: serde_json::Value) -> GitHubEvent {
        GitHubEvent {
            event_type: kind.to_string(),
            repo: EventRepo {
                name: repo.to_string(),
            },
            payload,
            created_at: None,
        }
    }

    #[test]
    fn test_rank_drops_forks_and_orders_by_stars() {
        let ranked = rank_repositories(
            vec![repo("small", 1, false), repo("forked", 500, true), repo("big", 90, false)],
            false,
        );
        let names: Vec<&str> = ranked.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["big", "small"]);
    }

    #[test]
    fn test_rank_keeps_forks_when_requested() {
        let ranked = rank_repositories(vec![repo("forked", 5, true)], true);
        assert_eq!(ranked.len(), 1);
    }

    #[test]
    fn test_rank_keeps_archived_repositories() {
        let mut archived = repo("old", 0, false);
        archived.archived = true;
        let ranked = rank_repositories(vec![archived, repo("fork", 3, true)], false);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].name, "old");
    }

    #[test]
    fn test_summarize_events() {
        let events = vec![
            event("PushEvent", "octocat/a", json!({"size": 3})),
            event("PushEvent", "octocat/b", json!({"commits": [{}, {}]})),
            event("PullRequestEvent", "octocat/a", json!({"action": "opened"})),
            event("PullRequestEvent", "octocat/a", json!({"action": "closed"})),
            event("IssuesEvent", "rust-lang/rust", json!({"action": "opened"})),
            event("PullRequestReviewEvent", "rust-lang/rust", json!({})),
            event("WatchEvent", "tokio-rs/tokio", json!({})),
        ];
        let summary = summarize_events(&events);
        assert_eq!(
            summary,
            ActivitySummary {
                push_events: 2,
                commits_pushed: 5,
                pull_requests_opened: 1,
                issues_opened: 1,
                reviews: 1,
                repositories_touched: 4,
            }
        );
    }

    fn repo_json(name: &str, stars: u32) -> serde_json::Value {
        json!({
            "id": stars,
            "name": name,
            "full_name": format!("octocat/{name}"),
            "owner": { "login": "octocat" },
            "html_url": format!("https://github.com/octocat/{name}"),
            "language": "Rust",
            "stargazers_count": stars,
            "pushed_at": "2024-05-01T00:00:00Z"
        })
    }

    #[tokio::test]
    async fn test_fetch_profile_skips_failing_repository() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/octocat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 1, "login": "octocat", "public_repos": 2, "followers": 3
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/users/octocat/repos"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([repo_json("good", 10), repo_json("broken", 20)])),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octocat/good/languages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Rust": 1200})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octocat/broken/languages"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/repos/octocat/[a-z]+/commits$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{}, {}, {}])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/users/octocat/events/public"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = GitHubClient::new(server.uri(), None)
            .unwrap()
            .with_retry_base_delay(Duration::from_millis(1));
        let options = FetchOptions {
            max_repos: 5,
            include_forks: false,
            dispatch_delay: Duration::from_millis(1),
        };

        let profile = fetch_profile(&client, "octocat", &options).await.unwrap();

        assert_eq!(profile.repositories.len(), 1);
        assert_eq!(profile.repositories[0].repo.name, "good");
        assert_eq!(profile.repositories[0].commit_count, 3);
        assert_eq!(profile.repositories[0].languages.get("Rust"), Some(&1200));
        assert_eq!(profile.skipped_repos, vec!["octocat/broken".to_string()]);
        assert_eq!(profile.activity, ActivitySummary::default());
    }

    #[tokio::test]
    async fn test_fetch_profile_fails_when_user_missing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/ghost"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = GitHubClient::new(server.uri(), None).unwrap();
        let err = fetch_profile(&client, "ghost", &FetchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GitHubError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_low_rate_limit_shrinks_fan_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/octocat"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": 1, "login": "octocat"}))
                    .insert_header("x-ratelimit-limit", "60")
                    .insert_header("x-ratelimit-remaining", "5"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/users/octocat/repos"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([
                        repo_json("a", 4),
                        repo_json("b", 3),
                        repo_json("c", 2),
                        repo_json("d", 1)
                    ]))
                    .insert_header("x-ratelimit-limit", "60")
                    .insert_header("x-ratelimit-remaining", "4"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/repos/octocat/[a-z]/languages$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Go": 10})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/repos/octocat/[a-z]/commits$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/users/octocat/events/public"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let client = GitHubClient::new(server.uri(), None).unwrap();
        let options = FetchOptions {
            max_repos: 4,
            include_forks: false,
            dispatch_delay: Duration::ZERO,
        };
        let profile = fetch_profile(&client, "octocat", &options).await.unwrap();

        // 4 remaining calls / 2 calls per repo
        let names: Vec<&str> = profile
            .repositories
            .iter()
            .map(|r| r.repo.name.as_str())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
