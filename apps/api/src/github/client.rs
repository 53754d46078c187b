//! Thin GitHub REST client with rate-limit tracking and GET retries.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::github::errors::GitHubError;
use crate::github::models::{
    GitHubEvent, GitHubRepository, GitHubUser, LanguageBytes, RateLimitInfo,
};

const API_VERSION: &str = "2022-11-28";
const CLIENT_USER_AGENT: &str = concat!("borg-tools/", env!("CARGO_PKG_VERSION"));
const MAX_ATTEMPTS: u32 = 3;
const PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
struct GitHubErrorBody {
    message: String,
}

/// GitHub API client. Cheap to clone; clones share the rate-limit observation.
#[derive(Clone)]
pub struct GitHubClient {
    http: Client,
    base_url: String,
    token: Option<String>,
    retry_base_delay: Duration,
    rate_limit: Arc<Mutex<Option<RateLimitInfo>>>,
}

impl GitHubClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self, GitHubError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            retry_base_delay: Duration::from_millis(500),
            rate_limit: Arc::new(Mutex::new(None)),
        })
    }

    /// Overrides the first backoff delay (doubles per attempt).
    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    /// The most recent rate-limit headers seen by this client or its clones.
    pub fn rate_limit(&self) -> Option<RateLimitInfo> {
        self.rate_limit.lock().ok().and_then(|guard| *guard)
    }

    pub async fn get_authenticated_user(&self) -> Result<GitHubUser, GitHubError> {
        self.get_json("/user").await
    }

    pub async fn get_user(&self, login: &str) -> Result<GitHubUser, GitHubError> {
        self.get_json(&format!("/users/{login}")).await
    }

    /// Lists repositories owned by `login`, most recently pushed first, until
    /// `max` have been collected or GitHub returns a short page.
    pub async fn list_repos(
        &self,
        login: &str,
        max: usize,
    ) -> Result<Vec<GitHubRepository>, GitHubError> {
        let mut repos = Vec::new();
        let mut page = 1;
        while repos.len() < max {
            let batch: Vec<GitHubRepository> = self
                .get_json(&format!(
                    "/users/{login}/repos?type=owner&sort=pushed&per_page={PAGE_SIZE}&page={page}"
                ))
                .await?;
            let short_page = batch.len() < PAGE_SIZE;
            repos.extend(batch);
            if short_page {
                break;
            }
            page += 1;
        }
        repos.truncate(max);
        Ok(repos)
    }

    pub async fn get_languages(&self, owner: &str, repo: &str) -> Result<LanguageBytes, GitHubError> {
        self.get_json(&format!("/repos/{owner}/{repo}/languages")).await
    }

    /// Number of commits authored by `author` in the default branch, capped at
    /// one page. An empty repository (409) counts as zero.
    pub async fn count_commits(
        &self,
        owner: &str,
        repo: &str,
        author: &str,
    ) -> Result<u32, GitHubError> {
        let path = format!("/repos/{owner}/{repo}/commits?author={author}&per_page={PAGE_SIZE}");
        match self.get_json::<Vec<serde_json::Value>>(&path).await {
            Ok(commits) => Ok(commits.len() as u32),
            Err(GitHubError::Status { status: 409, .. }) => Ok(0),
            Err(e) => Err(e),
        }
    }

    pub async fn list_public_events(&self, login: &str) -> Result<Vec<GitHubEvent>, GitHubError> {
        self.get_json(&format!("/users/{login}/events/public?per_page={PAGE_SIZE}"))
            .await
    }

    /// GET with up to `MAX_ATTEMPTS` attempts. Only network and 5xx failures
    /// are retried; backoff doubles from `retry_base_delay`.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, GitHubError> {
        let url = format!("{}{}", self.base_url, path);
        let mut last_error: Option<GitHubError> = None;

        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                let delay = self.retry_base_delay * (1 << (attempt - 1));
                warn!(
                    url = %url,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "GitHub request failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }

            let result = match self.send_get(&url).await {
                Ok(response) => self.read_response(path, response).await,
                Err(e) => Err(GitHubError::Http(e)),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() => last_error = Some(e),
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or(GitHubError::Status {
            status: 0,
            message: "request was never attempted".to_string(),
        }))
    }

    async fn send_get(&self, url: &str) -> Result<Response, reqwest::Error> {
        let mut request = self
            .http
            .get(url)
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .header(USER_AGENT, CLIENT_USER_AGENT);
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        request.send().await
    }

    async fn read_response<T: DeserializeOwned>(
        &self,
        path: &str,
        response: Response,
    ) -> Result<T, GitHubError> {
        let status = response.status();
        let info = parse_rate_limit(response.headers());
        if let Some(info) = info {
            self.record_rate_limit(info);
        }

        if status.is_success() {
            let body = response.bytes().await?;
            debug!(path, status = status.as_u16(), "GitHub request succeeded");
            return serde_json::from_slice(&body).map_err(|e| GitHubError::Decode(e.to_string()));
        }

        let exhausted = info.map(|i| i.remaining == 0).unwrap_or(false);
        if status == StatusCode::TOO_MANY_REQUESTS
            || (status == StatusCode::FORBIDDEN && exhausted)
        {
            warn!(path, "GitHub rate limit exhausted");
            return Err(GitHubError::RateLimited {
                reset_at: info.and_then(|i| i.reset_at),
            });
        }

        if status == StatusCode::NOT_FOUND {
            return Err(GitHubError::NotFound(path.to_string()));
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<GitHubErrorBody>(&body)
            .map(|e| e.message)
            .unwrap_or(body);
        Err(GitHubError::Status {
            status: status.as_u16(),
            message,
        })
    }

    fn record_rate_limit(&self, info: RateLimitInfo) {
        if let Ok(mut guard) = self.rate_limit.lock() {
            *guard = Some(info);
        }
    }
}

/// Reads `x-ratelimit-limit`, `x-ratelimit-remaining` and `x-ratelimit-reset`.
/// Returns `None` unless both limit and remaining are present.
pub fn parse_rate_limit(headers: &HeaderMap) -> Option<RateLimitInfo> {
    let number = |name: &str| -> Option<i64> {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<i64>().ok())
    };

    let limit = number("x-ratelimit-limit")?;
    let remaining = number("x-ratelimit-remaining")?;
    let reset_at: Option<DateTime<Utc>> = number("x-ratelimit-reset")
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single());

    Some(RateLimitInfo {
        limit: limit.max(0) as u32,
        remaining: remaining.max(0) as u32,
        reset_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> GitHubClient {
        GitHubClient::new(server.uri(), Some("gh-token".to_string()))
            .unwrap()
            .with_retry_base_delay(Duration::from_millis(1))
    }

    fn user_json(login: &str) -> serde_json::Value {
        serde_json::json!({
            "id": 42,
            "login": login,
            "name": "Test User",
            "public_repos": 3,
            "followers": 10,
            "created_at": "2018-03-01T00:00:00Z"
        })
    }

    #[test]
    fn test_parse_rate_limit_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-limit", HeaderValue::from_static("5000"));
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("4990"));
        headers.insert("x-ratelimit-reset", HeaderValue::from_static("1735693200"));

        let info = parse_rate_limit(&headers).unwrap();
        assert_eq!(info.limit, 5000);
        assert_eq!(info.remaining, 4990);
        assert_eq!(
            info.reset_at.unwrap().to_rfc3339(),
            "2025-01-01T01:00:00+00:00"
        );
    }

    #[test]
    fn test_parse_rate_limit_missing_headers() {
        assert!(parse_rate_limit(&HeaderMap::new()).is_none());
    }

    #[tokio::test]
    async fn test_get_user_sends_auth_and_records_rate_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/octocat"))
            .and(header("authorization", "Bearer gh-token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(user_json("octocat"))
                    .insert_header("x-ratelimit-limit", "5000")
                    .insert_header("x-ratelimit-remaining", "4321"),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        let user = client.get_user("octocat").await.unwrap();

        assert_eq!(user.login, "octocat");
        assert_eq!(client.rate_limit().unwrap().remaining, 4321);
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/flaky"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/users/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_json(user_json("flaky")))
            .mount(&server)
            .await;

        let user = client_for(&server).get_user("flaky").await.unwrap();
        assert_eq!(user.login, "flaky");
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/down"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let err = client_for(&server).get_user("down").await.unwrap_err();
        assert!(matches!(err, GitHubError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_auth_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(serde_json::json!({
                    "message": "Bad credentials"
                })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server).get_authenticated_user().await.unwrap_err();
        match err {
            GitHubError::Status { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Bad credentials");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_forbidden_with_exhausted_quota_is_rate_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/octocat"))
            .respond_with(
                ResponseTemplate::new(403)
                    .insert_header("x-ratelimit-limit", "60")
                    .insert_header("x-ratelimit-remaining", "0")
                    .insert_header("x-ratelimit-reset", "1735693200"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server).get_user("octocat").await.unwrap_err();
        match err {
            GitHubError::RateLimited { reset_at } => assert!(reset_at.is_some()),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_not_found_maps_to_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/ghost"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client_for(&server).get_user("ghost").await.unwrap_err();
        assert!(matches!(err, GitHubError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_count_commits_empty_repository_is_zero() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octocat/empty/commits"))
            .and(query_param("author", "octocat"))
            .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
                "message": "Git Repository is empty."
            })))
            .mount(&server)
            .await;

        let count = client_for(&server)
            .count_commits("octocat", "empty", "octocat")
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_list_repos_stops_on_short_page() {
        let server = MockServer::start().await;
        let repos: Vec<serde_json::Value> = (0..3)
            .map(|i| {
                serde_json::json!({
                    "id": i,
                    "name": format!("repo-{i}"),
                    "full_name": format!("octocat/repo-{i}"),
                    "owner": { "login": "octocat" },
                    "html_url": format!("https://github.com/octocat/repo-{i}"),
                })
            })
            .collect();
        Mock::given(method("GET"))
            .and(path("/users/octocat/repos"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(repos))
            .expect(1)
            .mount(&server)
            .await;

        let repos = client_for(&server).list_repos("octocat", 50).await.unwrap();
        assert_eq!(repos.len(), 3);
        assert_eq!(repos[0].full_name, "octocat/repo-0");
    }
}
