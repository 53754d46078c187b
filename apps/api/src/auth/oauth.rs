//! GitHub OAuth web flow: authorize URL, code exchange, CSRF state bookkeeping.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::ACCEPT;
use reqwest::{Client, Url};
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::config::Config;
use crate::errors::AppError;
use crate::github::GitHubError;

pub const OAUTH_SCOPES: &str = "read:user user:email repo";
const STATE_TTL_MINUTES: i64 = 10;

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("OAuth request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("OAuth rejected: {error}: {description}")]
    Rejected { error: String, description: String },

    #[error("OAuth response carried no access token")]
    MissingToken,

    #[error("invalid OAuth URL: {0}")]
    Url(String),
}

impl From<OAuthError> for AppError {
    fn from(e: OAuthError) -> Self {
        match e {
            OAuthError::Http(e) => AppError::GitHub(GitHubError::Http(e)),
            OAuthError::Rejected { description, .. } => {
                AppError::BadRequest(format!("GitHub OAuth error: {description}"))
            }
            OAuthError::MissingToken => {
                AppError::BadRequest("GitHub OAuth returned no access token".to_string())
            }
            OAuthError::Url(msg) => AppError::Internal(anyhow::anyhow!(msg)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Clone)]
pub struct GitHubOAuth {
    http: Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    oauth_url: String,
}

impl GitHubOAuth {
    pub fn new(config: &Config) -> Result<Self, OAuthError> {
        Ok(Self {
            http: Client::builder().timeout(Duration::from_secs(30)).build()?,
            client_id: config.github_client_id.clone(),
            client_secret: config.github_client_secret.clone(),
            redirect_uri: config.github_redirect_uri.clone(),
            oauth_url: config.github_oauth_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn authorize_url(&self, state: &str) -> Result<String, OAuthError> {
        let url = Url::parse_with_params(
            &format!("{}/login/oauth/authorize", self.oauth_url),
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("scope", OAUTH_SCOPES),
                ("state", state),
            ],
        )
        .map_err(|e| OAuthError::Url(e.to_string()))?;
        Ok(url.to_string())
    }

    /// Exchanges an authorization code for a GitHub access token.
    pub async fn exchange_code(&self, code: &str) -> Result<String, OAuthError> {
        let response = self
            .http
            .post(format!("{}/login/oauth/access_token", self.oauth_url))
            .header(ACCEPT, "application/json")
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?;

        let body: TokenResponse = response.json().await?;
        if let Some(error) = body.error {
            warn!("GitHub OAuth exchange rejected: {error}");
            return Err(OAuthError::Rejected {
                description: body.error_description.unwrap_or_else(|| error.clone()),
                error,
            });
        }
        body.access_token
            .filter(|t| !t.is_empty())
            .ok_or(OAuthError::MissingToken)
    }
}

/// Single-use CSRF states handed out by the login endpoint.
#[derive(Default)]
pub struct OAuthStates {
    issued: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl OAuthStates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self) -> String {
        let state = Uuid::new_v4().simple().to_string();
        let now = Utc::now();
        if let Ok(mut issued) = self.issued.lock() {
            issued.retain(|_, at| now - *at < chrono::Duration::minutes(STATE_TTL_MINUTES));
            issued.insert(state.clone(), now);
        }
        state
    }

    /// Removes `state` and reports whether it was issued here and is still fresh.
    pub fn consume(&self, state: &str) -> bool {
        self.consume_at(state, Utc::now())
    }

    fn consume_at(&self, state: &str, now: DateTime<Utc>) -> bool {
        let Ok(mut issued) = self.issued.lock() else {
            return false;
        };
        match issued.remove(state) {
            Some(at) => now - at < chrono::Duration::minutes(STATE_TTL_MINUTES),
            None => false,
        }
    }
}
