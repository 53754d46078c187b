use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Coarse error buckets used for user-facing messages and retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Network,
    Auth,
    Validation,
    RateLimit,
    Server,
}

impl ErrorCategory {
    /// Buckets an HTTP status code. Anything below 400 is not an error and
    /// lands in `Server` only if a caller insists on classifying it.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => ErrorCategory::Auth,
            429 => ErrorCategory::RateLimit,
            400..=499 => ErrorCategory::Validation,
            _ => ErrorCategory::Server,
        }
    }

    /// Only transient failures are worth another attempt.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorCategory::Network | ErrorCategory::Server)
    }

    pub fn user_message(self) -> &'static str {
        match self {
            ErrorCategory::Network => "Could not reach GitHub. Check your connection and try again.",
            ErrorCategory::Auth => "GitHub rejected the access token. Please sign in again.",
            ErrorCategory::Validation => "GitHub could not find the requested profile or repository.",
            ErrorCategory::RateLimit => "GitHub API rate limit exceeded. Please try again later.",
            ErrorCategory::Server => "GitHub is having trouble right now. Please try again shortly.",
        }
    }
}

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GitHub API error (status {status}): {message}")]
    Status { status: u16, message: String },

    #[error("GitHub API rate limit exceeded")]
    RateLimited { reset_at: Option<DateTime<Utc>> },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Failed to decode GitHub response: {0}")]
    Decode(String),
}

impl GitHubError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            GitHubError::Http(e) => match e.status() {
                Some(status) => ErrorCategory::from_status(status.as_u16()),
                None if e.is_decode() => ErrorCategory::Server,
                None => ErrorCategory::Network,
            },
            GitHubError::Status { status, .. } => ErrorCategory::from_status(*status),
            GitHubError::RateLimited { .. } => ErrorCategory::RateLimit,
            GitHubError::NotFound(_) => ErrorCategory::Validation,
            GitHubError::Decode(_) => ErrorCategory::Server,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Message safe to show to the end user, with the reset time when GitHub
    /// reported one.
    pub fn user_message(&self) -> String {
        match self {
            GitHubError::RateLimited {
                reset_at: Some(reset_at),
            } => format!(
                "GitHub API rate limit exceeded. Limit resets at {}.",
                reset_at.to_rfc3339()
            ),
            GitHubError::NotFound(resource) => format!("GitHub resource not found: {resource}"),
            other => other.category().user_message().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_buckets() {
        assert_eq!(ErrorCategory::from_status(401), ErrorCategory::Auth);
        assert_eq!(ErrorCategory::from_status(403), ErrorCategory::Auth);
        assert_eq!(ErrorCategory::from_status(404), ErrorCategory::Validation);
        assert_eq!(ErrorCategory::from_status(422), ErrorCategory::Validation);
        assert_eq!(ErrorCategory::from_status(429), ErrorCategory::RateLimit);
        assert_eq!(ErrorCategory::from_status(500), ErrorCategory::Server);
        assert_eq!(ErrorCategory::from_status(503), ErrorCategory::Server);
    }

    #[test]
    fn test_only_network_and_server_retry() {
        assert!(ErrorCategory::Network.is_retryable());
        assert!(ErrorCategory::Server.is_retryable());
        assert!(!ErrorCategory::Auth.is_retryable());
        assert!(!ErrorCategory::Validation.is_retryable());
        assert!(!ErrorCategory::RateLimit.is_retryable());
    }

    #[test]
    fn test_rate_limited_message_includes_reset() {
        let reset_at = DateTime::parse_from_rfc3339("2025-01-01T01:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let err = GitHubError::RateLimited {
            reset_at: Some(reset_at),
        };
        assert_eq!(err.category(), ErrorCategory::RateLimit);
        assert!(err.user_message().contains("2025-01-01T01:00:00"));
    }

    #[test]
    fn test_status_error_category() {
        let err = GitHubError::Status {
            status: 502,
            message: "bad gateway".to_string(),
        };
        assert!(err.is_retryable());
        assert_eq!(err.user_message(), ErrorCategory::Server.user_message());
    }
}
