use anyhow::{Context, Result};

/// Object storage settings. Absent when no bucket is configured, in which case
/// rendered CVs are held in process memory.
#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub endpoint: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub environment: String,
    pub jwt_secret: String,
    pub access_token_expire_minutes: i64,
    pub github_client_id: String,
    pub github_client_secret: String,
    pub github_redirect_uri: String,
    pub github_api_url: String,
    pub github_oauth_url: String,
    pub github_webhook_secret: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub s3: Option<S3Config>,
    pub rate_limit_per_hour: u32,
    pub rate_limit_per_day: u32,
    pub monthly_cv_limit: u32,
    pub cors_origins: Vec<String>,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let s3 = match optional_env("S3_BUCKET") {
            Some(bucket) => Some(S3Config {
                bucket,
                endpoint: require_env("S3_ENDPOINT")?,
                access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
                secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            }),
            None => None,
        };

        Ok(Config {
            environment: optional_env("ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
            jwt_secret: require_env("JWT_SECRET")?,
            access_token_expire_minutes: parse_env("ACCESS_TOKEN_EXPIRE_MINUTES", 60 * 24 * 8)?,
            github_client_id: require_env("GITHUB_CLIENT_ID")?,
            github_client_secret: require_env("GITHUB_CLIENT_SECRET")?,
            github_redirect_uri: optional_env("GITHUB_REDIRECT_URI")
                .unwrap_or_else(|| "http://localhost:3000/auth/callback".to_string()),
            github_api_url: optional_env("GITHUB_API_URL")
                .unwrap_or_else(|| "https://api.github.com".to_string()),
            github_oauth_url: optional_env("GITHUB_OAUTH_URL")
                .unwrap_or_else(|| "https://github.com".to_string()),
            github_webhook_secret: optional_env("GITHUB_WEBHOOK_SECRET"),
            anthropic_api_key: optional_env("ANTHROPIC_API_KEY"),
            s3,
            rate_limit_per_hour: parse_env("RATE_LIMIT_PER_HOUR", 5)?,
            rate_limit_per_day: parse_env("RATE_LIMIT_PER_DAY", 20)?,
            monthly_cv_limit: parse_env("MONTHLY_CV_LIMIT", 10)?,
            cors_origins: parse_list(
                &optional_env("CORS_ORIGINS")
                    .unwrap_or_else(|| "http://localhost:3000,http://127.0.0.1:3000".to_string()),
            ),
            port: parse_env("PORT", 8000)?,
            rust_log: optional_env("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Unset and empty variables are treated the same.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value: {raw}")),
        None => Ok(default),
    }
}

/// Splits a comma-separated list, dropping blanks.
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
impl Config {
    /// Config used by handler tests. Nothing in it points at a real service.
    pub fn for_tests() -> Self {
        Config {
            environment: "test".to_string(),
            jwt_secret: "test-secret-key-with-enough-entropy".to_string(),
            access_token_expire_minutes: 60,
            github_client_id: "client-id".to_string(),
            github_client_secret: "client-secret".to_string(),
            github_redirect_uri: "http://localhost:3000/auth/callback".to_string(),
            github_api_url: "http://127.0.0.1:9".to_string(),
            github_oauth_url: "http://127.0.0.1:9".to_string(),
            github_webhook_secret: None,
            anthropic_api_key: None,
            s3: None,
            rate_limit_per_hour: 5,
            rate_limit_per_day: 20,
            monthly_cv_limit: 10,
            cors_origins: vec!["http://localhost:3000".to_string()],
            port: 0,
            rust_log: "debug".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_trims_and_drops_blanks() {
        assert_eq!(
            parse_list(" http://a.dev , ,http://b.dev"),
            vec!["http://a.dev".to_string(), "http://b.dev".to_string()]
        );
    }

    #[test]
    fn test_parse_list_empty() {
        assert!(parse_list("").is_empty());
    }

    #[test]
    fn test_is_production() {
        let mut config = Config::for_tests();
        assert!(!config.is_production());
        config.environment = "production".to_string();
        assert!(config.is_production());
    }
}
