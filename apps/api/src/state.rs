use std::sync::Arc;
use std::time::Duration;

use crate::auth::jwt::{JwtService, TokenRevocations};
use crate::auth::oauth::{GitHubOAuth, OAuthStates};
use crate::config::Config;
use crate::cv::SummaryWriter;
use crate::jobs::pipeline::GenerationContext;
use crate::jobs::rate_limit::GenerationLimiter;
use crate::jobs::store::{JobStore, MemoryJobStore};
use crate::storage::CvStorage;
use crate::users::{MemoryUserStore, UserStore};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub jwt: JwtService,
    pub revocations: Arc<TokenRevocations>,
    pub oauth: GitHubOAuth,
    pub oauth_states: Arc<OAuthStates>,
    pub users: Arc<dyn UserStore>,
    pub jobs: Arc<dyn JobStore>,
    /// Rendered PDFs. S3 when a bucket is configured, process memory otherwise.
    pub storage: Arc<dyn CvStorage>,
    pub limiter: Arc<GenerationLimiter>,
    /// LLM-backed when `ANTHROPIC_API_KEY` is set, heuristic otherwise.
    pub summaries: SummaryWriter,
    /// Pause between per-repository GitHub dispatches in the generation fan-out.
    pub dispatch_delay: Duration,
}

impl AppState {
    pub fn new(
        config: Config,
        storage: Arc<dyn CvStorage>,
        summaries: SummaryWriter,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            jwt: JwtService::new(&config.jwt_secret, config.access_token_expire_minutes),
            revocations: Arc::new(TokenRevocations::new()),
            oauth: GitHubOAuth::new(&config)?,
            oauth_states: Arc::new(OAuthStates::new()),
            users: Arc::new(MemoryUserStore::new()),
            jobs: Arc::new(MemoryJobStore::new()),
            storage,
            limiter: Arc::new(GenerationLimiter::new(
                config.rate_limit_per_hour,
                config.rate_limit_per_day,
            )),
            summaries,
            dispatch_delay: Duration::from_millis(100),
            config,
        })
    }

    pub fn generation_context(&self) -> GenerationContext {
        GenerationContext {
            jobs: self.jobs.clone(),
            storage: self.storage.clone(),
            github_api_url: self.config.github_api_url.clone(),
            summaries: self.summaries.clone(),
            dispatch_delay: self.dispatch_delay,
            retry_base_delay: Duration::from_millis(500),
        }
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self::with_config(Config::for_tests())
    }

    #[cfg(test)]
    pub fn with_config(config: Config) -> Self {
        let mut state = Self::new(
            config,
            Arc::new(crate::storage::MemoryStorage::new()),
            SummaryWriter::heuristic(),
        )
        .expect("test state");
        state.dispatch_delay = Duration::ZERO;
        state
    }
}
