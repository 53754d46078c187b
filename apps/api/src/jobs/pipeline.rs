//! Background CV generation.
//!
//! `run_generation` is spawned per accepted request. Each step is recorded on
//! the job before it starts so pollers see where a slow job is. Rendering is
//! CPU-bound and runs via `spawn_blocking`.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

use crate::cv::render::RenderError;
use crate::cv::{build_document, render_pdf, SummaryWriter};
use crate::errors::AppError;
use crate::github::skills::extract_skills;
use crate::github::{fetch_profile, FetchOptions, GitHubClient, GitHubError};
use crate::jobs::models::{CvJob, JobStep};
use crate::jobs::store::JobStore;
use crate::storage::{cv_key, CvStorage};

/// Repositories inspected per CV, independent of how many are rendered.
const MAX_REPOS_ANALYZED: usize = 10;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("job {0} disappeared")]
    JobMissing(Uuid),
    #[error(transparent)]
    GitHub(#[from] GitHubError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("storage failed: {0}")]
    Storage(#[from] AppError),
    #[error("render task panicked: {0}")]
    Join(String),
}

impl PipelineError {
    /// Message stored on the failed job and shown to the user.
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::GitHub(e) => e.user_message(),
            PipelineError::Render(_) | PipelineError::Join(_) => {
                "Failed to render the CV. Please try again.".to_string()
            }
            PipelineError::Storage(_) => {
                "Failed to store the generated CV. Please try again.".to_string()
            }
            PipelineError::JobMissing(_) => "CV generation was cancelled.".to_string(),
        }
    }
}

/// Everything a generation run needs, detached from request state.
#[derive(Clone)]
pub struct GenerationContext {
    pub jobs: Arc<dyn JobStore>,
    pub storage: Arc<dyn CvStorage>,
    pub github_api_url: String,
    pub summaries: SummaryWriter,
    pub dispatch_delay: Duration,
    pub retry_base_delay: Duration,
}

/// Drives one job to a terminal state. Never returns an error; failures are
/// recorded on the job.
pub async fn run_generation(ctx: GenerationContext, job_id: Uuid, github_token: Option<String>) {
    match generate(&ctx, job_id, github_token).await {
        Ok(size) => info!(%job_id, size, "CV generation completed"),
        Err(e) => {
            error!(%job_id, "CV generation failed: {e}");
            let message = e.user_message();
            ctx.jobs
                .update(job_id, Box::new(move |job| job.fail(message)))
                .await;
        }
    }
}

async fn step(ctx: &GenerationContext, job_id: Uuid, step: JobStep) -> Result<CvJob, PipelineError> {
    ctx.jobs
        .update(job_id, Box::new(move |job| job.advance(step)))
        .await
        .ok_or(PipelineError::JobMissing(job_id))
}

async fn generate(
    ctx: &GenerationContext,
    job_id: Uuid,
    github_token: Option<String>,
) -> Result<u64, PipelineError> {
    let job = step(ctx, job_id, JobStep::FetchingGithubData).await?;
    let options = job.options.clone();

    let client = GitHubClient::new(&ctx.github_api_url, github_token)?
        .with_retry_base_delay(ctx.retry_base_delay);
    let fetch_options = FetchOptions {
        max_repos: MAX_REPOS_ANALYZED.max(options.project_limit()),
        include_forks: options.include_forks,
        dispatch_delay: ctx.dispatch_delay,
    };
    let profile = fetch_profile(&client, &job.github_username, &fetch_options).await?;

    step(ctx, job_id, JobStep::AnalyzingRepositories).await?;
    let skills = extract_skills(&profile);

    step(ctx, job_id, JobStep::GeneratingSummaries).await?;
    let summary = ctx.summaries.write(&profile, &skills, &options).await;
    let document = build_document(&profile, &skills, &summary, &options);

    step(ctx, job_id, JobStep::RenderingPdf).await?;
    let theme = options.theme;
    let pdf = tokio::task::spawn_blocking(move || render_pdf(&document, theme))
        .await
        .map_err(|e| PipelineError::Join(e.to_string()))??;

    step(ctx, job_id, JobStep::Uploading).await?;
    let key = cv_key(job.user_id, job_id);
    let size = pdf.len() as u64;
    ctx.storage.put(&key, Bytes::from(pdf)).await?;

    let finished = ctx
        .jobs
        .update(job_id, Box::new(move |job| job.complete(key, size)))
        .await;
    if finished.is_none() {
        // Deleted mid-run; the stored PDF has no owner any more.
        let orphan = cv_key(job.user_id, job_id);
        if let Err(e) = ctx.storage.delete(&orphan).await {
            error!(%job_id, "failed to remove orphaned CV: {e}");
        }
        return Err(PipelineError::JobMissing(job_id));
    }
    Ok(size)
}
