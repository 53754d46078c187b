use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::cv::CvOptions;
use crate::errors::AppError;
use crate::jobs::models::{CvJob, JobStatus, JobView};
use crate::jobs::pipeline::run_generation;
use crate::routes::parse_json_body;
use crate::state::AppState;
use crate::users::User;

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub job_id: Uuid,
    pub status: &'static str,
    pub estimated_completion: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub history: Vec<JobView>,
    pub total: usize,
}

/// Records a new job for `user` and starts it in the background.
pub(crate) async fn start_job(state: &AppState, user: &User, options: CvOptions) -> CvJob {
    let job = CvJob::new(user.id, user.github_username.clone(), options);
    state.jobs.insert(job.clone()).await;
    tokio::spawn(run_generation(
        state.generation_context(),
        job.id,
        user.github_token.clone(),
    ));
    info!(job_id = %job.id, user_id = %user.id, theme = job.options.theme.as_str(), "CV generation queued");
    job
}

async fn owned_job(state: &AppState, auth: &AuthUser, job_id: &str) -> Result<CvJob, AppError> {
    let not_found = || AppError::NotFound("CV job not found".to_string());
    let id = Uuid::parse_str(job_id).map_err(|_| not_found())?;
    let job = state.jobs.get(id).await.ok_or_else(not_found)?;
    if job.user_id != auth.user_id() {
        warn!(job_id = %id, user_id = %auth.user_id(), "Denied access to another user's job");
        return Err(AppError::Forbidden);
    }
    Ok(job)
}

/// POST /api/v1/cv/generate
pub async fn handle_generate(
    State(state): State<AppState>,
    auth: AuthUser,
    body: Bytes,
) -> Result<(StatusCode, Json<GenerateResponse>), AppError> {
    let user = state
        .users
        .get(auth.user_id())
        .await
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let options: CvOptions = parse_json_body(&body)?;
    options.validate()?;

    let decision = state.limiter.try_acquire(user.id);
    if !decision.allowed {
        info!(user_id = %user.id, reset_time = %decision.reset_time, "CV generation rate limited");
        return Err(AppError::RateLimited {
            reset_time: decision.reset_time,
        });
    }

    let job = start_job(&state, &user, options).await;
    Ok((
        StatusCode::ACCEPTED,
        Json(GenerateResponse {
            job_id: job.id,
            status: "processing",
            estimated_completion: job.estimated_completion(),
        }),
    ))
}

/// GET /api/v1/cv/:job_id/status
pub async fn handle_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(job_id): Path<String>,
) -> Result<Json<JobView>, AppError> {
    let job = owned_job(&state, &auth, &job_id).await?;
    Ok(Json(JobView::from(&job)))
}

/// GET /api/v1/cv/history
pub async fn handle_history(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Json<HistoryResponse> {
    let history: Vec<JobView> = state
        .jobs
        .list_for_user(auth.user_id())
        .await
        .iter()
        .map(JobView::from)
        .collect();
    let total = history.len();
    Json(HistoryResponse { history, total })
}

/// GET /api/v1/cv/:job_id/download
pub async fn handle_download(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(job_id): Path<String>,
) -> Result<Response, AppError> {
    let job = owned_job(&state, &auth, &job_id).await?;
    let key = match (job.status, &job.result_key) {
        (JobStatus::Completed, Some(key)) => key,
        _ => return Err(AppError::Conflict("CV is not ready yet".to_string())),
    };
    let pdf = state
        .storage
        .get(key)
        .await?
        .ok_or_else(|| AppError::NotFound("CV file not found".to_string()))?;

    let filename = format!("{}-cv.pdf", job.github_username);
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        pdf,
    )
        .into_response())
}

/// DELETE /api/v1/cv/:job_id
pub async fn handle_delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(job_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let job = owned_job(&state, &auth, &job_id).await?;
    if !job.status.is_terminal() {
        return Err(AppError::Conflict(
            "CV generation is still running".to_string(),
        ));
    }
    if let Some(key) = &job.result_key {
        state.storage.delete(key).await?;
    }
    state.jobs.delete(job.id).await;
    info!(job_id = %job.id, "CV deleted");
    Ok(Json(json!({ "message": "CV deleted successfully" })))
}
