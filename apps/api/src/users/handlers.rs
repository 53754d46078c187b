use axum::{body::Bytes, extract::State, Json};
use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::routes::parse_json_body;
use crate::state::AppState;
use crate::users::User;

const MAX_NAME_LEN: usize = 100;
const MAX_GITHUB_LOGIN_LEN: usize = 39;

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub github_username: Option<String>,
}

impl UpdateUserRequest {
    fn validate(&self) -> Result<(), AppError> {
        let mut problems = Vec::new();
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                problems.push("name cannot be empty".to_string());
            } else if name.chars().count() > MAX_NAME_LEN {
                problems.push(format!("name must be at most {MAX_NAME_LEN} characters"));
            }
        }
        if let Some(email) = &self.email {
            if !is_plausible_email(email) {
                problems.push("email is not a valid address".to_string());
            }
        }
        if let Some(login) = &self.github_username {
            if !is_valid_github_login(login) {
                problems.push(format!(
                    "github_username must be 1-{MAX_GITHUB_LOGIN_LEN} letters, digits or single hyphens"
                ));
            }
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(problems.join("; ")))
        }
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !email.contains(' ')
        }
        None => false,
    }
}

/// GitHub logins: alphanumerics and non-consecutive hyphens, no leading or trailing hyphen.
pub fn is_valid_github_login(login: &str) -> bool {
    !login.is_empty()
        && login.len() <= MAX_GITHUB_LOGIN_LEN
        && login.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        && !login.starts_with('-')
        && !login.ends_with('-')
        && !login.contains("--")
}

#[derive(Debug, Serialize)]
pub struct UsageResponse {
    pub monthly_limit: u32,
    pub current_usage: u32,
    pub reset_date: DateTime<Utc>,
    pub plan: &'static str,
}

fn month_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = Utc
        .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now);
    let (year, month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };
    let next = Utc
        .with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .unwrap_or(now);
    (start, next)
}

async fn current_user(state: &AppState, auth: &AuthUser) -> Result<User, AppError> {
    state
        .users
        .get(auth.user_id())
        .await
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

/// GET /api/v1/users/me
pub async fn handle_get_me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<User>, AppError> {
    Ok(Json(current_user(&state, &auth).await?))
}

/// PUT /api/v1/users/me
pub async fn handle_update_me(
    State(state): State<AppState>,
    auth: AuthUser,
    body: Bytes,
) -> Result<Json<User>, AppError> {
    let req: UpdateUserRequest = parse_json_body(&body)?;
    req.validate()?;

    let mut user = current_user(&state, &auth).await?;
    if let Some(name) = req.name {
        user.name = Some(name.trim().to_string());
    }
    if let Some(email) = req.email {
        user.email = Some(email.trim().to_string());
    }
    if let Some(login) = req.github_username {
        user.github_username = login;
    }

    let updated = state
        .users
        .update(user)
        .await
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    Ok(Json(updated))
}

/// DELETE /api/v1/users/me
/// Removes the account, its jobs and every stored CV, then revokes the token.
pub async fn handle_delete_me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Value>, AppError> {
    let user = current_user(&state, &auth).await?;

    for job in state.jobs.list_for_user(user.id).await {
        if let Some(key) = &job.result_key {
            if let Err(e) = state.storage.delete(key).await {
                warn!(job_id = %job.id, "Failed to delete stored CV: {e}");
            }
        }
        state.jobs.delete(job.id).await;
    }
    state.limiter.forget(user.id);
    state.users.delete(user.id).await;
    state.revocations.revoke(&auth.claims);

    info!(user_id = %user.id, "Account deleted");
    Ok(Json(json!({ "message": "Account deleted successfully" })))
}

/// GET /api/v1/users/me/usage
pub async fn handle_usage(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<UsageResponse>, AppError> {
    let user = current_user(&state, &auth).await?;
    let (month_start, reset_date) = month_bounds(Utc::now());
    let current_usage = state
        .jobs
        .list_for_user(user.id)
        .await
        .iter()
        .filter(|j| j.created_at >= month_start)
        .count() as u32;

    Ok(Json(UsageResponse {
        monthly_limit: state.config.monthly_cv_limit,
        current_usage,
        reset_date,
        plan: "free",
    }))
}
