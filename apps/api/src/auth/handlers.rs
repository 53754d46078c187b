use axum::{body::Bytes, extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::auth::extractor::AuthUser;
use crate::errors::AppError;
use crate::github::GitHubClient;
use crate::routes::parse_json_body;
use crate::state::AppState;
use crate::users::User;

#[derive(Serialize)]
pub struct LoginResponse {
    pub auth_url: String,
    pub state: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CallbackRequest {
    pub code: Option<String>,
    pub state: Option<String>,
}

#[derive(Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub user: User,
}

fn token_response(state: &AppState, user: User) -> Result<TokenResponse, AppError> {
    let access_token = state.jwt.issue(user.id, &user.github_username)?;
    Ok(TokenResponse {
        access_token,
        token_type: "bearer",
        expires_in: state.jwt.ttl_seconds(),
        user,
    })
}

/// GET /api/v1/auth/github/login
pub async fn handle_github_login(
    State(state): State<AppState>,
) -> Result<Json<LoginResponse>, AppError> {
    let csrf_state = state.oauth_states.issue();
    let auth_url = state.oauth.authorize_url(&csrf_state)?;
    Ok(Json(LoginResponse {
        auth_url,
        state: csrf_state,
    }))
}

/// POST /api/v1/auth/github/callback
pub async fn handle_github_callback(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<TokenResponse>, AppError> {
    let req: CallbackRequest = parse_json_body(&body)?;
    let code = req
        .code
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| AppError::Validation("code is required".to_string()))?;
    let csrf_state = req
        .state
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| AppError::Validation("state is required".to_string()))?;
    if !state.oauth_states.consume(&csrf_state) {
        return Err(AppError::BadRequest(
            "Invalid or expired OAuth state".to_string(),
        ));
    }

    let github_token = state.oauth.exchange_code(&code).await?;
    let github = GitHubClient::new(&state.config.github_api_url, Some(github_token.clone()))?;
    let profile = github.get_authenticated_user().await?;

    let user = state.users.upsert_github(&profile, Some(github_token)).await;
    info!(user_id = %user.id, login = %user.github_username, "User signed in with GitHub");

    Ok(Json(token_response(&state, user)?))
}

/// GET /api/v1/auth/me
pub async fn handle_me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<User>, AppError> {
    let user = state
        .users
        .get(auth.user_id())
        .await
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    Ok(Json(user))
}

/// POST /api/v1/auth/refresh
/// Issues a fresh token and revokes the one presented.
pub async fn handle_refresh(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<TokenResponse>, AppError> {
    let user = state
        .users
        .get(auth.user_id())
        .await
        .ok_or(AppError::Unauthorized)?;
    let response = token_response(&state, user)?;
    state.revocations.revoke(&auth.claims);
    Ok(Json(response))
}

/// POST /api/v1/auth/logout
pub async fn handle_logout(State(state): State<AppState>, auth: AuthUser) -> Json<Value> {
    state.revocations.revoke(&auth.claims);
    info!(user_id = %auth.user_id(), "User logged out");
    Json(json!({ "message": "Successfully logged out" }))
}
