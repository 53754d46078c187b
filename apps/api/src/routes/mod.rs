pub mod health;

use axum::{
    routing::{get, post},
    Router,
};
use serde::de::DeserializeOwned;

use crate::auth::handlers as auth;
use crate::errors::AppError;
use crate::jobs::handlers as cv;
use crate::state::AppState;
use crate::users::handlers as users;
use crate::webhooks;

/// Parses a JSON request body. An empty body means "all defaults".
/// Malformed or mistyped bodies are validation errors (422) in the API's error shape.
pub fn parse_json_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, AppError> {
    let body = if body.iter().all(u8::is_ascii_whitespace) {
        b"{}".as_slice()
    } else {
        body
    };
    serde_json::from_slice(body)
        .map_err(|e| AppError::Validation(format!("Invalid request body: {e}")))
}

async fn not_found() -> AppError {
    AppError::NotFound("Route not found".to_string())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health::root_handler))
        .route("/health", get(health::health_handler))
        // Authentication
        .route("/api/v1/auth/github/login", get(auth::handle_github_login))
        .route(
            "/api/v1/auth/github/callback",
            post(auth::handle_github_callback),
        )
        .route("/api/v1/auth/me", get(auth::handle_me))
        .route("/api/v1/auth/refresh", post(auth::handle_refresh))
        .route("/api/v1/auth/logout", post(auth::handle_logout))
        // CV generation
        .route("/api/v1/cv/generate", post(cv::handle_generate))
        .route("/api/v1/cv/history", get(cv::handle_history))
        .route("/api/v1/cv/:job_id/status", get(cv::handle_status))
        .route("/api/v1/cv/:job_id/download", get(cv::handle_download))
        .route("/api/v1/cv/:job_id", axum::routing::delete(cv::handle_delete))
        // Users
        .route(
            "/api/v1/users/me",
            get(users::handle_get_me)
                .put(users::handle_update_me)
                .delete(users::handle_delete_me),
        )
        .route("/api/v1/users/me/usage", get(users::handle_usage))
        // Webhooks
        .route(
            "/api/v1/webhooks/github",
            post(webhooks::handle_github_webhook),
        )
        .fallback(not_found)
        .with_state(state)
}
