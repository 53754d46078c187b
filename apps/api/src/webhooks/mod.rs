//! GitHub webhook receiver.
//!
//! `push` and `release` events for a signed-in user who already has a
//! completed CV queue a regeneration with that CV's options. Regenerations
//! count against the user's generation limits like any other request.

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    Json,
};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::Sha256;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::jobs::handlers::start_job;
use crate::jobs::models::JobStatus;
use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_HEADER: &str = "x-hub-signature-256";
const EVENT_HEADER: &str = "x-github-event";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WebhookPayload {
    pub action: Option<String>,
    pub repository: Option<WebhookRepository>,
    pub sender: Option<WebhookAccount>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookRepository {
    pub full_name: String,
    pub owner: WebhookAccount,
}

#[derive(Debug, Deserialize)]
pub struct WebhookAccount {
    pub login: String,
}

/// Checks a `sha256=<hex>` signature over the raw body in constant time.
pub fn verify_signature(secret: &str, body: &[u8], signature: Option<&str>) -> bool {
    let Some(hex_sig) = signature.and_then(|s| s.strip_prefix("sha256=")) else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_sig) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// POST /api/v1/webhooks/github
pub async fn handle_github_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    if let Some(secret) = &state.config.github_webhook_secret {
        let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
        if !verify_signature(secret, &body, signature) {
            warn!("Rejected GitHub webhook with bad signature");
            return Err(AppError::Unauthorized);
        }
    }

    let event = headers
        .get(EVENT_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();
    let payload: WebhookPayload = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid webhook payload: {e}")))?;

    info!(
        event = %event,
        action = payload.action.as_deref().unwrap_or("-"),
        repository = payload.repository.as_ref().map(|r| r.full_name.as_str()).unwrap_or("-"),
        "GitHub webhook received"
    );

    let queued = match event.as_str() {
        "push" | "release" => queue_regeneration(&state, &payload).await,
        _ => None,
    };

    Ok(Json(match queued {
        Some(job_id) => json!({
            "message": "Webhook processed successfully",
            "regeneration_job_id": job_id,
        }),
        None => json!({ "message": "Webhook processed successfully" }),
    }))
}

async fn queue_regeneration(state: &AppState, payload: &WebhookPayload) -> Option<uuid::Uuid> {
    let login = payload
        .repository
        .as_ref()
        .map(|r| r.owner.login.as_str())
        .or_else(|| payload.sender.as_ref().map(|s| s.login.as_str()))?;
    let user = state.users.find_by_login(login).await?;

    let latest = state
        .jobs
        .list_for_user(user.id)
        .await
        .into_iter()
        .find(|j| j.status == JobStatus::Completed)?;

    let decision = state.limiter.try_acquire(user.id);
    if !decision.allowed {
        info!(user_id = %user.id, "Skipping webhook regeneration: rate limited");
        return None;
    }

    let job = start_job(state, &user, latest.options).await;
    Some(job.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn test_valid_signature() {
        let body = br#"{"action":"published"}"#;
        let sig = sign("s3cret", body);
        assert!(verify_signature("s3cret", body, Some(&sig)));
    }

    #[test]
    fn test_invalid_signatures() {
        let body = br#"{"action":"published"}"#;
        let sig = sign("s3cret", body);
        assert!(!verify_signature("other", body, Some(&sig)));
        assert!(!verify_signature("s3cret", b"tampered", Some(&sig)));
        assert!(!verify_signature("s3cret", body, None));
        assert!(!verify_signature("s3cret", body, Some("sha1=abcd")));
        assert!(!verify_signature("s3cret", body, Some("sha256=not-hex")));
    }

    #[test]
    fn test_payload_tolerates_missing_fields() {
        let payload: WebhookPayload = serde_json::from_str("{}").unwrap();
        assert!(payload.repository.is_none());
        let payload: WebhookPayload = serde_json::from_str(
            r#"{"action":"published","repository":{"full_name":"octocat/api","owner":{"login":"octocat"}},"sender":{"login":"octocat"},"extra":1}"#,
        )
        .unwrap();
        assert_eq!(payload.repository.unwrap().owner.login, "octocat");
    }
}
