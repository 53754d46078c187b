use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum::http::header::AUTHORIZATION;
use uuid::Uuid;

use crate::auth::jwt::{AuthError, Claims};
use crate::errors::AppError;
use crate::state::AppState;

/// An authenticated caller: a verified, non-revoked bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub claims: Claims,
}

impl AuthUser {
    pub fn user_id(&self) -> Uuid {
        self.claims.sub
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(AppError::Unauthorized)?;
        let claims = state.jwt.verify(token)?;
        if state.revocations.is_revoked(claims.jti) {
            tracing::debug!(user_id = %claims.sub, "Rejected revoked token");
            return Err(AuthError::Revoked.into());
        }
        Ok(AuthUser { claims })
    }
}
