use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::errors::AppError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub jti: Uuid,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum AuthError {
    #[error("token expired")]
    Expired,
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("malformed token")]
    Malformed,
    #[error("token revoked")]
    Revoked,
    #[error("token encoding failed: {0}")]
    Encoding(String),
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Encoding(msg) => AppError::Internal(anyhow::anyhow!(msg)),
            _ => AppError::Unauthorized,
        }
    }
}

/// Issues and verifies HS256 access tokens.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl fmt::Debug for JwtService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtService")
            .field("ttl_minutes", &self.ttl.num_minutes())
            .finish()
    }
}

impl JwtService {
    pub fn new(secret: &str, ttl_minutes: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::minutes(ttl_minutes),
        }
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.ttl.num_seconds()
    }

    pub fn issue(&self, user_id: Uuid, username: &str) -> Result<String, AuthError> {
        self.issue_at(user_id, username, Utc::now())
    }

    pub fn issue_at(
        &self,
        user_id: Uuid,
        username: &str,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let claims = Claims {
            sub: user_id,
            username: username.to_string(),
            jti: Uuid::new_v4(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Encoding(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 30;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                use jsonwebtoken::errors::ErrorKind;
                match e.kind() {
                    ErrorKind::ExpiredSignature => {
                        tracing::debug!("Token verification failed: token expired");
                        AuthError::Expired
                    }
                    ErrorKind::InvalidSignature => {
                        tracing::warn!("Token verification failed: invalid signature");
                        AuthError::InvalidSignature
                    }
                    _ => {
                        tracing::debug!("Token verification failed: {e}");
                        AuthError::Malformed
                    }
                }
            })
    }
}

/// Revoked token ids, kept until the token would have expired anyway.
#[derive(Default)]
pub struct TokenRevocations {
    revoked: Mutex<HashMap<Uuid, DateTime<Utc>>>,
}

impl TokenRevocations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revoke(&self, claims: &Claims) {
        let now = Utc::now();
        if let Ok(mut revoked) = self.revoked.lock() {
            revoked.retain(|_, exp| *exp > now);
            revoked.insert(claims.jti, claims.expires_at());
        }
    }

    pub fn is_revoked(&self, jti: Uuid) -> bool {
        match self.revoked.lock() {
            Ok(revoked) => revoked.contains_key(&jti),
            Err(poisoned) => poisoned.into_inner().contains_key(&jti),
        }
    }
}
