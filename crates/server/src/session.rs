use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shared::domain::UserId;

/// Thin bearer-token session provider. Sessions carry only the user
/// identity; everything else about authentication is out of scope.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub secret: String,
    pub ttl_seconds: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: i64,
    username: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub user_id: UserId,
    pub username: String,
}

pub fn mint_token(
    cfg: &SessionConfig,
    user_id: UserId,
    username: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let exp = now + Duration::seconds(cfg.ttl_seconds);
    let claims = Claims {
        sub: user_id.0,
        username: username.to_string(),
        iat: now.timestamp(),
        exp: exp.timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(cfg.secret.as_bytes()),
    )
}

pub fn verify_token(cfg: &SessionConfig, token: &str) -> Option<SessionUser> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(cfg.secret.as_bytes()),
        &Validation::default(),
    )
    .ok()?;
    Some(SessionUser {
        user_id: UserId(data.claims.sub),
        username: data.claims.username,
    })
}

/// Pulls the session out of an `Authorization: Bearer` header, if any.
pub fn session_from_bearer(cfg: &SessionConfig, header: Option<&str>) -> Option<SessionUser> {
    let token = header?.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }
    verify_token(cfg, token)
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
