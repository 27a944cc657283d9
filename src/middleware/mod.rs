use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::ApiError;

pub const ADMIN_ROLE: i32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: i32,
    /// Expiration, unix seconds
    pub exp: usize,
}

/// Caller holding a valid bearer token with the admin role.
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub subject: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRejection {
    MissingToken,
    InvalidToken,
    NotAdmin,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            AuthRejection::MissingToken => {
                ApiError::reply(StatusCode::UNAUTHORIZED, "Authorization token required")
            }
            AuthRejection::InvalidToken => {
                ApiError::reply(StatusCode::UNAUTHORIZED, "Invalid or expired token")
            }
            AuthRejection::NotAdmin => {
                ApiError::reply(StatusCode::FORBIDDEN, "Admin access required")
            }
        }
    }
}

/// Signs a token for `sub` valid for `ttl_seconds`. Used by operators and tests.
pub fn issue_token(
    sub: &str,
    role: i32,
    ttl_seconds: i64,
    secret: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let exp = (chrono::Utc::now() + chrono::Duration::seconds(ttl_seconds)).timestamp();
    let claims = Claims {
        sub: sub.to_string(),
        role,
        exp: exp.max(0) as usize,
    };
    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
}

// Bearer JWT extractor for the admin routes
impl FromRequestParts<Arc<crate::AppState>> for AdminUser {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<crate::AppState>,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(AuthRejection::MissingToken)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthRejection::MissingToken)?;

        let claims = verify_token(token, &state.config.jwt.secret).map_err(|e| {
            tracing::debug!("JWT validation failed: {}", e);
            AuthRejection::InvalidToken
        })?;

        if claims.role != ADMIN_ROLE {
            tracing::warn!("Non-admin subject {} tried an admin route", claims.sub);
            return Err(AuthRejection::NotAdmin);
        }

        Ok(AdminUser {
            subject: claims.sub,
        })
    }
}
