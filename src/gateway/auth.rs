//! Bearer-token identity
//!
//! The ledger trusts the organization id and role carried in a HS256 JWT.
//! Tokens are issued by the surrounding identity service; `issue_token` exists
//! for dev tooling and tests.

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::response::{ApiResponse, error_codes};
use super::state::AppState;
use crate::core_types::OrgType;

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Organization id of the caller
    pub sub: String,
    pub role: OrgType,
    pub exp: usize,
    pub iat: usize,
}

impl Claims {
    pub fn org_id(&self) -> &str {
        &self.sub
    }
}

pub fn issue_token(
    secret: &str,
    org_id: &str,
    role: OrgType,
    ttl: chrono::Duration,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = Claims {
        sub: org_id.to_string(),
        role,
        exp: (now + ttl).timestamp() as usize,
        iat: now.timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn verify_token(secret: &str, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let validation = Validation::new(Algorithm::HS256);
    let token_data = decode::<Claims>(token, &decoding_key, &validation)?;
    Ok(token_data.claims)
}

pub async fn jwt_auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, Json<ApiResponse<()>>)> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or((
            StatusCode::UNAUTHORIZED,
            Json(ApiResponse::<()>::error(
                error_codes::MISSING_AUTH,
                "Missing Authorization header",
            )),
        ))?;

    let Some(token) = auth_header.strip_prefix("Bearer ") else {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(ApiResponse::<()>::error(
                error_codes::AUTH_FAILED,
                "Invalid token format",
            )),
        ));
    };

    match verify_token(&state.jwt_secret, token) {
        Ok(claims) => {
            request.extensions_mut().insert(claims);
            Ok(next.run(request).await)
        }
        Err(e) => {
            tracing::debug!(error = %e, "Token rejected");
            Err((
                StatusCode::UNAUTHORIZED,
                Json(ApiResponse::<()>::error(
                    error_codes::AUTH_FAILED,
                    "Invalid or expired token",
                )),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip() {
        let token = issue_token("secret", "h1", OrgType::Hospital, chrono::Duration::hours(1)).unwrap();
        let claims = verify_token("secret", &token).unwrap();
        assert_eq!(claims.org_id(), "h1");
        assert_eq!(claims.role, OrgType::Hospital);
    }

    #[test]
    fn test_wrong_secret_and_expired_token() {
        let token = issue_token("secret", "h1", OrgType::Hospital, chrono::Duration::hours(1)).unwrap();
        assert!(verify_token("other", &token).is_err());

        let expired =
            issue_token("secret", "h1", OrgType::Hospital, chrono::Duration::hours(-2)).unwrap();
        assert!(verify_token("secret", &expired).is_err());
    }
}
