use std::sync::Arc;

use axum::{
    extract::State,
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;

use assetkeep_auth::{JwtValidator, TokenValidationError};
use assetkeep_core::DomainError;
use assetkeep_infra::services::AccountService;

use crate::app::errors::ApiError;
use crate::context::PrincipalContext;

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
    pub accounts: AccountService,
}

/// Verify the bearer token, then re-read the profile so admin changes and
/// deletions apply on the next request.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let token = match extract_bearer(req.headers()) {
        Ok(t) => t,
        Err(e) => return ApiError::from(e).into_response(),
    };

    let claims = match state.jwt.validate(token, Utc::now()) {
        Ok(c) => c,
        Err(e) => {
            let message = match e {
                TokenValidationError::Expired => "Token expired",
                _ => "Invalid token",
            };
            return ApiError::from(DomainError::unauthorized(message)).into_response();
        }
    };

    let principal = match state.accounts.resolve_principal(claims.sub).await {
        Ok(p) => p,
        Err(e) => return ApiError::from(e).into_response(),
    };

    req.extensions_mut().insert(PrincipalContext::new(principal));
    next.run(req).await
}

pub fn extract_bearer(headers: &HeaderMap) -> Result<&str, DomainError> {
    let missing = || DomainError::unauthorized("No token provided");

    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(missing)?;
    let header = header.to_str().map_err(|_| missing())?;
    let token = header.strip_prefix("Bearer ").ok_or_else(missing)?.trim();
    if token.is_empty() {
        return Err(missing());
    }
    Ok(token)
}
