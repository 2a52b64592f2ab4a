use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use tracing::warn;

use super::error::ApiError;
use crate::domain::auth_service::Claims;
use crate::domain::{AuthError, AuthService};
use crate::AppState;

/// Proof that the request carries a valid admin token.
///
/// Add it as a handler argument to protect the route; the request is
/// rejected with 401 before the body is read.
#[derive(Debug, Clone)]
pub struct AdminSession {
    pub claims: Claims,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(AuthService::extract_bearer)
            .ok_or(AuthError::MissingToken)?;

        match state.auth_service.verify(token) {
            Ok(claims) => Ok(Self { claims }),
            Err(e) => {
                warn!("{} {} - rejected admin token: {}", parts.method, parts.uri.path(), e);
                Err(e.into())
            }
        }
    }
}
