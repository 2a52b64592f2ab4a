//! Admin authentication: one shared password exchanged for a signed JWT.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const ADMIN_ROLE: &str = "admin";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid password")]
    InvalidPassword,
    #[error("Missing bearer token")]
    MissingToken,
    #[error("Token expired")]
    ExpiredToken,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Failed to sign token: {0}")]
    Signing(String),
}

/// Claims carried by an admin token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

/// A freshly signed admin token
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct AuthService {
    admin_password: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    /// `None` when the configured lifetime does not fit a chrono duration
    token_ttl: Option<Duration>,
}

impl AuthService {
    pub fn new(admin_password: impl Into<String>, secret: &str, ttl_minutes: i64) -> Self {
        Self {
            admin_password: admin_password.into(),
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            token_ttl: Duration::try_minutes(ttl_minutes),
        }
    }

    /// Check the admin password and issue a token
    pub fn login(&self, password: &str) -> Result<IssuedToken, AuthError> {
        if !constant_time_eq(password.as_bytes(), self.admin_password.as_bytes()) {
            warn!("Rejected admin login with wrong password");
            return Err(AuthError::InvalidPassword);
        }

        let issued = self.issue_token()?;
        info!("Issued admin token valid until {}", issued.expires_at.to_rfc3339());
        Ok(issued)
    }

    fn issue_token(&self) -> Result<IssuedToken, AuthError> {
        let now = Utc::now();
        let expires_at = self
            .token_ttl
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| AuthError::Signing("token lifetime is out of range".to_string()))?;
        let claims = Claims {
            sub: ADMIN_ROLE.to_string(),
            role: ADMIN_ROLE.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Signing(e.to_string()))?;
        Ok(IssuedToken { token, expires_at })
    }

    /// Validate a token and make sure it belongs to an admin
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                _ => AuthError::InvalidToken,
            }
        })?;

        if data.claims.role != ADMIN_ROLE {
            return Err(AuthError::InvalidToken);
        }
        Ok(data.claims)
    }

    /// Pull the token out of an `Authorization: Bearer <token>` header value
    pub fn extract_bearer(header: &str) -> Option<&str> {
        let (scheme, token) = header.trim().split_once(' ')?;
        let token = token.trim();
        (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_test() -> AuthService {
        AuthService::new("s3cret", "test-signing-secret", 60)
    }

    #[test]
    fn test_login_issues_verifiable_token() {
        let auth = setup_test();

        let issued = auth.login("s3cret").unwrap();
        let claims = auth.verify(&issued.token).unwrap();

        assert_eq!(claims.role, "admin");
        assert_eq!(claims.exp, issued.expires_at.timestamp());
        assert!(issued.expires_at > Utc::now());
    }

    #[test]
    fn test_wrong_password_is_rejected() {
        let auth = setup_test();
        assert_eq!(auth.login("nope").unwrap_err(), AuthError::InvalidPassword);
        assert_eq!(auth.login("").unwrap_err(), AuthError::InvalidPassword);
    }

    #[test]
    fn test_token_from_other_secret_is_invalid() {
        let other = AuthService::new("s3cret", "another-secret", 60);
        let token = other.login("s3cret").unwrap().token;

        assert_eq!(setup_test().verify(&token).unwrap_err(), AuthError::InvalidToken);
        assert_eq!(setup_test().verify("garbage").unwrap_err(), AuthError::InvalidToken);
    }

    #[test]
    fn test_expired_token() {
        let auth = AuthService::new("s3cret", "test-signing-secret", -10);
        let token = auth.login("s3cret").unwrap().token;

        assert_eq!(auth.verify(&token).unwrap_err(), AuthError::ExpiredToken);
    }

    #[test]
    fn test_out_of_range_lifetime_fails_instead_of_panicking() {
        let auth = AuthService::new("s3cret", "test-signing-secret", i64::MAX);
        assert!(matches!(auth.login("s3cret"), Err(AuthError::Signing(_))));

        // fits a duration but not a date
        let auth = AuthService::new("s3cret", "test-signing-secret", i64::MAX / 60_000_000);
        assert!(matches!(auth.login("s3cret"), Err(AuthError::Signing(_))));
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(AuthService::extract_bearer("Bearer abc.def"), Some("abc.def"));
        assert_eq!(AuthService::extract_bearer("bearer  abc "), Some("abc"));
        assert_eq!(AuthService::extract_bearer("Basic abc"), None);
        assert_eq!(AuthService::extract_bearer("Bearer "), None);
        assert_eq!(AuthService::extract_bearer("abc"), None);
    }
}
