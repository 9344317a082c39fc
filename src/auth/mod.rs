/*!
 * # Authentication Module
 *
 * Caller identity for the checkout API. Tokens are issued by an external
 * identity provider and validated here as HS256 JWTs; the `sub` claim becomes
 * the owner identity of every order the caller creates.
 *
 * Handlers receive identity through the [`AuthUser`] extractor and pass it on
 * explicitly, so services never look identity up from ambient state.
 */

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::errors::ErrorResponse;

/// Claim structure for JWT tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,          // Subject (user ID)
    pub name: Option<String>, // User's name
    pub email: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    pub jti: String, // JWT ID
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

/// Authenticated user data extracted from the JWT token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub roles: Vec<String>,
    pub token_id: String,
}

impl AuthUser {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            name: claims.name,
            email: claims.email,
            roles: claims.roles,
            token_id: claims.jti,
        }
    }
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
}

impl AuthConfig {
    pub fn new(
        jwt_secret: String,
        jwt_issuer: String,
        jwt_audience: String,
    ) -> Result<Self, AuthError> {
        if jwt_secret.trim().is_empty() {
            return Err(AuthError::InternalError(
                "JWT secret must not be empty".to_string(),
            ));
        }

        Ok(Self {
            jwt_secret,
            jwt_issuer,
            jwt_audience,
        })
    }
}

impl From<&crate::config::AppConfig> for AuthConfig {
    fn from(cfg: &crate::config::AppConfig) -> Self {
        Self {
            jwt_secret: cfg.jwt_secret.clone(),
            jwt_issuer: cfg.auth_issuer.clone(),
            jwt_audience: cfg.auth_audience.clone(),
        }
    }
}

/// Validates caller tokens
pub struct AuthService {
    config: AuthConfig,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.config.jwt_issuer.as_str()]);
        validation.set_audience(&[self.config.jwt_audience.as_str()]);
        validation
    }

    /// Decode and validate a bearer token
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &self.validation(),
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => {
                debug!(error = %e, "rejected bearer token");
                AuthError::InvalidToken
            }
        })?
        .claims;

        if claims.sub.trim().is_empty() {
            return Err(AuthError::InvalidToken);
        }

        Ok(claims)
    }

    /// Issue a token with this service's issuer and audience.
    ///
    /// Production tokens come from the identity provider; this is used by
    /// tooling and tests that need a caller identity.
    pub fn issue_token(&self, user_id: &str, ttl: Duration) -> Result<String, AuthError> {
        let now = Utc::now();
        let exp = now
            + ChronoDuration::from_std(ttl)
                .map_err(|_| AuthError::InternalError("Invalid token duration".to_string()))?;

        let claims = Claims {
            sub: user_id.to_string(),
            name: None,
            email: None,
            roles: vec!["customer".to_string()],
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::MissingAuth => (StatusCode::UNAUTHORIZED, "Authentication required"),
            Self::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid authentication token"),
            Self::TokenExpired => (StatusCode::UNAUTHORIZED, "Authentication token has expired"),
            Self::TokenCreation(_) | Self::InternalError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: message.to_string(),
            details: None,
            request_id: crate::tracing::current_request_id().map(|rid| rid.0),
            timestamp: Utc::now().to_rfc3339(),
        };

        (status, Json(body)).into_response()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    Arc<AuthService>: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_service = Arc::<AuthService>::from_ref(state);

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MissingAuth)?;

        auth_service.validate_token(token).map(AuthUser::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> AuthService {
        AuthService::new(
            AuthConfig::new(
                "unit_test_secret_with_enough_entropy_0123456789".into(),
                "checkout-auth".into(),
                "checkout-api".into(),
            )
            .unwrap(),
        )
    }

    #[test]
    fn issued_tokens_validate_and_carry_subject() {
        let auth = service();
        let token = auth.issue_token("user_42", Duration::from_secs(60)).unwrap();
        let claims = auth.validate_token(&token).unwrap();
        assert_eq!(claims.sub, "user_42");

        let user = AuthUser::from(claims);
        assert!(user.has_role("customer"));
    }

    #[test]
    fn rejects_token_for_other_audience() {
        let issuer = AuthService::new(
            AuthConfig::new(
                "unit_test_secret_with_enough_entropy_0123456789".into(),
                "checkout-auth".into(),
                "some-other-api".into(),
            )
            .unwrap(),
        );
        let token = issuer.issue_token("user_42", Duration::from_secs(60)).unwrap();
        assert!(matches!(
            service().validate_token(&token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn rejects_token_signed_with_other_secret() {
        let other = AuthService::new(
            AuthConfig::new(
                "a_completely_different_secret_value_abcdefghijkl".into(),
                "checkout-auth".into(),
                "checkout-api".into(),
            )
            .unwrap(),
        );
        let token = other.issue_token("user_42", Duration::from_secs(60)).unwrap();
        assert!(service().validate_token(&token).is_err());
    }

    #[test]
    fn empty_secret_is_rejected() {
        assert!(AuthConfig::new("  ".into(), "i".into(), "a".into()).is_err());
    }
}
