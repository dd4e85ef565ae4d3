use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use jsonwebtoken::{DecodingKey, Validation, decode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    access::Principal,
    config::{AppConfig, Env},
    error::AppError,
    repository::RepositoryState,
    session::SessionState,
};

/// Claims
///
/// Payload expected inside the identity provider's JWT. Only the subject is trusted; roles
/// always come from the local profile, never from the token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the profile id.
    pub sub: Uuid,
    /// Expiration Time (exp).
    pub exp: usize,
    /// Issued At (iat).
    pub iat: usize,
}

/// AuthUser
///
/// The resolved principal of an authenticated request. Authentication only answers "who"; the
/// principal may still be inactive, and every capability check goes through `access::authorize`.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Principal);

impl AuthUser {
    pub fn id(&self) -> Uuid {
        self.0.id
    }

    pub fn principal(&self) -> &Principal {
        &self.0
    }
}

/// subject_of
///
/// Works out which user the request claims to be: the local `x-user-id` bypass first (only in
/// `Env::Local`), otherwise a Bearer JWT signed with the configured secret.
pub fn subject_of(parts: &Parts, config: &AppConfig) -> Result<Uuid, AppError> {
    if config.env == Env::Local {
        let bypass = parts
            .headers
            .get("x-user-id")
            .and_then(|value| value.to_str().ok())
            .and_then(|raw| Uuid::parse_str(raw).ok());
        if let Some(user_id) = bypass {
            return Ok(user_id);
        }
    }

    let token = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(AppError::Unauthenticated)?;

    let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
    let mut validation = Validation::default();
    validation.validate_exp = true;

    match decode::<Claims>(token, &decoding_key, &validation) {
        Ok(data) => Ok(data.claims.sub),
        Err(e) => {
            match e.kind() {
                ErrorKind::ExpiredSignature => tracing::debug!("rejected expired token"),
                other => tracing::debug!(reason = ?other, "rejected invalid token"),
            }
            Err(AppError::Unauthenticated)
        }
    }
}

/// AuthUser Extractor Implementation
///
/// 1. Reuse the principal a route guard already resolved for this request, if any.
/// 2. Otherwise work out the subject (local bypass or JWT).
/// 3. Resolve the principal through the session cache, falling back to the repository.
///
/// Rejection: `AppError::Unauthenticated` (401) when there is no subject, the token is invalid or
/// the profile no longer exists. A store failure is `AppError::Database` (500).
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    SessionState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(resolved) = parts.extensions.get::<AuthUser>() {
            return Ok(resolved.clone());
        }

        let repo = RepositoryState::from_ref(state);
        let sessions = SessionState::from_ref(state);
        let config = AppConfig::from_ref(state);

        let user_id = subject_of(parts, &config)?;

        let principal = sessions
            .resolve(repo.as_ref(), user_id)
            .await
            .inspect_err(|e| {
                tracing::error!(error = %e, user = %user_id, "failed to load principal");
            })?
            // The token may outlive the profile.
            .ok_or(AppError::Unauthenticated)?;

        Ok(AuthUser(principal))
    }
}
