use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;

/// AppError
///
/// Every failure the core can report. Business-rule denials (`Inactive`, `InsufficientRole`,
/// `NotAuthor`, `IllegalTransition`, `MissingRequiredNotes`) are recoverable by the caller and are
/// returned as values. `UnknownCapability` marks a defect at the call site.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("sign-in required")]
    Unauthenticated,

    #[error("account is inactive")]
    Inactive,

    #[error("your roles do not grant this action")]
    InsufficientRole,

    #[error("only the author may perform this action")]
    NotAuthor,

    #[error("this transition is not allowed from the item's current state")]
    IllegalTransition,

    #[error("review notes are required when rejecting content")]
    MissingRequiredNotes,

    #[error("unknown capability `{0}`")]
    UnknownCapability(String),

    #[error("not found")]
    NotFound,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("identity provider error: {0}")]
    IdentityProvider(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl AppError {
    /// Machine-readable code sent to clients.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Inactive => "inactive",
            Self::InsufficientRole => "insufficient_role",
            Self::NotAuthor => "not_author",
            Self::IllegalTransition => "illegal_transition",
            Self::MissingRequiredNotes => "missing_required_notes",
            Self::UnknownCapability(_) => "unknown_capability",
            Self::NotFound => "not_found",
            Self::Validation(_) => "validation_failed",
            Self::IdentityProvider(_) => "identity_provider",
            Self::Database(_) => "internal_error",
        }
    }

    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Inactive | Self::InsufficientRole | Self::NotAuthor => StatusCode::FORBIDDEN,
            Self::IllegalTransition => StatusCode::CONFLICT,
            Self::MissingRequiredNotes | Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::UnknownCapability(_) | Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IdentityProvider(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

/// ErrorResponse
///
/// JSON body for every error answer.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = match &self {
            Self::Database(e) => {
                tracing::error!(error = %e, "database error");
                "Internal server error".to_string()
            }
            Self::UnknownCapability(name) => {
                tracing::error!(capability = %name, "caller asked for an unknown capability");
                self.to_string()
            }
            _ => self.to_string(),
        };

        let body = Json(ErrorResponse {
            error: self.code().to_string(),
            message,
        });

        (self.status(), body).into_response()
    }
}

/// Result type for core operations.
pub type AppResult<T> = Result<T, AppError>;
