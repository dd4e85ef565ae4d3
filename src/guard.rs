//! Route guard: decides whether a principal may enter an area of the portal.
//!
//! The middleware resolves the principal on every request and only hands the request to the
//! handler once the decision is `Granted`. A revoked capability therefore takes effect on the very
//! next navigation.

use axum::{
    Json,
    extract::{FromRequestParts, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

use crate::{
    AppState,
    access::{Decision, DenyReason, Principal, authorize},
    auth::AuthUser,
    error::AppError,
    roles::Capability,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Area {
    Member,
    Admin,
    SuperAdmin,
}

impl Area {
    /// The capability that opens this area.
    pub const fn capability(&self) -> Capability {
        match self {
            Area::Member => Capability::EnterMemberArea,
            Area::Admin => Capability::EnterAdminArea,
            Area::SuperAdmin => Capability::EnterSuperadminArea,
        }
    }
}

/// can_enter_area
pub fn can_enter_area(principal: &Principal, area: Area) -> Decision {
    authorize(principal, area.capability())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    Granted,
    RedirectToLogin,
    NotPermitted(DenyReason),
}

/// evaluate
///
/// No principal means the visitor is sent to log in; a principal without the area capability is
/// sent to the not-permitted page with the reason.
pub fn evaluate(principal: Option<&Principal>, area: Area) -> GuardOutcome {
    let Some(principal) = principal else {
        return GuardOutcome::RedirectToLogin;
    };
    match can_enter_area(principal, area) {
        Decision::Allow => GuardOutcome::Granted,
        Decision::Deny(reason) => GuardOutcome::NotPermitted(reason),
    }
}

/// GuardRejection
///
/// Body returned when the guard turns a request away. `redirect` is where the client should
/// navigate next.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct GuardRejection {
    pub error: String,
    pub redirect: String,
}

async fn guard_area(state: &AppState, area: Area, request: Request, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();
    let resolved = match AuthUser::from_request_parts(&mut parts, state).await {
        Ok(user) => Some(user),
        Err(AppError::Unauthenticated) => None,
        Err(e) => return e.into_response(),
    };

    let outcome = evaluate(resolved.as_ref().map(AuthUser::principal), area);
    match (outcome, resolved) {
        (GuardOutcome::Granted, Some(user)) => {
            parts.extensions.insert(user);
            next.run(Request::from_parts(parts, body)).await
        }
        (GuardOutcome::NotPermitted(reason), _) => {
            tracing::warn!(
                area = ?area,
                reason = reason.as_str(),
                path = %parts.uri.path(),
                "area entry denied"
            );
            let body = GuardRejection {
                error: reason.as_str().to_string(),
                redirect: state.config.not_permitted_path.clone(),
            };
            (StatusCode::FORBIDDEN, Json(body)).into_response()
        }
        _ => {
            let body = GuardRejection {
                error: "unauthenticated".to_string(),
                redirect: state.config.login_path.clone(),
            };
            (StatusCode::UNAUTHORIZED, Json(body)).into_response()
        }
    }
}

/// member_area
///
/// Layer for every route behind a login.
pub async fn member_area(State(state): State<AppState>, request: Request, next: Next) -> Response {
    guard_area(&state, Area::Member, request, next).await
}

pub async fn admin_area(State(state): State<AppState>, request: Request, next: Next) -> Response {
    guard_area(&state, Area::Admin, request, next).await
}

pub async fn superadmin_area(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    guard_area(&state, Area::SuperAdmin, request, next).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::{Role, RoleSet};
    use uuid::Uuid;

    fn principal(roles: &[Role], is_active: bool) -> Principal {
        Principal::new(Uuid::new_v4(), RoleSet::new(roles.iter().copied()), is_active)
    }

    #[test]
    fn anonymous_visitors_are_sent_to_login() {
        assert_eq!(evaluate(None, Area::Member), GuardOutcome::RedirectToLogin);
        assert_eq!(evaluate(None, Area::SuperAdmin), GuardOutcome::RedirectToLogin);
    }

    #[test]
    fn admin_enters_admin_area_but_not_superadmin_area() {
        let admin = principal(&[Role::Admin], true);
        assert_eq!(evaluate(Some(&admin), Area::Admin), GuardOutcome::Granted);
        assert_eq!(
            evaluate(Some(&admin), Area::SuperAdmin),
            GuardOutcome::NotPermitted(DenyReason::InsufficientRole)
        );
    }

    #[test]
    fn inactive_superadmin_is_not_permitted_anywhere() {
        let root = principal(&[Role::Superadmin], false);
        for area in [Area::Member, Area::Admin, Area::SuperAdmin] {
            assert_eq!(
                evaluate(Some(&root), area),
                GuardOutcome::NotPermitted(DenyReason::Inactive)
            );
        }
    }
}
