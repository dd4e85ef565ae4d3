use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::User,
    roles::{Capability, RoleSet, capabilities_of},
};

/// Principal
///
/// The actor subject to an authorization check. Passed explicitly into every decision; there
/// is no ambient "current user".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: Uuid,
    pub roles: RoleSet,
    pub is_active: bool,
}

impl Principal {
    pub fn new(id: Uuid, roles: RoleSet, is_active: bool) -> Self {
        Self {
            id,
            roles,
            is_active,
        }
    }
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Principal {
            id: user.id,
            roles: user.role_set(),
            is_active: user.is_active,
        }
    }
}

/// Why a capability check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum DenyReason {
    Inactive,
    InsufficientRole,
}

impl DenyReason {
    pub const fn as_str(&self) -> &'static str {
        match self {
            DenyReason::Inactive => "inactive",
            DenyReason::InsufficientRole => "insufficient_role",
        }
    }
}

impl From<DenyReason> for AppError {
    fn from(reason: DenyReason) -> Self {
        match reason {
            DenyReason::Inactive => AppError::Inactive,
            DenyReason::InsufficientRole => AppError::InsufficientRole,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    /// Converts a denial into the matching `AppError` so callers can use `?`.
    pub fn into_result(self) -> Result<(), AppError> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(reason.into()),
        }
    }
}

/// authorize
///
/// Pure capability check. Inactivity is evaluated before anything else so a deactivated
/// account learns nothing about what it would otherwise be allowed to do.
///
/// Ownership is not considered here. Callers that allow "the author may ..."
/// evaluate that clause first and only fall back to this function.
pub fn authorize(principal: &Principal, capability: Capability) -> Decision {
    if !principal.is_active {
        return Decision::Deny(DenyReason::Inactive);
    }
    if capabilities_of(&principal.roles).contains(&capability) {
        Decision::Allow
    } else {
        Decision::Deny(DenyReason::InsufficientRole)
    }
}

/// authorize_named
///
/// Same as `authorize` for a capability given by its wire name. An unknown name is returned as
/// `UnknownCapability`, never as a denial.
pub fn authorize_named(principal: &Principal, capability: &str) -> Result<Decision, AppError> {
    let capability: Capability = capability.parse()?;
    Ok(authorize(principal, capability))
}

/// require
///
/// `authorize` followed by a log line on denial; the form handlers use.
pub fn require(principal: &Principal, capability: Capability) -> Result<(), AppError> {
    let decision = authorize(principal, capability);
    if let Decision::Deny(reason) = decision {
        tracing::warn!(
            principal = %principal.id,
            capability = %capability,
            reason = reason.as_str(),
            "authorization denied"
        );
    }
    decision.into_result()
}
