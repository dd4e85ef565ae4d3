use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::roles::{Capability, Role, RoleSet};

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// The member's profile row in `public.profiles`.
///
/// `roles` is authoritative. `role` is the legacy single-role column kept for older screens; it is
/// only consulted when `roles` is empty, and is rewritten to the highest role whenever roles change.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub role: Option<String>,
    pub roles: Vec<String>,
    pub is_active: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl User {
    /// A freshly registered member.
    pub fn new_member(id: Uuid, email: String) -> Self {
        Self {
            id,
            email,
            role: Some(Role::Member.as_str().to_string()),
            roles: vec![Role::Member.as_str().to_string()],
            is_active: true,
            created_at: Utc::now(),
        }
    }

    /// role_set
    ///
    /// Reads the effective role set, coercing a legacy single `role` into the set model when the
    /// `roles` column is empty.
    pub fn role_set(&self) -> RoleSet {
        match (&self.role, self.roles.is_empty()) {
            (Some(legacy), true) => RoleSet::from_names([legacy.as_str()]),
            _ => RoleSet::from_names(&self.roles),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, TS, ToSchema,
)]
#[sqlx(type_name = "content_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ContentKind {
    Story,
    Gallery,
    Resource,
}

/// ContentState
///
/// Lifecycle state shared by every content kind. `Archived` is terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, TS, ToSchema,
)]
#[sqlx(type_name = "content_state", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ContentState {
    Draft,
    PendingReview,
    Published,
    Rejected,
    Archived,
}

impl ContentState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ContentState::Draft => "draft",
            ContentState::PendingReview => "pending_review",
            ContentState::Published => "published",
            ContentState::Rejected => "rejected",
            ContentState::Archived => "archived",
        }
    }

    /// Only published content is ever shown to the public.
    pub const fn is_publicly_visible(&self) -> bool {
        matches!(self, ContentState::Published)
    }
}

/// ContentPayload
///
/// Variant-specific fields. The `kind` tag is shared with `ContentItem::kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[ts(export)]
pub enum ContentPayload {
    Story {
        title: String,
        body: String,
    },
    Gallery {
        caption: String,
        /// Object key held by the external media store.
        media_key: String,
    },
    Resource {
        title: String,
        url: String,
        summary: Option<String>,
    },
}

impl ContentPayload {
    pub const fn kind(&self) -> ContentKind {
        match self {
            ContentPayload::Story { .. } => ContentKind::Story,
            ContentPayload::Gallery { .. } => ContentKind::Gallery,
            ContentPayload::Resource { .. } => ContentKind::Resource,
        }
    }

    /// Rejects payloads whose required text fields are blank.
    pub fn validate(&self) -> Result<(), String> {
        let required: Vec<(&str, &str)> = match self {
            ContentPayload::Story { title, body } => {
                vec![("title", title.as_str()), ("body", body.as_str())]
            }
            ContentPayload::Gallery { caption, media_key } => {
                vec![("caption", caption.as_str()), ("media_key", media_key.as_str())]
            }
            ContentPayload::Resource { title, url, .. } => {
                vec![("title", title.as_str()), ("url", url.as_str())]
            }
        };
        match required.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((field, _)) => Err(format!("`{field}` must not be empty")),
            None => Ok(()),
        }
    }
}

/// ContentItem
///
/// One story, gallery entry or resource, stored in `public.content_items`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct ContentItem {
    pub id: Uuid,
    pub kind: ContentKind,
    pub author_id: Uuid,
    #[sqlx(json)]
    pub payload: ContentPayload,
    pub state: ContentState,
    pub review_notes: Option<String>,
    pub reviewer_id: Option<Uuid>,
    #[ts(type = "string | null")]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl ContentItem {
    /// Builds an unsaved item in the given initial state.
    pub fn new(author_id: Uuid, payload: ContentPayload, state: ContentState) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            kind: payload.kind(),
            author_id,
            payload,
            state,
            review_notes: None,
            reviewer_id: None,
            reviewed_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

// --- Request Payloads (Input Schemas) ---

/// CreateContentRequest
///
/// POST /content. With `submit = true` the item goes straight to review.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateContentRequest {
    pub payload: ContentPayload,
    #[serde(default)]
    pub submit: bool,
}

/// ApproveRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ApproveRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// RejectRequest
///
/// `notes` is mandatory; a blank value is answered with `missing_required_notes`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RejectRequest {
    #[serde(default)]
    pub notes: String,
}

/// SetRolesRequest
///
/// PUT /superadmin/users/{id}/roles. Unknown role names fail deserialization.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SetRolesRequest {
    pub roles: Vec<Role>,
}

/// RegisterUserRequest
///
/// POST /register. The password is forwarded to the identity provider and never stored here.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterUserRequest {
    pub email: String,
    pub password: String,
}

// --- Dashboard & Profile Schemas (Output) ---

/// UserProfile
///
/// GET /me and the rows of GET /admin/users.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub roles: Vec<Role>,
    /// Display value only; decisions use `capabilities`.
    pub highest_role: Role,
    pub capabilities: Vec<Capability>,
    pub is_active: bool,
}

/// CapabilityCheck
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CapabilityCheck {
    pub capability: Capability,
    pub allowed: bool,
    pub reason: Option<crate::access::DenyReason>,
}

/// ModerationStats
///
/// GET /reports/stats.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct ModerationStats {
    pub total_users: i64,
    pub active_users: i64,
    pub drafts: i64,
    pub pending_reviews: i64,
    pub published: i64,
    pub rejected: i64,
    pub archived: i64,
}
