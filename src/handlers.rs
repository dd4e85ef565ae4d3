use crate::{
    AppState,
    access::{Decision, authorize, require},
    auth::AuthUser,
    error::{AppError, ErrorResponse},
    models::{
        ApproveRequest, CapabilityCheck, ContentItem, ContentKind, CreateContentRequest,
        ModerationStats, RegisterUserRequest, RejectRequest, SetRolesRequest, UserProfile,
    },
    moderation, queue,
    roles::Capability,
    users,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

// --- Filter Structs ---

/// ContentFilter
///
/// Query parameters shared by the public listing and the moderation queue.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct ContentFilter {
    /// Restrict the listing to one content kind.
    pub kind: Option<ContentKind>,
}

/// SupabaseAuthResponse
///
/// The part of the identity provider's sign-up answer we need: the new account's UUID.
#[derive(Deserialize)]
struct SupabaseAuthResponse {
    id: Uuid,
}

// --- Public Handlers ---

/// register_user
///
/// [Public Route] Signs the user up with the identity provider, then mirrors the account into
/// `public.profiles` under the same id with roles `{member}`.
#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterUserRequest,
    responses(
        (status = 201, description = "Registered", body = UserProfile),
        (status = 422, description = "Rejected by the identity provider", body = ErrorResponse),
        (status = 502, description = "Identity provider unavailable", body = ErrorResponse)
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    Json(payload): Json<RegisterUserRequest>,
) -> Result<(StatusCode, Json<UserProfile>), AppError> {
    let (Some(supabase_url), Some(supabase_key)) =
        (&state.config.supabase_url, &state.config.supabase_key)
    else {
        return Err(AppError::IdentityProvider(
            "identity provider is not configured".to_string(),
        ));
    };

    let response = reqwest::Client::new()
        .post(format!("{}/auth/v1/signup", supabase_url))
        .header("apikey", supabase_key)
        .json(&serde_json::json!({ "email": payload.email, "password": payload.password }))
        .send()
        .await
        .map_err(|e| AppError::IdentityProvider(e.to_string()))?;

    if !response.status().is_success() {
        tracing::info!(status = %response.status(), "identity provider refused sign-up");
        return Err(AppError::Validation(
            "the identity provider rejected the sign-up".to_string(),
        ));
    }

    let account = response
        .json::<SupabaseAuthResponse>()
        .await
        .map_err(|e| AppError::IdentityProvider(e.to_string()))?;

    let user = users::register_member(state.repo.as_ref(), account.id, payload.email).await?;
    Ok((StatusCode::CREATED, Json(users::profile_of(&user))))
}

/// list_published
///
/// [Public Route] Published items, newest first.
#[utoipa::path(
    get,
    path = "/content",
    params(ContentFilter),
    responses((status = 200, description = "Published content", body = [ContentItem]))
)]
pub async fn list_published(
    State(state): State<AppState>,
    Query(filter): Query<ContentFilter>,
) -> Result<Json<Vec<ContentItem>>, AppError> {
    Ok(Json(state.repo.published_items(filter.kind).await?))
}

/// get_published
///
/// [Public Route] One published item. Anything not yet (or no longer) public is a 404 here.
#[utoipa::path(
    get,
    path = "/content/{id}",
    responses(
        (status = 200, description = "Item", body = ContentItem),
        (status = 404, description = "Not found or not public", body = ErrorResponse)
    )
)]
pub async fn get_published(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ContentItem>, AppError> {
    let item = state
        .repo
        .load_content_item(id)
        .await?
        .filter(|item| item.state.is_publicly_visible())
        .ok_or(AppError::NotFound)?;
    Ok(Json(item))
}

// --- Member Area Handlers ---

/// get_me
///
/// [Member Route] The caller's profile, roles and the capabilities they grant.
#[utoipa::path(
    get,
    path = "/me",
    responses((status = 200, description = "Profile", body = UserProfile))
)]
pub async fn get_me(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UserProfile>, AppError> {
    let profile = state
        .repo
        .get_user(user.id())
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(users::profile_of(&profile)))
}

/// logout
///
/// [Member Route] Forgets the cached principal. The token itself is revoked by the identity
/// provider on the client side.
#[utoipa::path(post, path = "/logout", responses((status = 204, description = "Logged out")))]
pub async fn logout(user: AuthUser, State(state): State<AppState>) -> StatusCode {
    state.sessions.invalidate(user.id());
    StatusCode::NO_CONTENT
}

/// check_capability
///
/// [Member Route] Lets the UI ask whether to show a control. An unknown capability name is a
/// client defect and answers 500.
#[utoipa::path(
    get,
    path = "/me/capabilities/{name}",
    responses(
        (status = 200, description = "Decision", body = CapabilityCheck),
        (status = 500, description = "Unknown capability", body = ErrorResponse)
    )
)]
pub async fn check_capability(
    user: AuthUser,
    Path(name): Path<String>,
) -> Result<Json<CapabilityCheck>, AppError> {
    let capability: Capability = name.parse()?;
    let decision = authorize(user.principal(), capability);
    let reason = match decision {
        Decision::Allow => None,
        Decision::Deny(reason) => Some(reason),
    };
    Ok(Json(CapabilityCheck {
        capability,
        allowed: decision.is_allowed(),
        reason,
    }))
}

/// get_my_content
///
/// [Member Route] Everything the caller authored, in every state, newest first.
#[utoipa::path(
    get,
    path = "/me/content",
    responses((status = 200, description = "My content", body = [ContentItem]))
)]
pub async fn get_my_content(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<ContentItem>>, AppError> {
    Ok(Json(state.repo.items_by_author(user.id()).await?))
}

/// create_content
///
/// [Member Route] Stores a story, gallery entry or resource as a draft, or straight into review.
#[utoipa::path(
    post,
    path = "/content",
    request_body = CreateContentRequest,
    responses(
        (status = 201, description = "Created", body = ContentItem),
        (status = 422, description = "Invalid payload", body = ErrorResponse)
    )
)]
pub async fn create_content(
    user: AuthUser,
    State(state): State<AppState>,
    Json(request): Json<CreateContentRequest>,
) -> Result<(StatusCode, Json<ContentItem>), AppError> {
    let item = moderation::create_content(
        state.repo.as_ref(),
        user.principal(),
        request.payload,
        request.submit,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// preview_content
///
/// [Member Route] Visibility-checked read. Items the caller may not see are reported as missing.
#[utoipa::path(
    get,
    path = "/content/{id}/preview",
    responses(
        (status = 200, description = "Item", body = ContentItem),
        (status = 404, description = "Not found or not visible", body = ErrorResponse)
    )
)]
pub async fn preview_content(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ContentItem>, AppError> {
    let item = state
        .repo
        .load_content_item(id)
        .await?
        .filter(|item| moderation::can_view(item, Some(user.principal())))
        .ok_or(AppError::NotFound)?;
    Ok(Json(item))
}

/// submit_content
///
/// [Member Route] Author sends a draft to review.
#[utoipa::path(
    post,
    path = "/content/{id}/submit",
    responses(
        (status = 200, description = "Submitted", body = ContentItem),
        (status = 403, description = "Not the author", body = ErrorResponse),
        (status = 409, description = "Illegal transition", body = ErrorResponse)
    )
)]
pub async fn submit_content(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ContentItem>, AppError> {
    Ok(Json(
        moderation::submit(state.repo.as_ref(), id, user.principal()).await?,
    ))
}

/// resubmit_content
///
/// [Member Route] Author sends a rejected item back to review.
#[utoipa::path(
    post,
    path = "/content/{id}/resubmit",
    responses(
        (status = 200, description = "Resubmitted", body = ContentItem),
        (status = 403, description = "Not the author", body = ErrorResponse),
        (status = 409, description = "Illegal transition", body = ErrorResponse)
    )
)]
pub async fn resubmit_content(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ContentItem>, AppError> {
    Ok(Json(
        moderation::resubmit(state.repo.as_ref(), id, user.principal()).await?,
    ))
}

/// get_moderation_queue
///
/// [Member Route] Items awaiting review, oldest first. Requires `moderation.queue.view`.
#[utoipa::path(
    get,
    path = "/moderation/queue",
    params(ContentFilter),
    responses(
        (status = 200, description = "Pending items", body = [ContentItem]),
        (status = 403, description = "Denied", body = ErrorResponse)
    )
)]
pub async fn get_moderation_queue(
    user: AuthUser,
    State(state): State<AppState>,
    Query(filter): Query<ContentFilter>,
) -> Result<Json<Vec<ContentItem>>, AppError> {
    let items =
        queue::pending_for_reviewer(state.repo.as_ref(), user.principal(), filter.kind).await?;
    Ok(Json(items))
}

/// approve_content
///
/// [Member Route] The body is optional; without one the item is approved with no notes.
#[utoipa::path(
    post,
    path = "/moderation/{id}/approve",
    request_body(content = ApproveRequest, description = "Optional reviewer notes"),
    responses(
        (status = 200, description = "Published", body = ContentItem),
        (status = 403, description = "Denied", body = ErrorResponse),
        (status = 409, description = "Illegal transition", body = ErrorResponse)
    )
)]
pub async fn approve_content(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    request: Option<Json<ApproveRequest>>,
) -> Result<Json<ContentItem>, AppError> {
    let request = request.map(|Json(body)| body).unwrap_or_default();
    let item =
        moderation::approve(state.repo.as_ref(), id, user.principal(), request.notes).await?;
    Ok(Json(item))
}

/// reject_content
///
/// [Member Route] Rejection always carries notes for the author.
#[utoipa::path(
    post,
    path = "/moderation/{id}/reject",
    request_body = RejectRequest,
    responses(
        (status = 200, description = "Rejected", body = ContentItem),
        (status = 403, description = "Denied", body = ErrorResponse),
        (status = 409, description = "Illegal transition", body = ErrorResponse),
        (status = 422, description = "Missing notes", body = ErrorResponse)
    )
)]
pub async fn reject_content(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<RejectRequest>,
) -> Result<Json<ContentItem>, AppError> {
    let item =
        moderation::reject(state.repo.as_ref(), id, user.principal(), request.notes).await?;
    Ok(Json(item))
}

/// get_report_stats
///
/// [Member Route] Platform counters for advisors and above.
#[utoipa::path(
    get,
    path = "/reports/stats",
    responses(
        (status = 200, description = "Stats", body = ModerationStats),
        (status = 403, description = "Denied", body = ErrorResponse)
    )
)]
pub async fn get_report_stats(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ModerationStats>, AppError> {
    require(user.principal(), Capability::ViewReports)?;
    Ok(Json(state.repo.get_stats().await?))
}

// --- Admin Area Handlers ---

/// archive_content
#[utoipa::path(
    post,
    path = "/admin/content/{id}/archive",
    responses(
        (status = 200, description = "Archived", body = ContentItem),
        (status = 409, description = "Illegal transition", body = ErrorResponse)
    )
)]
pub async fn archive_content(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ContentItem>, AppError> {
    Ok(Json(
        moderation::archive(state.repo.as_ref(), id, user.principal()).await?,
    ))
}

/// list_users
#[utoipa::path(
    get,
    path = "/admin/users",
    responses((status = 200, description = "Users", body = [UserProfile]))
)]
pub async fn list_users(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<UserProfile>>, AppError> {
    Ok(Json(
        users::list_users(state.repo.as_ref(), user.principal()).await?,
    ))
}

/// set_user_active
///
/// [Admin Route] Body is a bare JSON boolean.
#[utoipa::path(
    put,
    path = "/admin/users/{id}/active",
    request_body = bool,
    responses(
        (status = 200, description = "Updated", body = UserProfile),
        (status = 404, description = "No such user", body = ErrorResponse)
    )
)]
pub async fn set_user_active(
    user: AuthUser,
    State(state): State<AppState>,
    Path(target): Path<Uuid>,
    Json(is_active): Json<bool>,
) -> Result<Json<UserProfile>, AppError> {
    let updated =
        users::set_active(state.repo.as_ref(), target, is_active, user.principal()).await?;
    state.sessions.invalidate(target);
    Ok(Json(users::profile_of(&updated)))
}

// --- Super-admin Area Handlers ---

/// set_user_roles
///
/// [Super-admin Route] Replaces a user's role set. Takes effect on the target's next request.
#[utoipa::path(
    put,
    path = "/superadmin/users/{id}/roles",
    request_body = SetRolesRequest,
    responses(
        (status = 200, description = "Updated", body = UserProfile),
        (status = 404, description = "No such user", body = ErrorResponse),
        (status = 422, description = "Empty role set", body = ErrorResponse)
    )
)]
pub async fn set_user_roles(
    user: AuthUser,
    State(state): State<AppState>,
    Path(target): Path<Uuid>,
    Json(request): Json<SetRolesRequest>,
) -> Result<Json<UserProfile>, AppError> {
    let updated =
        users::set_roles(state.repo.as_ref(), target, &request.roles, user.principal()).await?;
    state.sessions.invalidate(target);
    Ok(Json(users::profile_of(&updated)))
}

/// delete_user
#[utoipa::path(
    delete,
    path = "/superadmin/users/{id}",
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "No such user", body = ErrorResponse)
    )
)]
pub async fn delete_user(
    user: AuthUser,
    State(state): State<AppState>,
    Path(target): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    users::delete_user(state.repo.as_ref(), target, user.principal()).await?;
    state.sessions.invalidate(target);
    Ok(StatusCode::NO_CONTENT)
}
