use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Member Area Router Module
///
/// Everything behind a login. The whole router is wrapped in the `member_area` guard, so each
/// handler receives an active principal holding `area.member.enter`. Finer capabilities
/// (`content.approve`, `moderation.queue.view`, `reports.view`) are checked inside the handlers.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- Profile ---
        .route("/me", get(handlers::get_me))
        .route("/me/capabilities/{name}", get(handlers::check_capability))
        .route("/me/content", get(handlers::get_my_content))
        .route("/logout", post(handlers::logout))
        // --- Authoring ---
        // POST /content
        // Creates a draft, or submits immediately with `submit: true`.
        .route("/content", post(handlers::create_content))
        // GET /content/{id}/preview
        // Lets authors see their own unpublished work and reviewers see what they review.
        .route("/content/{id}/preview", get(handlers::preview_content))
        .route("/content/{id}/submit", post(handlers::submit_content))
        .route("/content/{id}/resubmit", post(handlers::resubmit_content))
        // --- Review ---
        .route("/moderation/queue", get(handlers::get_moderation_queue))
        .route("/moderation/{id}/approve", post(handlers::approve_content))
        .route("/moderation/{id}/reject", post(handlers::reject_content))
        // --- Reports ---
        .route("/reports/stats", get(handlers::get_report_stats))
}
