use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Admin Router Module
///
/// Nested under `/admin` and wrapped in the `admin_area` guard (`area.admin.enter`).
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // POST /admin/content/{id}/archive
        // Takes a published item down. Archived is terminal.
        .route("/content/{id}/archive", post(handlers::archive_content))
        // GET /admin/users
        .route("/users", get(handlers::list_users))
        // PUT /admin/users/{id}/active
        // Body is `true` or `false`.
        .route("/users/{id}/active", put(handlers::set_user_active))
}
