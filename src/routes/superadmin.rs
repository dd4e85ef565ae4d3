use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, put},
};

/// Super-admin Router Module
///
/// Nested under `/superadmin` and wrapped in the `superadmin_area` guard. Role assignment and
/// hard deletion live here.
pub fn superadmin_routes() -> Router<AppState> {
    Router::new()
        .route("/users/{id}/roles", put(handlers::set_user_roles))
        .route("/users/{id}", delete(handlers::delete_user))
}
