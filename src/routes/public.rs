use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints open to anonymous visitors. Content reads here only ever return `published` items;
/// the visibility rules for anything else live behind the member guard.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for the load balancer.
        .route("/health", get(|| async { "ok" }))
        // POST /register
        // Sign-up through the identity provider. New profiles always start as `{member}`.
        .route("/register", post(handlers::register_user))
        // GET /content?kind=...
        .route("/content", get(handlers::list_published))
        // GET /content/{id}
        .route("/content/{id}", get(handlers::get_published))
}
