use axum::{Router, extract::FromRef, http::HeaderName, middleware};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Domain core: roles, decisions, the moderation lifecycle.
pub mod access;
pub mod error;
pub mod moderation;
pub mod queue;
pub mod roles;
pub mod users;

// Services and web plumbing.
pub mod auth;
pub mod config;
pub mod guard;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod session;

// Routers segregated by area (public, member, admin, super-admin).
pub mod routes;
use routes::{admin, authenticated, public, superadmin};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use session::{SessionCache, SessionState};

/// ApiDoc
///
/// OpenAPI document for every handler and schema, served at `/api-docs/openapi.json` and browsable
/// through Swagger UI.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::register_user, handlers::list_published, handlers::get_published,
        handlers::get_me, handlers::logout, handlers::check_capability, handlers::get_my_content,
        handlers::create_content, handlers::preview_content, handlers::submit_content,
        handlers::resubmit_content, handlers::get_moderation_queue, handlers::approve_content,
        handlers::reject_content, handlers::get_report_stats, handlers::archive_content,
        handlers::list_users, handlers::set_user_active, handlers::set_user_roles,
        handlers::delete_user
    ),
    components(
        schemas(
            models::User, models::ContentKind, models::ContentState, models::ContentPayload,
            models::ContentItem, models::CreateContentRequest, models::ApproveRequest,
            models::RejectRequest, models::SetRolesRequest, models::RegisterUserRequest,
            models::UserProfile, models::CapabilityCheck, models::ModerationStats,
            roles::Role, roles::Capability, access::DenyReason, error::ErrorResponse,
            guard::GuardRejection,
        )
    ),
    tags(
        (name = "advocacy-portal", description = "Advocacy Portal API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single shared container handed to every request. Handlers and extractors pull only the
/// parts they need through `FromRef`.
#[derive(Clone)]
pub struct AppState {
    /// Persistence behind the `Repository` trait (Postgres in production, in-memory in tests).
    pub repo: RepositoryState,
    /// Short-lived principal cache used by the `AuthUser` extractor.
    pub sessions: SessionState,
    /// The loaded, immutable configuration.
    pub config: AppConfig,
}

impl AppState {
    pub fn new(repo: RepositoryState, config: AppConfig) -> Self {
        let sessions = SessionState::new(SessionCache::new(config.session_ttl));
        Self {
            repo,
            sessions,
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for SessionState {
    fn from_ref(app_state: &AppState) -> SessionState {
        app_state.sessions.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles every router, puts each protected area behind its guard, and wraps the whole thing
/// in the request-id, tracing and CORS layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        // Guards run as route layers so unmatched paths still 404 instead of 401.
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                guard::member_area,
            )),
        )
        .nest(
            "/admin",
            admin::admin_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                guard::admin_area,
            )),
        )
        .nest(
            "/superadmin",
            superadmin::superadmin_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                guard::superadmin_area,
            )),
        )
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Builds the `http_request` span for `TraceLayer`, carrying the `x-request-id` so every log line
/// of one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
