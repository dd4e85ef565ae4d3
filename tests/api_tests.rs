use advocacy_portal::{
    AppConfig, AppState, InMemoryRepository, create_router,
    models::{ContentItem, ContentState, User, UserProfile},
    repository::Repository,
    roles::{Role, RoleSet},
};
use axum::{Json, Router, http::StatusCode, routing::post};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;
use uuid::Uuid;

pub struct TestApp {
    pub address: String,
    pub repo: InMemoryRepository,
}

async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    format!("http://127.0.0.1:{}", port)
}

async fn spawn_app(config: AppConfig) -> TestApp {
    let repo = InMemoryRepository::new();
    let state = AppState::new(Arc::new(repo.clone()), config);
    let address = serve(create_router(state)).await;
    TestApp { address, repo }
}

/// A stand-in for the identity provider's sign-up endpoint. Every sign-up succeeds except for
/// `taken@club.org`.
async fn spawn_identity_provider() -> String {
    let router = Router::new().route(
        "/auth/v1/signup",
        post(|Json(body): Json<Value>| async move {
            if body["email"] == "taken@club.org" {
                return (StatusCode::BAD_REQUEST, Json(json!({ "msg": "already registered" })));
            }
            (StatusCode::OK, Json(json!({ "id": Uuid::new_v4() })))
        }),
    );
    serve(router).await
}

async fn seed(app: &TestApp, roles: &[Role]) -> Uuid {
    let mut user = User::new_member(Uuid::new_v4(), format!("{}@test.com", Uuid::new_v4()));
    user.roles = RoleSet::new(roles.iter().copied()).names();
    app.repo.create_user(user).await.unwrap().id
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app(AppConfig::default()).await;
    let response = reqwest::Client::new()
        .get(format!("{}/health", app.address))
        .send()
        .await
        .expect("req fail");
    assert!(response.status().is_success());
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = spawn_app(AppConfig::default()).await;
    let doc: Value = reqwest::get(format!("{}/api-docs/openapi.json", app.address))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(doc["paths"]["/moderation/{id}/approve"].is_object());
    assert!(doc["paths"]["/superadmin/users/{id}/roles"].is_object());
}

#[tokio::test]
async fn test_member_to_moderator_scenario_over_http() {
    let app = spawn_app(AppConfig::default()).await;
    let client = reqwest::Client::new();
    let author = seed(&app, &[Role::Member]).await;
    let hopeful = seed(&app, &[Role::Member]).await;
    let root = seed(&app, &[Role::Superadmin]).await;

    // Author submits a story straight into review.
    let response = client
        .post(format!("{}/content", app.address))
        .header("x-user-id", author.to_string())
        .json(&json!({
            "payload": { "kind": "story", "title": "My first rally", "body": "Loud and proud." },
            "submit": true
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let item: ContentItem = response.json().await.unwrap();
    assert_eq!(item.state, ContentState::PendingReview);

    // Not public yet.
    let response = client
        .get(format!("{}/content/{}", app.address, item.id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    // A plain member cannot approve.
    let response = client
        .post(format!("{}/moderation/{}/approve", app.address, item.id))
        .header("x-user-id", hopeful.to_string())
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "insufficient_role");

    // Superadmin grants moderator.
    let response = client
        .put(format!("{}/superadmin/users/{}/roles", app.address, hopeful))
        .header("x-user-id", root.to_string())
        .json(&json!({ "roles": ["member", "moderator"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let profile: UserProfile = response.json().await.unwrap();
    assert_eq!(profile.highest_role, Role::Moderator);

    // The retry succeeds.
    let response = client
        .post(format!("{}/moderation/{}/approve", app.address, item.id))
        .header("x-user-id", hopeful.to_string())
        .json(&json!({ "notes": "Lovely" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let published: ContentItem = response.json().await.unwrap();
    assert_eq!(published.state, ContentState::Published);
    assert_eq!(published.reviewer_id, Some(hopeful));

    // And the public feed now carries it.
    let feed: Vec<ContentItem> = client
        .get(format!("{}/content?kind=story", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].id, item.id);

    // A second decision on the same item is an illegal transition.
    let response = client
        .post(format!("{}/moderation/{}/reject", app.address, item.id))
        .header("x-user-id", hopeful.to_string())
        .json(&json!({ "notes": "changed my mind" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);
}

#[tokio::test]
async fn test_reject_without_notes_is_unprocessable() {
    let app = spawn_app(AppConfig::default()).await;
    let client = reqwest::Client::new();
    let author = seed(&app, &[Role::Member]).await;
    let moderator = seed(&app, &[Role::Moderator]).await;

    let item: ContentItem = client
        .post(format!("{}/content", app.address))
        .header("x-user-id", author.to_string())
        .json(&json!({
            "payload": { "kind": "gallery", "caption": "March", "media_key": "g/1.jpg" },
            "submit": true
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let response = client
        .post(format!("{}/moderation/{}/reject", app.address, item.id))
        .header("x-user-id", moderator.to_string())
        .json(&json!({ "notes": "  " }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 422);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "missing_required_notes");
}

#[tokio::test]
async fn test_register_creates_member_profile() {
    let idp = spawn_identity_provider().await;
    let config = AppConfig {
        supabase_url: Some(idp),
        supabase_key: Some("anon-key".to_string()),
        ..AppConfig::default()
    };
    let app = spawn_app(config).await;
    let client = reqwest::Client::new();

    // A client-supplied role is ignored.
    let response = client
        .post(format!("{}/register", app.address))
        .json(&json!({ "email": "new@club.org", "password": "pw-123456", "role": "superadmin" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let profile: UserProfile = response.json().await.unwrap();
    assert_eq!(profile.roles, vec![Role::Member]);

    let stored = app.repo.get_user(profile.id).await.unwrap().unwrap();
    assert_eq!(stored.email, "new@club.org");

    let response = client
        .post(format!("{}/register", app.address))
        .json(&json!({ "email": "taken@club.org", "password": "pw-123456" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 422);
}

#[tokio::test]
async fn test_register_without_identity_provider_is_bad_gateway() {
    let app = spawn_app(AppConfig::default()).await;
    let response = reqwest::Client::new()
        .post(format!("{}/register", app.address))
        .json(&json!({ "email": "new@club.org", "password": "pw-123456" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 502);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "identity_provider");
}
