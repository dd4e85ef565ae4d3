//! Round trips against a live Postgres. Run with `DATABASE_URL` set and `cargo test -- --ignored`.

use advocacy_portal::{
    models::{ContentItem, ContentKind, ContentPayload, ContentState, User},
    moderation::{ReviewStamp, TransitionFields},
    repository::{PostgresRepository, Repository},
    roles::{Role, RoleSet},
};
use chrono::{Duration, Utc};
use futures::TryStreamExt;
use sqlx::PgPool;
use tokio::test;
use uuid::Uuid;

// --- Test Context and Setup ---

/// A simple structure to hold the database pool for testing
struct DbTestContext {
    pool: PgPool,
}

impl DbTestContext {
    async fn setup() -> Self {
        dotenv::dotenv().ok();

        let db_url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set to run integration tests");

        let pool = PgPool::connect(&db_url)
            .await
            .expect("Failed to connect to database for integration tests.");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run database migrations.");

        DbTestContext { pool }
    }

    fn repository(&self) -> PostgresRepository {
        PostgresRepository::new(self.pool.clone())
    }
}

// --- Test Data Helpers ---

async fn create_test_user(repo: &PostgresRepository, roles: &[Role]) -> User {
    let mut user = User::new_member(Uuid::new_v4(), format!("{}@test.com", Uuid::new_v4()));
    user.roles = RoleSet::new(roles.iter().copied()).names();
    repo.create_user(user).await.expect("Failed to create test user")
}

async fn create_test_item(
    repo: &PostgresRepository,
    author: Uuid,
    state: ContentState,
    minutes_ago: i64,
) -> ContentItem {
    let payload = ContentPayload::Resource {
        title: "Youth helpline".to_string(),
        url: "https://example.org/helpline".to_string(),
        summary: Some("Free and confidential".to_string()),
    };
    let mut item = ContentItem::new(author, payload, state);
    item.created_at = Utc::now() - Duration::minutes(minutes_ago);
    item.updated_at = item.created_at;
    repo.create_content_item(item)
        .await
        .expect("Failed to create test item")
}

// --- Tests ---

#[test]
#[ignore = "requires DATABASE_URL"]
async fn test_content_round_trip_keeps_payload() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let author = create_test_user(&repo, &[Role::Member]).await;

    let created = create_test_item(&repo, author.id, ContentState::Draft, 0).await;
    let fetched = repo.load_content_item(created.id).await.unwrap().unwrap();

    assert_eq!(fetched.kind, ContentKind::Resource);
    assert_eq!(fetched.payload, created.payload);
    assert_eq!(fetched.state, ContentState::Draft);
}

#[test]
#[ignore = "requires DATABASE_URL"]
async fn test_compare_and_set_has_one_winner() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let author = create_test_user(&repo, &[Role::Member]).await;
    let reviewer = create_test_user(&repo, &[Role::Moderator]).await;
    let item = create_test_item(&repo, author.id, ContentState::PendingReview, 0).await;

    let now = Utc::now();
    let fields = TransitionFields {
        review: Some(ReviewStamp {
            reviewer_id: reviewer.id,
            notes: Some("great".to_string()),
            reviewed_at: now,
        }),
        at: now,
    };

    let (first, second) = tokio::join!(
        repo.compare_and_set_state(
            item.id,
            ContentState::PendingReview,
            ContentState::Published,
            &fields
        ),
        repo.compare_and_set_state(
            item.id,
            ContentState::PendingReview,
            ContentState::Rejected,
            &fields
        ),
    );
    let winners = [first.unwrap(), second.unwrap()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>();

    assert_eq!(winners.len(), 1);
    assert_eq!(winners[0].reviewer_id, Some(reviewer.id));
    assert_eq!(winners[0].review_notes.as_deref(), Some("great"));
}

#[test]
#[ignore = "requires DATABASE_URL"]
async fn test_pending_stream_is_oldest_first() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let author = create_test_user(&repo, &[Role::Member]).await;

    let newer = create_test_item(&repo, author.id, ContentState::PendingReview, 1).await;
    let older = create_test_item(&repo, author.id, ContentState::PendingReview, 90).await;
    create_test_item(&repo, author.id, ContentState::Published, 120).await;

    let ours: Vec<Uuid> = repo
        .pending_items()
        .try_filter(|item| futures::future::ready(item.author_id == author.id))
        .map_ok(|item| item.id)
        .try_collect()
        .await
        .unwrap();

    assert_eq!(ours, vec![older.id, newer.id]);
}

#[test]
#[ignore = "requires DATABASE_URL"]
async fn test_update_roles_rewrites_legacy_column() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let user = create_test_user(&repo, &[Role::Member]).await;

    let updated = repo
        .update_roles(user.id, &RoleSet::new([Role::Member, Role::Admin]))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(updated.role.as_deref(), Some("admin"));
    assert_eq!(updated.role_set(), RoleSet::new([Role::Member, Role::Admin]));
    assert!(
        repo.update_roles(Uuid::new_v4(), &RoleSet::member())
            .await
            .unwrap()
            .is_none()
    );
}

#[test]
#[ignore = "requires DATABASE_URL"]
async fn test_legacy_row_without_role_set_reads_as_its_role() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let id = Uuid::new_v4();

    sqlx::query("INSERT INTO profiles (id, email, role) VALUES ($1, $2, 'moderator')")
        .bind(id)
        .bind(format!("{id}@legacy.test"))
        .execute(&ctx.pool)
        .await
        .unwrap();

    let principal = repo.load_principal(id).await.unwrap().unwrap();
    assert_eq!(principal.roles, RoleSet::new([Role::Moderator]));
    assert!(principal.is_active);
}

#[test]
#[ignore = "requires DATABASE_URL"]
async fn test_delete_user_cascades_content_and_clears_review_stamps() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let author = create_test_user(&repo, &[Role::Member]).await;
    let reviewer = create_test_user(&repo, &[Role::Moderator]).await;
    let other_author = create_test_user(&repo, &[Role::Member]).await;

    let authored = create_test_item(&repo, author.id, ContentState::Draft, 0).await;
    let reviewed = create_test_item(&repo, other_author.id, ContentState::PendingReview, 0).await;
    let now = Utc::now();
    repo.compare_and_set_state(
        reviewed.id,
        ContentState::PendingReview,
        ContentState::Published,
        &TransitionFields {
            review: Some(ReviewStamp {
                reviewer_id: reviewer.id,
                notes: None,
                reviewed_at: now,
            }),
            at: now,
        },
    )
    .await
    .unwrap();

    assert!(repo.delete_user(author.id).await.unwrap());
    assert!(repo.load_content_item(authored.id).await.unwrap().is_none());

    assert!(repo.delete_user(reviewer.id).await.unwrap());
    let kept = repo.load_content_item(reviewed.id).await.unwrap().unwrap();
    assert_eq!(kept.state, ContentState::Published);
    assert_eq!(kept.reviewer_id, None);

    assert!(!repo.delete_user(reviewer.id).await.unwrap());
}

#[test]
#[ignore = "requires DATABASE_URL"]
async fn test_set_user_active_and_stats() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let user = create_test_user(&repo, &[Role::Member]).await;

    let updated = repo.set_user_active(user.id, false).await.unwrap().unwrap();
    assert!(!updated.is_active);
    assert!(!repo.get_user(user.id).await.unwrap().unwrap().is_active);

    let stats = repo.get_stats().await.unwrap();
    assert!(stats.total_users >= 1);
    assert!(stats.active_users < stats.total_users);
}
