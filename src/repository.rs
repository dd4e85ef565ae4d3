use crate::{
    access::Principal,
    models::{ContentItem, ContentKind, ContentState, ModerationStats, User},
    moderation::TransitionFields,
    roles::{RoleSet, highest_role},
};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use sqlx::{PgPool, types::Json};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Result type for persistence calls.
pub type RepoResult<T> = Result<T, sqlx::Error>;

/// Repository Trait
///
/// The persistence contract consumed by the core. Handlers and services only ever see this
/// trait, so the Postgres store and the in-memory store are interchangeable.
///
/// **Send + Sync + async_trait** are required to share `Arc<dyn Repository>` across Axum tasks.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Principals ---
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>>;
    async fn create_user(&self, user: User) -> RepoResult<User>;
    async fn list_users(&self) -> RepoResult<Vec<User>>;
    // Writes `roles` and the derived legacy `role` column together.
    async fn update_roles(&self, id: Uuid, roles: &RoleSet) -> RepoResult<Option<User>>;
    async fn set_user_active(&self, id: Uuid, is_active: bool) -> RepoResult<Option<User>>;
    // Hard delete. Returns false when no row matched.
    async fn delete_user(&self, id: Uuid) -> RepoResult<bool>;

    /// load_principal
    ///
    /// Resolves the principal for an authorization check. Always reads current state.
    async fn load_principal(&self, id: Uuid) -> RepoResult<Option<Principal>> {
        Ok(self.get_user(id).await?.as_ref().map(Principal::from))
    }

    // --- Content ---
    async fn create_content_item(&self, item: ContentItem) -> RepoResult<ContentItem>;
    async fn load_content_item(&self, id: Uuid) -> RepoResult<Option<ContentItem>>;

    /// compare_and_set_state
    ///
    /// Moves an item to `new_state` only if it is still in `expected`. Returns `None` when the
    /// item is missing or its state changed since it was read.
    async fn compare_and_set_state(
        &self,
        id: Uuid,
        expected: ContentState,
        new_state: ContentState,
        fields: &TransitionFields,
    ) -> RepoResult<Option<ContentItem>>;

    /// pending_items
    ///
    /// Lazy stream of every `pending_review` item, oldest first. Nothing is read until polled.
    fn pending_items(&self) -> BoxStream<'_, RepoResult<ContentItem>>;

    // Public feed, newest first.
    async fn published_items(&self, kind: Option<ContentKind>) -> RepoResult<Vec<ContentItem>>;
    // Every item by one author in any state, newest first.
    async fn items_by_author(&self, author_id: Uuid) -> RepoResult<Vec<ContentItem>>;
    async fn get_stats(&self) -> RepoResult<ModerationStats>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The `Repository` implementation backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    /// get_user
    ///
    /// Profile lookup used by authentication and every principal resolution.
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        sqlx::query_as::<_, User>(
            "SELECT id, email, role, roles, is_active, created_at FROM profiles WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// create_user
    ///
    /// Creates the mirroring profile record after the identity provider accepted the sign-up.
    async fn create_user(&self, user: User) -> RepoResult<User> {
        sqlx::query_as::<_, User>(
            r#"INSERT INTO profiles (id, email, role, roles, is_active, created_at)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING id, email, role, roles, is_active, created_at"#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.role)
        .bind(&user.roles)
        .bind(user.is_active)
        .bind(user.created_at)
        .fetch_one(&self.pool)
        .await
    }

    async fn list_users(&self) -> RepoResult<Vec<User>> {
        sqlx::query_as::<_, User>(
            "SELECT id, email, role, roles, is_active, created_at FROM profiles ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await
    }

    /// update_roles
    ///
    /// Replaces the role set. The legacy `role` column follows the highest role so older
    /// screens keep showing a sensible badge.
    async fn update_roles(&self, id: Uuid, roles: &RoleSet) -> RepoResult<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"UPDATE profiles SET roles = $2, role = $3 WHERE id = $1
               RETURNING id, email, role, roles, is_active, created_at"#,
        )
        .bind(id)
        .bind(roles.names())
        .bind(highest_role(roles).as_str())
        .fetch_optional(&self.pool)
        .await
    }

    async fn set_user_active(&self, id: Uuid, is_active: bool) -> RepoResult<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"UPDATE profiles SET is_active = $2 WHERE id = $1
               RETURNING id, email, role, roles, is_active, created_at"#,
        )
        .bind(id)
        .bind(is_active)
        .fetch_optional(&self.pool)
        .await
    }

    /// delete_user
    ///
    /// Authored content goes with the profile (`ON DELETE CASCADE`); review stamps referring to
    /// the user are cleared (`ON DELETE SET NULL`).
    async fn delete_user(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM profiles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_content_item(&self, item: ContentItem) -> RepoResult<ContentItem> {
        sqlx::query_as::<_, ContentItem>(
            r#"INSERT INTO content_items
                 (id, kind, author_id, payload, state, review_notes, reviewer_id, reviewed_at, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
               RETURNING id, kind, author_id, payload, state, review_notes, reviewer_id, reviewed_at, created_at, updated_at"#,
        )
        .bind(item.id)
        .bind(item.kind)
        .bind(item.author_id)
        .bind(Json(&item.payload))
        .bind(item.state)
        .bind(&item.review_notes)
        .bind(item.reviewer_id)
        .bind(item.reviewed_at)
        .bind(item.created_at)
        .bind(item.updated_at)
        .fetch_one(&self.pool)
        .await
    }

    async fn load_content_item(&self, id: Uuid) -> RepoResult<Option<ContentItem>> {
        sqlx::query_as::<_, ContentItem>(
            r#"SELECT id, kind, author_id, payload, state, review_notes, reviewer_id, reviewed_at, created_at, updated_at
               FROM content_items WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// compare_and_set_state
    ///
    /// A single conditional UPDATE: the `state = $2` predicate is the compare, so two reviewers
    /// racing on the same item cannot both match.
    async fn compare_and_set_state(
        &self,
        id: Uuid,
        expected: ContentState,
        new_state: ContentState,
        fields: &TransitionFields,
    ) -> RepoResult<Option<ContentItem>> {
        let review = fields.review.as_ref();
        sqlx::query_as::<_, ContentItem>(
            r#"UPDATE content_items
               SET state = $3,
                   review_notes = CASE WHEN $4 THEN $5 ELSE review_notes END,
                   reviewer_id = CASE WHEN $4 THEN $6 ELSE reviewer_id END,
                   reviewed_at = CASE WHEN $4 THEN $7 ELSE reviewed_at END,
                   updated_at = $8
               WHERE id = $1 AND state = $2
               RETURNING id, kind, author_id, payload, state, review_notes, reviewer_id, reviewed_at, created_at, updated_at"#,
        )
        .bind(id)
        .bind(expected)
        .bind(new_state)
        .bind(review.is_some())
        .bind(review.and_then(|r| r.notes.clone()))
        .bind(review.map(|r| r.reviewer_id))
        .bind(review.map(|r| r.reviewed_at))
        .bind(fields.at)
        .fetch_optional(&self.pool)
        .await
    }

    /// pending_items
    ///
    /// Streams rows straight from the cursor; callers that stop early never pull the rest.
    fn pending_items(&self) -> BoxStream<'_, RepoResult<ContentItem>> {
        sqlx::query_as::<_, ContentItem>(
            r#"SELECT id, kind, author_id, payload, state, review_notes, reviewer_id, reviewed_at, created_at, updated_at
               FROM content_items
               WHERE state = 'pending_review'
               ORDER BY created_at ASC, id ASC"#,
        )
        .fetch(&self.pool)
    }

    async fn published_items(&self, kind: Option<ContentKind>) -> RepoResult<Vec<ContentItem>> {
        sqlx::query_as::<_, ContentItem>(
            r#"SELECT id, kind, author_id, payload, state, review_notes, reviewer_id, reviewed_at, created_at, updated_at
               FROM content_items
               WHERE state = 'published' AND ($1::content_kind IS NULL OR kind = $1)
               ORDER BY created_at DESC"#,
        )
        .bind(kind)
        .fetch_all(&self.pool)
        .await
    }

    async fn items_by_author(&self, author_id: Uuid) -> RepoResult<Vec<ContentItem>> {
        sqlx::query_as::<_, ContentItem>(
            r#"SELECT id, kind, author_id, payload, state, review_notes, reviewer_id, reviewed_at, created_at, updated_at
               FROM content_items WHERE author_id = $1
               ORDER BY created_at DESC"#,
        )
        .bind(author_id)
        .fetch_all(&self.pool)
        .await
    }

    /// get_stats
    ///
    /// Compiles the dashboard counters in a single round trip.
    async fn get_stats(&self) -> RepoResult<ModerationStats> {
        sqlx::query_as::<_, ModerationStats>(
            r#"SELECT
                 (SELECT COUNT(*) FROM profiles) AS total_users,
                 (SELECT COUNT(*) FROM profiles WHERE is_active) AS active_users,
                 COUNT(*) FILTER (WHERE state = 'draft') AS drafts,
                 COUNT(*) FILTER (WHERE state = 'pending_review') AS pending_reviews,
                 COUNT(*) FILTER (WHERE state = 'published') AS published,
                 COUNT(*) FILTER (WHERE state = 'rejected') AS rejected,
                 COUNT(*) FILTER (WHERE state = 'archived') AS archived
               FROM content_items"#,
        )
        .fetch_one(&self.pool)
        .await
    }
}

// --- In-Memory Implementation (tests and local experiments) ---

#[derive(Default)]
struct MemoryStore {
    users: HashMap<Uuid, User>,
    items: HashMap<Uuid, ContentItem>,
}

/// InMemoryRepository
///
/// A `Repository` held in process memory. The compare-and-set runs under a single write lock, so
/// it gives the same one-winner guarantee as the conditional UPDATE in Postgres.
#[derive(Default, Clone)]
pub struct InMemoryRepository {
    store: Arc<RwLock<MemoryStore>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(items: &mut [ContentItem]) {
    items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        Ok(self.store.read().await.users.get(&id).cloned())
    }

    async fn create_user(&self, user: User) -> RepoResult<User> {
        let mut store = self.store.write().await;
        store.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn list_users(&self) -> RepoResult<Vec<User>> {
        let mut users: Vec<User> = self.store.read().await.users.values().cloned().collect();
        users.sort_by_key(|user| (user.created_at, user.id));
        Ok(users)
    }

    async fn update_roles(&self, id: Uuid, roles: &RoleSet) -> RepoResult<Option<User>> {
        let mut store = self.store.write().await;
        Ok(store.users.get_mut(&id).map(|user| {
            user.roles = roles.names();
            user.role = Some(highest_role(roles).as_str().to_string());
            user.clone()
        }))
    }

    async fn set_user_active(&self, id: Uuid, is_active: bool) -> RepoResult<Option<User>> {
        let mut store = self.store.write().await;
        Ok(store.users.get_mut(&id).map(|user| {
            user.is_active = is_active;
            user.clone()
        }))
    }

    async fn delete_user(&self, id: Uuid) -> RepoResult<bool> {
        let mut store = self.store.write().await;
        let removed = store.users.remove(&id).is_some();
        if removed {
            store.items.retain(|_, item| item.author_id != id);
            for item in store.items.values_mut() {
                if item.reviewer_id == Some(id) {
                    item.reviewer_id = None;
                }
            }
        }
        Ok(removed)
    }

    async fn create_content_item(&self, item: ContentItem) -> RepoResult<ContentItem> {
        let mut store = self.store.write().await;
        store.items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn load_content_item(&self, id: Uuid) -> RepoResult<Option<ContentItem>> {
        Ok(self.store.read().await.items.get(&id).cloned())
    }

    async fn compare_and_set_state(
        &self,
        id: Uuid,
        expected: ContentState,
        new_state: ContentState,
        fields: &TransitionFields,
    ) -> RepoResult<Option<ContentItem>> {
        let mut store = self.store.write().await;
        let Some(item) = store.items.get_mut(&id) else {
            return Ok(None);
        };
        if item.state != expected {
            return Ok(None);
        }
        item.state = new_state;
        if let Some(review) = &fields.review {
            item.review_notes = review.notes.clone();
            item.reviewer_id = Some(review.reviewer_id);
            item.reviewed_at = Some(review.reviewed_at);
        }
        item.updated_at = fields.at;
        Ok(Some(item.clone()))
    }

    fn pending_items(&self) -> BoxStream<'_, RepoResult<ContentItem>> {
        stream::once(async move {
            let store = self.store.read().await;
            let mut pending: Vec<ContentItem> = store
                .items
                .values()
                .filter(|item| item.state == ContentState::PendingReview)
                .cloned()
                .collect();
            pending.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
            stream::iter(pending.into_iter().map(Ok))
        })
        .flatten()
        .boxed()
    }

    async fn published_items(&self, kind: Option<ContentKind>) -> RepoResult<Vec<ContentItem>> {
        let mut items: Vec<ContentItem> = self
            .store
            .read()
            .await
            .items
            .values()
            .filter(|item| item.state == ContentState::Published)
            .filter(|item| kind.is_none_or(|k| item.kind == k))
            .cloned()
            .collect();
        newest_first(&mut items);
        Ok(items)
    }

    async fn items_by_author(&self, author_id: Uuid) -> RepoResult<Vec<ContentItem>> {
        let mut items: Vec<ContentItem> = self
            .store
            .read()
            .await
            .items
            .values()
            .filter(|item| item.author_id == author_id)
            .cloned()
            .collect();
        newest_first(&mut items);
        Ok(items)
    }

    async fn get_stats(&self) -> RepoResult<ModerationStats> {
        let store = self.store.read().await;
        let count = |state: ContentState| {
            store.items.values().filter(|item| item.state == state).count() as i64
        };
        Ok(ModerationStats {
            total_users: store.users.len() as i64,
            active_users: store.users.values().filter(|u| u.is_active).count() as i64,
            drafts: count(ContentState::Draft),
            pending_reviews: count(ContentState::PendingReview),
            published: count(ContentState::Published),
            rejected: count(ContentState::Rejected),
            archived: count(ContentState::Archived),
        })
    }
}
