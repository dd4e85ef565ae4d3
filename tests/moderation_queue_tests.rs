use advocacy_portal::{
    AppError, InMemoryRepository,
    access::Principal,
    models::{ContentItem, ContentKind, ContentPayload, ContentState, User},
    moderation,
    queue::{list_pending, oldest_pending, pending_for_reviewer},
    repository::Repository,
    roles::{Role, RoleSet},
};
use chrono::{Duration, Utc};
use futures::TryStreamExt;
use uuid::Uuid;

async fn seed(repo: &InMemoryRepository, roles: &[Role]) -> Principal {
    let mut user = User::new_member(Uuid::new_v4(), format!("{}@test.com", Uuid::new_v4()));
    user.roles = RoleSet::new(roles.iter().copied()).names();
    Principal::from(&repo.create_user(user).await.unwrap())
}

fn payload(kind: ContentKind, label: &str) -> ContentPayload {
    match kind {
        ContentKind::Story => ContentPayload::Story {
            title: label.to_string(),
            body: "body".to_string(),
        },
        ContentKind::Gallery => ContentPayload::Gallery {
            caption: label.to_string(),
            media_key: format!("gallery/{label}.jpg"),
        },
        ContentKind::Resource => ContentPayload::Resource {
            title: label.to_string(),
            url: "https://example.org/help".to_string(),
            summary: None,
        },
    }
}

/// Stores a pending item whose `created_at` is `minutes_ago` in the past.
async fn pending_item(
    repo: &InMemoryRepository,
    author: Uuid,
    kind: ContentKind,
    label: &str,
    minutes_ago: i64,
) -> ContentItem {
    let mut item = ContentItem::new(author, payload(kind, label), ContentState::PendingReview);
    item.created_at = Utc::now() - Duration::minutes(minutes_ago);
    item.updated_at = item.created_at;
    repo.create_content_item(item).await.unwrap()
}

async fn pending_ids(repo: &InMemoryRepository) -> Vec<Uuid> {
    list_pending(repo)
        .map_ok(|item| item.id)
        .try_collect()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_queue_is_oldest_first_across_kinds() {
    let repo = InMemoryRepository::new();
    let author = seed(&repo, &[Role::Member]).await;

    let newest = pending_item(&repo, author.id, ContentKind::Story, "newest", 1).await;
    let oldest = pending_item(&repo, author.id, ContentKind::Gallery, "oldest", 30).await;
    let middle = pending_item(&repo, author.id, ContentKind::Resource, "middle", 10).await;

    assert_eq!(
        pending_ids(&repo).await,
        vec![oldest.id, middle.id, newest.id]
    );
}

#[tokio::test]
async fn test_queue_only_lists_pending_review() {
    let repo = InMemoryRepository::new();
    let author = seed(&repo, &[Role::Member]).await;

    let pending = pending_item(&repo, author.id, ContentKind::Story, "pending", 5).await;
    for state in [
        ContentState::Draft,
        ContentState::Published,
        ContentState::Rejected,
        ContentState::Archived,
    ] {
        repo.create_content_item(ContentItem::new(
            author.id,
            payload(ContentKind::Story, "other"),
            state,
        ))
        .await
        .unwrap();
    }

    assert_eq!(pending_ids(&repo).await, vec![pending.id]);
}

#[tokio::test]
async fn test_queue_reflects_decisions_immediately_and_is_restartable() {
    let repo = InMemoryRepository::new();
    let author = seed(&repo, &[Role::Member]).await;
    let moderator = seed(&repo, &[Role::Moderator]).await;

    let first = pending_item(&repo, author.id, ContentKind::Story, "first", 20).await;
    let second = pending_item(&repo, author.id, ContentKind::Story, "second", 10).await;

    // Listing twice without a decision in between yields the same sequence.
    assert_eq!(pending_ids(&repo).await, pending_ids(&repo).await);

    moderation::approve(&repo, first.id, &moderator, None)
        .await
        .unwrap();
    assert_eq!(pending_ids(&repo).await, vec![second.id]);

    moderation::reject(&repo, second.id, &moderator, "too short".to_string())
        .await
        .unwrap();
    assert!(pending_ids(&repo).await.is_empty());

    moderation::resubmit(&repo, second.id, &author).await.unwrap();
    assert_eq!(pending_ids(&repo).await, vec![second.id]);
}

#[tokio::test]
async fn test_oldest_pending_is_the_head_of_the_queue() {
    let repo = InMemoryRepository::new();
    let author = seed(&repo, &[Role::Member]).await;
    assert!(oldest_pending(&repo).await.unwrap().is_none());

    pending_item(&repo, author.id, ContentKind::Story, "later", 2).await;
    let head = pending_item(&repo, author.id, ContentKind::Gallery, "head", 60).await;

    assert_eq!(oldest_pending(&repo).await.unwrap().map(|i| i.id), Some(head.id));
}

#[tokio::test]
async fn test_reviewer_queue_requires_queue_capability_and_filters_by_kind() {
    let repo = InMemoryRepository::new();
    let author = seed(&repo, &[Role::Member]).await;
    let moderator = seed(&repo, &[Role::Moderator]).await;
    let advisor = seed(&repo, &[Role::Advisor]).await;

    let story = pending_item(&repo, author.id, ContentKind::Story, "story", 3).await;
    let gallery = pending_item(&repo, author.id, ContentKind::Gallery, "gallery", 2).await;

    let all = pending_for_reviewer(&repo, &moderator, None).await.unwrap();
    assert_eq!(
        all.iter().map(|i| i.id).collect::<Vec<_>>(),
        vec![story.id, gallery.id]
    );

    let galleries = pending_for_reviewer(&repo, &moderator, Some(ContentKind::Gallery))
        .await
        .unwrap();
    assert_eq!(galleries.len(), 1);
    assert_eq!(galleries[0].id, gallery.id);

    let err = pending_for_reviewer(&repo, &advisor, None).await.unwrap_err();
    assert!(matches!(err, AppError::InsufficientRole));

    let err = pending_for_reviewer(&repo, &author, None).await.unwrap_err();
    assert!(matches!(err, AppError::InsufficientRole));
}

#[tokio::test]
async fn test_listing_does_not_mutate_state() {
    let repo = InMemoryRepository::new();
    let author = seed(&repo, &[Role::Member]).await;
    let item = pending_item(&repo, author.id, ContentKind::Resource, "r", 1).await;

    let _ = pending_ids(&repo).await;
    let _ = oldest_pending(&repo).await.unwrap();

    let stored = repo.load_content_item(item.id).await.unwrap().unwrap();
    assert_eq!(stored, item);
}
