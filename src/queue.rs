//! Moderation queue: every item awaiting review, across all content kinds.
//!
//! Nothing is cached. Each call asks the repository again, so a decision made through the state
//! machine is reflected by the very next listing.

use futures::stream::{BoxStream, StreamExt, TryStreamExt};

use crate::{
    access::{Principal, require},
    error::AppResult,
    models::{ContentItem, ContentKind},
    repository::{RepoResult, Repository},
    roles::Capability,
};

/// list_pending
///
/// Lazy stream of `pending_review` items, oldest first. Read-only and restartable: calling it
/// again starts a fresh read from current persisted state.
pub fn list_pending(repo: &dyn Repository) -> BoxStream<'_, RepoResult<ContentItem>> {
    repo.pending_items()
}

/// pending_for_reviewer
///
/// The queue screen: requires `moderation.queue.view`, optionally narrowed to one kind.
pub async fn pending_for_reviewer(
    repo: &dyn Repository,
    viewer: &Principal,
    kind: Option<ContentKind>,
) -> AppResult<Vec<ContentItem>> {
    require(viewer, Capability::ViewModerationQueue)?;

    let items: Vec<ContentItem> = list_pending(repo)
        .try_filter(|item| futures::future::ready(kind.is_none_or(|k| item.kind == k)))
        .try_collect()
        .await?;
    Ok(items)
}

/// oldest_pending
///
/// Head of the queue. Only the first row is pulled from the stream.
pub async fn oldest_pending(repo: &dyn Repository) -> RepoResult<Option<ContentItem>> {
    list_pending(repo).next().await.transpose()
}
