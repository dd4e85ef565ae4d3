//! Content moderation lifecycle shared by stories, gallery entries and resources.
//!
//! | From           | Event    | To             | Requires                           |
//! |----------------|----------|----------------|------------------------------------|
//! | draft          | submit   | pending_review | author                             |
//! | pending_review | approve  | published      | `content.approve`                  |
//! | pending_review | reject   | rejected       | `content.approve`, non-empty notes |
//! | rejected       | resubmit | pending_review | author                             |
//! | published      | archive  | archived       | `content.archive`                  |
//!
//! Anything else is `IllegalTransition`. Planning is pure; persistence goes through
//! `Repository::compare_and_set_state` so the state read and the write cannot drift apart.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    access::{Principal, authorize, require},
    error::{AppError, AppResult},
    models::{ContentItem, ContentPayload, ContentState},
    repository::Repository,
    roles::Capability,
};

/// The events a caller can fire at an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModerationEvent {
    Submit,
    Approve { notes: Option<String> },
    Reject { notes: String },
    Resubmit,
    Archive,
}

impl ModerationEvent {
    pub const fn name(&self) -> &'static str {
        match self {
            ModerationEvent::Submit => "submit",
            ModerationEvent::Approve { .. } => "approve",
            ModerationEvent::Reject { .. } => "reject",
            ModerationEvent::Resubmit => "resubmit",
            ModerationEvent::Archive => "archive",
        }
    }
}

/// Reviewer stamp written when an item leaves `pending_review`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewStamp {
    pub reviewer_id: Uuid,
    pub reviewed_at: DateTime<Utc>,
    pub notes: Option<String>,
}

/// Field updates that accompany a state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionFields {
    pub review: Option<ReviewStamp>,
    pub at: DateTime<Utc>,
}

/// A validated transition, ready to be applied with compare-and-set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: ContentState,
    pub to: ContentState,
    pub fields: TransitionFields,
}

enum Gate {
    Author,
    Capability(Capability),
}

fn gate_for(event: &ModerationEvent) -> Gate {
    match event {
        ModerationEvent::Submit | ModerationEvent::Resubmit => Gate::Author,
        ModerationEvent::Approve { .. } | ModerationEvent::Reject { .. } => {
            Gate::Capability(Capability::ApproveContent)
        }
        ModerationEvent::Archive => Gate::Capability(Capability::ArchiveContent),
    }
}

fn target_state(from: ContentState, event: &ModerationEvent) -> Option<ContentState> {
    use ContentState::*;
    match (from, event) {
        (Draft, ModerationEvent::Submit) => Some(PendingReview),
        (PendingReview, ModerationEvent::Approve { .. }) => Some(Published),
        (PendingReview, ModerationEvent::Reject { .. }) => Some(Rejected),
        (Rejected, ModerationEvent::Resubmit) => Some(PendingReview),
        (Published, ModerationEvent::Archive) => Some(Archived),
        _ => None,
    }
}

fn normalize_notes(notes: Option<&str>) -> Option<String> {
    notes
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}

/// plan_transition
///
/// Validates `event` against `item` for `actor` without touching storage.
///
/// Check order: the actor's standing (inactive, role or authorship) first, then the notes rule
/// for rejection, then the transition table. A member asking to approve therefore always learns
/// `insufficient_role`, whatever the item's state.
pub fn plan_transition(
    item: &ContentItem,
    actor: &Principal,
    event: &ModerationEvent,
    at: DateTime<Utc>,
) -> AppResult<Transition> {
    match gate_for(event) {
        Gate::Author => {
            if !actor.is_active {
                return Err(AppError::Inactive);
            }
            if item.author_id != actor.id {
                return Err(AppError::NotAuthor);
            }
        }
        Gate::Capability(capability) => require(actor, capability)?,
    }

    let review = match event {
        ModerationEvent::Approve { notes } => Some(ReviewStamp {
            reviewer_id: actor.id,
            reviewed_at: at,
            notes: normalize_notes(notes.as_deref()),
        }),
        ModerationEvent::Reject { notes } => {
            let notes =
                normalize_notes(Some(notes.as_str())).ok_or(AppError::MissingRequiredNotes)?;
            Some(ReviewStamp {
                reviewer_id: actor.id,
                reviewed_at: at,
                notes: Some(notes),
            })
        }
        _ => None,
    };

    let to = target_state(item.state, event).ok_or(AppError::IllegalTransition)?;

    Ok(Transition {
        from: item.state,
        to,
        fields: TransitionFields { review, at },
    })
}

/// can_view
///
/// Visibility of a single item. Published items are public. Otherwise the author sees their own
/// item (ownership is checked before any capability), holders of `content.viewUnpublished` see
/// everything that is not public, and queue reviewers see items awaiting review.
pub fn can_view(item: &ContentItem, viewer: Option<&Principal>) -> bool {
    if item.state.is_publicly_visible() {
        return true;
    }
    let Some(viewer) = viewer else {
        return false;
    };
    if viewer.is_active && viewer.id == item.author_id {
        return true;
    }
    if authorize(viewer, Capability::ViewUnpublishedContent).is_allowed() {
        return true;
    }
    item.state == ContentState::PendingReview
        && authorize(viewer, Capability::ViewModerationQueue).is_allowed()
}

/// create_content
///
/// Stores a new item in `draft`, or directly in `pending_review` when `submit` is set.
pub async fn create_content(
    repo: &dyn Repository,
    actor: &Principal,
    payload: ContentPayload,
    submit: bool,
) -> AppResult<ContentItem> {
    require(actor, Capability::CreateContent)?;
    payload.validate().map_err(AppError::Validation)?;

    let state = if submit {
        ContentState::PendingReview
    } else {
        ContentState::Draft
    };
    let item = repo
        .create_content_item(ContentItem::new(actor.id, payload, state))
        .await?;

    tracing::info!(
        item = %item.id,
        kind = ?item.kind,
        state = item.state.as_str(),
        "content created"
    );
    Ok(item)
}

/// apply
///
/// Load, plan, compare-and-set. If another writer moved the item between our read and our
/// write, the compare fails and the caller gets `IllegalTransition` and should re-fetch.
pub async fn apply(
    repo: &dyn Repository,
    item_id: Uuid,
    actor: &Principal,
    event: ModerationEvent,
) -> AppResult<ContentItem> {
    let item = repo
        .load_content_item(item_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let transition = plan_transition(&item, actor, &event, Utc::now()).inspect_err(|e| {
        tracing::warn!(
            item = %item_id,
            actor = %actor.id,
            event = event.name(),
            state = item.state.as_str(),
            error = e.code(),
            "moderation transition refused"
        );
    })?;

    let updated = repo
        .compare_and_set_state(item_id, transition.from, transition.to, &transition.fields)
        .await?
        .ok_or_else(|| {
            tracing::warn!(item = %item_id, event = event.name(), "lost compare-and-set race");
            AppError::IllegalTransition
        })?;

    tracing::info!(
        item = %item_id,
        actor = %actor.id,
        from = transition.from.as_str(),
        to = transition.to.as_str(),
        "content state changed"
    );
    Ok(updated)
}

pub async fn submit(
    repo: &dyn Repository,
    item_id: Uuid,
    actor: &Principal,
) -> AppResult<ContentItem> {
    apply(repo, item_id, actor, ModerationEvent::Submit).await
}

pub async fn approve(
    repo: &dyn Repository,
    item_id: Uuid,
    actor: &Principal,
    notes: Option<String>,
) -> AppResult<ContentItem> {
    apply(repo, item_id, actor, ModerationEvent::Approve { notes }).await
}

pub async fn reject(
    repo: &dyn Repository,
    item_id: Uuid,
    actor: &Principal,
    notes: String,
) -> AppResult<ContentItem> {
    apply(repo, item_id, actor, ModerationEvent::Reject { notes }).await
}

pub async fn resubmit(
    repo: &dyn Repository,
    item_id: Uuid,
    actor: &Principal,
) -> AppResult<ContentItem> {
    apply(repo, item_id, actor, ModerationEvent::Resubmit).await
}

pub async fn archive(
    repo: &dyn Repository,
    item_id: Uuid,
    actor: &Principal,
) -> AppResult<ContentItem> {
    apply(repo, item_id, actor, ModerationEvent::Archive).await
}
