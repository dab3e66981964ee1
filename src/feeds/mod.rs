//! Feed view-models: one live query each, plus the create actions behind it.
//!
//! A feed never appends optimistically. Posted records show up through the
//! feed's own subscription, like everyone else's.

pub mod chat;
pub mod lessons;
pub mod notices;

use serde::Serialize;

use crate::db::Record;
use crate::errors::AppError;
use crate::models::Identity;
use crate::store::{Query, RealtimeStore, Snapshot, Subscription};

/// What a view renders. `Loading` and `Empty` are never conflated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedState<R> {
    /// No snapshot received yet
    Loading,
    /// Fetched, zero records
    Empty,
    Ready(Vec<R>),
    /// The subscription was closed by the store; carries a user-facing notice
    Unavailable(String),
}

impl<R> FeedState<R> {
    pub fn label(&self) -> &'static str {
        match self {
            FeedState::Loading => "loading",
            FeedState::Empty => "empty",
            FeedState::Ready(_) => "ready",
            FeedState::Unavailable(_) => "unavailable",
        }
    }

    pub fn items(&self) -> &[R] {
        match self {
            FeedState::Ready(items) => items,
            _ => &[],
        }
    }
}

/// How a delivered snapshot maps to display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayOrder {
    AsQueried,
    /// Newest-first window shown oldest-first (chat)
    Reversed,
}

/// Serializable view of a feed.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedView<'a, R> {
    pub state: &'static str,
    pub items: &'a [R],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<&'a str>,
    pub can_post: bool,
}

pub struct Feed<R> {
    subscription: Subscription<R>,
    display: DisplayOrder,
    state: FeedState<R>,
    revision: Option<i64>,
}

impl<R: Record> Feed<R> {
    /// Subscribe. The state stays `Loading` until [`Feed::changed`] applies the first snapshot.
    pub async fn mount(
        store: &RealtimeStore,
        query: Query,
        display: DisplayOrder,
    ) -> Result<Self, AppError> {
        let subscription = store.subscribe::<R>(query).await?;
        Ok(Self {
            subscription,
            display,
            state: FeedState::Loading,
            revision: None,
        })
    }

    /// Subscribe and wait for the initial snapshot.
    pub async fn load(
        store: &RealtimeStore,
        query: Query,
        display: DisplayOrder,
    ) -> Result<Self, AppError> {
        let mut feed = Self::mount(store, query, display).await?;
        feed.changed().await;
        Ok(feed)
    }

    pub fn state(&self) -> &FeedState<R> {
        &self.state
    }

    pub fn revision(&self) -> Option<i64> {
        self.revision
    }

    /// Wait for the next snapshot and apply it. Returns `false` once the feed is closed.
    pub async fn changed(&mut self) -> bool {
        match self.subscription.next().await {
            Some(Ok(snapshot)) => {
                self.apply(snapshot);
                true
            }
            Some(Err(e)) => {
                tracing::warn!(
                    collection = %self.subscription.query().collection,
                    "Feed closed: {}",
                    e
                );
                self.state = FeedState::Unavailable(format!(
                    "Live updates for {} are unavailable right now.",
                    self.subscription.query().collection
                ));
                true
            }
            None => false,
        }
    }

    fn apply(&mut self, snapshot: Snapshot<R>) {
        let Snapshot {
            revision,
            mut records,
        } = snapshot;
        if self.display == DisplayOrder::Reversed {
            records.reverse();
        }
        self.revision = Some(revision);
        self.state = if records.is_empty() {
            FeedState::Empty
        } else {
            FeedState::Ready(records)
        };
    }

    /// Release the subscription. Dropping the feed does the same.
    pub fn unmount(mut self) {
        self.subscription.unsubscribe();
    }

    pub fn view(&self, can_post: bool) -> FeedView<'_, R> {
        let state = self.state();
        FeedView {
            state: state.label(),
            items: state.items(),
            revision_id: self.revision(),
            notice: match state {
                FeedState::Unavailable(notice) => Some(notice.as_str()),
                _ => None,
            },
            can_post,
        }
    }
}

/// Require a signed-in identity for a create action.
pub(crate) fn signed_in(identity: Option<&Identity>) -> Result<&Identity, AppError> {
    identity.ok_or_else(|| AppError::Unauthorized("Sign in to post".to_string()))
}

/// Trimmed, non-empty text or a validation error naming the field.
pub(crate) fn required_text(field: &str, value: &str) -> Result<String, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    Ok(value.to_string())
}
