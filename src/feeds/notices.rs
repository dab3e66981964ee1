//! Notice board: the latest few notices, newest first.

use crate::config::FeedLimits;
use crate::errors::AppError;
use crate::models::{Identity, Notice};
use crate::role::RoleGate;
use crate::store::{
    Collection, Direction, NewNotice, NewRecord, OrderKey, Query, RealtimeStore, WriteReceipt,
};

use super::{required_text, signed_in, DisplayOrder, Feed};

pub fn query(limits: &FeedLimits) -> Query {
    Query::new(Collection::Notices, OrderKey::CreatedAt, Direction::Descending)
        .limit(limits.notices)
}

pub async fn load(store: &RealtimeStore, limits: &FeedLimits) -> Result<Feed<Notice>, AppError> {
    Feed::load(store, query(limits), DisplayOrder::AsQueried).await
}

/// Post a notice as the moderator.
pub async fn post_notice(
    store: &RealtimeStore,
    gate: &RoleGate,
    identity: Option<&Identity>,
    content: &str,
) -> Result<WriteReceipt, AppError> {
    let author = signed_in(identity)?;
    if !gate.is_privileged(Some(author)) {
        return Err(AppError::Forbidden(
            "Only the class moderator can post notices".to_string(),
        ));
    }
    let content = required_text("content", content)?;

    store
        .create(
            author,
            NewRecord::Notice(NewNotice {
                content,
                created_by: author.uid.clone(),
            }),
        )
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feeds::tests::{identity, store_with_pool, MODERATOR};
    use crate::feeds::FeedState;

    fn contents(feed: &Feed<Notice>) -> Vec<String> {
        feed.state()
            .items()
            .iter()
            .map(|n| n.content.clone())
            .collect()
    }

    #[tokio::test]
    async fn test_posted_notices_arrive_through_the_feed() {
        let (store, _pool, _dir) = store_with_pool().await;
        let gate = RoleGate::new(MODERATOR);
        let teacher = identity(MODERATOR);
        let limits = FeedLimits::default();

        let mut feed = load(&store, &limits).await.unwrap();
        assert_eq!(feed.state(), &FeedState::Empty);

        let receipt = post_notice(&store, &gate, Some(&teacher), "  A  ")
            .await
            .unwrap();
        assert_eq!(receipt.revision, 1);
        feed.changed().await;
        assert_eq!(contents(&feed), ["A"]);

        post_notice(&store, &gate, Some(&teacher), "B").await.unwrap();
        feed.changed().await;
        assert_eq!(contents(&feed), ["B", "A"]);
        assert_eq!(feed.revision(), Some(2));
    }

    #[tokio::test]
    async fn test_board_shows_at_most_the_limit() {
        let (store, _pool, _dir) = store_with_pool().await;
        let gate = RoleGate::new(MODERATOR);
        let teacher = identity(MODERATOR);
        for content in ["one", "two", "three", "four"] {
            post_notice(&store, &gate, Some(&teacher), content)
                .await
                .unwrap();
        }

        let feed = load(&store, &FeedLimits::default()).await.unwrap();
        assert_eq!(contents(&feed), ["four", "three", "two"]);
    }

    #[tokio::test]
    async fn test_member_cannot_post() {
        let (store, _pool, _dir) = store_with_pool().await;
        let gate = RoleGate::new(MODERATOR);
        let student = identity("student@school.kr");

        let result = post_notice(&store, &gate, Some(&student), "hello").await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));

        let result = post_notice(&store, &gate, None, "hello").await;
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_empty_notice_never_reaches_the_store() {
        let (store, _pool, _dir) = store_with_pool().await;
        let gate = RoleGate::new(MODERATOR);
        let teacher = identity(MODERATOR);

        let result = post_notice(&store, &gate, Some(&teacher), "   ").await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let feed = load(&store, &FeedLimits::default()).await.unwrap();
        assert_eq!(feed.state(), &FeedState::Empty);
        assert_eq!(feed.revision(), Some(0));
    }
}
