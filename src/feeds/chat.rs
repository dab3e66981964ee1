//! Class chat: the latest window of messages, displayed oldest to newest.

use crate::config::FeedLimits;
use crate::errors::AppError;
use crate::models::{ChatMessage, Identity};
use crate::store::{
    Collection, Direction, NewChatMessage, NewRecord, OrderKey, Query, RealtimeStore, WriteReceipt,
};

use super::{required_text, signed_in, DisplayOrder, Feed};

pub fn query(limits: &FeedLimits) -> Query {
    Query::new(Collection::Chats, OrderKey::CreatedAt, Direction::Descending).limit(limits.chats)
}

pub async fn load(
    store: &RealtimeStore,
    limits: &FeedLimits,
) -> Result<Feed<ChatMessage>, AppError> {
    Feed::load(store, query(limits), DisplayOrder::Reversed).await
}

/// Send a message as the signed-in user. Any identity may chat.
pub async fn post_message(
    store: &RealtimeStore,
    identity: Option<&Identity>,
    text: &str,
) -> Result<WriteReceipt, AppError> {
    let author = signed_in(identity)?;
    let text = required_text("text", text)?;

    store
        .create(
            author,
            NewRecord::Chat(NewChatMessage {
                text,
                user_id: author.uid.clone(),
                user_name: author.author_name(),
                user_photo: author.photo_url.clone(),
            }),
        )
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feeds::tests::{identity, store_with_pool};
    use crate::feeds::FeedState;

    fn texts(feed: &Feed<ChatMessage>) -> Vec<String> {
        feed.state()
            .items()
            .iter()
            .map(|m| m.text.clone())
            .collect()
    }

    #[tokio::test]
    async fn test_latest_window_displayed_oldest_first() {
        let (store, _pool, _dir) = store_with_pool().await;
        let student = identity("student@school.kr");
        let limits = FeedLimits {
            notices: 3,
            chats: 2,
        };
        for text in ["first", "second", "third"] {
            post_message(&store, Some(&student), text).await.unwrap();
        }

        let feed = load(&store, &limits).await.unwrap();
        assert_eq!(texts(&feed), ["second", "third"]);
    }

    #[tokio::test]
    async fn test_message_carries_author() {
        let (store, _pool, _dir) = store_with_pool().await;
        let mut author = identity("kim@school.kr");
        author.display_name = Some("Kim".to_string());
        author.photo_url = Some("https://example.com/kim.png".to_string());

        let mut feed = load(&store, &FeedLimits::default()).await.unwrap();
        post_message(&store, Some(&author), "hello").await.unwrap();
        feed.changed().await;

        let message = &feed.state().items()[0];
        assert_eq!(message.user_id, author.uid);
        assert_eq!(message.user_name, "Kim");
        assert_eq!(message.user_photo.as_deref(), Some("https://example.com/kim.png"));
    }

    #[tokio::test]
    async fn test_rejects_empty_or_anonymous_messages() {
        let (store, _pool, _dir) = store_with_pool().await;
        let student = identity("student@school.kr");

        let result = post_message(&store, Some(&student), "\n ").await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        let result = post_message(&store, None, "hi").await;
        assert!(matches!(result, Err(AppError::Unauthorized(_))));

        let feed = load(&store, &FeedLimits::default()).await.unwrap();
        assert_eq!(feed.state(), &FeedState::Empty);
    }
}
