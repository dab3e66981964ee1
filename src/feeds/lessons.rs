//! Lesson plan: every entry, by period ascending.

use crate::errors::AppError;
use crate::models::{Identity, LessonEntry};
use crate::role::RoleGate;
use crate::store::{
    Collection, Direction, NewLessonEntry, NewRecord, OrderKey, Query, RealtimeStore, WriteReceipt,
};

use super::{required_text, signed_in, DisplayOrder, Feed};

pub fn query() -> Query {
    Query::new(Collection::Learning, OrderKey::Period, Direction::Ascending)
}

pub async fn load(store: &RealtimeStore) -> Result<Feed<LessonEntry>, AppError> {
    Feed::load(store, query(), DisplayOrder::AsQueried).await
}

pub async fn post_lesson(
    store: &RealtimeStore,
    gate: &RoleGate,
    identity: Option<&Identity>,
    period: i64,
    subject: &str,
) -> Result<WriteReceipt, AppError> {
    let author = signed_in(identity)?;
    if !gate.is_privileged(Some(author)) {
        return Err(AppError::Forbidden(
            "Only the class moderator can edit the lesson plan".to_string(),
        ));
    }
    if period <= 0 {
        return Err(AppError::Validation(
            "period must be a positive number".to_string(),
        ));
    }
    let subject = required_text("subject", subject)?;

    store
        .create(
            author,
            NewRecord::Lesson(NewLessonEntry {
                period,
                subject,
                created_by: author.uid.clone(),
            }),
        )
        .await
}
