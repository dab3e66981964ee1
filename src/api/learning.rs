//! Lesson plan endpoints.

use axum::{extract::State, Extension, Json};
use serde_json::Value;

use super::{feed_response, identity_of, success, ApiResult};
use crate::auth::CurrentSession;
use crate::feeds::lessons;
use crate::models::CreateLessonRequest;
use crate::store::WriteReceipt;
use crate::AppState;

/// GET /api/learning - The whole lesson plan by period.
pub async fn list_lessons(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
) -> ApiResult<Value> {
    let feed = lessons::load(&state.store).await?;
    let can_post = state.gate.is_privileged(identity_of(&session).as_ref());
    feed_response(&feed, can_post)
}

/// POST /api/learning - Add a lesson entry (moderator only).
pub async fn create_lesson(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    Json(request): Json<CreateLessonRequest>,
) -> ApiResult<WriteReceipt> {
    let identity = identity_of(&session);
    let receipt = lessons::post_lesson(
        &state.store,
        &state.gate,
        identity.as_ref(),
        request.period,
        &request.subject,
    )
    .await?;
    success(receipt)
}
