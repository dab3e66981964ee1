//! Notice board endpoints.

use axum::{extract::State, Extension, Json};
use serde_json::Value;

use super::{feed_response, identity_of, success, ApiResult};
use crate::auth::CurrentSession;
use crate::feeds::notices;
use crate::models::CreateNoticeRequest;
use crate::store::WriteReceipt;
use crate::AppState;

/// GET /api/notices - The latest notices.
pub async fn list_notices(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
) -> ApiResult<Value> {
    let feed = notices::load(&state.store, &state.config.feed_limits).await?;
    let can_post = state.gate.is_privileged(identity_of(&session).as_ref());
    feed_response(&feed, can_post)
}

/// POST /api/notices - Post a notice (moderator only).
pub async fn create_notice(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    Json(request): Json<CreateNoticeRequest>,
) -> ApiResult<WriteReceipt> {
    let identity = identity_of(&session);
    let receipt =
        notices::post_notice(&state.store, &state.gate, identity.as_ref(), &request.content)
            .await?;
    success(receipt)
}
