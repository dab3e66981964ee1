use axum::{extract::State, Extension, Json};
use serde_json::Value;

use super::{feed_response, identity_of, success, ApiResult};
use crate::auth::CurrentSession;
use crate::feeds::chat;
use crate::models::SendMessageRequest;
use crate::store::WriteReceipt;
use crate::AppState;

/// GET /api/chats - The latest messages, oldest first.
pub async fn list_messages(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
) -> ApiResult<Value> {
    let feed = chat::load(&state.store, &state.config.feed_limits).await?;
    feed_response(&feed, identity_of(&session).is_some())
}

/// POST /api/chats - Send a message.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    Json(request): Json<SendMessageRequest>,
) -> ApiResult<WriteReceipt> {
    let identity = identity_of(&session);
    let receipt = chat::post_message(&state.store, identity.as_ref(), &request.text).await?;
    success(receipt)
}
