//! REST and WebSocket API.
//!
//! Every JSON response uses the `{success, data}` / `{success, error}` envelope.

mod assignments;
mod chats;
mod learning;
mod live;
mod meal;
mod notices;
mod session;

pub use assignments::*;
pub use chats::*;
pub use learning::*;
pub use live::*;
pub use meal::*;
pub use notices::*;
pub use session::*;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;

use crate::auth::CurrentSession;
use crate::db::Record;
use crate::errors::AppError;
use crate::feeds::Feed;
use crate::models::Identity;

/// Success response envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<ApiResponse<T>, AppError>;

/// Create a successful API response.
pub fn success<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(ApiResponse::new(data))
}

/// Render a loaded feed. The view borrows the feed, so it is serialized here.
fn feed_response<R: Record + Serialize>(feed: &Feed<R>, can_post: bool) -> ApiResult<Value> {
    success(serde_json::to_value(feed.view(can_post))?)
}

fn identity_of(session: &CurrentSession) -> Option<Identity> {
    session.0.identity()
}
