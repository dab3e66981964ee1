use axum::extract::State;
use serde::Serialize;

use super::{success, ApiResult};
use crate::errors::AppError;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct AssignmentLink {
    pub url: String,
}

/// GET /api/assignments - Where to hand in assignments.
pub async fn get_assignments(State(state): State<AppState>) -> ApiResult<AssignmentLink> {
    match &state.config.assignment_url {
        Some(url) => success(AssignmentLink { url: url.clone() }),
        None => Err(AppError::ConfigMissing(
            "Assignment submission link is not configured".to_string(),
        )),
    }
}
