//! Lesson plan model (collection `learning`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One period of today's lesson plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonEntry {
    pub id: String,
    /// Positive, conventionally 1..N, not required to be unique
    pub period: i64,
    pub subject: String,
    pub created_at: DateTime<Utc>,
}

/// Request body for adding a lesson plan entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLessonRequest {
    pub period: i64,
    pub subject: String,
}
