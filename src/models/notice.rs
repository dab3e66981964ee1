//! Notice model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A class notice. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Request body for posting a notice.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNoticeRequest {
    pub content: String,
}
