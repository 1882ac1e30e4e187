use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'events' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    /// Creator.
    pub user_id: i64,
    pub title: String,
    pub description: String,
    pub location: String,

    pub starts_at: chrono::DateTime<chrono::Utc>,
    pub ends_at: Option<chrono::DateTime<chrono::Utc>>,

    /// Maximum registrations; 0 means unlimited.
    pub capacity: i32,
    pub registrations_count: i32,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub deleted_at: Option<chrono::DateTime<chrono::Utc>>,

    /// UI helper: whether the current user is registered.
    #[serde(default)]
    #[sqlx(default)]
    pub is_registered: bool,
}

/// DTO for creating a new event.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateEventRequest {
    #[validate(length(min = 1, max = 100, message = "Title must be between 1 and 100 chars"))]
    pub title: String,

    #[validate(length(
        min = 1,
        max = 5000,
        message = "Description must be between 1 and 5000 chars"
    ))]
    pub description: String,

    #[validate(length(min = 1, max = 200, message = "Location must be between 1 and 200 chars"))]
    pub location: String,

    pub starts_at: chrono::DateTime<chrono::Utc>,
    pub ends_at: Option<chrono::DateTime<chrono::Utc>>,

    /// 0 (or omitted) means unlimited.
    #[validate(range(min = 0, max = 100_000, message = "Capacity must be non-negative"))]
    pub capacity: Option<i32>,
}

/// Query parameters for listing events.
#[derive(Debug, Deserialize)]
pub struct EventListParams {
    /// Cursor: the starts_at of the last event in the previous page.
    pub cursor: Option<chrono::DateTime<chrono::Utc>>,
    pub limit: Option<i64>,
    /// Include events that already started (default: upcoming only).
    pub include_past: Option<bool>,
}
