use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Notification kinds fanned in from interactions.
pub const KIND_LIKE: &str = "like";
pub const KIND_COMMENT: &str = "comment";
pub const KIND_FOLLOW: &str = "follow";

/// A notification row joined with the acting user's name.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct NotificationResponse {
    pub id: i64,
    /// Recipient.
    pub user_id: i64,
    /// The user whose action triggered the notification.
    pub actor_id: i64,
    pub actor_username: String,
    /// 'like', 'comment' or 'follow'.
    pub kind: String,
    pub post_id: Option<i64>,
    pub comment_id: Option<i64>,
    pub read_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Query parameters for listing notifications.
#[derive(Debug, Deserialize)]
pub struct NotificationListParams {
    pub cursor: Option<chrono::DateTime<chrono::Utc>>,
    pub limit: Option<i64>,
    /// Only unread ones when true.
    pub unread_only: Option<bool>,
}

/// DTO for marking notifications read. Without ids, everything is marked.
#[derive(Debug, Deserialize)]
pub struct MarkReadRequest {
    pub ids: Option<Vec<i64>>,
}
