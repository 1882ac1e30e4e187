use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'messages' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub sender_id: i64,
    pub recipient_id: i64,
    pub content: String,
    pub read_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for sending a message.
#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    pub recipient_id: i64,

    #[validate(length(
        min = 1,
        max = 2000,
        message = "Message must be between 1 and 2000 characters"
    ))]
    pub content: String,
}

/// One row per conversation partner: the latest message plus unread count.
#[derive(Debug, Serialize)]
pub struct ConversationSummary {
    pub peer_id: i64,
    pub peer_username: String,
    pub last_content: String,
    pub last_at: Option<chrono::DateTime<chrono::Utc>>,
    pub unread_count: i64,
}

/// Query parameters for a message thread.
#[derive(Debug, Deserialize)]
pub struct MessageListParams {
    /// Cursor: the created_at of the oldest message in the previous page.
    pub cursor: Option<chrono::DateTime<chrono::Utc>>,
    pub limit: Option<i64>,
}
