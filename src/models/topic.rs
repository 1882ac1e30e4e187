use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'topics' table in the database.
///
/// Topics are created implicitly the first time a post references them;
/// `usage_count` tracks how many live posts carry the topic.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Topic {
    pub id: i64,
    /// Lowercase, unique.
    pub name: String,
    pub usage_count: i32,
    pub views_count: i32,
    /// Admin override: featured topics outrank organic trending ones.
    pub is_featured: bool,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Topic row plus the number of posts that used it in the recent window.
/// Fetched in one query for the trending computation.
#[derive(Debug, FromRow)]
pub struct TopicWithRecent {
    pub id: i64,
    pub name: String,
    pub usage_count: i32,
    pub views_count: i32,
    pub is_featured: bool,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub recent_posts: i64,
}

/// A topic as served by the trending widget.
#[derive(Debug, Serialize)]
pub struct TrendingTopic {
    pub id: i64,
    pub name: String,
    pub usage_count: i32,
    pub views_count: i32,
    pub is_featured: bool,
    pub trending_score: i64,
}

#[derive(Debug, Deserialize)]
pub struct TopicListParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct TrendingParams {
    pub limit: Option<i64>,
}
