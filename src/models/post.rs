use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::comment::CommentResponse;

/// Represents the 'posts' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub content: String,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
    pub deleted_at: Option<chrono::DateTime<chrono::Utc>>,

    pub likes_count: i32,
    pub comments_count: i32,
    pub favorites_count: i32,
    pub views_count: i32,

    /// Admin override: pinned to the top of the recommended feed.
    pub is_recommended: bool,
    /// Moderation flag: hidden posts are invisible to non-admin readers.
    pub is_hidden: bool,

    /// UI helper: whether the current user has liked this post.
    /// Default to false, populated only in specific queries.
    #[serde(default)]
    #[sqlx(default)]
    pub is_liked: bool,
    /// UI helper: whether the current user has favorited this post.
    #[serde(default)]
    #[sqlx(default)]
    pub is_favorited: bool,
}

/// DTO for creating a new post.
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePostRequest {
    #[validate(length(
        min = 1,
        max = 100,
        message = "Title length must be between 1 and 100 chars"
    ))]
    pub title: String,

    #[validate(length(
        min = 1,
        max = 10000,
        message = "Content length must be between 1 and 10000 chars"
    ))]
    pub content: String,

    /// Optional explicit topic names; merged with #hashtags found in content.
    pub topics: Option<Vec<String>>,
}

/// DTO for updating a post. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePostRequest {
    #[validate(length(min = 1, max = 100))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 10000))]
    pub content: Option<String>,
}

/// Query parameters for listing posts.
#[derive(Debug, Deserialize)]
pub struct PostListParams {
    /// Cursor for pagination: the created_at timestamp of the last post in the previous page.
    pub cursor: Option<chrono::DateTime<chrono::Utc>>,

    /// Number of items to return (default: 20, max: 100).
    pub limit: Option<i64>,

    /// Search keyword for title match.
    pub q: Option<String>,
}

/// Query parameters for the recommended feed (page-based, unlike the
/// cursor-based chronological list: the scored order has no stable cursor).
#[derive(Debug, Deserialize)]
pub struct FeedParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
}

/// A post as served by the recommended feed: the row itself, its ranking
/// score (null for admin picks), and up to two latest top-level comments.
#[derive(Debug, Serialize)]
pub struct FeedPost {
    #[serde(flatten)]
    pub post: Post,
    pub score: Option<f64>,
    pub preview_comments: Vec<CommentResponse>,
}

/// Post detail response: the row plus its topic names.
#[derive(Debug, Serialize)]
pub struct PostDetail {
    #[serde(flatten)]
    pub post: Post,
    pub topics: Vec<String>,
}
