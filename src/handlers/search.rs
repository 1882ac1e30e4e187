use axum::{Json, extract::{Query, State}, response::IntoResponse};
use serde::Deserialize;
use serde_json::json;

use crate::{
    error::AppError,
    models::{post::Post, topic::Topic, user::UserSummary},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: String,
    /// 'posts', 'users', 'topics' or 'all' (default).
    pub kind: Option<String>,
    pub limit: Option<i64>,
}

/// Keyword search across posts, users and topics.
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, AppError> {
    let keyword = params.q.trim();
    if keyword.is_empty() {
        return Err(AppError::BadRequest("Query must not be empty".to_string()));
    }

    let limit = params.limit.unwrap_or(20).clamp(1, 50);
    let kind = params.kind.as_deref().unwrap_or("all");
    let pattern = format!("%{keyword}%");

    let mut body = serde_json::Map::new();

    if kind == "posts" || kind == "all" {
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT
                id, user_id, title, content,
                created_at, updated_at, deleted_at,
                likes_count, comments_count, favorites_count, views_count,
                is_recommended, is_hidden
            FROM posts
            WHERE deleted_at IS NULL AND NOT is_hidden
              AND (title ILIKE $1 OR content ILIKE $1)
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(&pattern)
        .bind(limit)
        .fetch_all(&state.pool)
        .await?;
        body.insert("posts".to_string(), serde_json::to_value(posts)?);
    }

    if kind == "users" || kind == "all" {
        let users = sqlx::query_as::<_, UserSummary>(
            r#"
            SELECT id, username, bio, avatar_url
            FROM users
            WHERE status = 'active' AND username ILIKE $1
            ORDER BY username ASC
            LIMIT $2
            "#,
        )
        .bind(&pattern)
        .bind(limit)
        .fetch_all(&state.pool)
        .await?;
        body.insert("users".to_string(), serde_json::to_value(users)?);
    }

    if kind == "topics" || kind == "all" {
        let topics = sqlx::query_as::<_, Topic>(
            r#"
            SELECT id, name, usage_count, views_count, is_featured, created_at
            FROM topics
            WHERE name ILIKE $1
            ORDER BY usage_count DESC
            LIMIT $2
            "#,
        )
        .bind(&pattern)
        .bind(limit)
        .fetch_all(&state.pool)
        .await?;
        body.insert("topics".to_string(), serde_json::to_value(topics)?);
    }

    if body.is_empty() {
        return Err(AppError::BadRequest(format!("Unknown search kind '{kind}'")));
    }

    Ok(Json(json!(body)))
}
