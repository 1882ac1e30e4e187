use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::{
    error::AppError,
    handlers::notification::notify,
    models::{notification::KIND_FOLLOW, user::UserSummary},
    state::AppState,
    utils::jwt::Claims,
};

#[derive(Debug, Deserialize)]
pub struct FollowListParams {
    pub cursor: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

/// Follow a user. Re-following is a no-op success; a previously undone
/// follow is restored rather than re-inserted.
pub async fn follow_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(followee_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let follower_id = claims.user_id();

    if follower_id == followee_id {
        return Err(AppError::BadRequest("Cannot follow yourself".to_string()));
    }

    let mut tx = state.pool.begin().await?;

    let target: Option<(String,)> = sqlx::query_as("SELECT status FROM users WHERE id = $1")
        .bind(followee_id)
        .fetch_optional(&mut *tx)
        .await?;
    let (status,) = target.ok_or(AppError::NotFound("User not found".to_string()))?;
    if status == "banned" {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    let row: Option<(Option<DateTime<Utc>>,)> = sqlx::query_as(
        "SELECT deleted_at FROM follows WHERE follower_id = $1 AND followee_id = $2",
    )
    .bind(follower_id)
    .bind(followee_id)
    .fetch_optional(&mut *tx)
    .await?;

    let mut newly_followed = false;
    match row.map(|(d,)| d) {
        Some(None) => {}
        Some(Some(_)) => {
            sqlx::query(
                "UPDATE follows SET deleted_at = NULL, created_at = NOW()
                 WHERE follower_id = $1 AND followee_id = $2",
            )
            .bind(follower_id)
            .bind(followee_id)
            .execute(&mut *tx)
            .await?;
            newly_followed = true;
        }
        None => {
            sqlx::query("INSERT INTO follows (follower_id, followee_id) VALUES ($1, $2)")
                .bind(follower_id)
                .bind(followee_id)
                .execute(&mut *tx)
                .await?;
            newly_followed = true;
        }
    }

    if newly_followed {
        notify(&mut tx, &state, followee_id, follower_id, KIND_FOLLOW, None, None).await?;
    }

    tx.commit().await?;

    Ok(Json(serde_json::json!({ "following": true })))
}

/// Unfollow a user. Succeeds even when not following.
pub async fn unfollow_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(followee_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let follower_id = claims.user_id();

    sqlx::query(
        "UPDATE follows SET deleted_at = NOW()
         WHERE follower_id = $1 AND followee_id = $2 AND deleted_at IS NULL",
    )
    .bind(follower_id)
    .bind(followee_id)
    .execute(&state.pool)
    .await?;

    Ok(Json(serde_json::json!({ "following": false })))
}

/// List the users following `{id}`, most recent first.
pub async fn list_followers(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(params): Query<FollowListParams>,
) -> Result<impl IntoResponse, AppError> {
    let limit = params.limit.unwrap_or(20).min(100);

    let followers = sqlx::query_as::<_, UserSummary>(
        r#"
        SELECT u.id, u.username, u.bio, u.avatar_url
        FROM follows f
        JOIN users u ON u.id = f.follower_id
        WHERE f.followee_id = $1 AND f.deleted_at IS NULL
          AND ($2::TIMESTAMPTZ IS NULL OR f.created_at < $2)
        ORDER BY f.created_at DESC
        LIMIT $3
        "#,
    )
    .bind(user_id)
    .bind(params.cursor)
    .bind(limit)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(followers))
}

/// List the users `{id}` is following, most recent first.
pub async fn list_following(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(params): Query<FollowListParams>,
) -> Result<impl IntoResponse, AppError> {
    let limit = params.limit.unwrap_or(20).min(100);

    let following = sqlx::query_as::<_, UserSummary>(
        r#"
        SELECT u.id, u.username, u.bio, u.avatar_url
        FROM follows f
        JOIN users u ON u.id = f.followee_id
        WHERE f.follower_id = $1 AND f.deleted_at IS NULL
          AND ($2::TIMESTAMPTZ IS NULL OR f.created_at < $2)
        ORDER BY f.created_at DESC
        LIMIT $3
        "#,
    )
    .bind(user_id)
    .bind(params.cursor)
    .bind(limit)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(following))
}
