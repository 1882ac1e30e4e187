use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use sqlx::{Postgres, Transaction};

use crate::{
    error::AppError,
    handlers::notification::notify,
    models::notification::KIND_LIKE,
    state::AppState,
    utils::jwt::Claims,
};

/// Which per-post mark a request manipulates. Both kinds share the same
/// join-table shape and counter semantics.
#[derive(Clone, Copy, PartialEq)]
enum PostMark {
    Like,
    Favorite,
}

impl PostMark {
    fn table(self) -> &'static str {
        match self {
            PostMark::Like => "post_likes",
            PostMark::Favorite => "post_favorites",
        }
    }

    fn counter(self) -> &'static str {
        match self {
            PostMark::Like => "likes_count",
            PostMark::Favorite => "favorites_count",
        }
    }
}

/// State of the join row for (user, post): absent, soft-deleted, or active.
async fn mark_row_state(
    tx: &mut Transaction<'_, Postgres>,
    table: &str,
    user_id: i64,
    post_id: i64,
) -> Result<Option<Option<DateTime<Utc>>>, AppError> {
    let row: Option<(Option<DateTime<Utc>>,)> = sqlx::query_as(&format!(
        "SELECT deleted_at FROM {table} WHERE user_id = $1 AND post_id = $2"
    ))
    .bind(user_id)
    .bind(post_id)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(row.map(|(deleted_at,)| deleted_at))
}

/// Applies or removes a mark, keeping the join row and the denormalized
/// counter consistent inside one transaction.
///
/// Redoing an action that is already in effect is reported as success
/// without touching the counter; undoing restores a soft-deleted row
/// rather than inserting a duplicate, so a re-do never double-counts.
async fn set_post_mark(
    state: &AppState,
    user_id: i64,
    post_id: i64,
    mark: PostMark,
    on: bool,
) -> Result<(), AppError> {
    let mut tx = state.pool.begin().await?;

    let post: Option<(i64,)> = sqlx::query_as(
        "SELECT user_id FROM posts WHERE id = $1 AND deleted_at IS NULL AND NOT is_hidden",
    )
    .bind(post_id)
    .fetch_optional(&mut *tx)
    .await?;
    let (author_id,) = post.ok_or(AppError::NotFound("Post not found".to_string()))?;

    let table = mark.table();
    let counter = mark.counter();
    let row = mark_row_state(&mut tx, table, user_id, post_id).await?;

    let mut newly_applied = false;
    match (row, on) {
        // Already in the requested state: idempotent success.
        (Some(None), true) | (None, false) | (Some(Some(_)), false) => {}

        (Some(Some(_)), true) => {
            // Restore the soft-deleted row instead of inserting again.
            sqlx::query(&format!(
                "UPDATE {table} SET deleted_at = NULL, created_at = NOW()
                 WHERE user_id = $1 AND post_id = $2"
            ))
            .bind(user_id)
            .bind(post_id)
            .execute(&mut *tx)
            .await?;

            sqlx::query(&format!(
                "UPDATE posts SET {counter} = {counter} + 1 WHERE id = $1"
            ))
            .bind(post_id)
            .execute(&mut *tx)
            .await?;
            newly_applied = true;
        }

        (None, true) => {
            sqlx::query(&format!(
                "INSERT INTO {table} (user_id, post_id) VALUES ($1, $2)"
            ))
            .bind(user_id)
            .bind(post_id)
            .execute(&mut *tx)
            .await?;

            sqlx::query(&format!(
                "UPDATE posts SET {counter} = {counter} + 1 WHERE id = $1"
            ))
            .bind(post_id)
            .execute(&mut *tx)
            .await?;
            newly_applied = true;
        }

        (Some(None), false) => {
            sqlx::query(&format!(
                "UPDATE {table} SET deleted_at = NOW() WHERE user_id = $1 AND post_id = $2"
            ))
            .bind(user_id)
            .bind(post_id)
            .execute(&mut *tx)
            .await?;

            // Clamp at zero in case of a removal race.
            sqlx::query(&format!(
                "UPDATE posts SET {counter} = GREATEST(0, {counter} - 1) WHERE id = $1"
            ))
            .bind(post_id)
            .execute(&mut *tx)
            .await?;
        }
    }

    if newly_applied && mark == PostMark::Like {
        notify(&mut tx, state, author_id, user_id, KIND_LIKE, Some(post_id), None).await?;
    }

    tx.commit().await?;

    Ok(())
}

/// Like a post. Calling it again while liked is a no-op success.
pub async fn like_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(post_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    set_post_mark(&state, claims.user_id(), post_id, PostMark::Like, true).await?;
    Ok(Json(serde_json::json!({ "liked": true })))
}

/// Remove a like. Succeeds even if the post was never liked.
pub async fn unlike_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(post_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    set_post_mark(&state, claims.user_id(), post_id, PostMark::Like, false).await?;
    Ok(Json(serde_json::json!({ "liked": false })))
}

/// Favorite (collect) a post.
pub async fn favorite_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(post_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    set_post_mark(&state, claims.user_id(), post_id, PostMark::Favorite, true).await?;
    Ok(Json(serde_json::json!({ "favorited": true })))
}

/// Remove a post from favorites.
pub async fn unfavorite_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(post_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    set_post_mark(&state, claims.user_id(), post_id, PostMark::Favorite, false).await?;
    Ok(Json(serde_json::json!({ "favorited": false })))
}

/// Like a comment. Same idempotent restore semantics as post likes.
pub async fn like_comment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(comment_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    set_comment_like(&state, claims.user_id(), comment_id, true).await?;
    Ok(Json(serde_json::json!({ "liked": true })))
}

/// Remove a comment like.
pub async fn unlike_comment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(comment_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    set_comment_like(&state, claims.user_id(), comment_id, false).await?;
    Ok(Json(serde_json::json!({ "liked": false })))
}

async fn set_comment_like(
    state: &AppState,
    user_id: i64,
    comment_id: i64,
    on: bool,
) -> Result<(), AppError> {
    let mut tx = state.pool.begin().await?;

    let comment: Option<(i64, i64)> = sqlx::query_as(
        "SELECT user_id, post_id FROM comments WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(comment_id)
    .fetch_optional(&mut *tx)
    .await?;
    let (author_id, post_id) =
        comment.ok_or(AppError::NotFound("Comment not found".to_string()))?;

    let row: Option<(Option<DateTime<Utc>>,)> = sqlx::query_as(
        "SELECT deleted_at FROM comment_likes WHERE user_id = $1 AND comment_id = $2",
    )
    .bind(user_id)
    .bind(comment_id)
    .fetch_optional(&mut *tx)
    .await?;

    let mut newly_applied = false;
    match (row.map(|(d,)| d), on) {
        (Some(None), true) | (None, false) | (Some(Some(_)), false) => {}

        (Some(Some(_)), true) => {
            sqlx::query(
                "UPDATE comment_likes SET deleted_at = NULL, created_at = NOW()
                 WHERE user_id = $1 AND comment_id = $2",
            )
            .bind(user_id)
            .bind(comment_id)
            .execute(&mut *tx)
            .await?;

            sqlx::query("UPDATE comments SET likes_count = likes_count + 1 WHERE id = $1")
                .bind(comment_id)
                .execute(&mut *tx)
                .await?;
            newly_applied = true;
        }

        (None, true) => {
            sqlx::query("INSERT INTO comment_likes (user_id, comment_id) VALUES ($1, $2)")
                .bind(user_id)
                .bind(comment_id)
                .execute(&mut *tx)
                .await?;

            sqlx::query("UPDATE comments SET likes_count = likes_count + 1 WHERE id = $1")
                .bind(comment_id)
                .execute(&mut *tx)
                .await?;
            newly_applied = true;
        }

        (Some(None), false) => {
            sqlx::query(
                "UPDATE comment_likes SET deleted_at = NOW()
                 WHERE user_id = $1 AND comment_id = $2",
            )
            .bind(user_id)
            .bind(comment_id)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "UPDATE comments SET likes_count = GREATEST(0, likes_count - 1) WHERE id = $1",
            )
            .bind(comment_id)
            .execute(&mut *tx)
            .await?;
        }
    }

    if newly_applied {
        notify(
            &mut tx,
            state,
            author_id,
            user_id,
            KIND_LIKE,
            Some(post_id),
            Some(comment_id),
        )
        .await?;
    }

    tx.commit().await?;
    Ok(())
}
