use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    handlers::notification::notify,
    models::{
        comment::{CommentResponse, CreateCommentRequest},
        notification::KIND_COMMENT,
    },
    state::AppState,
    utils::{
        html::clean_html,
        jwt::{Claims, OptionalClaims},
    },
};

/// Create a new comment on a post.
///
/// Supports two-level threading: replying to a reply attaches the new
/// comment to the same root as its parent.
pub async fn create_comment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(post_id): Path<i64>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let user_id = claims.user_id();
    let content = clean_html(&payload.content);

    let mut tx = state.pool.begin().await?;

    let post: Option<(i64,)> = sqlx::query_as(
        "SELECT user_id FROM posts WHERE id = $1 AND deleted_at IS NULL AND NOT is_hidden",
    )
    .bind(post_id)
    .fetch_optional(&mut *tx)
    .await?;
    let (post_author,) = post.ok_or(AppError::NotFound("Post not found".to_string()))?;

    // Resolve root_id: replies to a root comment point at it, replies to a
    // reply share the parent's root.
    let mut root_id: Option<i64> = None;
    let mut parent_author: Option<i64> = None;
    if let Some(pid) = payload.parent_id {
        let parent: Option<(i64, Option<i64>, i64)> = sqlx::query_as(
            "SELECT id, root_id, user_id FROM comments
             WHERE id = $1 AND post_id = $2 AND deleted_at IS NULL",
        )
        .bind(pid)
        .bind(post_id)
        .fetch_optional(&mut *tx)
        .await?;
        let (parent_id, parent_root, author) =
            parent.ok_or(AppError::NotFound("Parent comment not found".to_string()))?;

        root_id = Some(parent_root.unwrap_or(parent_id));
        parent_author = Some(author);
    }

    let (new_id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO comments (post_id, user_id, content, root_id, parent_id)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(post_id)
    .bind(user_id)
    .bind(&content)
    .bind(root_id)
    .bind(payload.parent_id)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("UPDATE posts SET comments_count = comments_count + 1 WHERE id = $1")
        .bind(post_id)
        .execute(&mut *tx)
        .await?;

    // Notify the post author, and the parent comment's author on replies.
    notify(&mut tx, &state, post_author, user_id, KIND_COMMENT, Some(post_id), Some(new_id))
        .await?;
    if let Some(parent_author) = parent_author.filter(|a| *a != post_author) {
        notify(
            &mut tx,
            &state,
            parent_author,
            user_id,
            KIND_COMMENT,
            Some(post_id),
            Some(new_id),
        )
        .await?;
    }

    tx.commit().await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "id": new_id })),
    ))
}

/// List all comments for a post, roots first in thread order.
pub async fn list_comments(
    State(state): State<AppState>,
    OptionalClaims(claims): OptionalClaims,
    Path(post_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut comments = sqlx::query_as::<_, CommentResponse>(
        r#"
        SELECT
            c.id, c.post_id, c.user_id, u.username, c.content,
            c.root_id, c.parent_id, c.likes_count, c.created_at
        FROM comments c
        JOIN users u ON c.user_id = u.id
        WHERE c.post_id = $1 AND c.deleted_at IS NULL
        ORDER BY c.root_id IS NOT NULL, c.root_id, c.created_at ASC
        "#,
    )
    .bind(post_id)
    .fetch_all(&state.pool)
    .await?;

    // One extra query marks the caller's likes for the whole page.
    if let Some(claims) = claims {
        let ids: Vec<i64> = comments.iter().map(|c| c.id).collect();
        if !ids.is_empty() {
            let liked: Vec<(i64,)> = sqlx::query_as(
                "SELECT comment_id FROM comment_likes
                 WHERE user_id = $1 AND comment_id = ANY($2) AND deleted_at IS NULL",
            )
            .bind(claims.user_id())
            .bind(&ids)
            .fetch_all(&state.pool)
            .await?;
            let liked: std::collections::HashSet<i64> =
                liked.into_iter().map(|(id,)| id).collect();
            for comment in &mut comments {
                comment.is_liked = liked.contains(&comment.id);
            }
        }
    }

    Ok(Json(comments))
}

/// Delete a comment (soft delete). Author or admin only.
pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(comment_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id();

    let mut tx = state.pool.begin().await?;

    let comment: Option<(i64, i64)> = sqlx::query_as(
        "SELECT user_id, post_id FROM comments WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(comment_id)
    .fetch_optional(&mut *tx)
    .await?;
    let (author_id, post_id) =
        comment.ok_or(AppError::NotFound("Comment not found".to_string()))?;

    if author_id != user_id && claims.role != "admin" {
        return Err(AppError::Forbidden(
            "You are not authorized to delete this comment".to_string(),
        ));
    }

    sqlx::query("UPDATE comments SET deleted_at = NOW() WHERE id = $1")
        .bind(comment_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("UPDATE posts SET comments_count = GREATEST(0, comments_count - 1) WHERE id = $1")
        .bind(post_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}
