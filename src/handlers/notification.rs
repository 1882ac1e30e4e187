use axum::{
    Extension, Json,
    extract::{Query, State},
    response::IntoResponse,
};
use sqlx::{Postgres, Transaction};

use crate::{
    error::AppError,
    models::notification::{MarkReadRequest, NotificationListParams, NotificationResponse},
    state::AppState,
    utils::jwt::Claims,
};

/// Inserts a notification inside the caller's transaction.
///
/// Self-notifications are silently skipped so a user liking their own post
/// does not ping themselves. The recipient's cached unread count is
/// invalidated; the 30s TTL bounds any staleness from a later rollback.
pub async fn notify(
    tx: &mut Transaction<'_, Postgres>,
    state: &AppState,
    recipient_id: i64,
    actor_id: i64,
    kind: &str,
    post_id: Option<i64>,
    comment_id: Option<i64>,
) -> Result<(), AppError> {
    if recipient_id == actor_id {
        return Ok(());
    }

    sqlx::query(
        r#"
        INSERT INTO notifications (user_id, actor_id, kind, post_id, comment_id)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(recipient_id)
    .bind(actor_id)
    .bind(kind)
    .bind(post_id)
    .bind(comment_id)
    .execute(&mut **tx)
    .await?;

    state.unread_counts.invalidate(&recipient_id);
    Ok(())
}

/// List the current user's notifications, newest first.
pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<NotificationListParams>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id();
    let limit = params.limit.unwrap_or(20).min(100);
    let unread_only = params.unread_only.unwrap_or(false);

    let notifications = sqlx::query_as::<_, NotificationResponse>(
        r#"
        SELECT
            n.id, n.user_id, n.actor_id, u.username AS actor_username,
            n.kind, n.post_id, n.comment_id, n.read_at, n.created_at
        FROM notifications n
        JOIN users u ON u.id = n.actor_id
        WHERE n.user_id = $1
          AND ($2::TIMESTAMPTZ IS NULL OR n.created_at < $2)
          AND (NOT $3 OR n.read_at IS NULL)
        ORDER BY n.created_at DESC
        LIMIT $4
        "#,
    )
    .bind(user_id)
    .bind(params.cursor)
    .bind(unread_only)
    .bind(limit)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(notifications))
}

/// Number of unread notifications, served from a short-lived cache.
pub async fn unread_count(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id();

    if let Some(count) = state.unread_counts.get(&user_id) {
        return Ok(Json(serde_json::json!({ "unread": count })));
    }

    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND read_at IS NULL",
    )
    .bind(user_id)
    .fetch_one(&state.pool)
    .await?;

    state.unread_counts.insert(user_id, count);

    Ok(Json(serde_json::json!({ "unread": count })))
}

/// Mark notifications read: the listed ids, or everything when no ids given.
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<MarkReadRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id();

    let result = match payload.ids {
        Some(ids) if !ids.is_empty() => {
            sqlx::query(
                r#"
                UPDATE notifications SET read_at = NOW()
                WHERE user_id = $1 AND id = ANY($2) AND read_at IS NULL
                "#,
            )
            .bind(user_id)
            .bind(&ids)
            .execute(&state.pool)
            .await?
        }
        _ => {
            sqlx::query(
                "UPDATE notifications SET read_at = NOW() WHERE user_id = $1 AND read_at IS NULL",
            )
            .bind(user_id)
            .execute(&state.pool)
            .await?
        }
    };

    state.unread_counts.invalidate(&user_id);

    Ok(Json(serde_json::json!({ "updated": result.rows_affected() })))
}
