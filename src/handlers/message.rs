use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use validator::Validate;

use crate::{
    error::AppError,
    models::message::{ConversationSummary, Message, MessageListParams, SendMessageRequest},
    state::AppState,
    utils::{html::clean_html, jwt::Claims},
};

/// Send a private message.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let sender_id = claims.user_id();
    if payload.recipient_id == sender_id {
        return Err(AppError::BadRequest(
            "Cannot message yourself".to_string(),
        ));
    }

    let recipient: Option<(String,)> = sqlx::query_as("SELECT status FROM users WHERE id = $1")
        .bind(payload.recipient_id)
        .fetch_optional(&state.pool)
        .await?;
    let (status,) = recipient.ok_or(AppError::NotFound("User not found".to_string()))?;
    if status == "banned" {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    let content = clean_html(&payload.content);

    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO messages (sender_id, recipient_id, content)
        VALUES ($1, $2, $3)
        RETURNING id
        "#,
    )
    .bind(sender_id)
    .bind(payload.recipient_id)
    .bind(&content)
    .fetch_one(&state.pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to send message: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id }))))
}

#[derive(FromRow)]
struct ConversationRow {
    peer_id: i64,
    last_content: String,
    last_at: Option<DateTime<Utc>>,
}

/// List the current user's conversations: latest message per partner plus
/// the number of unread messages from them.
pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id();

    let rows = sqlx::query_as::<_, ConversationRow>(
        r#"
        SELECT DISTINCT ON (peer_id)
            peer_id, content AS last_content, created_at AS last_at
        FROM (
            SELECT
                CASE WHEN m.sender_id = $1 THEN m.recipient_id ELSE m.sender_id END AS peer_id,
                m.content, m.created_at
            FROM messages m
            WHERE m.sender_id = $1 OR m.recipient_id = $1
        ) pairs
        ORDER BY peer_id, last_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(&state.pool)
    .await?;

    if rows.is_empty() {
        return Ok(Json(Vec::<ConversationSummary>::new()));
    }

    let peer_ids: Vec<i64> = rows.iter().map(|r| r.peer_id).collect();

    let names: Vec<(i64, String)> =
        sqlx::query_as("SELECT id, username FROM users WHERE id = ANY($1)")
            .bind(&peer_ids)
            .fetch_all(&state.pool)
            .await?;
    let names: HashMap<i64, String> = names.into_iter().collect();

    let unread: Vec<(i64, i64)> = sqlx::query_as(
        r#"
        SELECT sender_id, COUNT(*)
        FROM messages
        WHERE recipient_id = $1 AND read_at IS NULL
        GROUP BY sender_id
        "#,
    )
    .bind(user_id)
    .fetch_all(&state.pool)
    .await?;
    let unread: HashMap<i64, i64> = unread.into_iter().collect();

    let mut conversations: Vec<ConversationSummary> = rows
        .into_iter()
        .map(|r| ConversationSummary {
            peer_username: names.get(&r.peer_id).cloned().unwrap_or_default(),
            unread_count: unread.get(&r.peer_id).copied().unwrap_or(0),
            peer_id: r.peer_id,
            last_content: r.last_content,
            last_at: r.last_at,
        })
        .collect();

    // Most recently active conversation first.
    conversations.sort_by(|a, b| b.last_at.cmp(&a.last_at));

    Ok(Json(conversations))
}

/// The message thread with one user, newest first, cursor paginated.
pub async fn list_thread(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(peer_id): Path<i64>,
    Query(params): Query<MessageListParams>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id();
    let limit = params.limit.unwrap_or(50).min(200);

    let messages = sqlx::query_as::<_, Message>(
        r#"
        SELECT id, sender_id, recipient_id, content, read_at, created_at
        FROM messages
        WHERE ((sender_id = $1 AND recipient_id = $2)
            OR (sender_id = $2 AND recipient_id = $1))
          AND ($3::TIMESTAMPTZ IS NULL OR created_at < $3)
        ORDER BY created_at DESC
        LIMIT $4
        "#,
    )
    .bind(user_id)
    .bind(peer_id)
    .bind(params.cursor)
    .bind(limit)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(messages))
}

/// Mark every message from a user as read.
pub async fn mark_thread_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(peer_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id();

    let result = sqlx::query(
        r#"
        UPDATE messages SET read_at = NOW()
        WHERE recipient_id = $1 AND sender_id = $2 AND read_at IS NULL
        "#,
    )
    .bind(user_id)
    .bind(peer_id)
    .execute(&state.pool)
    .await?;

    Ok(Json(serde_json::json!({ "updated": result.rows_affected() })))
}
