use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use validator::Validate;

use crate::{
    error::AppError,
    models::event::{CreateEventRequest, Event, EventListParams},
    state::AppState,
    utils::{
        html::clean_html,
        jwt::{Claims, OptionalClaims},
    },
};

/// Create a new event.
pub async fn create_event(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateEventRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    if let Some(ends_at) = payload.ends_at {
        if ends_at <= payload.starts_at {
            return Err(AppError::BadRequest(
                "Event must end after it starts".to_string(),
            ));
        }
    }

    let user_id = claims.user_id();
    let description = clean_html(&payload.description);

    let (event_id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO events (user_id, title, description, location, starts_at, ends_at, capacity)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(&payload.title)
    .bind(&description)
    .bind(&payload.location)
    .bind(payload.starts_at)
    .bind(payload.ends_at)
    .bind(payload.capacity.unwrap_or(0))
    .fetch_one(&state.pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create event: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({"id": event_id})),
    ))
}

/// List events, soonest first. Upcoming only unless `include_past=true`.
pub async fn list_events(
    State(state): State<AppState>,
    Query(params): Query<EventListParams>,
) -> Result<impl IntoResponse, AppError> {
    let limit = params.limit.unwrap_or(20).min(100);
    let include_past = params.include_past.unwrap_or(false);

    let events = sqlx::query_as::<_, Event>(
        r#"
        SELECT
            id, user_id, title, description, location,
            starts_at, ends_at, capacity, registrations_count,
            created_at, deleted_at
        FROM events
        WHERE deleted_at IS NULL
          AND ($1 OR starts_at >= NOW())
          AND ($2::TIMESTAMPTZ IS NULL OR starts_at > $2)
        ORDER BY starts_at ASC
        LIMIT $3
        "#,
    )
    .bind(include_past)
    .bind(params.cursor)
    .bind(limit)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(events))
}

/// Get a single event, with the caller's registration status.
pub async fn get_event(
    State(state): State<AppState>,
    OptionalClaims(claims): OptionalClaims,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut event = sqlx::query_as::<_, Event>(
        r#"
        SELECT
            id, user_id, title, description, location,
            starts_at, ends_at, capacity, registrations_count,
            created_at, deleted_at
        FROM events
        WHERE id = $1 AND deleted_at IS NULL
        "#,
    )
    .bind(id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or(AppError::NotFound("Event not found".to_string()))?;

    if let Some(claims) = &claims {
        let (registered,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM event_registrations
             WHERE user_id = $1 AND event_id = $2 AND deleted_at IS NULL)",
        )
        .bind(claims.user_id())
        .bind(id)
        .fetch_one(&state.pool)
        .await?;
        event.is_registered = registered;
    }

    Ok(Json(event))
}

/// Register for an event. Re-registering is a no-op success; a cancelled
/// registration is restored. Capacity is enforced inside the transaction.
pub async fn register(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(event_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id();

    let mut tx = state.pool.begin().await?;

    let event: Option<(i32, i32, DateTime<Utc>)> = sqlx::query_as(
        "SELECT capacity, registrations_count, starts_at
         FROM events WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(event_id)
    .fetch_optional(&mut *tx)
    .await?;
    let (capacity, registrations_count, starts_at) =
        event.ok_or(AppError::NotFound("Event not found".to_string()))?;

    if starts_at <= Utc::now() {
        return Err(AppError::BadRequest(
            "Event has already started".to_string(),
        ));
    }

    let row: Option<(Option<DateTime<Utc>>,)> = sqlx::query_as(
        "SELECT deleted_at FROM event_registrations WHERE user_id = $1 AND event_id = $2",
    )
    .bind(user_id)
    .bind(event_id)
    .fetch_optional(&mut *tx)
    .await?;

    let already_registered = matches!(row, Some((None,)));
    if !already_registered {
        // 0 capacity means unlimited.
        if capacity > 0 && registrations_count >= capacity {
            return Err(AppError::Conflict("Event is full".to_string()));
        }

        match row {
            Some((Some(_),)) => {
                sqlx::query(
                    "UPDATE event_registrations SET deleted_at = NULL, created_at = NOW()
                     WHERE user_id = $1 AND event_id = $2",
                )
                .bind(user_id)
                .bind(event_id)
                .execute(&mut *tx)
                .await?;
            }
            _ => {
                sqlx::query(
                    "INSERT INTO event_registrations (user_id, event_id) VALUES ($1, $2)",
                )
                .bind(user_id)
                .bind(event_id)
                .execute(&mut *tx)
                .await?;
            }
        }

        sqlx::query(
            "UPDATE events SET registrations_count = registrations_count + 1 WHERE id = $1",
        )
        .bind(event_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    Ok(Json(serde_json::json!({ "registered": true })))
}

/// Cancel a registration. Succeeds even when not registered.
pub async fn cancel_registration(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(event_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id();

    let mut tx = state.pool.begin().await?;

    let active: Option<(i32,)> = sqlx::query_as(
        "SELECT 1 FROM event_registrations
         WHERE user_id = $1 AND event_id = $2 AND deleted_at IS NULL",
    )
    .bind(user_id)
    .bind(event_id)
    .fetch_optional(&mut *tx)
    .await?;

    if active.is_some() {
        sqlx::query(
            "UPDATE event_registrations SET deleted_at = NOW()
             WHERE user_id = $1 AND event_id = $2",
        )
        .bind(user_id)
        .bind(event_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE events SET registrations_count = GREATEST(0, registrations_count - 1)
             WHERE id = $1",
        )
        .bind(event_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    Ok(Json(serde_json::json!({ "registered": false })))
}

/// Delete an event (soft delete). Creator or admin only.
pub async fn delete_event(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let event: Option<(i64,)> =
        sqlx::query_as("SELECT user_id FROM events WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(&state.pool)
            .await?;
    let (creator_id,) = event.ok_or(AppError::NotFound("Event not found".to_string()))?;

    if creator_id != claims.user_id() && claims.role != "admin" {
        return Err(AppError::Forbidden(
            "You are not authorized to delete this event".to_string(),
        ));
    }

    sqlx::query("UPDATE events SET deleted_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(&state.pool)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
