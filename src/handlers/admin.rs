// src/handlers/admin.rs

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use sqlx::{PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    error::AppError,
    models::user::User,
    ranking::RankingConfig,
    utils::{hash::hash_password, jwt::Claims},
};

/// Lists all users in the system.
/// Admin only.
pub async fn list_users(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let users = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, password, role, status, bio, avatar_url, created_at
        FROM users
        ORDER BY id DESC
        "#,
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list users: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(users))
}

/// DTO for Admin creating a user (can specify role).
#[derive(Debug, Deserialize, Validate)]
pub struct AdminCreateUserRequest {
    #[validate(length(
        min = 3,
        max = 50,
        message = "Username length must be between 3 and 50 characters."
    ))]
    pub username: String,
    #[validate(length(
        min = 4,
        max = 128,
        message = "Password length must be between 4 and 128 characters."
    ))]
    pub password: String,
    pub role: String, // 'user' or 'admin'
}

/// Creates a new user with specific role.
/// Admin only.
pub async fn create_user(
    State(pool): State<PgPool>,
    Json(payload): Json<AdminCreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    if payload.role != "user" && payload.role != "admin" {
        return Err(AppError::BadRequest("Invalid role".to_string()));
    }

    let hashed_password = hash_password(&payload.password)?;

    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO users (username, password, role)
        VALUES ($1, $2, $3)
        RETURNING id
        "#,
    )
    .bind(&payload.username)
    .bind(&hashed_password)
    .bind(&payload.role)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        if e.to_string().contains("unique constraint") || e.to_string().contains("23505") {
            AppError::Conflict(format!("Username '{}' already exists", payload.username))
        } else {
            tracing::error!("Failed to create user: {:?}", e);
            AppError::InternalServerError(e.to_string())
        }
    })?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({"id": id}))))
}

/// DTO for updating a user. Fields are optional.
#[derive(Debug, Deserialize)]
pub struct AdminUpdateUserRequest {
    pub role: Option<String>,
    pub status: Option<String>,
    pub password: Option<String>,
}

/// Updates a user's role, status or password.
/// Admin only.
pub async fn update_user(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<AdminUpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    // Check existence
    let _exists: (i64,) = sqlx::query_as("SELECT id FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    if let Some(role) = &payload.role {
        if role != "user" && role != "admin" {
            return Err(AppError::BadRequest("Invalid role".to_string()));
        }
    }
    if let Some(status) = &payload.status {
        if status != "active" && status != "banned" {
            return Err(AppError::BadRequest("Invalid status".to_string()));
        }
    }

    // Perform updates sequentially if fields are present
    if let Some(new_role) = payload.role {
        sqlx::query("UPDATE users SET role = $1 WHERE id = $2")
            .bind(new_role)
            .bind(id)
            .execute(&pool)
            .await?;
    }

    if let Some(new_status) = payload.status {
        sqlx::query("UPDATE users SET status = $1 WHERE id = $2")
            .bind(new_status)
            .bind(id)
            .execute(&pool)
            .await?;
    }

    if let Some(new_password) = payload.password {
        let hashed = hash_password(&new_password)?;
        sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
            .bind(hashed)
            .bind(id)
            .execute(&pool)
            .await?;
    }

    Ok(StatusCode::OK)
}

/// Deletes a user by ID.
/// Admin only. Prevents deleting self.
pub async fn delete_user(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    // Prevent self-deletion
    if id == claims.user_id() {
        return Err(AppError::BadRequest("Cannot delete yourself".to_string()));
    }

    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete user: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct RecommendRequest {
    pub recommended: bool,
}

/// Flags or unflags a post as admin-recommended; flagged posts are pinned
/// ahead of the scored feed. Admin only.
pub async fn recommend_post(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<RecommendRequest>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query(
        "UPDATE posts SET is_recommended = $1 WHERE id = $2 AND deleted_at IS NULL",
    )
    .bind(payload.recommended)
    .bind(id)
    .execute(&pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Post not found".to_string()));
    }

    Ok(Json(serde_json::json!({ "recommended": payload.recommended })))
}

#[derive(Debug, Deserialize)]
pub struct VisibilityRequest {
    pub hidden: bool,
}

/// Hides a post from all non-admin surfaces, or restores it. Admin only.
pub async fn set_post_visibility(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<VisibilityRequest>,
) -> Result<impl IntoResponse, AppError> {
    let result =
        sqlx::query("UPDATE posts SET is_hidden = $1 WHERE id = $2 AND deleted_at IS NULL")
            .bind(payload.hidden)
            .bind(id)
            .execute(&pool)
            .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Post not found".to_string()));
    }

    Ok(Json(serde_json::json!({ "hidden": payload.hidden })))
}

#[derive(Debug, Deserialize)]
pub struct FeatureRequest {
    pub featured: bool,
}

/// Features or unfeatures a topic; featured topics always lead the
/// trending widget. Admin only.
pub async fn feature_topic(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<FeatureRequest>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("UPDATE topics SET is_featured = $1 WHERE id = $2")
        .bind(payload.featured)
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Topic not found".to_string()));
    }

    Ok(Json(serde_json::json!({ "featured": payload.featured })))
}

/// Current effective ranking settings (stored rows overlaid on defaults).
/// Admin only.
pub async fn get_settings(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let cfg = RankingConfig::load(&pool).await?;
    Ok(Json(cfg))
}

/// Upserts ranking settings. Only known keys are accepted; values must be
/// non-negative and finite (decay and window keys strictly positive).
/// Admin only.
pub async fn update_settings(
    State(pool): State<PgPool>,
    Json(payload): Json<HashMap<String, f64>>,
) -> Result<impl IntoResponse, AppError> {
    if payload.is_empty() {
        return Err(AppError::BadRequest("No settings provided".to_string()));
    }

    for (key, value) in &payload {
        if !RankingConfig::KEYS.contains(&key.as_str()) {
            return Err(AppError::BadRequest(format!("Unknown setting '{key}'")));
        }
        if !value.is_finite() || *value < 0.0 {
            return Err(AppError::BadRequest(format!(
                "Setting '{key}' must be a non-negative number"
            )));
        }
        let strictly_positive = matches!(
            key.as_str(),
            "time_decay_days" | "max_age_days" | "topic_recent_days" | "max_hot_topics"
        );
        if strictly_positive && *value <= 0.0 {
            return Err(AppError::BadRequest(format!(
                "Setting '{key}' must be positive"
            )));
        }
    }

    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO settings (key, value) ");
    builder.push_values(&payload, |mut b, (key, value)| {
        b.push_bind(key.as_str()).push_bind(value.to_string());
    });
    builder.push(" ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()");
    builder.build().execute(&pool).await?;

    let cfg = RankingConfig::load(&pool).await?;
    Ok(Json(cfg))
}
