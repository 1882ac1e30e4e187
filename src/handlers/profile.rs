use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use sqlx::FromRow;
use url::Url;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        post::{Post, PostListParams},
        user::{FavoritePostResponse, MeResponse, ProfileResponse, UpdateProfileRequest},
    },
    state::AppState,
    utils::jwt::{Claims, OptionalClaims},
};

#[derive(FromRow)]
struct ProfileCounts {
    posts_count: i64,
    followers_count: i64,
    following_count: i64,
}

async fn profile_counts(state: &AppState, user_id: i64) -> Result<ProfileCounts, AppError> {
    // Subqueries are fine here given the indexes on user_id / followee_id.
    let counts = sqlx::query_as::<_, ProfileCounts>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM posts WHERE user_id = $1 AND deleted_at IS NULL) AS posts_count,
            (SELECT COUNT(*) FROM follows WHERE followee_id = $1 AND deleted_at IS NULL) AS followers_count,
            (SELECT COUNT(*) FROM follows WHERE follower_id = $1 AND deleted_at IS NULL) AS following_count
        "#,
    )
    .bind(user_id)
    .fetch_one(&state.pool)
    .await?;
    Ok(counts)
}

/// Get current user's profile and statistics.
pub async fn get_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id();

    #[derive(FromRow)]
    struct MeRow {
        id: i64,
        username: String,
        role: String,
        status: String,
        bio: Option<String>,
        avatar_url: Option<String>,
        created_at: Option<chrono::DateTime<chrono::Utc>>,
        total_likes_received: i64,
    }

    let me = sqlx::query_as::<_, MeRow>(
        r#"
        SELECT
            u.id, u.username, u.role, u.status, u.bio, u.avatar_url, u.created_at,
            (SELECT COUNT(*)
             FROM post_likes pl
             JOIN posts p ON pl.post_id = p.id
             WHERE p.user_id = u.id AND pl.deleted_at IS NULL) AS total_likes_received
        FROM users u
        WHERE u.id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or(AppError::NotFound("User not found".to_string()))?;

    let counts = profile_counts(&state, user_id).await?;

    Ok(Json(MeResponse {
        id: me.id,
        username: me.username,
        role: me.role,
        status: me.status,
        bio: me.bio,
        avatar_url: me.avatar_url,
        created_at: me.created_at,
        posts_count: counts.posts_count,
        followers_count: counts.followers_count,
        following_count: counts.following_count,
        total_likes_received: me.total_likes_received,
    }))
}

/// Update the current user's bio and avatar.
pub async fn update_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    if let Some(avatar_url) = &payload.avatar_url {
        Url::parse(avatar_url)
            .map_err(|_| AppError::BadRequest("Invalid avatar URL".to_string()))?;
    }

    let user_id = claims.user_id();

    if payload.bio.is_none() && payload.avatar_url.is_none() {
        return Ok(Json(serde_json::json!({ "updated": false })));
    }

    if let Some(bio) = payload.bio {
        sqlx::query("UPDATE users SET bio = $1 WHERE id = $2")
            .bind(bio)
            .bind(user_id)
            .execute(&state.pool)
            .await?;
    }

    if let Some(avatar_url) = payload.avatar_url {
        sqlx::query("UPDATE users SET avatar_url = $1 WHERE id = $2")
            .bind(avatar_url)
            .bind(user_id)
            .execute(&state.pool)
            .await?;
    }

    Ok(Json(serde_json::json!({ "updated": true })))
}

/// Public profile of any user, with the caller's follow status.
pub async fn get_user(
    State(state): State<AppState>,
    OptionalClaims(claims): OptionalClaims,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    #[derive(FromRow)]
    struct UserRow {
        id: i64,
        username: String,
        bio: Option<String>,
        avatar_url: Option<String>,
        created_at: Option<chrono::DateTime<chrono::Utc>>,
    }

    let user = sqlx::query_as::<_, UserRow>(
        "SELECT id, username, bio, avatar_url, created_at
         FROM users WHERE id = $1 AND status = 'active'",
    )
    .bind(user_id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or(AppError::NotFound("User not found".to_string()))?;

    let counts = profile_counts(&state, user_id).await?;

    let is_following = match &claims {
        Some(claims) => {
            let (following,): (bool,) = sqlx::query_as(
                "SELECT EXISTS (SELECT 1 FROM follows
                 WHERE follower_id = $1 AND followee_id = $2 AND deleted_at IS NULL)",
            )
            .bind(claims.user_id())
            .bind(user_id)
            .fetch_one(&state.pool)
            .await?;
            following
        }
        None => false,
    };

    Ok(Json(ProfileResponse {
        id: user.id,
        username: user.username,
        bio: user.bio,
        avatar_url: user.avatar_url,
        created_at: user.created_at,
        posts_count: counts.posts_count,
        followers_count: counts.followers_count,
        following_count: counts.following_count,
        is_following,
    }))
}

/// List posts created by the current user.
/// Includes real interaction status (is_liked, is_favorited).
pub async fn list_my_posts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<PostListParams>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id();
    let limit = params.limit.unwrap_or(20).min(100);

    let posts = sqlx::query_as::<_, Post>(
        r#"
        SELECT
            p.id, p.user_id, p.title, p.content,
            p.created_at, p.updated_at, p.deleted_at,
            p.likes_count, p.comments_count, p.favorites_count, p.views_count,
            p.is_recommended, p.is_hidden,
            (pl.user_id IS NOT NULL) AS is_liked,
            (pf.user_id IS NOT NULL) AS is_favorited
        FROM posts p
        LEFT JOIN post_likes pl
            ON p.id = pl.post_id AND pl.user_id = $1 AND pl.deleted_at IS NULL
        LEFT JOIN post_favorites pf
            ON p.id = pf.post_id AND pf.user_id = $1 AND pf.deleted_at IS NULL
        WHERE p.user_id = $1 AND p.deleted_at IS NULL
          AND ($2::TIMESTAMPTZ IS NULL OR p.created_at < $2)
        ORDER BY p.created_at DESC
        LIMIT $3
        "#,
    )
    .bind(user_id)
    .bind(params.cursor)
    .bind(limit)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(posts))
}

/// List posts favorited by the current user.
pub async fn list_my_favorites(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id();

    let favorites = sqlx::query_as::<_, FavoritePostResponse>(
        r#"
        SELECT
            f.post_id, p.title, u.username AS author_username,
            f.created_at AS favorited_at
        FROM post_favorites f
        JOIN posts p ON f.post_id = p.id
        JOIN users u ON p.user_id = u.id
        WHERE f.user_id = $1 AND f.deleted_at IS NULL AND p.deleted_at IS NULL
        ORDER BY f.created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(favorites))
}
