use axum::{
    Json,
    extract::{Path, Query, State},
    http::HeaderMap,
    response::IntoResponse,
};
use chrono::{Duration, Utc};

use crate::{
    error::AppError,
    handlers::community::viewer_key,
    models::{
        post::{Post, PostListParams},
        topic::{Topic, TopicListParams, TopicWithRecent, TrendingParams, TrendingTopic},
    },
    ranking::{self, RankingConfig},
    state::AppState,
    utils::{jwt::OptionalClaims, view_guard::ViewKind},
};

/// List topics by overall usage.
pub async fn list_topics(
    State(state): State<AppState>,
    Query(params): Query<TopicListParams>,
) -> Result<impl IntoResponse, AppError> {
    let limit = params.limit.unwrap_or(50).min(100);
    let offset = params.offset.unwrap_or(0).max(0);

    let topics = sqlx::query_as::<_, Topic>(
        r#"
        SELECT id, name, usage_count, views_count, is_featured, created_at
        FROM topics
        ORDER BY usage_count DESC, name ASC
        LIMIT $1 OFFSET $2
        "#,
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(topics))
}

/// The trending widget: featured topics first, then by trending score.
///
/// The score blends long-term usage with activity inside the recent
/// window; weights come from the settings table on every call.
pub async fn trending_topics(
    State(state): State<AppState>,
    Query(params): Query<TrendingParams>,
) -> Result<impl IntoResponse, AppError> {
    let cfg = RankingConfig::load(&state.pool).await?;
    let limit = ranking::hot_topics_limit(params.limit, &cfg);
    let window_start = Utc::now() - Duration::days(cfg.topic_recent_days);

    let topics = sqlx::query_as::<_, TopicWithRecent>(
        r#"
        SELECT
            t.id, t.name, t.usage_count, t.views_count, t.is_featured, t.created_at,
            COALESCE(r.recent, 0) AS recent_posts
        FROM topics t
        LEFT JOIN (
            SELECT pt.topic_id, COUNT(*) AS recent
            FROM post_topics pt
            JOIN posts p ON p.id = pt.post_id
            WHERE p.created_at > $1 AND p.deleted_at IS NULL AND NOT p.is_hidden
            GROUP BY pt.topic_id
        ) r ON r.topic_id = t.id
        "#,
    )
    .bind(window_start)
    .fetch_all(&state.pool)
    .await?;

    let mut trending: Vec<TrendingTopic> = topics
        .into_iter()
        .map(|t| {
            let score = ranking::topic_score(t.usage_count as i64, t.recent_posts, &cfg);
            TrendingTopic {
                id: t.id,
                name: t.name,
                usage_count: t.usage_count,
                views_count: t.views_count,
                is_featured: t.is_featured,
                trending_score: score,
            }
        })
        .collect();

    trending.sort_by(|a, b| {
        ranking::trending_order(
            (a.is_featured, a.trending_score),
            (b.is_featured, b.trending_score),
        )
    });
    trending.truncate(limit as usize);

    Ok(Json(serde_json::json!({ "topics": trending })))
}

/// Get a topic by name. Counts a view, debounced per viewer.
pub async fn get_topic(
    State(state): State<AppState>,
    OptionalClaims(claims): OptionalClaims,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let name = name.to_lowercase();

    let mut topic = sqlx::query_as::<_, Topic>(
        "SELECT id, name, usage_count, views_count, is_featured, created_at
         FROM topics WHERE name = $1",
    )
    .bind(&name)
    .fetch_optional(&state.pool)
    .await?
    .ok_or(AppError::NotFound("Topic not found".to_string()))?;

    let viewer = viewer_key(&claims, &headers);
    if state
        .view_guard
        .should_count(ViewKind::Topic, topic.id, &viewer)
    {
        sqlx::query("UPDATE topics SET views_count = views_count + 1 WHERE id = $1")
            .bind(topic.id)
            .execute(&state.pool)
            .await?;
        topic.views_count += 1;
    }

    Ok(Json(topic))
}

/// List the visible posts carrying a topic, newest first.
pub async fn list_topic_posts(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<PostListParams>,
) -> Result<impl IntoResponse, AppError> {
    let name = name.to_lowercase();
    let limit = params.limit.unwrap_or(20).min(100);

    let topic: Option<(i64,)> = sqlx::query_as("SELECT id FROM topics WHERE name = $1")
        .bind(&name)
        .fetch_optional(&state.pool)
        .await?;
    let (topic_id,) = topic.ok_or(AppError::NotFound("Topic not found".to_string()))?;

    let posts = sqlx::query_as::<_, Post>(
        r#"
        SELECT
            p.id, p.user_id, p.title, p.content,
            p.created_at, p.updated_at, p.deleted_at,
            p.likes_count, p.comments_count, p.favorites_count, p.views_count,
            p.is_recommended, p.is_hidden
        FROM posts p
        JOIN post_topics pt ON pt.post_id = p.id
        WHERE pt.topic_id = $1 AND p.deleted_at IS NULL AND NOT p.is_hidden
          AND ($2::TIMESTAMPTZ IS NULL OR p.created_at < $2)
        ORDER BY p.created_at DESC
        LIMIT $3
        "#,
    )
    .bind(topic_id)
    .bind(params.cursor)
    .bind(limit)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(posts))
}
