use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use chrono::{Duration, Utc};
use regex::Regex;
use sqlx::{Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        comment::CommentResponse,
        post::{
            CreatePostRequest, FeedParams, FeedPost, Pagination, Post, PostDetail,
            PostListParams, UpdatePostRequest,
        },
    },
    ranking::{self, Engagement, RankingConfig},
    state::AppState,
    utils::{
        html::clean_html,
        jwt::{Claims, OptionalClaims},
        view_guard::ViewKind,
    },
};

/// At most this many topics are attached to one post.
const MAX_TOPICS_PER_POST: usize = 5;

/// Key identifying the viewer for view debouncing: the user id when logged
/// in, otherwise the client address from the proxy headers.
pub(crate) fn viewer_key(claims: &Option<Claims>, headers: &HeaderMap) -> String {
    if let Some(claims) = claims {
        return claims.sub.clone();
    }

    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        })
        .unwrap_or_else(|| "anonymous".to_string())
}

fn hashtag_regex() -> &'static Regex {
    static HASHTAG: OnceLock<Regex> = OnceLock::new();
    HASHTAG.get_or_init(|| Regex::new(r"#(\w{1,50})").expect("hashtag regex"))
}

/// Normalizes a candidate topic name; None if it is unusable.
fn normalize_topic(raw: &str) -> Option<String> {
    let name = raw.trim().trim_start_matches('#').to_lowercase();
    if name.is_empty() || name.len() > 50 || name.chars().any(char::is_whitespace) {
        return None;
    }
    Some(name)
}

/// Explicit topic names merged with #hashtags found in the content,
/// deduplicated in order of appearance and capped.
fn collect_topics(explicit: Option<&[String]>, content: &str) -> Vec<String> {
    let mut topics = Vec::new();

    let explicit = explicit.unwrap_or(&[]).iter().map(String::as_str);
    let extracted = hashtag_regex()
        .captures_iter(content)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str());

    for raw in explicit.chain(extracted) {
        if let Some(name) = normalize_topic(raw) {
            if !topics.contains(&name) {
                topics.push(name);
            }
        }
        if topics.len() == MAX_TOPICS_PER_POST {
            break;
        }
    }

    topics
}

/// Create a new post.
/// Requires: Login + active (non-banned) account.
pub async fn create_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let user_id = claims.user_id();

    let status: Option<(String,)> = sqlx::query_as("SELECT status FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&state.pool)
        .await?;
    let (status,) = status.ok_or(AppError::NotFound("User not found".to_string()))?;
    if status == "banned" {
        return Err(AppError::Forbidden(
            "Banned accounts cannot post".to_string(),
        ));
    }

    let topics = collect_topics(payload.topics.as_deref(), &payload.content);
    let content = clean_html(&payload.content);

    let mut tx = state.pool.begin().await?;

    let (post_id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO posts (user_id, title, content)
        VALUES ($1, $2, $3)
        RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(&payload.title)
    .bind(&content)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create post: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    // First use creates the topic; later uses bump its counter.
    for name in &topics {
        let (topic_id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO topics (name, usage_count) VALUES ($1, 1)
            ON CONFLICT (name) DO UPDATE SET usage_count = topics.usage_count + 1
            RETURNING id
            "#,
        )
        .bind(name)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO post_topics (post_id, topic_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(post_id)
        .bind(topic_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({"id": post_id, "topics": topics})),
    ))
}

/// List posts (Recent first).
/// Filters out soft-deleted and hidden posts.
/// Supports cursor-based pagination and an optional title keyword.
pub async fn list_posts(
    State(state): State<AppState>,
    Query(params): Query<PostListParams>,
) -> Result<impl IntoResponse, AppError> {
    let limit = params.limit.unwrap_or(20).min(100); // Default 20, max 100
    let keyword = params
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(|q| format!("%{q}%"));

    let posts = sqlx::query_as::<_, Post>(
        r#"
        SELECT
            id, user_id, title, content,
            created_at, updated_at, deleted_at,
            likes_count, comments_count, favorites_count, views_count,
            is_recommended, is_hidden
        FROM posts
        WHERE deleted_at IS NULL AND NOT is_hidden
          AND ($1::TIMESTAMPTZ IS NULL OR created_at < $1)
          AND ($2::TEXT IS NULL OR title ILIKE $2)
        ORDER BY created_at DESC
        LIMIT $3
        "#,
    )
    .bind(params.cursor)
    .bind(keyword)
    .bind(limit)
    .fetch_all(&state.pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list posts: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(posts))
}

/// Get a single post by ID, with its topics and the caller's interaction
/// status. Counts a view, debounced per viewer.
pub async fn get_post(
    State(state): State<AppState>,
    OptionalClaims(claims): OptionalClaims,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut post = sqlx::query_as::<_, Post>(
        r#"
        SELECT
            id, user_id, title, content,
            created_at, updated_at, deleted_at,
            likes_count, comments_count, favorites_count, views_count,
            is_recommended, is_hidden
        FROM posts
        WHERE id = $1 AND deleted_at IS NULL AND NOT is_hidden
        "#,
    )
    .bind(id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or(AppError::NotFound("Post not found".to_string()))?;

    let viewer = viewer_key(&claims, &headers);
    if state.view_guard.should_count(ViewKind::Post, id, &viewer) {
        sqlx::query("UPDATE posts SET views_count = views_count + 1 WHERE id = $1")
            .bind(id)
            .execute(&state.pool)
            .await?;
        post.views_count += 1;
    }

    let topics: Vec<(String,)> = sqlx::query_as(
        r#"
        SELECT t.name
        FROM topics t
        JOIN post_topics pt ON pt.topic_id = t.id
        WHERE pt.post_id = $1
        ORDER BY t.name
        "#,
    )
    .bind(id)
    .fetch_all(&state.pool)
    .await?;

    if let Some(claims) = &claims {
        let user_id = claims.user_id();
        let (liked,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM post_likes
             WHERE user_id = $1 AND post_id = $2 AND deleted_at IS NULL)",
        )
        .bind(user_id)
        .bind(id)
        .fetch_one(&state.pool)
        .await?;
        let (favorited,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM post_favorites
             WHERE user_id = $1 AND post_id = $2 AND deleted_at IS NULL)",
        )
        .bind(user_id)
        .bind(id)
        .fetch_one(&state.pool)
        .await?;
        post.is_liked = liked;
        post.is_favorited = favorited;
    }

    Ok(Json(PostDetail {
        post,
        topics: topics.into_iter().map(|(name,)| name).collect(),
    }))
}

/// Update a post's title/content. Author only.
pub async fn update_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdatePostRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let post: Option<(i64,)> =
        sqlx::query_as("SELECT user_id FROM posts WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(&state.pool)
            .await?;
    let (author_id,) = post.ok_or(AppError::NotFound("Post not found".to_string()))?;

    if author_id != claims.user_id() {
        return Err(AppError::Forbidden(
            "You are not authorized to edit this post".to_string(),
        ));
    }

    if payload.title.is_none() && payload.content.is_none() {
        return Ok(StatusCode::OK);
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE posts SET ");
    let mut separated = builder.separated(", ");

    if let Some(title) = payload.title {
        separated.push("title = ");
        separated.push_bind_unseparated(title);
    }

    if let Some(content) = payload.content {
        separated.push("content = ");
        separated.push_bind_unseparated(clean_html(&content));
    }

    separated.push("updated_at = NOW()");

    builder.push(" WHERE id = ");
    builder.push_bind(id);

    builder.build().execute(&state.pool).await.map_err(|e| {
        tracing::error!("Failed to update post: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(StatusCode::OK)
}

/// Delete a post (Soft Delete).
/// Requires: Login + (Author OR Admin). Releases its topic usage.
pub async fn delete_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id();

    let mut tx = state.pool.begin().await?;

    let post: Option<(i64,)> =
        sqlx::query_as("SELECT user_id FROM posts WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
    let (author_id,) = post.ok_or(AppError::NotFound("Post not found".to_string()))?;

    if author_id != user_id && claims.role != "admin" {
        return Err(AppError::Forbidden(
            "You are not authorized to delete this post".to_string(),
        ));
    }

    sqlx::query("UPDATE posts SET deleted_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        r#"
        UPDATE topics SET usage_count = GREATEST(0, usage_count - 1)
        WHERE id IN (SELECT topic_id FROM post_topics WHERE post_id = $1)
        "#,
    )
    .bind(id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}

/// The recommended feed: admin-curated picks pinned ahead of an
/// engagement-and-recency ranking of recent posts.
///
/// Admin picks appear on page 1 only and are excluded from the paginated
/// total, so no post repeats across pages. Weights come from the settings
/// table on every call.
pub async fn recommended_feed(
    State(state): State<AppState>,
    OptionalClaims(claims): OptionalClaims,
    Query(params): Query<FeedParams>,
) -> Result<impl IntoResponse, AppError> {
    let cfg = RankingConfig::load(&state.pool).await?;
    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(10).clamp(1, 50);

    // Admin picks are fetched on every page: their ids are excluded from
    // the scored candidates so the pagination below stays stable.
    let admin_picks = sqlx::query_as::<_, Post>(
        r#"
        SELECT
            id, user_id, title, content,
            created_at, updated_at, deleted_at,
            likes_count, comments_count, favorites_count, views_count,
            is_recommended, is_hidden
        FROM posts
        WHERE is_recommended AND deleted_at IS NULL AND NOT is_hidden
        ORDER BY created_at DESC
        LIMIT $1
        "#,
    )
    .bind(cfg.max_admin_recommended)
    .fetch_all(&state.pool)
    .await?;

    let admin_ids: Vec<i64> = admin_picks.iter().map(|p| p.id).collect();
    let cutoff = Utc::now() - Duration::days(cfg.max_age_days);

    let candidates = sqlx::query_as::<_, Post>(
        r#"
        SELECT
            id, user_id, title, content,
            created_at, updated_at, deleted_at,
            likes_count, comments_count, favorites_count, views_count,
            is_recommended, is_hidden
        FROM posts
        WHERE deleted_at IS NULL AND NOT is_hidden
          AND created_at > $1
          AND NOT (id = ANY($2))
        "#,
    )
    .bind(cutoff)
    .bind(&admin_ids)
    .fetch_all(&state.pool)
    .await?;

    let now = Utc::now();
    let scored: Vec<(Post, f64)> = candidates
        .into_iter()
        .map(|post| {
            let engagement = Engagement {
                likes: post.likes_count as i64,
                comments: post.comments_count as i64,
                favorites: post.favorites_count as i64,
                views: post.views_count as i64,
            };
            let age = ranking::age_in_days(post.created_at.unwrap_or(now), now);
            let score = ranking::post_score(engagement, age, &cfg);
            (post, score)
        })
        .collect();

    let (page_posts, total) = ranking::rank_and_page(
        scored,
        |a, b| b.created_at.cmp(&a.created_at),
        page,
        limit,
    );

    let mut feed: Vec<FeedPost> = Vec::new();
    if page == 1 {
        feed.extend(admin_picks.into_iter().map(|post| FeedPost {
            post,
            score: None,
            preview_comments: Vec::new(),
        }));
    }
    feed.extend(page_posts.into_iter().map(|(post, score)| FeedPost {
        post,
        score: Some(score),
        preview_comments: Vec::new(),
    }));

    attach_feed_extras(&state, &claims, &mut feed).await?;

    Ok(Json(serde_json::json!({
        "posts": feed,
        "pagination": Pagination { page, limit, total },
    })))
}

/// Batch-attaches preview comments and the caller's like/favorite flags to
/// a feed page: one query per concern, keyed by the page's post ids.
async fn attach_feed_extras(
    state: &AppState,
    claims: &Option<Claims>,
    feed: &mut [FeedPost],
) -> Result<(), AppError> {
    let ids: Vec<i64> = feed.iter().map(|f| f.post.id).collect();
    if ids.is_empty() {
        return Ok(());
    }

    // Two newest top-level comments per post.
    let previews = sqlx::query_as::<_, CommentResponse>(
        r#"
        SELECT id, post_id, user_id, username, content, root_id, parent_id,
               likes_count, created_at
        FROM (
            SELECT c.id, c.post_id, c.user_id, u.username, c.content,
                   c.root_id, c.parent_id, c.likes_count, c.created_at,
                   ROW_NUMBER() OVER (PARTITION BY c.post_id ORDER BY c.created_at DESC) AS rn
            FROM comments c
            JOIN users u ON u.id = c.user_id
            WHERE c.post_id = ANY($1) AND c.deleted_at IS NULL AND c.root_id IS NULL
        ) ranked
        WHERE rn <= 2
        "#,
    )
    .bind(&ids)
    .fetch_all(&state.pool)
    .await?;

    let mut by_post: HashMap<i64, Vec<CommentResponse>> = HashMap::new();
    for comment in previews {
        by_post.entry(comment.post_id).or_default().push(comment);
    }
    for item in feed.iter_mut() {
        if let Some(comments) = by_post.remove(&item.post.id) {
            item.preview_comments = comments;
        }
    }

    let Some(claims) = claims else {
        return Ok(());
    };
    let user_id = claims.user_id();

    let liked: Vec<(i64,)> = sqlx::query_as(
        "SELECT post_id FROM post_likes
         WHERE user_id = $1 AND post_id = ANY($2) AND deleted_at IS NULL",
    )
    .bind(user_id)
    .bind(&ids)
    .fetch_all(&state.pool)
    .await?;
    let liked: HashSet<i64> = liked.into_iter().map(|(id,)| id).collect();

    let favorited: Vec<(i64,)> = sqlx::query_as(
        "SELECT post_id FROM post_favorites
         WHERE user_id = $1 AND post_id = ANY($2) AND deleted_at IS NULL",
    )
    .bind(user_id)
    .bind(&ids)
    .fetch_all(&state.pool)
    .await?;
    let favorited: HashSet<i64> = favorited.into_iter().map(|(id,)| id).collect();

    for item in feed.iter_mut() {
        item.post.is_liked = liked.contains(&item.post.id);
        item.post.is_favorited = favorited.contains(&item.post.id);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashtags_are_extracted_and_normalized() {
        let topics = collect_topics(None, "Exam week! #StudyGroup at the #library #Library");
        assert_eq!(topics, vec!["studygroup", "library"]);
    }

    #[test]
    fn explicit_topics_come_before_extracted_ones() {
        let explicit = vec!["  Sports ".to_string(), "#music".to_string()];
        let topics = collect_topics(Some(&explicit), "see you there #sports #tonight");
        assert_eq!(topics, vec!["sports", "music", "tonight"]);
    }

    #[test]
    fn topic_count_is_capped() {
        let content = "#a #b #c #d #e #f #g";
        let topics = collect_topics(None, content);
        assert_eq!(topics.len(), MAX_TOPICS_PER_POST);
    }

    #[test]
    fn unusable_topic_names_are_dropped() {
        assert_eq!(normalize_topic("   "), None);
        assert_eq!(normalize_topic("two words"), None);
        assert_eq!(normalize_topic("#Fine"), Some("fine".to_string()));
    }

    #[test]
    fn viewer_key_prefers_forwarded_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        assert_eq!(viewer_key(&None, &headers), "203.0.113.7");
    }

    #[test]
    fn viewer_key_falls_back_to_anonymous() {
        assert_eq!(viewer_key(&None, &HeaderMap::new()), "anonymous");
    }
}
