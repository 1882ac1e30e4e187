// src/routes.rs

use axum::{
    Router,
    http::Method,
    middleware,
    routing::{delete, get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{
        admin, auth, comment, community, event, follow, interaction, message, notification,
        profile, search, topic,
    },
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Nests one sub-router per resource under /api.
/// * Protected routes sit in merged sub-routers behind the auth middleware.
/// * Applies global middleware (Trace, CORS) and injects the app state.
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let post_routes = Router::new()
        .route("/", get(community::list_posts))
        .route("/recommended", get(community::recommended_feed))
        .route("/{id}", get(community::get_post))
        .route("/{id}/comments", get(comment::list_comments))
        .merge(
            Router::new()
                .route("/", post(community::create_post))
                .route(
                    "/{id}",
                    put(community::update_post).delete(community::delete_post),
                )
                .route("/{id}/comments", post(comment::create_comment))
                .route(
                    "/{id}/like",
                    put(interaction::like_post).delete(interaction::unlike_post),
                )
                .route(
                    "/{id}/favorite",
                    put(interaction::favorite_post).delete(interaction::unfavorite_post),
                )
                .layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        );

    let comment_routes = Router::new()
        .route("/{id}", delete(comment::delete_comment))
        .route(
            "/{id}/like",
            put(interaction::like_comment).delete(interaction::unlike_comment),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let user_routes = Router::new()
        .route("/{id}", get(profile::get_user))
        .route("/{id}/followers", get(follow::list_followers))
        .route("/{id}/following", get(follow::list_following))
        .merge(
            Router::new()
                .route(
                    "/{id}/follow",
                    put(follow::follow_user).delete(follow::unfollow_user),
                )
                .layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        );

    let me_routes = Router::new()
        .route("/", get(profile::get_me).put(profile::update_me))
        .route("/posts", get(profile::list_my_posts))
        .route("/favorites", get(profile::list_my_favorites))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let topic_routes = Router::new()
        .route("/", get(topic::list_topics))
        .route("/trending", get(topic::trending_topics))
        .route("/{name}", get(topic::get_topic))
        .route("/{name}/posts", get(topic::list_topic_posts));

    let event_routes = Router::new()
        .route("/", get(event::list_events))
        .route("/{id}", get(event::get_event))
        .merge(
            Router::new()
                .route("/", post(event::create_event))
                .route("/{id}", delete(event::delete_event))
                .route(
                    "/{id}/register",
                    put(event::register).delete(event::cancel_registration),
                )
                .layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        );

    let message_routes = Router::new()
        .route("/", post(message::send_message))
        .route("/conversations", get(message::list_conversations))
        .route("/{user_id}", get(message::list_thread))
        .route("/{user_id}/read", put(message::mark_thread_read))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let notification_routes = Router::new()
        .route("/", get(notification::list_notifications))
        .route("/unread-count", get(notification::unread_count))
        .route("/read", put(notification::mark_read))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let search_routes = Router::new().route("/", get(search::search));

    let admin_routes = Router::new()
        .route("/users", get(admin::list_users).post(admin::create_user))
        .route(
            "/users/{id}",
            put(admin::update_user).delete(admin::delete_user),
        )
        .route("/posts/{id}/recommend", put(admin::recommend_post))
        .route("/posts/{id}/visibility", put(admin::set_post_visibility))
        .route("/topics/{id}/feature", put(admin::feature_topic))
        .route("/events/{id}", delete(event::delete_event))
        .route(
            "/settings",
            get(admin::get_settings).put(admin::update_settings),
        )
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/posts", post_routes)
        .nest("/api/comments", comment_routes)
        .nest("/api/users", user_routes)
        .nest("/api/me", me_routes)
        .nest("/api/topics", topic_routes)
        .nest("/api/events", event_routes)
        .nest("/api/messages", message_routes)
        .nest("/api/notifications", notification_routes)
        .nest("/api/search", search_routes)
        .nest("/api/admin", admin_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
