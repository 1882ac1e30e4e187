// tests/api_tests.rs

use campuslink::{config::Config, routes, state::AppState};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Spawns the app on a random port and returns its base URL plus a pool
/// for direct seeding. Returns None (skipping the test) when DATABASE_URL
/// is not set, so the suite can run without a database.
async fn spawn_app() -> Option<(String, PgPool)> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping integration test");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = Config {
        database_url: database_url.clone(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        admin_username: None,
        admin_password: None,
    };

    let state = AppState::new(pool.clone(), config);
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Some((address, pool))
}

/// Registers a fresh user and logs them in. Returns (user id, token).
async fn register_and_login(
    client: &reqwest::Client,
    address: &str,
    prefix: &str,
) -> (i64, String) {
    let username = format!("{}_{}", prefix, &uuid::Uuid::new_v4().to_string()[..8]);
    let password = "password123";

    let created = client
        .post(&format!("{}/api/auth/register", address))
        .json(&serde_json::json!({"username": username, "password": password}))
        .send()
        .await
        .expect("Register failed")
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse register json");
    let id = created["id"].as_i64().expect("User id missing");

    let login = client
        .post(&format!("{}/api/auth/login", address))
        .json(&serde_json::json!({"username": username, "password": password}))
        .send()
        .await
        .expect("Login failed")
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse login json");
    let token = login["token"].as_str().expect("Token missing").to_string();

    (id, token)
}

#[tokio::test]
async fn health_check_404() {
    let Some((address, _pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();

    let response = client
        .get(&format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn register_works() {
    let Some((address, _pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();
    let unique_name = format!("u_{}", &uuid::Uuid::new_v4().to_string()[..8]);

    let response = client
        .post(&format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "username": unique_name,
            "password": "password123"
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 201);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["username"], unique_name);
    // The password hash must never leak.
    assert!(body.get("password").is_none());
}

#[tokio::test]
async fn register_fails_validation() {
    let Some((address, _pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();

    // Username too short.
    let response = client
        .post(&format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "username": "yo",
            "password": "password123"
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn duplicate_username_is_a_conflict() {
    let Some((address, _pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();
    let unique_name = format!("u_{}", &uuid::Uuid::new_v4().to_string()[..8]);
    let payload = serde_json::json!({"username": unique_name, "password": "password123"});

    let first = client
        .post(&format!("{}/api/auth/register", address))
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(first.status().as_u16(), 201);

    let second = client
        .post(&format!("{}/api/auth/register", address))
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(second.status().as_u16(), 409);
}

#[tokio::test]
async fn login_with_wrong_password_is_unauthorized() {
    let Some((address, _pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();
    let unique_name = format!("u_{}", &uuid::Uuid::new_v4().to_string()[..8]);

    client
        .post(&format!("{}/api/auth/register", address))
        .json(&serde_json::json!({"username": unique_name, "password": "password123"}))
        .send()
        .await
        .unwrap();

    let response = client
        .post(&format!("{}/api/auth/login", address))
        .json(&serde_json::json!({"username": unique_name, "password": "wrong"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    let Some((address, _pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();

    let response = client
        .post(&format!("{}/api/posts", address))
        .json(&serde_json::json!({"title": "T", "content": "C"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn like_twice_counts_once() {
    let Some((address, _pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();

    // 1. A creates a post, B will like it.
    let (_a_id, token_a) = register_and_login(&client, &address, "la").await;
    let (_b_id, token_b) = register_and_login(&client, &address, "lb").await;

    let post: serde_json::Value = client
        .post(&format!("{}/api/posts", address))
        .header("Authorization", format!("Bearer {}", token_a))
        .json(&serde_json::json!({"title": "Like me", "content": "please"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let post_id = post["id"].as_i64().unwrap();

    // 2. B likes twice in a row: second call must succeed without
    //    incrementing again.
    for _ in 0..2 {
        let resp = client
            .put(&format!("{}/api/posts/{}/like", address, post_id))
            .header("Authorization", format!("Bearer {}", token_b))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);
    }

    let detail: serde_json::Value = client
        .get(&format!("{}/api/posts/{}", address, post_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(detail["likes_count"], 1);

    // 3. Unlike drops the counter back to zero; unliking again is a no-op.
    for _ in 0..2 {
        let resp = client
            .delete(&format!("{}/api/posts/{}/like", address, post_id))
            .header("Authorization", format!("Bearer {}", token_b))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);
    }

    let detail: serde_json::Value = client
        .get(&format!("{}/api/posts/{}", address, post_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(detail["likes_count"], 0);

    // 4. Re-liking restores the soft-deleted row: back to exactly 1,
    //    not 2.
    client
        .put(&format!("{}/api/posts/{}/like", address, post_id))
        .header("Authorization", format!("Bearer {}", token_b))
        .send()
        .await
        .unwrap();

    let detail: serde_json::Value = client
        .get(&format!("{}/api/posts/{}", address, post_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(detail["likes_count"], 1);
}

#[tokio::test]
async fn comment_threading_and_counters() {
    let Some((address, _pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();

    let (_a_id, token_a) = register_and_login(&client, &address, "ca").await;
    let (_b_id, token_b) = register_and_login(&client, &address, "cb").await;

    let post: serde_json::Value = client
        .post(&format!("{}/api/posts", address))
        .header("Authorization", format!("Bearer {}", token_a))
        .json(&serde_json::json!({"title": "Discuss", "content": "topic"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let post_id = post["id"].as_i64().unwrap();

    // 1. B leaves a root comment.
    let root: serde_json::Value = client
        .post(&format!("{}/api/posts/{}/comments", address, post_id))
        .header("Authorization", format!("Bearer {}", token_b))
        .json(&serde_json::json!({"content": "first!"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let root_id = root["id"].as_i64().unwrap();

    // 2. A replies to the root; B replies to A's reply. Both must share
    //    the root comment's thread.
    let reply: serde_json::Value = client
        .post(&format!("{}/api/posts/{}/comments", address, post_id))
        .header("Authorization", format!("Bearer {}", token_a))
        .json(&serde_json::json!({"content": "welcome", "parent_id": root_id}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let reply_id = reply["id"].as_i64().unwrap();

    client
        .post(&format!("{}/api/posts/{}/comments", address, post_id))
        .header("Authorization", format!("Bearer {}", token_b))
        .json(&serde_json::json!({"content": "thanks", "parent_id": reply_id}))
        .send()
        .await
        .unwrap();

    let comments: Vec<serde_json::Value> = client
        .get(&format!("{}/api/posts/{}/comments", address, post_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(comments.len(), 3);

    // The root comes first; every reply points at the same root.
    assert_eq!(comments[0]["id"].as_i64(), Some(root_id));
    assert!(comments[0]["root_id"].is_null());
    for reply in &comments[1..] {
        assert_eq!(reply["root_id"].as_i64(), Some(root_id));
    }

    let detail: serde_json::Value = client
        .get(&format!("{}/api/posts/{}", address, post_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(detail["comments_count"], 3);

    // 3. Deleting a comment decrements the counter.
    let resp = client
        .delete(&format!("{}/api/comments/{}", address, root_id))
        .header("Authorization", format!("Bearer {}", token_b))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 204);

    let detail: serde_json::Value = client
        .get(&format!("{}/api/posts/{}", address, post_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(detail["comments_count"], 2);
}

#[tokio::test]
async fn follow_flow() {
    let Some((address, _pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();

    let (a_id, token_a) = register_and_login(&client, &address, "fa").await;
    let (b_id, _token_b) = register_and_login(&client, &address, "fb").await;

    // Self-follow is rejected.
    let resp = client
        .put(&format!("{}/api/users/{}/follow", address, a_id))
        .header("Authorization", format!("Bearer {}", token_a))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);

    // A follows B, twice: idempotent.
    for _ in 0..2 {
        let resp = client
            .put(&format!("{}/api/users/{}/follow", address, b_id))
            .header("Authorization", format!("Bearer {}", token_a))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);
    }

    let followers: Vec<serde_json::Value> = client
        .get(&format!("{}/api/users/{}/followers", address, b_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(followers.len(), 1);
    assert_eq!(followers[0]["id"].as_i64(), Some(a_id));

    // B's profile, seen by A, reports the follow.
    let profile: serde_json::Value = client
        .get(&format!("{}/api/users/{}", address, b_id))
        .header("Authorization", format!("Bearer {}", token_a))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(profile["followers_count"], 1);
    assert_eq!(profile["is_following"], true);

    // Unfollow empties the list again.
    client
        .delete(&format!("{}/api/users/{}/follow", address, b_id))
        .header("Authorization", format!("Bearer {}", token_a))
        .send()
        .await
        .unwrap();

    let followers: Vec<serde_json::Value> = client
        .get(&format!("{}/api/users/{}/followers", address, b_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(followers.is_empty());
}

#[tokio::test]
async fn profile_counts_and_favorites() {
    let Some((address, _pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();

    let (_a_id, token_a) = register_and_login(&client, &address, "pa").await;
    let (_b_id, token_b) = register_and_login(&client, &address, "pb").await;

    // 1. A creates two posts.
    let mut post_ids = Vec::new();
    for i in 1..=2 {
        let post: serde_json::Value = client
            .post(&format!("{}/api/posts", address))
            .header("Authorization", format!("Bearer {}", token_a))
            .json(&serde_json::json!({"title": format!("A Post {}", i), "content": "Content"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        post_ids.push(post["id"].as_i64().unwrap());
    }

    // 2. B likes the first and favorites the second.
    client
        .put(&format!("{}/api/posts/{}/like", address, post_ids[0]))
        .header("Authorization", format!("Bearer {}", token_b))
        .send()
        .await
        .unwrap();
    client
        .put(&format!("{}/api/posts/{}/favorite", address, post_ids[1]))
        .header("Authorization", format!("Bearer {}", token_b))
        .send()
        .await
        .unwrap();

    // 3. A's own profile reflects both.
    let me: serde_json::Value = client
        .get(&format!("{}/api/me", address))
        .header("Authorization", format!("Bearer {}", token_a))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me["posts_count"], 2);
    assert_eq!(me["total_likes_received"], 1);

    // 4. B's favorites list carries the joined post info.
    let favorites: Vec<serde_json::Value> = client
        .get(&format!("{}/api/me/favorites", address))
        .header("Authorization", format!("Bearer {}", token_b))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(favorites.len(), 1);
    assert_eq!(favorites[0]["title"], "A Post 2");

    // 5. A's post list marks interaction status.
    let my_posts: Vec<serde_json::Value> = client
        .get(&format!("{}/api/me/posts", address))
        .header("Authorization", format!("Bearer {}", token_a))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(my_posts.len(), 2);
    let first = my_posts
        .iter()
        .find(|p| p["id"].as_i64() == Some(post_ids[0]))
        .unwrap();
    assert_eq!(first["likes_count"], 1);
    assert_eq!(first["is_liked"], false); // A never liked their own post
}

#[tokio::test]
async fn event_registration_respects_capacity() {
    let Some((address, _pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();

    let (_a_id, token_a) = register_and_login(&client, &address, "ea").await;
    let (_b_id, token_b) = register_and_login(&client, &address, "eb").await;

    let starts_at = (chrono::Utc::now() + chrono::Duration::days(7)).to_rfc3339();
    let event: serde_json::Value = client
        .post(&format!("{}/api/events", address))
        .header("Authorization", format!("Bearer {}", token_a))
        .json(&serde_json::json!({
            "title": "Tiny workshop",
            "description": "One seat only",
            "location": "Room 101",
            "starts_at": starts_at,
            "capacity": 1
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let event_id = event["id"].as_i64().unwrap();

    // 1. B takes the only seat; registering again is an idempotent success.
    for _ in 0..2 {
        let resp = client
            .put(&format!("{}/api/events/{}/register", address, event_id))
            .header("Authorization", format!("Bearer {}", token_b))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);
    }

    // 2. A is turned away: the event is full.
    let resp = client
        .put(&format!("{}/api/events/{}/register", address, event_id))
        .header("Authorization", format!("Bearer {}", token_a))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 409);

    // 3. B cancels; the seat frees up and A gets in.
    client
        .delete(&format!("{}/api/events/{}/register", address, event_id))
        .header("Authorization", format!("Bearer {}", token_b))
        .send()
        .await
        .unwrap();

    let resp = client
        .put(&format!("{}/api/events/{}/register", address, event_id))
        .header("Authorization", format!("Bearer {}", token_a))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let detail: serde_json::Value = client
        .get(&format!("{}/api/events/{}", address, event_id))
        .header("Authorization", format!("Bearer {}", token_b))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(detail["registrations_count"], 1);
    assert_eq!(detail["is_registered"], false); // B cancelled
}

#[tokio::test]
async fn message_thread_and_unread_counts() {
    let Some((address, _pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();

    let (a_id, token_a) = register_and_login(&client, &address, "ma").await;
    let (b_id, token_b) = register_and_login(&client, &address, "mb").await;

    // 1. A sends B two messages.
    for text in ["hey", "are you around?"] {
        let resp = client
            .post(&format!("{}/api/messages", address))
            .header("Authorization", format!("Bearer {}", token_a))
            .json(&serde_json::json!({"recipient_id": b_id, "content": text}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 201);
    }

    // 2. B's conversation list shows A with two unread.
    let conversations: Vec<serde_json::Value> = client
        .get(&format!("{}/api/messages/conversations", address))
        .header("Authorization", format!("Bearer {}", token_b))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0]["peer_id"].as_i64(), Some(a_id));
    assert_eq!(conversations[0]["unread_count"], 2);
    assert_eq!(conversations[0]["last_content"], "are you around?");

    // 3. The thread holds both messages, newest first.
    let thread: Vec<serde_json::Value> = client
        .get(&format!("{}/api/messages/{}", address, a_id))
        .header("Authorization", format!("Bearer {}", token_b))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(thread.len(), 2);
    assert_eq!(thread[0]["content"], "are you around?");

    // 4. Marking the thread read zeroes the unread count.
    let marked: serde_json::Value = client
        .put(&format!("{}/api/messages/{}/read", address, a_id))
        .header("Authorization", format!("Bearer {}", token_b))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(marked["updated"], 2);

    let conversations: Vec<serde_json::Value> = client
        .get(&format!("{}/api/messages/conversations", address))
        .header("Authorization", format!("Bearer {}", token_b))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(conversations[0]["unread_count"], 0);

    // Messaging yourself is rejected.
    let resp = client
        .post(&format!("{}/api/messages", address))
        .header("Authorization", format!("Bearer {}", token_a))
        .json(&serde_json::json!({"recipient_id": a_id, "content": "note to self"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
}

#[tokio::test]
async fn notifications_fan_in_from_interactions() {
    let Some((address, _pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();

    let (a_id, token_a) = register_and_login(&client, &address, "na").await;
    let (_b_id, token_b) = register_and_login(&client, &address, "nb").await;

    let post: serde_json::Value = client
        .post(&format!("{}/api/posts", address))
        .header("Authorization", format!("Bearer {}", token_a))
        .json(&serde_json::json!({"title": "Notify me", "content": "when things happen"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let post_id = post["id"].as_i64().unwrap();

    // 1. B likes, comments and follows: three notifications for A.
    client
        .put(&format!("{}/api/posts/{}/like", address, post_id))
        .header("Authorization", format!("Bearer {}", token_b))
        .send()
        .await
        .unwrap();
    client
        .post(&format!("{}/api/posts/{}/comments", address, post_id))
        .header("Authorization", format!("Bearer {}", token_b))
        .json(&serde_json::json!({"content": "nice"}))
        .send()
        .await
        .unwrap();
    client
        .put(&format!("{}/api/users/{}/follow", address, a_id))
        .header("Authorization", format!("Bearer {}", token_b))
        .send()
        .await
        .unwrap();

    let unread: serde_json::Value = client
        .get(&format!("{}/api/notifications/unread-count", address))
        .header("Authorization", format!("Bearer {}", token_a))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(unread["unread"], 3);

    let notifications: Vec<serde_json::Value> = client
        .get(&format!("{}/api/notifications", address))
        .header("Authorization", format!("Bearer {}", token_a))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let kinds: Vec<&str> = notifications
        .iter()
        .filter_map(|n| n["kind"].as_str())
        .collect();
    assert!(kinds.contains(&"like"));
    assert!(kinds.contains(&"comment"));
    assert!(kinds.contains(&"follow"));

    // 2. A liking their own post must NOT self-notify.
    client
        .put(&format!("{}/api/posts/{}/like", address, post_id))
        .header("Authorization", format!("Bearer {}", token_a))
        .send()
        .await
        .unwrap();

    // 3. Mark everything read.
    client
        .put(&format!("{}/api/notifications/read", address))
        .header("Authorization", format!("Bearer {}", token_a))
        .json(&serde_json::json!({}))
        .send()
        .await
        .unwrap();

    let unread: serde_json::Value = client
        .get(&format!("{}/api/notifications/unread-count", address))
        .header("Authorization", format!("Bearer {}", token_a))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(unread["unread"], 0);
}

#[tokio::test]
async fn search_spans_posts_users_and_topics() {
    let Some((address, _pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();

    // A unique marker ties the post title, a hashtag and a username
    // together so the assertions cannot collide with other tests' data.
    let marker = uuid::Uuid::new_v4().simple().to_string()[..10].to_string();
    let username = format!("u{}", marker);
    let password = "password123";

    client
        .post(&format!("{}/api/auth/register", address))
        .json(&serde_json::json!({"username": username, "password": password}))
        .send()
        .await
        .unwrap();
    let login: serde_json::Value = client
        .post(&format!("{}/api/auth/login", address))
        .json(&serde_json::json!({"username": username, "password": password}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let token = login["token"].as_str().unwrap();

    client
        .post(&format!("{}/api/posts", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({
            "title": format!("Announcing {}", marker),
            "content": format!("come to #{}", marker)
        }))
        .send()
        .await
        .unwrap();

    let results: serde_json::Value = client
        .get(&format!("{}/api/search?q={}", address, marker))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(results["posts"].as_array().unwrap().len(), 1);
    assert_eq!(results["users"].as_array().unwrap().len(), 1);
    assert_eq!(results["topics"].as_array().unwrap().len(), 1);
    assert_eq!(results["topics"][0]["name"], marker);

    // Blank queries are rejected.
    let resp = client
        .get(&format!("{}/api/search?q=%20", address))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
}
