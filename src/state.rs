use std::time::Duration;

use axum::extract::FromRef;
use moka::sync::Cache;
use sqlx::PgPool;

use crate::config::Config;
use crate::utils::view_guard::ViewGuard;

/// How long a computed unread-notification count stays valid.
const UNREAD_COUNT_TTL: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    /// Debounces view counting per (resource, viewer). Process-local.
    pub view_guard: ViewGuard,
    /// Short-lived cache of unread notification counts, keyed by user id.
    /// Invalidated whenever a notification is created or marked read.
    pub unread_counts: Cache<i64, i64>,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        Self {
            pool,
            config,
            view_guard: ViewGuard::new(),
            unread_counts: Cache::builder()
                .time_to_live(UNREAD_COUNT_TTL)
                .max_capacity(10_000)
                .build(),
        }
    }
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for ViewGuard {
    fn from_ref(state: &AppState) -> Self {
        state.view_guard.clone()
    }
}
