use std::time::Duration;

use moka::sync::Cache;

/// Window within which repeat views by the same viewer are not counted.
const VIEW_DEBOUNCE: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    Post,
    Topic,
}

/// Remembers which (resource, viewer) pairs were counted recently so rapid
/// refreshes do not inflate view counters.
///
/// Held in process memory: entries are lost on restart and are not shared
/// across instances. Acceptable for a single-instance deployment only.
#[derive(Clone)]
pub struct ViewGuard {
    seen: Cache<(ViewKind, i64, String), ()>,
}

impl ViewGuard {
    pub fn new() -> Self {
        Self::with_window(VIEW_DEBOUNCE)
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            seen: Cache::builder()
                .time_to_live(window)
                .max_capacity(100_000)
                .build(),
        }
    }

    /// Returns true the first time a viewer hits a resource inside the
    /// debounce window; the caller should then increment the counter.
    pub fn should_count(&self, kind: ViewKind, id: i64, viewer: &str) -> bool {
        let key = (kind, id, viewer.to_owned());
        if self.seen.contains_key(&key) {
            return false;
        }
        self.seen.insert(key, ());
        true
    }
}

impl Default for ViewGuard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_view_counts_second_does_not() {
        let guard = ViewGuard::new();
        assert!(guard.should_count(ViewKind::Post, 1, "42"));
        assert!(!guard.should_count(ViewKind::Post, 1, "42"));
    }

    #[test]
    fn distinct_viewers_both_count() {
        let guard = ViewGuard::new();
        assert!(guard.should_count(ViewKind::Post, 1, "42"));
        assert!(guard.should_count(ViewKind::Post, 1, "10.0.0.7"));
    }

    #[test]
    fn kinds_are_independent() {
        let guard = ViewGuard::new();
        assert!(guard.should_count(ViewKind::Post, 1, "42"));
        assert!(guard.should_count(ViewKind::Topic, 1, "42"));
    }

    #[test]
    fn window_expiry_allows_recount() {
        let guard = ViewGuard::with_window(Duration::from_millis(50));
        assert!(guard.should_count(ViewKind::Post, 9, "42"));
        std::thread::sleep(Duration::from_millis(80));
        assert!(guard.should_count(ViewKind::Post, 9, "42"));
    }
}
