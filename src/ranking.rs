//! Engagement ranking for the recommended feed and trending topics.
//!
//! The scoring functions are pure; the database only appears in
//! [`RankingConfig::load`] and [`ensure_default_settings`]. Handlers load a
//! config per request and pass it down, so weight changes made through the
//! admin settings endpoint take effect on the next call.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

/// Trending widget never returns more than this many topics, whatever the
/// request or the settings say.
pub const MAX_HOT_TOPICS_CEILING: i64 = 20;

/// Posts younger than this (days) with almost no engagement get capped.
const FRESH_AGE_DAYS: f64 = 1.0;
const FRESH_MIN_INTERACTIONS: i64 = 3;
const FRESH_MIN_VIEWS: i64 = 10;
const FRESH_SCORE_CAP: f64 = 0.5;

/// Tunable ranking weights, stored as rows in the `settings` table.
///
/// Every field has a compiled-in default; rows only override.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingConfig {
    pub like_weight: f64,
    pub comment_weight: f64,
    pub collection_weight: f64,
    pub view_weight: f64,
    /// E-folding time of the age decay, in days. The score of an otherwise
    /// unchanged post shrinks by a factor of e every `time_decay_days`.
    pub time_decay_days: f64,
    /// Posts older than this never enter the scored feed.
    pub max_age_days: i64,
    /// How many admin-recommended posts are pinned ahead of the feed.
    pub max_admin_recommended: i64,
    pub topic_base_weight: f64,
    pub topic_recent_weight: f64,
    pub topic_recent_days: i64,
    pub max_hot_topics: i64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            like_weight: 2.0,
            comment_weight: 3.0,
            collection_weight: 4.0,
            view_weight: 0.5,
            time_decay_days: 10.0,
            max_age_days: 30,
            max_admin_recommended: 5,
            topic_base_weight: 0.7,
            topic_recent_weight: 0.3,
            topic_recent_days: 7,
            max_hot_topics: 10,
        }
    }
}

impl RankingConfig {
    /// Every key the settings table may carry for ranking.
    pub const KEYS: [&'static str; 11] = [
        "like_weight",
        "comment_weight",
        "collection_weight",
        "view_weight",
        "time_decay_days",
        "max_age_days",
        "max_admin_recommended",
        "topic_base_weight",
        "topic_recent_weight",
        "topic_recent_days",
        "max_hot_topics",
    ];

    /// The stored text form of a key's default, used when seeding the table.
    pub fn default_value(key: &str) -> Option<String> {
        let d = Self::default();
        let value = match key {
            "like_weight" => d.like_weight.to_string(),
            "comment_weight" => d.comment_weight.to_string(),
            "collection_weight" => d.collection_weight.to_string(),
            "view_weight" => d.view_weight.to_string(),
            "time_decay_days" => d.time_decay_days.to_string(),
            "max_age_days" => d.max_age_days.to_string(),
            "max_admin_recommended" => d.max_admin_recommended.to_string(),
            "topic_base_weight" => d.topic_base_weight.to_string(),
            "topic_recent_weight" => d.topic_recent_weight.to_string(),
            "topic_recent_days" => d.topic_recent_days.to_string(),
            "max_hot_topics" => d.max_hot_topics.to_string(),
            _ => return None,
        };
        Some(value)
    }

    /// Overlay settings rows onto the defaults.
    ///
    /// Unknown keys are ignored; values that fail to parse (or are
    /// nonsensical, like a zero decay time) keep the default.
    pub fn from_settings<'a, I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut cfg = Self::default();
        for (key, value) in rows {
            match key {
                "like_weight" => overlay_f64(&mut cfg.like_weight, value),
                "comment_weight" => overlay_f64(&mut cfg.comment_weight, value),
                "collection_weight" => overlay_f64(&mut cfg.collection_weight, value),
                "view_weight" => overlay_f64(&mut cfg.view_weight, value),
                "time_decay_days" => overlay_positive_f64(&mut cfg.time_decay_days, value),
                "max_age_days" => overlay_positive_i64(&mut cfg.max_age_days, value),
                "max_admin_recommended" => overlay_i64(&mut cfg.max_admin_recommended, value),
                "topic_base_weight" => overlay_f64(&mut cfg.topic_base_weight, value),
                "topic_recent_weight" => overlay_f64(&mut cfg.topic_recent_weight, value),
                "topic_recent_days" => overlay_positive_i64(&mut cfg.topic_recent_days, value),
                "max_hot_topics" => overlay_positive_i64(&mut cfg.max_hot_topics, value),
                _ => {}
            }
        }
        cfg
    }

    /// Reads the settings table and overlays it onto the defaults.
    /// Missing rows are not an error; a failing query is.
    pub async fn load(pool: &PgPool) -> Result<Self, sqlx::Error> {
        let rows: Vec<(String, String)> = sqlx::query_as("SELECT key, value FROM settings")
            .fetch_all(pool)
            .await?;
        Ok(Self::from_settings(
            rows.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        ))
    }
}

fn overlay_f64(slot: &mut f64, value: &str) {
    let parsed = value.trim().parse::<f64>().ok();
    if let Some(parsed) = parsed.filter(|v| v.is_finite() && *v >= 0.0) {
        *slot = parsed;
    }
}

fn overlay_positive_f64(slot: &mut f64, value: &str) {
    let parsed = value.trim().parse::<f64>().ok();
    if let Some(parsed) = parsed.filter(|v| v.is_finite() && *v > 0.0) {
        *slot = parsed;
    }
}

fn overlay_i64(slot: &mut i64, value: &str) {
    let parsed = value.trim().parse::<i64>().ok();
    if let Some(parsed) = parsed.filter(|v| *v >= 0) {
        *slot = parsed;
    }
}

fn overlay_positive_i64(slot: &mut i64, value: &str) {
    let parsed = value.trim().parse::<i64>().ok();
    if let Some(parsed) = parsed.filter(|v| *v > 0) {
        *slot = parsed;
    }
}

/// Seeds the settings table with every ranking key that is not present yet.
/// Idempotent; runs at startup.
pub async fn ensure_default_settings(pool: &PgPool) -> Result<(), sqlx::Error> {
    for key in RankingConfig::KEYS {
        let value = RankingConfig::default_value(key).unwrap_or_default();
        sqlx::query("INSERT INTO settings (key, value) VALUES ($1, $2) ON CONFLICT (key) DO NOTHING")
            .bind(key)
            .bind(value)
            .execute(pool)
            .await?;
    }
    Ok(())
}

/// Raw counters of a post, as read from its row.
#[derive(Debug, Clone, Copy, Default)]
pub struct Engagement {
    pub likes: i64,
    pub comments: i64,
    pub favorites: i64,
    pub views: i64,
}

impl Engagement {
    /// Likes, comments and favorites together; views excluded.
    pub fn interactions(&self) -> i64 {
        self.likes + self.comments + self.favorites
    }
}

/// Weighted sum of the raw counters.
pub fn base_score(e: Engagement, cfg: &RankingConfig) -> f64 {
    e.likes as f64 * cfg.like_weight
        + e.comments as f64 * cfg.comment_weight
        + e.favorites as f64 * cfg.collection_weight
        + e.views as f64 * cfg.view_weight
}

/// Exponential age decay: `exp(-age / time_decay_days)`.
///
/// Deliberately an e-folding time, not a half-life; operator configs
/// rely on this shape.
pub fn time_factor(age_days: f64, cfg: &RankingConfig) -> f64 {
    (-age_days.max(0.0) / cfg.time_decay_days).exp()
}

/// Final score of a post for the recommended feed.
///
/// Brand-new posts with almost no engagement are capped at
/// `FRESH_SCORE_CAP` so they cannot dominate purely by recency.
pub fn post_score(e: Engagement, age_days: f64, cfg: &RankingConfig) -> f64 {
    let score = base_score(e, cfg) * time_factor(age_days, cfg);

    let barely_seen = age_days < FRESH_AGE_DAYS
        && e.interactions() < FRESH_MIN_INTERACTIONS
        && e.views < FRESH_MIN_VIEWS;

    if barely_seen { score.min(FRESH_SCORE_CAP) } else { score }
}

/// Age of a row in fractional days, clamped at zero for clock skew.
pub fn age_in_days(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    (now - created_at).num_seconds().max(0) as f64 / 86_400.0
}

/// Trending score of a topic: long-term usage blended with recent activity.
pub fn topic_score(usage_count: i64, recent_posts: i64, cfg: &RankingConfig) -> i64 {
    (usage_count as f64 * cfg.topic_base_weight + recent_posts as f64 * cfg.topic_recent_weight)
        .round() as i64
}

/// Ordering for the trending widget: featured topics first, then score
/// descending. Arguments are `(is_featured, trending_score)` pairs.
pub fn trending_order(a: (bool, i64), b: (bool, i64)) -> Ordering {
    b.0.cmp(&a.0).then(b.1.cmp(&a.1))
}

/// Effective trending list size: the request wins over the configured
/// default, but the hard ceiling always applies.
pub fn hot_topics_limit(requested: Option<i64>, cfg: &RankingConfig) -> i64 {
    requested
        .unwrap_or(cfg.max_hot_topics)
        .clamp(1, MAX_HOT_TOPICS_CEILING)
}

/// Sorts scored items descending (ties resolved by `tie_break`) and slices
/// out the requested 1-based page. Returns the page plus the total count
/// of scored items; admin picks are handled by the caller and never enter
/// this count.
pub fn rank_and_page<T>(
    mut scored: Vec<(T, f64)>,
    tie_break: impl Fn(&T, &T) -> Ordering,
    page: i64,
    limit: i64,
) -> (Vec<(T, f64)>, i64) {
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| tie_break(&a.0, &b.0))
    });

    let total = scored.len() as i64;
    let start = ((page - 1) * limit).max(0) as usize;
    let page_items = scored
        .into_iter()
        .skip(start)
        .take(limit.max(0) as usize)
        .collect();

    (page_items, total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn defaults() -> RankingConfig {
        RankingConfig::default()
    }

    #[test]
    fn worked_example_matches_documented_numbers() {
        // likes=10, comments=2, favorites=1, views=50, age 5 days:
        // base = 20 + 6 + 4 + 25 = 55, factor = e^-0.5, final ~ 33.36
        let e = Engagement {
            likes: 10,
            comments: 2,
            favorites: 1,
            views: 50,
        };
        let cfg = defaults();

        assert_eq!(base_score(e, &cfg), 55.0);
        let score = post_score(e, 5.0, &cfg);
        assert!((score - 55.0 * (-0.5f64).exp()).abs() < 1e-9);
        assert!((score - 33.36).abs() < 0.01);
    }

    #[test]
    fn score_decays_monotonically_with_age() {
        let e = Engagement {
            likes: 4,
            comments: 1,
            favorites: 0,
            views: 30,
        };
        let cfg = defaults();

        let mut last = f64::INFINITY;
        for age in [1.0, 2.0, 5.0, 10.0, 25.0] {
            let score = post_score(e, age, &cfg);
            assert!(score < last, "score must shrink as age grows");
            last = score;
        }
    }

    #[test]
    fn fresh_unseen_post_is_capped() {
        // 1 like, 0 comments/favorites, 5 views, 2 hours old: all three
        // freshness conditions hold, so the score caps at 0.5.
        let e = Engagement {
            likes: 1,
            comments: 0,
            favorites: 0,
            views: 5,
        };
        let cfg = defaults();
        let uncapped = base_score(e, &cfg) * time_factor(2.0 / 24.0, &cfg);
        assert!(uncapped > FRESH_SCORE_CAP);
        assert_eq!(post_score(e, 2.0 / 24.0, &cfg), FRESH_SCORE_CAP);
    }

    #[test]
    fn cap_does_not_apply_once_any_condition_fails() {
        let cfg = defaults();
        let quiet = Engagement {
            likes: 1,
            comments: 0,
            favorites: 0,
            views: 5,
        };

        // Old enough.
        let expected = base_score(quiet, &cfg) * time_factor(1.0, &cfg);
        assert_eq!(post_score(quiet, 1.0, &cfg), expected);

        // Enough interactions.
        let engaged = Engagement {
            likes: 2,
            comments: 1,
            favorites: 0,
            views: 5,
        };
        let expected = base_score(engaged, &cfg) * time_factor(0.1, &cfg);
        assert_eq!(post_score(engaged, 0.1, &cfg), expected);

        // Enough views.
        let viewed = Engagement {
            likes: 1,
            comments: 0,
            favorites: 0,
            views: 10,
        };
        let expected = base_score(viewed, &cfg) * time_factor(0.1, &cfg);
        assert_eq!(post_score(viewed, 0.1, &cfg), expected);
    }

    #[test]
    fn capped_score_never_exceeds_uncapped() {
        let e = Engagement {
            likes: 0,
            comments: 0,
            favorites: 0,
            views: 0,
        };
        let cfg = defaults();
        // Zero engagement scores zero, cap must not raise it.
        assert_eq!(post_score(e, 0.01, &cfg), 0.0);
    }

    #[test]
    fn age_in_days_handles_future_timestamps() {
        let now = Utc::now();
        assert_eq!(age_in_days(now + Duration::hours(3), now), 0.0);
        let age = age_in_days(now - Duration::hours(36), now);
        assert!((age - 1.5).abs() < 1e-6);
    }

    #[test]
    fn settings_overlay_parses_and_ignores_garbage() {
        let rows = [
            ("like_weight", "3.5"),
            ("comment_weight", "not a number"),
            ("time_decay_days", "0"),    // zero decay would divide by zero
            ("max_age_days", "-4"),      // negative window is nonsense
            ("max_hot_topics", "15"),
            ("unknown_key", "1.0"),
        ];
        let cfg = RankingConfig::from_settings(rows.iter().copied());

        assert_eq!(cfg.like_weight, 3.5);
        assert_eq!(cfg.comment_weight, 3.0);
        assert_eq!(cfg.time_decay_days, 10.0);
        assert_eq!(cfg.max_age_days, 30);
        assert_eq!(cfg.max_hot_topics, 15);
    }

    #[test]
    fn empty_settings_are_the_defaults() {
        let cfg = RankingConfig::from_settings(std::iter::empty());
        assert_eq!(cfg, RankingConfig::default());
    }

    #[test]
    fn every_key_has_a_default_value() {
        for key in RankingConfig::KEYS {
            assert!(RankingConfig::default_value(key).is_some(), "{key}");
        }
        assert!(RankingConfig::default_value("bogus").is_none());
    }

    #[test]
    fn topic_score_rounds_the_blend() {
        let cfg = defaults();
        // 10 * 0.7 + 3 * 0.3 = 7.9 -> 8
        assert_eq!(topic_score(10, 3, &cfg), 8);
        assert_eq!(topic_score(0, 0, &cfg), 0);
    }

    #[test]
    fn featured_topics_outrank_any_score() {
        let mut topics = vec![
            ("organic-high", false, 900),
            ("featured-low", true, 1),
            ("organic-low", false, 10),
            ("featured-high", true, 50),
        ];
        topics.sort_by(|a, b| trending_order((a.1, a.2), (b.1, b.2)));

        let names: Vec<&str> = topics.iter().map(|t| t.0).collect();
        assert_eq!(
            names,
            vec!["featured-high", "featured-low", "organic-high", "organic-low"]
        );
    }

    #[test]
    fn hot_topics_limit_clamps_to_ceiling() {
        let cfg = defaults();
        assert_eq!(hot_topics_limit(None, &cfg), 10);
        assert_eq!(hot_topics_limit(Some(5), &cfg), 5);
        assert_eq!(hot_topics_limit(Some(500), &cfg), MAX_HOT_TOPICS_CEILING);
        assert_eq!(hot_topics_limit(Some(0), &cfg), 1);
    }

    #[test]
    fn rank_and_page_sorts_and_slices() {
        let scored = vec![("c", 1.0), ("a", 9.0), ("b", 5.0), ("d", 0.5)];
        let (page, total) = rank_and_page(scored, |_, _| Ordering::Equal, 1, 2);
        assert_eq!(total, 4);
        assert_eq!(page.iter().map(|p| p.0).collect::<Vec<_>>(), vec!["a", "b"]);

        let scored = vec![("c", 1.0), ("a", 9.0), ("b", 5.0), ("d", 0.5)];
        let (page, _) = rank_and_page(scored, |_, _| Ordering::Equal, 2, 2);
        assert_eq!(page.iter().map(|p| p.0).collect::<Vec<_>>(), vec!["c", "d"]);
    }

    #[test]
    fn rank_and_page_past_the_end_is_empty() {
        let scored = vec![("a", 1.0)];
        let (page, total) = rank_and_page(scored, |_, _| Ordering::Equal, 7, 10);
        assert_eq!(total, 1);
        assert!(page.is_empty());
    }

    #[test]
    fn rank_and_page_breaks_ties_with_comparator() {
        // Same score, newer (larger id) first per the tie-breaker.
        let scored = vec![(1i64, 3.0), (9i64, 3.0), (4i64, 3.0)];
        let (page, _) = rank_and_page(scored, |a, b| b.cmp(a), 1, 3);
        assert_eq!(page.iter().map(|p| p.0).collect::<Vec<_>>(), vec![9, 4, 1]);
    }
}
