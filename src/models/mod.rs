use serde::{Deserialize, Serialize};

// ── Feed metadata ─────────────────────────────────────────────────────────────

/// Feed-level fields the scheduler cares about, as found in the parsed feed.
/// Kept as raw strings; interpretation happens where they are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FeedMeta {
    pub generator: Option<String>,
    pub updated: Option<String>,
    /// Minutes, as written in the feed's `<ttl>` element.
    pub ttl: Option<String>,
}

impl FeedMeta {
    pub fn new(
        generator: Option<String>,
        updated: Option<String>,
        ttl: Option<String>,
    ) -> Self {
        Self { generator, updated, ttl }
    }

    pub fn generator(&self) -> Option<&str> {
        self.generator.as_deref()
    }

    /// `updated`, treating an empty string as missing.
    pub fn updated(&self) -> Option<&str> {
        self.updated.as_deref().filter(|s| !s.is_empty())
    }

    pub fn ttl(&self) -> &str {
        self.ttl.as_deref().unwrap_or_default()
    }
}

// ── Cache status ──────────────────────────────────────────────────────────────

/// Cloudflare `cf-cache-status` values meaning the edge holds a copy whose
/// lifetime follows the origin's caching headers.
pub const EDGE_CACHED_STATUSES: [&str; 4] = ["HIT", "MISS", "EXPIRED", "REVALIDATED"];

pub fn is_edge_cached(status: &str) -> bool {
    EDGE_CACHED_STATUSES.contains(&status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_updated_is_missing() {
        let meta = FeedMeta::new(Some("RSSHub".into()), Some(String::new()), None);
        assert_eq!(meta.updated(), None);
        assert_eq!(meta.ttl(), "");
    }

    #[test]
    fn test_edge_cache_status_is_case_sensitive() {
        assert!(is_edge_cached("HIT"));
        assert!(is_edge_cached("REVALIDATED"));
        assert!(!is_edge_cached("hit"));
        assert!(!is_edge_cached("DYNAMIC"));
        assert!(!is_edge_cached("BYPASS"));
    }
}
