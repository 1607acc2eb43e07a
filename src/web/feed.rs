//! Deferring the next poll of a feed as per server-side caching.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use super::dates::parse_http_or_iso_date;
use super::error::WebError;
use super::response::WebResponse;
use crate::models::{FeedMeta, is_edge_cached};

pub const CF_CACHE_STATUS: &str = "cf-cache-status";

/// RSSHub defaults to a 5 minute TTL and some legacy versions keep it even with
/// caching disabled, so anything at or below this is not trusted.
pub const MIN_TRUSTED_TTL_SECS: i64 = 300;

/// Everything the scheduler looks at for one poll cycle.
#[derive(Debug, Clone, Copy)]
pub struct FeedCheckContext<'a> {
    pub response: &'a WebResponse,
    pub meta: &'a FeedMeta,
    pub cache_status: Option<&'a str>,
}

impl<'a> FeedCheckContext<'a> {
    /// Takes the cache status from the response's own `cf-cache-status` header.
    pub fn new(response: &'a WebResponse, meta: &'a FeedMeta) -> Self {
        Self {
            response,
            meta,
            cache_status: response.header(CF_CACHE_STATUS),
        }
    }
}

/// Decide when the feed is worth checking again.
///
/// `None` means no deferral: the caller keeps its own polling interval.
pub fn compute_next_check(ctx: &FeedCheckContext<'_>) -> Option<DateTime<Utc>> {
    edge_cache_next_check(ctx).or_else(|| feed_ttl_next_check(ctx))
}

/// Cloudflare serves the cached copy until it expires; polling sooner is wasted.
fn edge_cache_next_check(ctx: &FeedCheckContext<'_>) -> Option<DateTime<Utc>> {
    if !ctx.cache_status.is_some_and(is_edge_cached) {
        return None;
    }
    let expires = ctx.response.expires()?;
    (expires > ctx.response.now()).then_some(expires)
}

/// RSSHub caches a route for its `<ttl>` (or `max-age`) after `updated`.
fn feed_ttl_next_check(ctx: &FeedCheckContext<'_>) -> Option<DateTime<Utc>> {
    if ctx.meta.generator() != Some("RSSHub") {
        return None;
    }
    let updated = ctx.meta.updated()?;

    let ttl = effective_ttl_secs(ctx.meta.ttl(), ctx.response.max_age())?;
    if ttl <= MIN_TRUSTED_TTL_SECS {
        return None;
    }

    let updated = parse_http_or_iso_date(Some(updated))?;
    let next_check = updated.checked_add_signed(Duration::try_seconds(ttl)?)?;
    (next_check > ctx.response.now()).then_some(next_check)
}

/// TTL in seconds: the feed's `<ttl>` minutes if it is a plain decimal number,
/// else `max-age`. Zero or missing becomes -1 (disabled).
///
/// `None` only when `<ttl>` is decimal but does not fit in seconds.
pub fn effective_ttl_secs(ttl_minutes: &str, max_age: Option<i64>) -> Option<i64> {
    let secs = if is_decimal(ttl_minutes) {
        ttl_minutes.parse::<i64>().ok()?.checked_mul(60)?
    } else {
        max_age.unwrap_or(0)
    };
    Some(if secs == 0 { -1 } else { secs })
}

/// ASCII digits only: no sign, no whitespace. Leading zeros are fine.
fn is_decimal(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

// ── WebFeed ───────────────────────────────────────────────────────────────────

/// Outcome of fetching one feed.
#[derive(Debug)]
pub struct WebFeed {
    /// Final URL after redirects.
    pub url: String,
    /// URL as originally requested.
    pub ori_url: String,
    pub status: Option<u16>,
    pub reason: Option<String>,
    pub meta: Option<FeedMeta>,
    pub error: Option<WebError>,
    pub web_response: Option<WebResponse>,
}

impl WebFeed {
    pub fn from_response(response: WebResponse) -> Self {
        Self {
            url: response.url.clone(),
            ori_url: response.ori_url.clone(),
            status: Some(response.status.as_u16()),
            reason: response.reason.clone(),
            meta: None,
            error: None,
            web_response: Some(response),
        }
    }

    pub fn from_error(url: impl Into<String>, error: WebError) -> Self {
        let url = url.into();
        Self {
            ori_url: url.clone(),
            url,
            status: error.status,
            reason: None,
            meta: None,
            error: Some(error),
            web_response: None,
        }
    }

    pub fn with_meta(mut self, meta: FeedMeta) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Next check as per server-side cache. Nothing to go on without a
    /// response.
    pub fn calc_next_check(&self) -> Option<DateTime<Utc>> {
        let response = self.web_response.as_ref()?;
        let default_meta = FeedMeta::default();
        let meta = self.meta.as_ref().unwrap_or(&default_meta);
        let next_check = compute_next_check(&FeedCheckContext::new(response, meta));
        if let Some(at) = next_check {
            debug!("Deferring next check of {} until {}", self.url, at);
        }
        next_check
    }
}
