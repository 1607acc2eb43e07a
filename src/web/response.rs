//! Caching-relevant view over a fetched HTTP response.
//!
//! Every derived field is a pure function of the headers and the observation
//! instant, so each is computed on first access and then memoized.

use chrono::{DateTime, Duration, Utc};
use reqwest::StatusCode;
use reqwest::header::{
    AGE, CACHE_CONTROL, DATE, ETAG, EXPIRES, HeaderMap, HeaderName, HeaderValue,
    IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED,
};
use std::sync::OnceLock;

use super::dates::parse_http_or_iso_date;

pub const AGE_REMAINING_CLAMP_MIN: i64 = 0;
pub const AGE_REMAINING_CLAMP_MAX: i64 = 21_600; // 6 hours

#[derive(Debug, Clone)]
pub struct WebResponse {
    /// Final URL after redirects.
    pub url: String,
    /// URL as originally requested.
    pub ori_url: String,
    pub content: Option<Vec<u8>>,
    pub headers: HeaderMap,
    pub status: StatusCode,
    pub reason: Option<String>,
    now: DateTime<Utc>,

    etag: OnceLock<Option<String>>,
    date: OnceLock<DateTime<Utc>>,
    last_modified: OnceLock<DateTime<Utc>>,
    max_age: OnceLock<Option<i64>>,
    age: OnceLock<Option<i64>>,
    age_remaining: OnceLock<Option<i64>>,
    expires: OnceLock<Option<DateTime<Utc>>>,
}

impl WebResponse {
    pub fn new(
        url: impl Into<String>,
        ori_url: impl Into<String>,
        content: Option<Vec<u8>>,
        headers: HeaderMap,
        status: StatusCode,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            url: url.into(),
            ori_url: ori_url.into(),
            content,
            headers,
            status,
            reason,
            now,
            etag: OnceLock::new(),
            date: OnceLock::new(),
            last_modified: OnceLock::new(),
            max_age: OnceLock::new(),
            age: OnceLock::new(),
            age_remaining: OnceLock::new(),
            expires: OnceLock::new(),
        }
    }

    /// First value of a header, if it is present and valid visible ASCII.
    pub fn header(&self, name: impl reqwest::header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The instant this response was observed.
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn etag(&self) -> Option<&str> {
        self.etag
            .get_or_init(|| {
                self.header(ETAG)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            })
            .as_deref()
    }

    /// `Date` header, falling back to the observation instant.
    pub fn date(&self) -> DateTime<Utc> {
        *self
            .date
            .get_or_init(|| parse_http_or_iso_date(self.header(DATE)).unwrap_or(self.now))
    }

    /// `Last-Modified` header, falling back to [`Self::date`].
    pub fn last_modified(&self) -> DateTime<Utc> {
        *self.last_modified.get_or_init(|| {
            parse_http_or_iso_date(self.header(LAST_MODIFIED)).unwrap_or_else(|| self.date())
        })
    }

    /// Freshness lifetime in seconds from `Cache-Control`.
    ///
    /// `no-cache` / `no-store` → 0; malformed or missing `max-age` → `None`.
    pub fn max_age(&self) -> Option<i64> {
        *self
            .max_age
            .get_or_init(|| parse_max_age(self.header(CACHE_CONTROL)?))
    }

    pub fn age(&self) -> Option<i64> {
        *self
            .age
            .get_or_init(|| self.header(AGE)?.trim().parse().ok())
    }

    /// Seconds the response stays fresh, clamped to 0..=6h.
    pub fn age_remaining(&self) -> Option<i64> {
        *self.age_remaining.get_or_init(|| {
            let remaining = self.max_age()?.saturating_sub(self.age().unwrap_or(0));
            Some(remaining.clamp(AGE_REMAINING_CLAMP_MIN, AGE_REMAINING_CLAMP_MAX))
        })
    }

    /// When the response stops being fresh.
    ///
    /// `max-age` overrides `Expires`; a response with no freshness left has no
    /// expiry at all.
    pub fn expires(&self) -> Option<DateTime<Utc>> {
        *self.expires.get_or_init(|| match self.age_remaining() {
            None => parse_http_or_iso_date(self.header(EXPIRES)),
            Some(remaining) if remaining <= 0 => None,
            Some(remaining) => self.date().checked_add_signed(Duration::seconds(remaining)),
        })
    }

    pub fn is_not_modified(&self) -> bool {
        self.status == StatusCode::NOT_MODIFIED
    }

    /// Validators to send with the next request for the same resource.
    pub fn conditional_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let validators: [(HeaderName, Option<&str>); 2] = [
            (IF_NONE_MATCH, self.etag()),
            (IF_MODIFIED_SINCE, self.header(LAST_MODIFIED)),
        ];
        for (name, value) in validators {
            if let Some(value) = value.and_then(|v| HeaderValue::from_str(v).ok()) {
                headers.insert(name, value);
            }
        }
        headers
    }
}

/// "public, max-age=120" → 120 | "no-store" → 0 | "max-age=abc" → None
pub fn parse_max_age(cache_control: &str) -> Option<i64> {
    let cache_control = cache_control.to_lowercase();
    if cache_control.is_empty() {
        return None;
    }
    if cache_control.contains("no-cache") || cache_control.contains("no-store") {
        return Some(0);
    }

    let (_, rest) = cache_control.split_once("max-age=")?;
    let value = rest.split(',').next().unwrap_or_default().trim();
    if value.is_empty() {
        return None;
    }
    value.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn response(headers: &[(&'static str, &str)]) -> WebResponse {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.append(*name, HeaderValue::from_str(value).unwrap());
        }
        WebResponse::new(
            "https://example.com/feed",
            "https://example.com/feed",
            None,
            map,
            StatusCode::OK,
            Some("OK".into()),
            now(),
        )
    }

    #[test]
    fn test_parse_max_age() {
        assert_eq!(parse_max_age(""), None);
        assert_eq!(parse_max_age("no-cache"), Some(0));
        assert_eq!(parse_max_age("No-Store"), Some(0));
        assert_eq!(parse_max_age("private, no-cache, max-age=600"), Some(0));
        assert_eq!(parse_max_age("max-age=120"), Some(120));
        assert_eq!(parse_max_age("public, max-age=3600, must-revalidate"), Some(3600));
        assert_eq!(parse_max_age("max-age=abc"), None);
        assert_eq!(parse_max_age("max-age=,public"), None);
        assert_eq!(parse_max_age("public"), None);
        assert_eq!(parse_max_age("s-maxage=60"), None);
    }

    #[test]
    fn test_missing_cache_control() {
        let r = response(&[("age", "10")]);
        assert_eq!(r.max_age(), None);
        assert_eq!(r.age_remaining(), None);
        assert_eq!(r.age(), Some(10));
    }

    #[test]
    fn test_etag_and_dates() {
        let r = response(&[("etag", "\"abc\"")]);
        assert_eq!(r.etag(), Some("\"abc\""));
        assert_eq!(r.date(), now());
        assert_eq!(r.last_modified(), now());

        let r = response(&[
            ("etag", ""),
            ("date", "Fri, 01 Mar 2024 11:00:00 GMT"),
        ]);
        assert_eq!(r.etag(), None);
        assert_eq!(r.date(), Utc.with_ymd_and_hms(2024, 3, 1, 11, 0, 0).unwrap());
        assert_eq!(r.last_modified(), r.date());

        let r = response(&[("last-modified", "2024-02-29T08:00:00Z")]);
        assert_eq!(
            r.last_modified(),
            Utc.with_ymd_and_hms(2024, 2, 29, 8, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_age_remaining_is_clamped() {
        let cases = [
            ("max-age=120", None, 120),
            ("max-age=120", Some("20"), 100),
            ("max-age=120", Some("500"), 0),
            ("max-age=-50", None, 0),
            ("max-age=86400", None, AGE_REMAINING_CLAMP_MAX),
            ("max-age=86400", Some("80000"), 6400),
            ("no-store", Some("3"), 0),
        ];
        for (cache_control, age, expected) in cases {
            let mut headers = vec![("cache-control", cache_control)];
            if let Some(age) = age {
                headers.push(("age", age));
            }
            let r = response(&headers);
            let remaining = r.age_remaining().unwrap();
            assert_eq!(remaining, expected, "{cache_control} / {age:?}");
            assert!((AGE_REMAINING_CLAMP_MIN..=AGE_REMAINING_CLAMP_MAX).contains(&remaining));
        }
    }

    #[test]
    fn test_bad_age_is_ignored() {
        let r = response(&[("cache-control", "max-age=60"), ("age", "soon")]);
        assert_eq!(r.age(), None);
        assert_eq!(r.age_remaining(), Some(60));
    }

    #[test]
    fn test_expires_from_max_age() {
        let r = response(&[
            ("cache-control", "max-age=600"),
            ("date", "Fri, 01 Mar 2024 12:00:00 GMT"),
            ("expires", "Fri, 01 Mar 2024 23:00:00 GMT"),
        ]);
        assert_eq!(r.expires(), Some(now() + Duration::seconds(600)));
    }

    #[test]
    fn test_expires_header_when_no_max_age() {
        let r = response(&[("expires", "Fri, 01 Mar 2024 23:00:00 GMT")]);
        assert_eq!(
            r.expires(),
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 23, 0, 0).unwrap())
        );
        assert_eq!(response(&[("expires", "0")]).expires(), None);
    }

    #[test]
    fn test_no_expiry_once_stale() {
        for cache_control in ["no-cache", "max-age=0", "max-age=30"] {
            let r = response(&[
                ("cache-control", cache_control),
                ("age", "30"),
                ("expires", "Fri, 01 Mar 2024 23:00:00 GMT"),
            ]);
            assert_eq!(r.age_remaining(), Some(0));
            assert_eq!(r.expires(), None, "{cache_control}");
        }
    }

    #[test]
    fn test_identical_headers_identical_view() {
        let headers = [
            ("cache-control", "public, max-age=900"),
            ("age", "100"),
            ("date", "Fri, 01 Mar 2024 11:58:00 GMT"),
            ("etag", "W/\"42\""),
        ];
        let a = response(&headers);
        let b = response(&headers);
        assert_eq!(a.etag(), b.etag());
        assert_eq!(a.date(), b.date());
        assert_eq!(a.last_modified(), b.last_modified());
        assert_eq!(a.max_age(), b.max_age());
        assert_eq!(a.age(), b.age());
        assert_eq!(a.age_remaining(), b.age_remaining());
        assert_eq!(a.expires(), b.expires());
        // memoized: asking again gives the same answer
        assert_eq!(a.expires(), a.expires());
    }

    #[test]
    fn test_conditional_headers() {
        let r = response(&[
            ("etag", "\"v1\""),
            ("last-modified", "Fri, 01 Mar 2024 10:00:00 GMT"),
        ]);
        let headers = r.conditional_headers();
        assert_eq!(headers.get(IF_NONE_MATCH).unwrap(), "\"v1\"");
        assert_eq!(
            headers.get(IF_MODIFIED_SINCE).unwrap(),
            "Fri, 01 Mar 2024 10:00:00 GMT"
        );
        assert!(response(&[]).conditional_headers().is_empty());
    }
}
