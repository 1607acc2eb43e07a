use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

const ISO_OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];
const ISO_NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse a timestamp found in an HTTP header or a feed field.
///
/// Servers are supposed to send HTTP dates in `Date`, `Last-Modified` and
/// `Expires` (any of the three forms HTTP allows, or general RFC 2822), but
/// some send ISO 8601 instead, so all are accepted.
/// "Wed, 21 Oct 2015 07:28:00 GMT" | "2015-10-21T07:28:00Z" | "2015-10-21"
///
/// Timestamps without an offset are taken as UTC. Anything unparseable is `None`.
pub fn parse_http_or_iso_date(s: Option<&str>) -> Option<DateTime<Utc>> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }

    // IMF-fixdate plus the obsolete RFC 850 and asctime forms
    if let Ok(t) = httpdate::parse_http_date(s) {
        return Some(DateTime::<Utc>::from(t));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    parse_iso_8601(s)
}

fn parse_iso_8601(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ISO_OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in ISO_NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.and_utc());
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_rfc_2822() {
        assert_eq!(
            parse_http_or_iso_date(Some("Wed, 21 Oct 2015 07:28:00 GMT")),
            Some(utc(2015, 10, 21, 7, 28, 0))
        );
        assert_eq!(
            parse_http_or_iso_date(Some("Wed, 21 Oct 2015 09:28:00 +0200")),
            Some(utc(2015, 10, 21, 7, 28, 0))
        );
    }

    #[test]
    fn test_obsolete_http_date_forms() {
        // RFC 850
        assert_eq!(
            parse_http_or_iso_date(Some("Sunday, 06-Nov-94 08:49:37 GMT")),
            Some(utc(1994, 11, 6, 8, 49, 37))
        );
        // asctime
        assert_eq!(
            parse_http_or_iso_date(Some("Sun Nov  6 08:49:37 1994")),
            Some(utc(1994, 11, 6, 8, 49, 37))
        );
        assert_eq!(
            parse_http_or_iso_date(Some("Sun, 06 Nov 1994 08:49:37 GMT")),
            Some(utc(1994, 11, 6, 8, 49, 37))
        );
    }

    #[test]
    fn test_iso_8601_fallback() {
        assert_eq!(
            parse_http_or_iso_date(Some("2015-10-21T07:28:00Z")),
            Some(utc(2015, 10, 21, 7, 28, 0))
        );
        assert_eq!(
            parse_http_or_iso_date(Some("2015-10-21T15:28:00+08:00")),
            Some(utc(2015, 10, 21, 7, 28, 0))
        );
        assert_eq!(
            parse_http_or_iso_date(Some("2015-10-21T07:28:00.250")),
            Some(utc(2015, 10, 21, 7, 28, 0) + chrono::Duration::milliseconds(250))
        );
        assert_eq!(
            parse_http_or_iso_date(Some("2015-10-21 07:28:00")),
            Some(utc(2015, 10, 21, 7, 28, 0))
        );
        assert_eq!(
            parse_http_or_iso_date(Some("2015-10-21")),
            Some(utc(2015, 10, 21, 0, 0, 0))
        );
    }

    #[test]
    fn test_absent_and_garbage() {
        assert_eq!(parse_http_or_iso_date(None), None);
        assert_eq!(parse_http_or_iso_date(Some("")), None);
        assert_eq!(parse_http_or_iso_date(Some("   ")), None);
        assert_eq!(parse_http_or_iso_date(Some("yesterday")), None);
        assert_eq!(parse_http_or_iso_date(Some("Wed, 32 Oct 2015 07:28:00 GMT")), None);
    }
}
