//! `Set-Cookie` header and HTTP date parsing.

use chrono::NaiveDateTime;

/// Date layouts accepted in an `Expires` attribute, always read as UTC.
const DATE_FORMATS: [&str; 4] = [
    "%a, %d %b %Y %H:%M:%S GMT",
    "%A, %d %b %Y %H:%M:%S GMT",
    "%a, %d-%b-%Y %H:%M:%S GMT",
    "%A, %d-%b-%Y %H:%M:%S GMT",
];

/// The parts of a `Set-Cookie` header value the jar cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie<'a> {
    /// Cookie name, never empty.
    pub name: &'a str,
    /// Cookie value, possibly empty.
    pub value: &'a str,
    /// `Domain` attribute.
    pub domain: Option<&'a str>,
    /// `Path` attribute, `/` when absent.
    pub path: &'a str,
    /// `Max-Age` in seconds, if present and numeric.
    pub max_age: Option<i64>,
    /// `Expires` as Unix seconds. `Some(0)` when present but unparseable.
    pub expires: Option<i64>,
    /// `Secure` flag.
    pub secure: bool,
    /// `HttpOnly` flag.
    pub http_only: bool,
}

impl SetCookie<'_> {
    /// Absolute expiry in Unix seconds, `0` for a session cookie.
    ///
    /// `Max-Age` wins over `Expires`. A non-positive `Max-Age` yields a time
    /// in the past, which makes the cookie expire immediately.
    pub fn expire_at(&self, now: i64) -> i64 {
        match (self.max_age, self.expires) {
            (Some(secs), _) if secs > 0 => now.saturating_add(secs),
            (Some(_), _) => now - 1,
            (None, Some(at)) => at,
            (None, None) => 0,
        }
    }
}

/// Parse a raw `Set-Cookie` header value.
///
/// Returns `None` if the leading `name=value` pair is missing or has an empty
/// name. Unknown attributes are ignored.
pub fn parse_set_cookie(raw: &str) -> Option<SetCookie<'_>> {
    let mut parts = raw.split(';').map(str::trim);
    let (name, value) = parts.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let mut cookie = SetCookie {
        name,
        value: value.trim(),
        domain: None,
        path: "/",
        max_age: None,
        expires: None,
        secure: false,
        http_only: false,
    };

    for attr in parts {
        let (key, val) = match attr.split_once('=') {
            Some((k, v)) => (k.trim(), v.trim()),
            None => (attr, ""),
        };
        if key.eq_ignore_ascii_case("domain") {
            cookie.domain = Some(val);
        } else if key.eq_ignore_ascii_case("path") {
            cookie.path = val;
        } else if key.eq_ignore_ascii_case("max-age") {
            cookie.max_age = val.parse().ok();
        } else if key.eq_ignore_ascii_case("expires") {
            cookie.expires = Some(parse_http_date(val).unwrap_or_else(|| {
                log::warn!("[cookie] unparseable Expires: {val}");
                0
            }));
        } else if key.eq_ignore_ascii_case("secure") {
            cookie.secure = true;
        } else if key.eq_ignore_ascii_case("httponly") {
            cookie.http_only = true;
        }
    }
    Some(cookie)
}

/// Parse an RFC 1123 or RFC 850 style date into Unix seconds.
pub fn parse_http_date(s: &str) -> Option<i64> {
    let s = s.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|dt| dt.and_utc().timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dates() {
        assert_eq!(parse_http_date("Wed, 21 Oct 2015 07:28:00 GMT"), Some(1445412480));
        assert_eq!(parse_http_date("Tue, 01 Jan 2030 00:00:00 GMT"), Some(1893456000));
        assert_eq!(parse_http_date("Sunday, 06-Nov-1994 08:49:37 GMT"), Some(784111777));
        assert_eq!(parse_http_date("Sun, 06-Nov-1994 08:49:37 GMT"), Some(784111777));
        assert_eq!(parse_http_date("yesterday"), None);
        assert_eq!(parse_http_date("Wed, 21 Oct 2015 07:28:00 PST"), None);
    }

    #[test]
    fn test_parse_full_header() {
        let c = parse_set_cookie(
            "sid=abc123; Path=/api; Domain=example.com; Max-Age=60; Secure; HttpOnly",
        )
        .unwrap();
        assert_eq!(c.name, "sid");
        assert_eq!(c.value, "abc123");
        assert_eq!(c.path, "/api");
        assert_eq!(c.domain, Some("example.com"));
        assert_eq!(c.max_age, Some(60));
        assert!(c.secure);
        assert!(c.http_only);
        assert_eq!(c.expire_at(1000), 1060);
    }

    #[test]
    fn test_attribute_names_are_case_insensitive() {
        let c = parse_set_cookie("a=b; max-AGE=5; SECURE; expires=Tue, 01 Jan 2030 00:00:00 GMT")
            .unwrap();
        assert_eq!(c.max_age, Some(5));
        assert!(c.secure);
        assert_eq!(c.expires, Some(1893456000));
    }

    #[test]
    fn test_max_age_beats_expires() {
        let c = parse_set_cookie("a=b; Expires=Tue, 01 Jan 2030 00:00:00 GMT; Max-Age=10").unwrap();
        assert_eq!(c.expire_at(100), 110);
        let c = parse_set_cookie("a=b; Max-Age=0; Expires=Tue, 01 Jan 2030 00:00:00 GMT").unwrap();
        assert!(c.expire_at(100) < 100);
    }

    #[test]
    fn test_bad_expires_means_session_cookie() {
        let c = parse_set_cookie("a=b; Expires=garbage").unwrap();
        assert_eq!(c.expires, Some(0));
        assert_eq!(c.expire_at(100), 0);
        assert_eq!(parse_set_cookie("a=b").unwrap().expire_at(100), 0);
    }

    #[test]
    fn test_rejects_missing_pair() {
        assert!(parse_set_cookie("").is_none());
        assert!(parse_set_cookie("novalue").is_none());
        assert!(parse_set_cookie("=value").is_none());
        assert_eq!(parse_set_cookie("empty=").unwrap().value, "");
    }
}
