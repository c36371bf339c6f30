//! Date Codec (C2): parse `If-Modified-Since` header values in any of the
//! three HTTP date formats, and format timestamps as IMF-fixdate for
//! `Date:`/`Last-Modified:` headers.
//!
//! `httpdate` already implements exactly these three formats (RFC-1123,
//! RFC-850, and `asctime`) for parsing and IMF-fixdate for formatting, the
//! same crate used for this purpose in `examples/epheo-kiss`.

use std::time::{SystemTime, UNIX_EPOCH};

/// Parses a raw `If-Modified-Since` header value into unix seconds (UTC).
///
/// Returns `0` if the value is empty or unparseable in any of the three
/// accepted formats — semantically "no conditional", per spec.
pub fn parse_ims(value: &[u8]) -> i64 {
    if value.is_empty() {
        return 0;
    }

    let s = match std::str::from_utf8(value) {
        Ok(s) => s,
        Err(_) => return 0,
    };

    match httpdate::parse_http_date(s) {
        Ok(t) => t
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0),
        Err(_) => 0,
    }
}

/// Formats a time as IMF-fixdate (`Sun, 06 Nov 1994 08:49:37 GMT`).
pub fn format_imf(time: SystemTime) -> String {
    httpdate::fmt_http_date(time)
}

/// Formats the current time as IMF-fixdate, for `Date:` headers.
pub fn format_now() -> String {
    format_imf(SystemTime::now())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_rfc1123() {
        assert_eq!(parse_ims(b"Sun, 06 Nov 1994 08:49:37 GMT"), 784111777);
    }

    #[test]
    fn parses_rfc850() {
        assert_eq!(parse_ims(b"Sunday, 06-Nov-94 08:49:37 GMT"), 784111777);
    }

    #[test]
    fn parses_asctime() {
        assert_eq!(parse_ims(b"Sun Nov  6 08:49:37 1994"), 784111777);
    }

    #[test]
    fn unparseable_is_zero() {
        assert_eq!(parse_ims(b"not a date"), 0);
    }

    #[test]
    fn empty_is_zero() {
        assert_eq!(parse_ims(b""), 0);
    }

    #[test]
    fn format_then_parse_round_trips() {
        let t = UNIX_EPOCH + std::time::Duration::from_secs(784111777);
        let formatted = format_imf(t);
        assert_eq!(parse_ims(formatted.as_bytes()), 784111777);
    }
}
