//! Request Parser (C1).
//!
//! Hand-rolled rather than built on a general HTTP parsing crate:
//! HTTP/0.9 requests as this spec defines them still carry a literal
//! `HTTP/0.9` token (mirroring `examples/original_source/parse.c`'s
//! `sscanf(line, "%s %s HTTP/%f", ...)`, which requires all three tokens
//! unconditionally), which parsers built around RFC 7230's grammar don't
//! expect to see paired with "0.9". The algorithm below follows
//! `parseRequest`/`validMethod` from that source closely, expressed with
//! `Result` and slice operations instead of fixed-size C buffers.

/// Upper bound on the number of bytes read for a single request. Chosen to
/// comfortably hold a request line plus a modest number of headers without
/// admitting unbounded memory use from a hostile client.
pub const MAX_REQUEST_SIZE: usize = 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
}

/// The three versions this server recognizes. `Http11` is accepted on the
/// wire but never stored: per spec, 1.1 is downgraded to 1.0 immediately
/// on parse, since the server never promises 1.1 semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Http09,
    Http10,
}

#[derive(Debug)]
pub struct Request {
    pub method: Method,
    pub uri: Vec<u8>,
    pub version: Version,
    pub if_modified_since: Vec<u8>,
    pub ims_time: i64,
}

/// A parse failure, carrying just enough information for the composer's
/// precedence table (`spec.md` §4.4) to pick 501 vs 400.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseFailure {
    /// The request line parsed far enough to see a method token, and it
    /// was neither `GET` nor `HEAD`.
    UnknownMethod,
    /// Anything else: no `\r\n`, wrong token count, bad version, or a
    /// version/method mismatch (`HTTP/0.9` with a method other than `GET`).
    BadRequest,
}

/// Parses a request out of the bytes read from the socket. Never reads
/// further; an incomplete request (no `\r\n` present yet) is simply a
/// `BadRequest` failure, since the worker never performs a second read.
pub fn parse(buf: &[u8]) -> Result<Request, ParseFailure> {
    let line_end = find(buf, b"\r\n").ok_or(ParseFailure::BadRequest)?;
    let (line, rest) = (&buf[..line_end], &buf[line_end + 2..]);

    let mut tokens = line.split(|&b| b == b' ').filter(|t| !t.is_empty());
    let method_tok = tokens.next().ok_or(ParseFailure::BadRequest)?;
    let uri = tokens.next().ok_or(ParseFailure::BadRequest)?.to_vec();
    let version_tok = tokens.next().ok_or(ParseFailure::BadRequest)?;
    if tokens.next().is_some() {
        return Err(ParseFailure::BadRequest);
    }

    let method = match method_tok {
        b"GET" => Method::Get,
        b"HEAD" => Method::Head,
        _ => return Err(ParseFailure::UnknownMethod),
    };

    let version = parse_version(version_tok).ok_or(ParseFailure::BadRequest)?;

    if version == Version::Http09 && method != Method::Get {
        return Err(ParseFailure::BadRequest);
    }

    if uri.is_empty() {
        return Err(ParseFailure::BadRequest);
    }

    let mut if_modified_since = Vec::new();
    for header_line in header_lines(rest) {
        if let Some(value) = strip_header_prefix(header_line, b"if-modified-since:") {
            let value = trim_leading_ws(value);
            if_modified_since = value.to_vec();
        }
    }

    let ims_time = crate::date::parse_ims(&if_modified_since);

    Ok(Request {
        method,
        uri,
        version,
        if_modified_since,
        ims_time,
    })
}

/// Parses the literal `HTTP/<float>` token, downgrading 1.1 to 1.0 as it
/// goes. `parse.c` compares with a small epsilon band (`> 1.099 && <
/// 1.101`) to dodge float-formatting noise around "1.1"; reproduced here.
fn parse_version(tok: &[u8]) -> Option<Version> {
    let s = std::str::from_utf8(tok).ok()?;
    let digits = s.strip_prefix("HTTP/")?;
    let v: f32 = digits.parse().ok()?;

    if v > 1.099 && v < 1.101 {
        Some(Version::Http10)
    } else if (v - 1.0).abs() < 0.0001 {
        Some(Version::Http10)
    } else if (v - 0.9).abs() < 0.0001 {
        Some(Version::Http09)
    } else {
        None
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Splits the header block into lines, stopping at the first blank line or
/// the end of the buffer (whichever comes first). Headers split across
/// multiple lines by leading whitespace (RFC 2616 line folding) are not
/// supported — the teacher's own parsers don't implement folding either,
/// and no header this server inspects needs it.
fn header_lines(mut buf: &[u8]) -> Vec<&[u8]> {
    let mut lines = Vec::new();
    while let Some(end) = find(buf, b"\r\n") {
        let line = &buf[..end];
        if line.is_empty() {
            break;
        }
        lines.push(line);
        buf = &buf[end + 2..];
    }
    lines
}

fn strip_header_prefix<'a>(line: &'a [u8], name: &[u8]) -> Option<&'a [u8]> {
    if line.len() < name.len() {
        return None;
    }
    let (head, tail) = line.split_at(name.len());
    if head.eq_ignore_ascii_case(name) {
        Some(tail)
    } else {
        None
    }
}

fn trim_leading_ws(buf: &[u8]) -> &[u8] {
    let start = buf.iter().position(|&b| b != b' ' && b != b'\t').unwrap_or(buf.len());
    &buf[start..]
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_simple_get() {
        let req = parse(b"GET / HTTP/1.0\r\n\r\n").unwrap();
        assert_eq!(req.method, Method::Get);
        assert_eq!(req.uri, b"/");
        assert_eq!(req.version, Version::Http10);
    }

    #[test]
    fn downgrades_http11_to_http10() {
        let req = parse(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n").unwrap();
        assert_eq!(req.version, Version::Http10);
    }

    #[test]
    fn accepts_http09_get() {
        let req = parse(b"GET / HTTP/0.9\r\n").unwrap();
        assert_eq!(req.version, Version::Http09);
    }

    #[test]
    fn rejects_http09_head() {
        assert_eq!(parse(b"HEAD / HTTP/0.9\r\n"), Err(ParseFailure::BadRequest));
    }

    #[test]
    fn unknown_method_is_unimplemented() {
        assert_eq!(
            parse(b"POST / HTTP/1.0\r\n\r\n"),
            Err(ParseFailure::UnknownMethod)
        );
    }

    #[test]
    fn missing_terminator_is_bad_request() {
        assert_eq!(parse(b"GET / HTTP/1.0"), Err(ParseFailure::BadRequest));
    }

    #[test]
    fn wrong_token_count_is_bad_request() {
        assert_eq!(parse(b"GET HTTP/1.0\r\n\r\n"), Err(ParseFailure::BadRequest));
        assert_eq!(
            parse(b"GET / extra HTTP/1.0\r\n\r\n"),
            Err(ParseFailure::BadRequest)
        );
    }

    #[test]
    fn captures_if_modified_since_case_insensitively() {
        let req = parse(
            b"GET / HTTP/1.0\r\nif-MODIFIED-since:   Sun, 06 Nov 1994 08:49:37 GMT\r\n\r\n",
        )
        .unwrap();
        assert_eq!(req.if_modified_since, b"Sun, 06 Nov 1994 08:49:37 GMT");
        assert_eq!(req.ims_time, 784111777);
    }

    #[test]
    fn other_headers_are_ignored() {
        let req = parse(b"GET / HTTP/1.0\r\nUser-Agent: test\r\n\r\n").unwrap();
        assert!(req.if_modified_since.is_empty());
        assert_eq!(req.ims_time, 0);
    }
}
