//! Response Composer (C4): picks exactly one outcome from the parse and
//! resolve results, then writes the status line, headers, and body.
//!
//! Header formatting and `Content-Type` detection follow
//! `server/static_files.rs`'s `serve_file` (mime_guess, `application/
//! octet-stream` fallback); the header-then-body write split mirrors
//! `server/mod.rs`'s `Response<Fresh>` (header written in one call, body
//! streamed after).

use std::fs::File;
use std::io::{self, Read, Write};
use std::time::UNIX_EPOCH;

use crate::date;
use crate::request::{Method, ParseFailure, Request};
use crate::resolver::{ResolveFailure, Resolved};

const WRITE_BUF: usize = 8192;

/// One of the ten precedence rows in the composer's decision table.
/// `Cgi` is decided here but executed by `cgi::run`, not by
/// `write_response` — its response is streamed straight from the child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    BadRequest,
    NotImplemented,
    Forbidden,
    NotFound,
    Redirect,
    NotModified,
    DirListing,
    Cgi,
    File,
}

impl Outcome {
    pub fn status(self) -> (u16, &'static str) {
        match self {
            Outcome::BadRequest => (400, "Bad Request"),
            Outcome::NotImplemented => (501, "Not Implemented"),
            Outcome::Forbidden => (403, "Forbidden"),
            Outcome::NotFound => (404, "Not Found"),
            Outcome::Redirect => (301, "Moved Permanently"),
            Outcome::NotModified => (304, "Not Modified"),
            Outcome::DirListing | Outcome::File => (200, "OK"),
            Outcome::Cgi => (200, "OK"),
        }
    }
}

/// Selects the outcome for a request, given the parser and resolver
/// results. Mirrors the precedence table in order; the first matching
/// row wins.
pub fn decide(
    parse_result: &Result<Request, ParseFailure>,
    resolve_result: &Result<Resolved, ResolveFailure>,
) -> Outcome {
    let req = match parse_result {
        Err(ParseFailure::UnknownMethod) => return Outcome::NotImplemented,
        Err(ParseFailure::BadRequest) => return Outcome::BadRequest,
        Ok(req) => req,
    };

    let resolved = match resolve_result {
        Err(_) => return Outcome::Forbidden,
        Ok(r) => r,
    };

    if !resolved.exists {
        return Outcome::NotFound;
    }

    if resolved.needs_trailing_slash {
        return Outcome::Redirect;
    }

    if req.ims_time > 0 {
        if let Some(mtime) = mtime_secs(resolved) {
            if mtime <= req.ims_time {
                return Outcome::NotModified;
            }
        }
    }

    if resolved.is_dir {
        return Outcome::DirListing;
    }

    if resolved.is_cgi {
        return Outcome::Cgi;
    }

    Outcome::File
}

fn mtime_secs(resolved: &Resolved) -> Option<i64> {
    let meta = resolved.meta.as_ref()?;
    let modified = meta.modified().ok()?;
    modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .ok()
}

fn fixed_body(outcome: Outcome) -> &'static [u8] {
    match outcome {
        Outcome::BadRequest => b"Bad Request\r\n",
        Outcome::NotImplemented => b"Not Implemented\r\n",
        Outcome::Forbidden => b"Forbidden\r\n",
        Outcome::NotFound => b"Not Found\r\n",
        _ => b"",
    }
}

/// Writes the full response for any outcome except `Cgi` (handled by
/// `cgi::run`). Returns `(status_actually_sent, body_bytes_written)`
/// for the access logger — the status can differ from `outcome`'s own code
/// when opening a resolved regular file fails after all (precedence row 10:
/// "open() fails" demotes a `File` outcome to 403 at write time).
pub fn write_response<W: Write>(
    w: &mut W,
    outcome: Outcome,
    uri: &[u8],
    head_only: bool,
    resolved: Option<&Resolved>,
) -> io::Result<(u16, u64)> {
    match outcome {
        Outcome::BadRequest
        | Outcome::NotImplemented
        | Outcome::Forbidden
        | Outcome::NotFound => write_fixed(w, outcome, head_only),
        Outcome::Redirect => write_redirect(w, uri, head_only),
        Outcome::NotModified => write_not_modified(w, resolved.unwrap()),
        Outcome::DirListing => write_dir_listing(w, uri, resolved.unwrap(), head_only),
        Outcome::File => write_file(w, resolved.unwrap(), head_only),
        Outcome::Cgi => unreachable!("CGI responses are written by cgi::run"),
    }
}

fn write_fixed<W: Write>(w: &mut W, outcome: Outcome, head_only: bool) -> io::Result<(u16, u64)> {
    let (code, reason) = outcome.status();
    let body = fixed_body(outcome);

    let mut header = format!(
        "HTTP/1.0 {} {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\n\r\n",
        code,
        reason,
        body.len()
    )
    .into_bytes();

    if head_only {
        w.write_all(&header)?;
        return Ok((code, body.len() as u64));
    }

    header.extend_from_slice(body);
    w.write_all(&header)?;
    Ok((code, body.len() as u64))
}

fn write_redirect<W: Write>(w: &mut W, uri: &[u8], head_only: bool) -> io::Result<(u16, u64)> {
    let mut location = uri.to_vec();
    location.push(b'/');

    let mut header = Vec::new();
    header.extend_from_slice(b"HTTP/1.0 301 Moved Permanently\r\n");
    header.extend_from_slice(b"Location: ");
    header.extend_from_slice(&location);
    header.extend_from_slice(b"\r\nContent-Length: 0\r\n\r\n");

    let _ = head_only;
    w.write_all(&header)?;
    Ok((301, 0))
}

fn write_not_modified<W: Write>(w: &mut W, resolved: &Resolved) -> io::Result<(u16, u64)> {
    let header = format!(
        "HTTP/1.0 304 Not Modified\r\nDate: {}\r\nServer: sws/1.0\r\nLast-Modified: {}\r\nContent-Length: 0\r\n\r\n",
        date::format_now(),
        date::format_imf(header_mtime(resolved))
    );
    w.write_all(header.as_bytes())?;
    Ok((304, 0))
}

/// The resource's modification time, for `Last-Modified` headers on
/// outcomes 6-9. Falls back to the epoch if metadata is unavailable,
/// which only happens for directories/files that vanished between
/// resolve and write (resolver.rs always attaches `meta` when `exists`).
fn header_mtime(resolved: &Resolved) -> std::time::SystemTime {
    resolved
        .meta
        .as_ref()
        .and_then(|m| m.modified().ok())
        .unwrap_or(UNIX_EPOCH)
}

fn write_dir_listing<W: Write>(
    w: &mut W,
    uri: &[u8],
    resolved: &Resolved,
    head_only: bool,
) -> io::Result<(u16, u64)> {
    let uri_str = String::from_utf8_lossy(uri);
    let mut body = format!(
        "<html><head><title>Index of {uri}</title></head>\n\
         <body><h1>Index of {uri}</h1><ul>\n",
        uri = html_escape(&uri_str)
    );

    let mut prefix = uri_str.to_string();
    if !prefix.ends_with('/') {
        prefix.push('/');
    }

    let entries = std::fs::read_dir(&resolved.outpath)?;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with('.') {
            continue;
        }
        body.push_str(&format!(
            "  <li><a href=\"{}{name}\">{name}</a></li>\n",
            prefix,
            name = name
        ));
    }
    body.push_str("</ul></body></html>");

    let body = body.into_bytes();
    let mut header = format!(
        "HTTP/1.0 200 OK\r\nDate: {}\r\nServer: sws/1.0\r\nLast-Modified: {}\r\nContent-Type: text/html\r\nContent-Length: {}\r\n\r\n",
        date::format_now(),
        date::format_imf(header_mtime(resolved)),
        body.len()
    )
    .into_bytes();

    if head_only {
        w.write_all(&header)?;
        return Ok((200, body.len() as u64));
    }

    header.extend_from_slice(&body);
    w.write_all(&header)?;
    Ok((200, body.len() as u64))
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn write_file<W: Write>(w: &mut W, resolved: &Resolved, head_only: bool) -> io::Result<(u16, u64)> {
    let mut file = match File::open(&resolved.outpath) {
        Ok(f) => f,
        Err(_) => return write_fixed(w, Outcome::Forbidden, head_only),
    };

    let len = resolved
        .meta
        .as_ref()
        .map(|m| m.len())
        .unwrap_or(0);
    let content_type = mime_guess::from_path(&resolved.outpath)
        .first_raw()
        .unwrap_or("application/octet-stream");

    let header = format!(
        "HTTP/1.0 200 OK\r\nDate: {}\r\nServer: sws/1.0\r\nLast-Modified: {}\r\nContent-Type: {}\r\nContent-Length: {}\r\n\r\n",
        date::format_now(),
        date::format_imf(header_mtime(resolved)),
        content_type,
        len
    );
    w.write_all(header.as_bytes())?;

    if head_only {
        return Ok((200, len));
    }

    let mut buf = [0u8; WRITE_BUF];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        w.write_all(&buf[..n])?;
    }

    Ok((200, len))
}

/// Whether the outcome's body should be suppressed — always false for GET.
pub fn suppress_body(method: Method) -> bool {
    method == Method::Head
}
