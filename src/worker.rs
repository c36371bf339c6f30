//! Connection Worker (C7): the per-connection pipeline run inside a
//! freshly forked child. One read, one response, one log line, then exit.
//!
//! The read-then-dispatch shape follows `server/mod.rs`'s connection
//! handling in the teacher, trimmed to a single blocking read (no
//! keep-alive, no chunked request bodies) per spec.

use std::io::Read;
use std::net::{IpAddr, SocketAddr, TcpStream};

use crate::access_log::Sink;
use crate::request::{self, ParseFailure, Request};
use crate::resolver::{self, ResolveFailure, Resolved};
use crate::response::{self, Outcome};

/// Static, per-server parameters a worker needs to do its job. Cheap to
/// clone per fork since it's all plain data (paths and an `Option<PathBuf>`).
#[derive(Clone)]
pub struct WorkerConfig {
    /// The document root, already canonicalized once at startup.
    pub realroot: std::path::PathBuf,
    pub cgidir: Option<std::path::PathBuf>,
}

/// Runs the full `READ -> PARSE -> RESOLVE -> COMPOSE -> WRITE -> LOG ->
/// CLOSE` pipeline for one accepted connection. Never returns an error to
/// its caller for anything short of a read/write failure on the socket
/// itself — everything else is folded into an HTTP response.
pub fn handle(mut stream: TcpStream, config: &WorkerConfig, log: &mut Sink) {
    let peer = match stream.peer_addr() {
        Ok(addr) => addr,
        Err(_) => return,
    };
    let remote_addr = format_remote_addr(peer);

    let mut buf = [0u8; request::MAX_REQUEST_SIZE];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let bytes = &buf[..n];

    let parse_result = request::parse(bytes);
    let resolve_result = resolve(config, &parse_result);
    let outcome = response::decide(&parse_result, &resolve_result);

    let uri: &[u8] = match &parse_result {
        Ok(req) => &req.uri,
        Err(_) => b"",
    };
    let head_only = match &parse_result {
        Ok(req) => response::suppress_body(req.method),
        Err(_) => false,
    };

    let write_result = match outcome {
        Outcome::Cgi => {
            let req = parse_result.as_ref().expect("Cgi outcome implies a parsed request");
            let resolved = resolve_result.as_ref().expect("Cgi outcome implies a resolved path");
            crate::cgi::run(&mut stream, &resolved.outpath, &req.uri, req.method, &remote_addr)
        }
        _ => {
            let resolved = resolve_result.as_ref().ok();
            response::write_response(&mut stream, outcome, uri, head_only, resolved)
        }
    };

    // A write failure mid-response leaves no recoverable state to log
    // truthfully: the client got a partial or no response, not the
    // status/byte-count we'd otherwise record. Report it and drop the
    // connection without writing a fabricated access-log entry.
    match write_result {
        Ok((status, body_bytes)) => {
            log.log(&remote_addr, &request_line_bytes(bytes), status, body_bytes);
        }
        Err(e) => {
            eprintln!("sws: write failed for {}: {}", remote_addr, e);
        }
    }
}

fn resolve(
    config: &WorkerConfig,
    parse_result: &Result<Request, ParseFailure>,
) -> Result<Resolved, ResolveFailure> {
    let req = match parse_result {
        Ok(req) => req,
        Err(_) => return Err(ResolveFailure::Forbidden),
    };
    resolver::resolve(&config.realroot, config.cgidir.as_deref(), &req.uri)
}

/// Returns the bytes of the request line only (up to but not including
/// `\r`), for the access log — matching spec's field definition exactly
/// even when the request failed to parse.
fn request_line_bytes(buf: &[u8]) -> Vec<u8> {
    match buf.windows(2).position(|w| w == b"\r\n") {
        Some(i) => buf[..i].to_vec(),
        None => match buf.iter().position(|&b| b == b'\r' || b == b'\n') {
            Some(i) => buf[..i].to_vec(),
            None => buf.to_vec(),
        },
    }
}

/// Formats a peer address the way spec's access-log field expects:
/// IPv6 as-is, IPv4 written as an IPv4-mapped IPv6 address.
pub fn format_remote_addr(addr: SocketAddr) -> String {
    match addr.ip() {
        IpAddr::V4(v4) => format!("::ffff:{}", v4),
        IpAddr::V6(v6) => v6.to_string(),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn request_line_stops_before_cr() {
        assert_eq!(
            request_line_bytes(b"GET / HTTP/1.0\r\nHost: x\r\n\r\n"),
            b"GET / HTTP/1.0"
        );
    }

    #[test]
    fn request_line_falls_back_to_whole_buffer_without_terminator() {
        assert_eq!(request_line_bytes(b"GET / HTTP/1.0"), b"GET / HTTP/1.0");
    }

    #[test]
    fn v4_address_is_mapped_into_v6_form() {
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        assert_eq!(format_remote_addr(addr), "::ffff:127.0.0.1");
    }

    #[test]
    fn v6_address_passes_through() {
        let addr: SocketAddr = "[::1]:9000".parse().unwrap();
        assert_eq!(format_remote_addr(addr), "::1");
    }
}
