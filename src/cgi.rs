//! CGI Runner (C5): executes a resolved CGI script via a real
//! fork/pipe/exec, and forwards its stdout to the client verbatim.
//!
//! The server does not parse the script's output — unlike the teacher's
//! `cgi`/`fastcgi` modules, which exist to parse a FastCGI responder's
//! framed headers. This is a much smaller, literal fork-per-request
//! handoff, grounded in `nix::unistd`'s process primitives (the same
//! module used for privilege-dropping in the corpus, e.g.
//! `jedahan-httpd2`) rather than `std::process::Command`, since the
//! contract calls for `fork`+`pipe`+`dup2`+`exec`, not a managed child.

use std::ffi::CString;
use std::fs::File;
use std::io::{self, Read, Write};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::AsRawFd;
use std::path::Path;

use nix::sys::wait::waitpid;
use nix::unistd::{dup2, execvp, fork, pipe, ForkResult};

use crate::date;
use crate::request::Method;
use crate::resolver::split_query;

const READ_BUF: usize = 8192;

/// Runs `script`, streaming its stdout to `w` after a server-written
/// prologue. Returns `(status, body_bytes)` for the access logger; body
/// bytes are counted even when the method is `HEAD` and the bytes are
/// discarded rather than written, per spec.
pub fn run<W: Write>(
    w: &mut W,
    script: &Path,
    uri: &[u8],
    method: Method,
    remote_addr: &str,
) -> io::Result<(u16, u64)> {
    let (read_end, write_end) = match pipe() {
        Ok(fds) => fds,
        Err(_) => return write_internal_error(w),
    };

    // SAFETY: the child below only calls async-signal-safe functions
    // (dup2, execvp) before exec'ing or exiting; it never returns into
    // the caller's Rust control flow.
    match unsafe { fork() } {
        Ok(ForkResult::Child) => {
            drop(read_end);
            let _ = dup2(write_end.as_raw_fd(), 1);
            drop(write_end);

            set_cgi_env(uri, method, remote_addr);

            let path = match CString::new(script.as_os_str().as_bytes()) {
                Ok(p) => p,
                Err(_) => std::process::exit(1),
            };
            let _ = execvp(&path, &[path.clone()]);
            std::process::exit(1);
        }
        Ok(ForkResult::Parent { child }) => {
            drop(write_end);
            let mut pipe_reader = File::from(read_end);

            let prologue = format!(
                "HTTP/1.0 200 OK\r\nDate: {}\r\nServer: sws/1.0\r\n",
                date::format_now()
            );
            w.write_all(prologue.as_bytes())?;

            let forward = method != Method::Head;
            let mut count: u64 = 0;
            let mut buf = [0u8; READ_BUF];
            loop {
                let n = pipe_reader.read(&mut buf)?;
                if n == 0 {
                    break;
                }
                count += n as u64;
                if forward {
                    w.write_all(&buf[..n])?;
                }
            }

            let _ = waitpid(child, None);
            Ok((200, count))
        }
        Err(_) => write_internal_error(w),
    }
}

fn set_cgi_env(uri: &[u8], method: Method, remote_addr: &str) {
    use std::ffi::OsStr;

    let (_, query) = split_query(uri);

    std::env::set_var(
        "REQUEST_METHOD",
        match method {
            Method::Get => "GET",
            Method::Head => "HEAD",
        },
    );
    std::env::set_var("SCRIPT_NAME", OsStr::from_bytes(uri));
    std::env::set_var("SERVER_PROTOCOL", "HTTP/1.0");
    std::env::set_var("SERVER_SOFTWARE", "sws/1.0");
    std::env::set_var("GATEWAY_INTERFACE", "CGI/1.1");
    std::env::set_var("REMOTE_ADDR", remote_addr);
    std::env::set_var("QUERY_STRING", OsStr::from_bytes(query));
    std::env::set_var("REDIRECT_STATUS", "200");
}

fn write_internal_error<W: Write>(w: &mut W) -> io::Result<(u16, u64)> {
    let body = b"Internal Server Error\r\n";
    let header = format!(
        "HTTP/1.0 500 Internal Server Error\r\nContent-Type: text/plain\r\nContent-Length: {}\r\n\r\n",
        body.len()
    );
    w.write_all(header.as_bytes())?;
    w.write_all(body)?;
    Ok((500, body.len() as u64))
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    fn write_script(dir: &Path, body: &str) -> std::path::PathBuf {
        let path = dir.join("echo.sh");
        fs::write(&path, format!("#!/bin/sh\nprintf '{}'\n", body)).unwrap();
        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).unwrap();
        path
    }

    #[test]
    fn forwards_script_output_verbatim_for_get() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "Content-Type: text/plain\\r\\n\\r\\nx=1");

        let mut out = Vec::new();
        let (status, count) = run(&mut out, &script, b"/cgi-bin/echo?x=1", Method::Get, "127.0.0.1").unwrap();

        assert_eq!(status, 200);
        assert_eq!(count, "Content-Type: text/plain\r\n\r\nx=1".len() as u64);
        let text = String::from_utf8_lossy(&out);
        assert!(text.starts_with("HTTP/1.0 200 OK\r\n"));
        assert!(text.contains("Server: sws/1.0\r\n"));
        assert!(text.ends_with("x=1"));
    }

    #[test]
    fn counts_but_discards_body_for_head() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "Content-Type: text/plain\\r\\n\\r\\nx=1");

        let mut out = Vec::new();
        let (status, count) = run(&mut out, &script, b"/cgi-bin/echo?x=1", Method::Head, "127.0.0.1").unwrap();

        assert_eq!(status, 200);
        assert_eq!(count, "Content-Type: text/plain\r\n\r\nx=1".len() as u64);
        let text = String::from_utf8_lossy(&out);
        assert!(!text.contains("x=1"));
    }
}
