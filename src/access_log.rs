//! Access Logger (C6): one line per request that reaches the composer.
//!
//! `log_util::ascii_escape` (already in this tree, used elsewhere for safe
//! diagnostic formatting) does the escaping of the echoed request line.
//! Timestamp formatting uses `chrono`, the ISO-8601/UTC-formatting crate
//! used for this purpose elsewhere in the retrieved corpus
//! (`chefaiqbal-Rust-Server`).

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use chrono::Utc;

use crate::log_util::ascii_escape;

/// Where access log lines are appended.
pub enum Sink {
    File(std::fs::File),
    Stdout,
}

impl Sink {
    /// Opens `path` in append mode, creating it with mode 0664 if absent.
    pub fn open_file(path: &Path) -> io::Result<Sink> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .mode(0o664)
            .open(path)?;
        Ok(Sink::File(file))
    }

    pub fn stdout() -> Sink {
        Sink::Stdout
    }

    /// Appends one log line: `addr timestamp "request_line" status bytes`.
    /// Emitted in a single `write_all` so the line stays atomic against
    /// interleaving from sibling worker processes.
    pub fn log(&mut self, addr: &str, request_line: &[u8], status: u16, body_bytes: u64) {
        let line = format!(
            "{} {} \"{}\" {} {}\n",
            addr,
            Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
            ascii_escape(request_line),
            status,
            body_bytes
        );

        let result = match self {
            Sink::File(f) => f.write_all(line.as_bytes()),
            Sink::Stdout => io::stdout().write_all(line.as_bytes()),
        };

        if let Err(e) = result {
            eprintln!("sws: failed to write access log line: {}", e);
        }
    }
}
