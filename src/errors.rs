//! Error handling for startup and internal (non-per-request) failures.
//!
//! Per-request branching (400 vs 403 vs 404 vs ...) is not modeled here —
//! see `request::ParseFailure`, `resolver::ResolveFailure` and
//! `response::Outcome` for that. This enum only covers things that abort a
//! worker or the whole server: socket setup, log-file access, CGI process
//! plumbing.

use std::io;

/// A `Result` for internal operations.
pub type Result<T> = ::std::result::Result<T, Error>;

/// All startup/internal errors which might arise within the application.
#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    Nix(nix::Error),
    /// The log file could not be opened for appending.
    LogOpen(io::Error),
    /// No usable address was returned for the requested bind interface.
    NoBindAddress,
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Error {
        Error::Io(e)
    }
}

impl From<nix::Error> for Error {
    fn from(e: nix::Error) -> Error {
        Error::Nix(e)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Nix(e) => write!(f, "system call failed: {}", e),
            Error::LogOpen(e) => write!(f, "could not open log file: {}", e),
            Error::NoBindAddress => write!(f, "no address to bind to"),
        }
    }
}

impl std::error::Error for Error {}
