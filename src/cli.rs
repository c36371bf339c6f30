//! Command-line parsing. The teacher parses a single `-f config_file` flag
//! with `clap`'s old `App`/`Arg` builder API (`main.rs`'s `get_args`); this
//! uses the current derive macros from the same crate for spec's richer
//! flag set.

use std::path::PathBuf;

use clap::Parser;

use crate::config::DEFAULT_PORT;

/// A minimal static-file HTTP/1.0 server with CGI support.
#[derive(Parser, Debug)]
#[command(name = "sws", version)]
pub struct Cli {
    /// Do not daemonize; log to standard output (overrides --log-file).
    #[arg(short = 'd', long = "debug")]
    pub debug: bool,

    /// CGI script directory; enables /cgi-bin routing.
    #[arg(short = 'c', long = "cgi-dir", value_name = "DIR")]
    pub cgi_dir: Option<PathBuf>,

    /// Bind address (default: wildcard dual-stack).
    #[arg(short = 'i', long = "interface", value_name = "ADDR")]
    pub interface: Option<String>,

    /// Append-mode log file, created with mode 0664 if absent.
    #[arg(short = 'l', long = "log-file", value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// TCP port to listen on.
    #[arg(short = 'p', long = "port", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Directory to serve.
    pub docroot: PathBuf,
}
