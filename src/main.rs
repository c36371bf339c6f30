//! sws: a minimal static-file HTTP/1.0 server with CGI support.
//!
//! Call it like this:
//!
//!     sws -p 8080 -c /srv/cgi-bin /srv/www
//!
//! One process is forked per accepted connection; the accept loop itself
//! never blocks on a request. See `accept::run` for the connection
//! lifecycle and `SPEC_FULL.md` for the full design.

mod access_log;
mod accept;
mod cgi;
mod cli;
mod config;
mod date;
mod errors;
mod log_util;
mod request;
mod resolver;
mod response;
mod worker;

use clap::Parser;
use log::error;

use std::process::exit;

fn init_logging() {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(log::LevelFilter::Info);

    if let Ok(var) = std::env::var("SWS_LOG") {
        builder.parse_filters(&var);
    }

    builder.init();
}

fn main() {
    init_logging();

    let cli = cli::Cli::parse();

    let config = match config::Config::from_cli(&cli) {
        Ok(c) => c,
        Err(e) => {
            error!("sws: {}", e);
            exit(1);
        }
    };

    let log_sink = if config.debug {
        access_log::Sink::stdout()
    } else {
        match &config.log_file {
            Some(path) => match access_log::Sink::open_file(path) {
                Ok(sink) => sink,
                Err(e) => {
                    error!("sws: {}", errors::Error::LogOpen(e));
                    exit(1);
                }
            },
            None => access_log::Sink::stdout(),
        }
    };

    let worker_config = worker::WorkerConfig {
        realroot: config.realroot.clone(),
        cgidir: config.cgidir.clone(),
    };

    let accept_config = accept::AcceptConfig {
        address: config.address,
        port: config.port,
        debug: config.debug,
        worker: worker_config,
    };

    if let Err(e) = accept::run(accept_config, log_sink) {
        error!("sws: {}", e);
        exit(1);
    }
}
