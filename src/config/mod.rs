//! Server configuration, built from parsed CLI flags rather than the
//! TOML file the teacher used — spec's external interface is a CLI, so
//! `config::parser`'s TOML parsing has no counterpart here and is no
//! longer wired into the module tree (see `main.rs`). `Config` itself
//! keeps the teacher's shape: a small plain struct built once at startup
//! and handed down to the parts of the server that need it.

use std::net::IpAddr;
use std::path::PathBuf;

use crate::errors::{Error, Result};

/// Default TCP port, matching spec's CLI default.
pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone)]
pub struct Config {
    /// The document root, canonicalized once here so the resolver never
    /// needs to re-canonicalize it per request.
    pub realroot: PathBuf,
    pub cgidir: Option<PathBuf>,
    pub address: IpAddr,
    pub port: u16,
    pub log_file: Option<PathBuf>,
    pub debug: bool,
}

impl Config {
    /// Validates and normalizes a parsed CLI invocation into a `Config`.
    /// The only real work here is canonicalizing `docroot` up front; all
    /// other fields are passed through.
    pub fn from_cli(cli: &crate::cli::Cli) -> Result<Config> {
        let realroot = std::fs::canonicalize(&cli.docroot)?;

        let address = match &cli.interface {
            Some(s) => s.parse().map_err(|_| Error::NoBindAddress)?,
            None => IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED),
        };

        Ok(Config {
            realroot,
            cgidir: cli.cgi_dir.clone(),
            address,
            port: cli.port,
            log_file: cli.log_file.clone(),
            debug: cli.debug,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn cli_with_docroot(docroot: PathBuf) -> crate::cli::Cli {
        crate::cli::Cli {
            debug: true,
            cgi_dir: None,
            interface: None,
            log_file: None,
            port: DEFAULT_PORT,
            docroot,
        }
    }

    #[test]
    fn canonicalizes_docroot() {
        let dir = tempfile::tempdir().unwrap();
        let cli = cli_with_docroot(dir.path().to_path_buf());

        let config = Config::from_cli(&cli).unwrap();
        assert_eq!(config.realroot, std::fs::canonicalize(dir.path()).unwrap());
        assert!(config.debug);
    }

    #[test]
    fn default_address_is_v6_wildcard() {
        let dir = tempfile::tempdir().unwrap();
        let cli = cli_with_docroot(dir.path().to_path_buf());

        let config = Config::from_cli(&cli).unwrap();
        assert_eq!(config.address, IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED));
    }
}
