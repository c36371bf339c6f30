//! Accept Loop (C8): binds the listening socket, reaps terminated
//! children, and forks one worker per accepted connection.
//!
//! `nix::poll` stands in for `select()`/`fd_set`, which Rust's standard
//! library has no direct equivalent for; this is a mechanical substitution
//! of the same single-fd, 5-second-timeout wait the original C server
//! performs, not a behavioral change. The raw `nix::sys::socket` setup
//! (rather than `std::net::TcpListener::bind`) exists solely so
//! `IPV6_V6ONLY` can be cleared before `bind()`, which is what gives the
//! wildcard `::` address its dual-stack behavior.

use std::net::{IpAddr, SocketAddrV4, SocketAddrV6, TcpListener, TcpStream};
use std::os::fd::{AsFd, AsRawFd, FromRawFd, IntoRawFd};

use log::{error, info};
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::sys::signal::{self, SigHandler, Signal};
use nix::sys::socket::{
    bind, listen, setsockopt, socket, sockopt, AddressFamily, Backlog, SockFlag, SockType,
    SockaddrIn, SockaddrIn6,
};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{fork, ForkResult, Pid};

use crate::access_log::Sink;
use crate::errors::{Error, Result};
use crate::worker::{self, WorkerConfig};

const POLL_TIMEOUT_MS: u16 = 5000;
const LISTEN_BACKLOG: i32 = 5;

pub struct AcceptConfig {
    pub address: IpAddr,
    pub port: u16,
    pub debug: bool,
    pub worker: WorkerConfig,
}

/// Runs the accept loop forever. Only returns on a startup failure (bind,
/// listen, or signal-handler installation); once serving begins, errors
/// on individual connections are logged and the loop continues.
pub fn run(cfg: AcceptConfig, mut log: Sink) -> Result<()> {
    let listener = bind_dual_stack(cfg.address, cfg.port)?;
    install_sigchld_handler()?;

    if !cfg.debug {
        daemonize();
    }

    info!("sws listening on {}:{}", cfg.address, cfg.port);

    loop {
        match wait_readable(&listener) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(e) => {
                error!("poll on listen socket failed: {}", e);
                continue;
            }
        }

        match listener.accept() {
            Ok((stream, _peer)) => spawn_worker(stream, &cfg.worker, &mut log),
            Err(e) => error!("accept failed: {}", e),
        }
    }
}

/// Forks a worker to handle `stream`. The parent's copy of the socket is
/// dropped immediately so only the child keeps it open.
fn spawn_worker(stream: TcpStream, worker_cfg: &WorkerConfig, log: &mut Sink) {
    match unsafe { fork() } {
        Ok(ForkResult::Child) => {
            worker::handle(stream, worker_cfg, log);
            std::process::exit(0);
        }
        Ok(ForkResult::Parent { .. }) => {
            drop(stream);
        }
        Err(e) => error!("fork failed: {}", e),
    }
}

/// Waits up to `POLL_TIMEOUT_MS` for the listen socket to become
/// readable. `Ok(false)` means the wait timed out with nothing to accept.
fn wait_readable(listener: &TcpListener) -> std::io::Result<bool> {
    let fd = listener.as_fd();
    let mut fds = [PollFd::new(fd, PollFlags::POLLIN)];

    match poll(&mut fds, PollTimeout::from(POLL_TIMEOUT_MS)) {
        Ok(0) => Ok(false),
        Ok(_) => Ok(true),
        Err(nix::errno::Errno::EINTR) => Ok(false),
        Err(e) => Err(std::io::Error::from(e)),
    }
}

extern "C" fn reap_children(_signum: libc::c_int) {
    loop {
        match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => break,
            Ok(_) => continue,
            Err(_) => break,
        }
    }
}

fn install_sigchld_handler() -> Result<()> {
    unsafe {
        signal::signal(Signal::SIGCHLD, SigHandler::Handler(reap_children))?;
    }
    Ok(())
}

/// Detaches from the controlling terminal via `daemon(3)`. Changing to
/// `/` and keeping stdio open (nochdir=1, noclose=1) since the log sink
/// and CGI children depend on inherited descriptors staying valid.
fn daemonize() {
    unsafe {
        libc::daemon(1, 1);
    }
}

fn bind_dual_stack(addr: IpAddr, port: u16) -> Result<TcpListener> {
    let family = match addr {
        IpAddr::V6(_) => AddressFamily::Inet6,
        IpAddr::V4(_) => AddressFamily::Inet,
    };

    let fd = socket(family, SockType::Stream, SockFlag::empty(), None)?;
    setsockopt(&fd, sockopt::ReuseAddr, &true)?;

    if family == AddressFamily::Inet6 {
        setsockopt(&fd, sockopt::Ipv6V6Only, &false)?;
    }

    match addr {
        IpAddr::V6(v6) => {
            let sockaddr = SockaddrIn6::from(SocketAddrV6::new(v6, port, 0, 0));
            bind(fd.as_raw_fd(), &sockaddr)?;
        }
        IpAddr::V4(v4) => {
            let sockaddr = SockaddrIn::from(SocketAddrV4::new(v4, port));
            bind(fd.as_raw_fd(), &sockaddr)?;
        }
    }

    listen(&fd, Backlog::new(LISTEN_BACKLOG)?)?;

    Ok(unsafe { TcpListener::from_raw_fd(fd.into_raw_fd()) })
}

/// Resolves the configured bind address, or the IPv6 wildcard default.
pub fn resolve_bind_address(configured: Option<&str>) -> Result<IpAddr> {
    match configured {
        Some(s) => s.parse().map_err(|_| Error::NoBindAddress),
        None => Ok(IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)),
    }
}
