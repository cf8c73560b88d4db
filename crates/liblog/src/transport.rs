// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Per-process datagram channel to the log daemon.
//!
//! The socket is created lazily on first use and installed with a single
//! compare-and-exchange, so the write path never takes a lock. A thread that loses the
//! install race closes its own socket and uses the winner's.

use std::io;
use std::mem::ManuallyDrop;
use std::os::fd::{FromRawFd, IntoRawFd, RawFd};
use std::os::unix::net::UnixDatagram;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI32, Ordering};

use tracing::debug;

const UNINITIALIZED: RawFd = -1;

/// A connection-oriented view of the daemon socket, as seen by the writer.
pub trait Transport: Send + Sync {
    /// Makes sure a socket exists, creating and installing one if needed.
    fn acquire(&self) -> io::Result<()>;

    /// Sends one whole datagram and returns the number of bytes written.
    fn send(&self, datagram: &[u8]) -> io::Result<usize>;

    /// Reconnects the existing socket to the daemon address.
    fn reconnect(&self);

    /// Closes the socket and returns to the uninitialized state.
    ///
    /// Not safe to race with writers; meant for single-threaded points such as right
    /// after a fork.
    fn reset(&self);
}

/// Lazily-connected datagram socket to the daemon.
#[derive(Debug)]
pub struct LogdSocket {
    sock: AtomicI32,
    blocking: bool,
    path: PathBuf,
}

impl LogdSocket {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, blocking: bool) -> Self {
        LogdSocket {
            sock: AtomicI32::new(UNINITIALIZED),
            blocking,
            path: path.into(),
        }
    }

    #[must_use]
    pub fn is_blocking(&self) -> bool {
        self.blocking
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Descriptor currently installed, if any.
    #[must_use]
    pub fn raw_fd(&self) -> Option<RawFd> {
        match self.sock.load(Ordering::Acquire) {
            UNINITIALIZED => None,
            fd => Some(fd),
        }
    }

    // Connecting an already connected datagram socket is allowed; reconnect relies on it.
    fn connect(socket: &UnixDatagram, path: &Path) -> io::Result<()> {
        loop {
            match socket.connect(path) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                result => return result,
            }
        }
    }

    fn install(&self) -> io::Result<RawFd> {
        let current = self.sock.load(Ordering::Acquire);
        if current != UNINITIALIZED {
            return Ok(current);
        }

        let socket = UnixDatagram::unbound()?;
        socket.set_nonblocking(!self.blocking)?;
        if let Err(e) = Self::connect(&socket, &self.path) {
            // The socket is still installed; the first failing write reconnects.
            debug!("Failed to connect to {}: {}", self.path.display(), e);
        }

        let fd = socket.into_raw_fd();
        match self
            .sock
            .compare_exchange(UNINITIALIZED, fd, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Ok(fd),
            Err(winner) => {
                // SAFETY: `fd` came from `into_raw_fd` above and was never published.
                drop(unsafe { UnixDatagram::from_raw_fd(fd) });
                Ok(winner)
            }
        }
    }

    fn with_socket<R>(&self, f: impl FnOnce(&UnixDatagram) -> io::Result<R>) -> io::Result<R> {
        let fd = self.install()?;
        // SAFETY: the descriptor stays owned by `self.sock` until `reset`; ManuallyDrop
        // keeps this temporary view from closing it.
        let socket = ManuallyDrop::new(unsafe { UnixDatagram::from_raw_fd(fd) });
        f(&socket)
    }
}

impl Transport for LogdSocket {
    fn acquire(&self) -> io::Result<()> {
        self.install().map(|_| ())
    }

    fn send(&self, datagram: &[u8]) -> io::Result<usize> {
        self.with_socket(|socket| loop {
            match socket.send(datagram) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                result => return result,
            }
        })
    }

    fn reconnect(&self) {
        let result = self.with_socket(|socket| Self::connect(socket, &self.path));
        if let Err(e) = result {
            debug!("Failed to reconnect to {}: {}", self.path.display(), e);
        }
    }

    fn reset(&self) {
        let fd = self.sock.swap(UNINITIALIZED, Ordering::AcqRel);
        if fd != UNINITIALIZED {
            // SAFETY: swapping the descriptor out transferred its ownership to us.
            drop(unsafe { UnixDatagram::from_raw_fd(fd) });
        }
    }
}

impl Drop for LogdSocket {
    fn drop(&mut self) {
        self.reset();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::{Arc, Barrier};
    use std::thread;
    use tempfile::TempDir;

    fn bind_daemon(dir: &TempDir) -> (UnixDatagram, PathBuf) {
        let path = dir.path().join("logdw");
        let daemon = UnixDatagram::bind(&path).expect("bind daemon socket");
        (daemon, path)
    }

    #[test]
    fn test_lazy_connect_and_send() {
        let dir = TempDir::new().unwrap();
        let (daemon, path) = bind_daemon(&dir);
        let socket = LogdSocket::new(&path, true);
        assert!(socket.raw_fd().is_none());

        assert_eq!(socket.send(b"hello").unwrap(), 5);
        assert!(socket.raw_fd().is_some());

        let mut buf = [0u8; 16];
        let n = daemon.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello");
    }

    #[test]
    fn test_concurrent_acquire_installs_one_descriptor() {
        let dir = TempDir::new().unwrap();
        let (_daemon, path) = bind_daemon(&dir);
        let socket = Arc::new(LogdSocket::new(&path, false));
        let threads = 16;
        let barrier = Arc::new(Barrier::new(threads));

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let socket = Arc::clone(&socket);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    socket.acquire().unwrap();
                    socket.raw_fd().unwrap()
                })
            })
            .collect();

        let fds: HashSet<RawFd> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(fds.len(), 1);
        assert_eq!(fds.into_iter().next(), socket.raw_fd());
    }

    #[test]
    fn test_reset_returns_to_uninitialized() {
        let dir = TempDir::new().unwrap();
        let (daemon, path) = bind_daemon(&dir);
        let socket = LogdSocket::new(&path, true);
        socket.acquire().unwrap();
        assert!(socket.raw_fd().is_some());

        socket.reset();
        assert!(socket.raw_fd().is_none());

        // The next write re-acquires.
        socket.send(b"again").unwrap();
        let mut buf = [0u8; 16];
        let n = daemon.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"again");
    }

    #[test]
    fn test_send_without_daemon_fails_but_installs() {
        let dir = TempDir::new().unwrap();
        let socket = LogdSocket::new(dir.path().join("missing"), false);
        assert!(socket.acquire().is_ok());
        assert!(socket.send(b"lost").is_err());
        assert!(socket.raw_fd().is_some());
    }

    #[test]
    fn test_reconnect_recovers_after_daemon_restart() {
        let dir = TempDir::new().unwrap();
        let (daemon, path) = bind_daemon(&dir);
        let socket = LogdSocket::new(&path, true);
        socket.send(b"first").unwrap();

        drop(daemon);
        std::fs::remove_file(&path).unwrap();
        let (daemon, _) = bind_daemon(&dir);

        assert!(socket.send(b"stale").is_err());
        socket.reconnect();
        socket.send(b"second").unwrap();

        let mut buf = [0u8; 16];
        let n = daemon.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"second");
    }

    #[test]
    fn test_non_blocking_flag() {
        let dir = TempDir::new().unwrap();
        assert!(!LogdSocket::new(dir.path().join("x"), false).is_blocking());
        assert!(LogdSocket::new(dir.path().join("x"), true).is_blocking());
    }
}
