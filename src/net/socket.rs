//! Owned socket descriptor.
//!
//! A [`Socket`] holds at most one OS descriptor and releases it exactly once:
//! either when dropped (shutdown of both directions, then `close`) or when the
//! descriptor is handed out with [`Socket::into_raw_fd`]. Sockets cannot be
//! cloned, so moving one is the only way to pass the descriptor along.

use libc::{SHUT_RDWR, close, shutdown};
use std::mem;
use std::net::SocketAddr;
use std::os::fd::{AsRawFd, RawFd};

const NO_DESCRIPTOR: RawFd = -1;

/// An owned, move-only socket descriptor plus the peer address captured at
/// accept time.
#[derive(Debug)]
pub struct Socket {
    file_descriptor: RawFd,
    peer: Option<SocketAddr>,
}

impl Socket {
    pub(crate) fn new(file_descriptor: RawFd, peer: Option<SocketAddr>) -> Self {
        Self {
            file_descriptor,
            peer,
        }
    }

    /// Adopts an already-open descriptor.
    ///
    /// # Safety
    /// `file_descriptor` must be open and must not be owned by anything else;
    /// it will be shut down and closed when the returned socket is dropped.
    pub unsafe fn from_raw_fd(file_descriptor: RawFd) -> Self {
        Self::new(file_descriptor, None)
    }

    /// Address of the remote end, when this socket came from `accept`.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// True while the socket still owns a descriptor.
    pub fn is_open(&self) -> bool {
        self.file_descriptor != NO_DESCRIPTOR
    }

    /// Gives up ownership of the descriptor without closing it.
    pub fn into_raw_fd(mut self) -> RawFd {
        mem::replace(&mut self.file_descriptor, NO_DESCRIPTOR)
    }
}

impl AsRawFd for Socket {
    fn as_raw_fd(&self) -> RawFd {
        self.file_descriptor
    }
}

impl Drop for Socket {
    fn drop(&mut self) {
        if self.file_descriptor == NO_DESCRIPTOR {
            return;
        }

        unsafe {
            shutdown(self.file_descriptor, SHUT_RDWR);
            close(self.file_descriptor);
        }
        self.file_descriptor = NO_DESCRIPTOR;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> (RawFd, RawFd) {
        let mut fds = [0; 2];
        let ret = unsafe { libc::socketpair(libc::AF_UNIX, libc::SOCK_STREAM, 0, fds.as_mut_ptr()) };
        assert_eq!(ret, 0, "socketpair: {}", std::io::Error::last_os_error());
        (fds[0], fds[1])
    }

    fn is_open(fd: RawFd) -> bool {
        unsafe { libc::fcntl(fd, libc::F_GETFD) != -1 }
    }

    fn peer_sees_eof(fd: RawFd) -> bool {
        let mut buf = [0u8; 1];
        unsafe { libc::read(fd, buf.as_mut_ptr() as *mut _, 1) == 0 }
    }

    #[test]
    fn test_drop_closes_descriptor() {
        let (a, b) = pair();
        let socket = unsafe { Socket::from_raw_fd(a) };
        assert!(socket.is_open());

        drop(socket);
        assert!(peer_sees_eof(b));

        unsafe { libc::close(b) };
    }

    #[test]
    fn test_into_raw_fd_transfers_ownership() {
        let (a, b) = pair();
        let socket = unsafe { Socket::from_raw_fd(a) };

        let raw = socket.into_raw_fd();
        assert_eq!(raw, a);
        assert!(is_open(a), "transfer-out must not close the descriptor");

        unsafe {
            libc::close(a);
            libc::close(b);
        }
    }

    #[test]
    fn test_move_keeps_single_owner() {
        let (a, b) = pair();
        let socket = unsafe { Socket::from_raw_fd(a) };
        let moved = socket;
        assert_eq!(moved.as_raw_fd(), a);
        assert_eq!(moved.peer_addr(), None);

        drop(moved);
        assert!(peer_sees_eof(b));

        unsafe { libc::close(b) };
    }
}
