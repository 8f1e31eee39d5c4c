//! Dual-stack listening socket.
//!
//! A [`Listener`] binds `[::]:port` with IPv4 allowed, so both IPv6 and
//! IPv4 clients can connect. [`Listener::accept`] never blocks: it drains
//! every pending connection the kernel has queued, hands each one to the
//! callback given at construction, and returns as soon as `accept` would
//! block.
//!
//! # Usage
//!
//! ```ignore
//! use pulsar::net::Listener;
//!
//! let mut listener = Listener::new(8080, |connection| {
//!     println!("New connection from {:?}", connection.peer_addr());
//! })?;
//!
//! loop {
//!     listener.accept();
//!     std::thread::sleep(std::time::Duration::from_millis(50));
//! }
//! ```

use crate::error::{Error, Result};
use crate::net::connection::Connection;
use crate::net::socket::Socket;
use crate::net::utils::{any_sockaddr_in6, set_nonblocking, sockaddr_to_socketaddr, would_block};

use libc::{
    AF_INET6, ECONNABORTED, EINTR, IPPROTO_IPV6, IPV6_V6ONLY, SO_REUSEADDR, SO_REUSEPORT,
    SOCK_CLOEXEC, SOCK_NONBLOCK, SOCK_STREAM, SOL_SOCKET, SOMAXCONN, accept4, bind, c_int,
    getsockname, listen, setsockopt, sockaddr, sockaddr_in6, socket, socklen_t,
};
use std::fmt;
use std::io;
use std::mem;
use std::net::SocketAddr;
use std::os::fd::AsRawFd;

/// Callback invoked once per accepted connection.
pub type AcceptCallback = Box<dyn FnMut(Connection) + Send>;

/// A bound, listening, non-blocking socket plus its accept callback.
pub struct Listener {
    socket: Socket,
    on_accept: AcceptCallback,
}

impl Listener {
    /// Binds a dual-stack listener on `port` (0 picks an ephemeral port).
    ///
    /// This method performs the following:
    /// 1. Creates an IPv6 stream socket and makes it non-blocking
    /// 2. Enables `SO_REUSEADDR` and `SO_REUSEPORT`, disables `IPV6_V6ONLY`
    /// 3. Binds to `[::]:port`
    /// 4. Starts listening with a `SOMAXCONN` backlog
    ///
    /// Each stage fails with its own [`Error`] variant:
    /// [`Error::SocketAcquire`], [`Error::SocketBind`] or
    /// [`Error::ListenStart`].
    ///
    /// Because of `SO_REUSEPORT`, two `Listener`s on the same port both bind
    /// and the kernel spreads incoming connections between them. Binding
    /// fails only against a socket that did not opt into port reuse.
    pub fn new<F>(port: u16, on_accept: F) -> Result<Self>
    where
        F: FnMut(Connection) + Send + 'static,
    {
        let file_descriptor = unsafe { socket(AF_INET6, SOCK_STREAM | SOCK_CLOEXEC, 0) };
        if file_descriptor < 0 {
            return Err(Error::SocketAcquire(io::Error::last_os_error()));
        }

        // From here on the descriptor is released on every error path.
        let socket = Socket::new(file_descriptor, None);
        set_nonblocking(file_descriptor).map_err(Error::SocketAcquire)?;

        let options = [
            ("SO_REUSEADDR", SOL_SOCKET, SO_REUSEADDR, 1),
            ("SO_REUSEPORT", SOL_SOCKET, SO_REUSEPORT, 1),
            ("IPV6_V6ONLY", IPPROTO_IPV6, IPV6_V6ONLY, 0),
        ];
        for (option, level, name, value) in options {
            if let Err(err) = set_option(file_descriptor, level, name, value) {
                tracing::warn!(error = %err, option, "setsockopt failed");
            }
        }

        let address = any_sockaddr_in6(port);
        let ret = unsafe {
            bind(
                file_descriptor,
                &address as *const _ as *const sockaddr,
                mem::size_of::<sockaddr_in6>() as socklen_t,
            )
        };
        if ret < 0 {
            return Err(Error::SocketBind(io::Error::last_os_error()));
        }

        let ret = unsafe { listen(file_descriptor, SOMAXCONN) };
        if ret < 0 {
            return Err(Error::ListenStart(io::Error::last_os_error()));
        }

        let listener = Self {
            socket,
            on_accept: Box::new(on_accept),
        };

        tracing::info!(
            port,
            local = ?listener.local_addr().ok(),
            "listener bound"
        );

        Ok(listener)
    }

    /// Accepts every pending connection, invoking the callback for each in
    /// acceptance order, and returns how many were accepted.
    ///
    /// Returns once the kernel reports that `accept` would block. Other
    /// accept failures (for instance running out of descriptors) also end
    /// the call; whatever is still queued is picked up next time.
    pub fn accept(&mut self) -> usize {
        let mut accepted = 0;

        loop {
            let mut address: sockaddr_in6 = unsafe { mem::zeroed() };
            let mut length = mem::size_of::<sockaddr_in6>() as socklen_t;

            let client = unsafe {
                accept4(
                    self.socket.as_raw_fd(),
                    &mut address as *mut _ as *mut sockaddr,
                    &mut length,
                    SOCK_NONBLOCK | SOCK_CLOEXEC,
                )
            };

            if client < 0 {
                let err = io::Error::last_os_error();
                if would_block(&err) {
                    return accepted;
                }

                match err.raw_os_error() {
                    Some(EINTR) | Some(ECONNABORTED) => continue,
                    _ => {
                        tracing::warn!(error = %err, accepted, "accept failed");
                        return accepted;
                    }
                }
            }

            let peer = sockaddr_to_socketaddr(&address);
            (self.on_accept)(Connection::new(Socket::new(client, Some(peer))));
            accepted += 1;
        }
    }

    /// Returns the local address this listener is bound to.
    ///
    /// Useful after binding port 0 to learn the port the kernel picked.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        let mut address: sockaddr_in6 = unsafe { mem::zeroed() };
        let mut length = mem::size_of::<sockaddr_in6>() as socklen_t;
        let result = unsafe {
            getsockname(
                self.socket.as_raw_fd(),
                &mut address as *mut _ as *mut sockaddr,
                &mut length,
            )
        };

        if result < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(sockaddr_to_socketaddr(&address))
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("socket", &self.socket)
            .finish_non_exhaustive()
    }
}

fn set_option(file_descriptor: i32, level: c_int, name: c_int, value: c_int) -> io::Result<()> {
    let ret = unsafe {
        setsockopt(
            file_descriptor,
            level,
            name,
            &value as *const c_int as *const _,
            mem::size_of::<c_int>() as socklen_t,
        )
    };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_option_reports_failure() {
        let err = set_option(-1, SOL_SOCKET, SO_REUSEADDR, 1).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EBADF));
    }

    #[test]
    fn test_set_option_on_fresh_socket() {
        let fd = unsafe { socket(AF_INET6, SOCK_STREAM | SOCK_CLOEXEC, 0) };
        assert!(fd >= 0);
        let _owned = Socket::new(fd, None);

        set_option(fd, SOL_SOCKET, SO_REUSEADDR, 1).unwrap();
        set_option(fd, SOL_SOCKET, SO_REUSEPORT, 1).unwrap();
        set_option(fd, IPPROTO_IPV6, IPV6_V6ONLY, 0).unwrap();
    }
}
