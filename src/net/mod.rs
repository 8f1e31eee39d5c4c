//! Socket primitives.
//!
//! - [`socket`]: [`Socket`], the owned descriptor handle
//! - [`connection`]: [`Connection`], non-blocking read/write/sendfile
//! - [`listener`]: [`Listener`], the dual-stack accepting socket
//! - [`utils`]: address conversion and errno helpers

pub mod connection;
pub mod listener;
pub mod socket;
pub(crate) mod utils;

pub use connection::{Connection, READ_CHUNK};
pub use listener::Listener;
pub use socket::Socket;

/// Two connected, non-blocking unix stream sockets.
#[cfg(test)]
pub(crate) fn connection_pair() -> (Connection, Connection) {
    let mut fds = [0; 2];
    let ret = unsafe {
        libc::socketpair(
            libc::AF_UNIX,
            libc::SOCK_STREAM | libc::SOCK_NONBLOCK,
            0,
            fds.as_mut_ptr(),
        )
    };
    assert_eq!(ret, 0, "socketpair: {}", std::io::Error::last_os_error());

    unsafe {
        (
            Connection::from(Socket::from_raw_fd(fds[0])),
            Connection::from(Socket::from_raw_fd(fds[1])),
        )
    }
}
