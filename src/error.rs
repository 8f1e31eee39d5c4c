//! Setup failures.
//!
//! Everything in here is fatal for the caller that constructs the failing
//! object: nothing is retried internally. Transient I/O (would-block) never
//! shows up as an [`Error`]; see [`Connection`](crate::net::Connection) for
//! how those are reported.

use std::io;

use thiserror::Error;

/// Result alias for constructors that can hit a setup fault.
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal conditions raised synchronously while building a listener, a
/// server or a sendfile transfer.
#[derive(Debug, Error)]
pub enum Error {
    /// `socket(2)` did not hand out a descriptor.
    #[error("could not acquire a socket: {0}")]
    SocketAcquire(#[source] io::Error),

    /// `bind(2)` failed, usually because the port is taken.
    #[error("could not bind socket: {0}")]
    SocketBind(#[source] io::Error),

    /// `listen(2)` failed.
    #[error("could not start listening: {0}")]
    ListenStart(#[source] io::Error),

    /// The file to transfer could not be opened.
    #[error("sendfile source not found: {0}")]
    SendfileNotFound(#[source] io::Error),

    /// The path exists but is not a regular file.
    #[error("sendfile source is not a regular file")]
    SendfileNotFile,

    /// The starting offset lies past the end of the file.
    #[error("sendfile offset {offset} is beyond file size {size}")]
    SendfileBadOffset { offset: u64, size: u64 },

    /// A worker or master thread could not be spawned.
    #[error("could not spawn server thread: {0}")]
    Spawn(#[source] io::Error),
}

impl Error {
    /// True for the listener setup stages (acquire, bind, listen).
    pub fn is_socket_setup(&self) -> bool {
        matches!(
            self,
            Error::SocketAcquire(_) | Error::SocketBind(_) | Error::ListenStart(_)
        )
    }

    /// True for the sendfile construction failures.
    pub fn is_sendfile(&self) -> bool {
        matches!(
            self,
            Error::SendfileNotFound(_) | Error::SendfileNotFile | Error::SendfileBadOffset { .. }
        )
    }
}
