//! Non-blocking byte I/O over an accepted socket.
//!
//! Every operation makes at most one attempt per syscall and reports the
//! outcome with the same three-way convention:
//!
//! - `Ok(n)` with `n > 0`: `n` bytes were moved.
//! - `Ok(0)`: the kernel would have blocked; try again on a later cycle.
//! - `Err(_)`: the connection is unusable (peer closed or a real error).
//!
//! A peer that closed its end is reported as an error of kind
//! [`io::ErrorKind::UnexpectedEof`], never as would-block.

use crate::fs::SendfileTransfer;
use crate::net::socket::Socket;
use crate::net::utils::nonblocking_result;

use libc::{MSG_NOSIGNAL, off_t, recv, send};
use std::io;
use std::net::SocketAddr;
use std::os::fd::{AsRawFd, RawFd};

/// Chunk size used by [`Connection::read_into`].
pub const READ_CHUNK: usize = 512;

/// A socket specialised for byte I/O.
///
/// Adds no resources of its own; dropping it shuts down and closes the
/// underlying descriptor through [`Socket`].
#[derive(Debug)]
pub struct Connection {
    socket: Socket,
}

impl Connection {
    /// Consumes a socket produced by `accept`.
    pub fn new(socket: Socket) -> Self {
        Self { socket }
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.socket.peer_addr()
    }

    /// One non-blocking receive into `buffer`.
    pub fn read(&self, buffer: &mut [u8]) -> io::Result<usize> {
        if buffer.is_empty() {
            return Ok(0);
        }

        let ret = unsafe {
            recv(
                self.as_raw_fd(),
                buffer.as_mut_ptr() as *mut _,
                buffer.len(),
                0,
            )
        };

        if ret == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "peer closed the connection",
            ));
        }

        nonblocking_result(ret)
    }

    /// Reads up to `count` bytes in [`READ_CHUNK`]-sized pieces, appending
    /// them to `buffer`.
    ///
    /// Stops once `count` bytes arrived or a chunk comes back short (nothing
    /// more is available right now). Returns the total appended, which is
    /// `0` when the first chunk would block. On error everything appended by
    /// this call is dropped again and the error is returned; use
    /// [`read`](Self::read) directly to keep partial data.
    pub fn read_into(&self, buffer: &mut Vec<u8>, count: usize) -> io::Result<usize> {
        let start = buffer.len();
        let mut chunk = [0u8; READ_CHUNK];
        let mut remaining = count;

        while remaining > 0 {
            let wanted = remaining.min(READ_CHUNK);
            let n = match self.read(&mut chunk[..wanted]) {
                Ok(n) => n,
                Err(err) => {
                    buffer.truncate(start);
                    return Err(err);
                }
            };

            if n == 0 {
                break;
            }

            buffer.extend_from_slice(&chunk[..n]);
            remaining -= n;

            if n < wanted {
                break;
            }
        }

        Ok(buffer.len() - start)
    }

    /// One non-blocking send of `buffer`.
    pub fn write(&self, buffer: &[u8]) -> io::Result<usize> {
        if buffer.is_empty() {
            return Ok(0);
        }

        let ret = unsafe {
            send(
                self.as_raw_fd(),
                buffer.as_ptr() as *const _,
                buffer.len(),
                MSG_NOSIGNAL,
            )
        };

        nonblocking_result(ret)
    }

    /// Sends at most `max_len` bytes from the front of `buffer` without
    /// touching it.
    pub fn write_prefix(&self, buffer: &[u8], max_len: usize) -> io::Result<usize> {
        let len = max_len.min(buffer.len());
        self.write(&buffer[..len])
    }

    /// Sends at most `max_len` bytes from the front of `buffer` and removes
    /// whatever was sent, leaving the unsent remainder in order.
    pub fn write_consume(&self, buffer: &mut Vec<u8>, max_len: usize) -> io::Result<usize> {
        let written = self.write_prefix(buffer, max_len)?;
        buffer.drain(..written);

        Ok(written)
    }

    /// Zero-copy transfer of up to `count` bytes of `file_descriptor`,
    /// starting at `*offset`. The kernel advances `*offset` by the amount
    /// sent.
    pub fn sendfile_fd(
        &self,
        file_descriptor: RawFd,
        offset: &mut off_t,
        count: usize,
    ) -> io::Result<usize> {
        let ret = unsafe { libc::sendfile(self.as_raw_fd(), file_descriptor, offset, count) };

        nonblocking_result(ret)
    }

    /// Runs one attempt of `transfer` against this connection.
    pub fn sendfile(&self, transfer: &mut SendfileTransfer) -> io::Result<usize> {
        transfer.work(self)
    }
}

impl From<Socket> for Connection {
    fn from(socket: Socket) -> Self {
        Self::new(socket)
    }
}

impl AsRawFd for Connection {
    fn as_raw_fd(&self) -> RawFd {
        self.socket.as_raw_fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::connection_pair as pair;

    #[test]
    fn test_read_would_block_is_zero() {
        let (a, _b) = pair();
        let mut buf = [0u8; 16];
        assert_eq!(a.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_read_returns_received_bytes() {
        let (a, b) = pair();
        assert_eq!(b.write(b"hello").unwrap(), 5);

        let mut buf = [0u8; 16];
        let n = a.read(&mut buf).unwrap();
        assert_eq!(n, 5);
        assert_eq!(&buf[..n], b"hello");
    }

    #[test]
    fn test_read_bounded_by_capacity() {
        let (a, b) = pair();
        b.write(&[1u8; 64]).unwrap();

        let mut buf = [0u8; 10];
        let n = a.read(&mut buf).unwrap();
        assert!((1..=10).contains(&n));
    }

    #[test]
    fn test_peer_close_is_an_error() {
        let (a, b) = pair();
        drop(b);

        let mut buf = [0u8; 16];
        let err = a.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_read_into_stops_at_count() {
        let (a, b) = pair();
        b.write(&[7u8; 1500]).unwrap();

        let mut buf = Vec::new();
        assert_eq!(a.read_into(&mut buf, 1024).unwrap(), 1024);
        assert_eq!(buf.len(), 1024);

        // the rest is still queued
        assert_eq!(a.read_into(&mut buf, 4096).unwrap(), 476);
        assert_eq!(buf.len(), 1500);
    }

    #[test]
    fn test_read_into_short_read_ends_call() {
        let (a, b) = pair();
        b.write(b"abc").unwrap();

        let mut buf = b"xy".to_vec();
        assert_eq!(a.read_into(&mut buf, 4096).unwrap(), 3);
        assert_eq!(buf, b"xyabc");
    }

    #[test]
    fn test_read_into_would_block() {
        let (a, _b) = pair();
        let mut buf = Vec::new();
        assert_eq!(a.read_into(&mut buf, 100).unwrap(), 0);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_read_into_discards_partial_on_close() {
        let (a, b) = pair();
        b.write(&[3u8; READ_CHUNK]).unwrap();
        drop(b);

        let mut buf = b"keep".to_vec();
        assert!(a.read_into(&mut buf, 4 * READ_CHUNK).is_err());
        assert_eq!(buf, b"keep");
    }

    #[test]
    fn test_write_consume_drains_sent_prefix() {
        let (a, b) = pair();
        let mut out = b"0123456789".to_vec();

        assert_eq!(a.write_consume(&mut out, 4).unwrap(), 4);
        assert_eq!(out, b"456789");

        let mut buf = [0u8; 16];
        let n = b.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"0123");
    }

    #[test]
    fn test_write_consume_partial_preserves_remainder() {
        let (a, b) = pair();
        let original: Vec<u8> = (0..4 * 1024 * 1024u32).map(|i| (i % 251) as u8).collect();
        let mut out = original.clone();

        let written = a.write_consume(&mut out, usize::MAX).unwrap();
        assert!(written > 0);
        assert!(written < original.len(), "socket buffer should not take 4 MiB");
        assert_eq!(out, original[written..]);

        // full send buffer: would-block leaves the buffer alone
        let before = out.len();
        assert_eq!(a.write_consume(&mut out, usize::MAX).unwrap(), 0);
        assert_eq!(out.len(), before);

        drop(b);
    }

    #[test]
    fn test_write_prefix_leaves_buffer() {
        let (a, b) = pair();
        let out = b"abcdef".to_vec();
        assert_eq!(a.write_prefix(&out, 100).unwrap(), 6);
        assert_eq!(out, b"abcdef");

        let mut buf = [0u8; 8];
        assert_eq!(b.read(&mut buf).unwrap(), 6);
    }

    #[test]
    fn test_write_to_closed_peer_fails() {
        let (a, b) = pair();
        drop(b);
        assert!(a.write(b"data").is_err());
    }

    #[test]
    fn test_sendfile_fd_advances_offset() {
        let path = std::env::temp_dir().join(format!(
            "pulsar-sendfile-fd-{}.tmp",
            std::process::id()
        ));
        std::fs::write(&path, b"0123456789").unwrap();
        let file = std::fs::File::open(&path).unwrap();

        let (a, b) = pair();
        let mut offset: off_t = 2;
        assert_eq!(a.sendfile_fd(file.as_raw_fd(), &mut offset, 5).unwrap(), 5);
        assert_eq!(offset, 7);

        let mut buf = [0u8; 16];
        let n = b.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"23456");

        let _ = std::fs::remove_file(path);
    }
}
