//! Resumable zero-copy file transfer.
//!
//! A [`SendfileTransfer`] owns a read-only descriptor for the file being
//! sent and remembers how far it got. Each call to
//! [`SendfileTransfer::work`] issues a single `sendfile(2)` for whatever is
//! left, so a protocol can push a large file across many pulses without ever
//! blocking:
//!
//! ```ignore
//! let mut transfer = SendfileTransfer::new("index.html", 0, usize::MAX)?;
//!
//! // on every pulse:
//! connection.sendfile(&mut transfer)?;
//! if transfer.is_done() {
//!     // finished
//! }
//! ```

use crate::error::{Error, Result};
use crate::net::Connection;
use crate::net::utils::nonblocking_result;

use libc::{O_CLOEXEC, O_RDONLY, S_IFMT, S_IFREG, close, fstat, off_t, open, stat};
use std::ffi::CString;
use std::io;
use std::mem;
use std::os::fd::AsRawFd;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

/// A bounded byte range of a file, streamed to a connection over several
/// non-blocking attempts.
///
/// The range is fixed when the transfer is created: a requested length that
/// runs past the end of the file is clamped to the file size at that moment,
/// and later growth of the file is ignored.
#[derive(Debug)]
pub struct SendfileTransfer {
    file_descriptor: i32,
    offset: off_t,
    remaining: usize,
}

impl SendfileTransfer {
    /// Opens `path` and prepares to send `count` bytes starting at `offset`.
    ///
    /// Fails with [`Error::SendfileNotFound`] when the file cannot be opened,
    /// [`Error::SendfileNotFile`] when it is not a regular file and
    /// [`Error::SendfileBadOffset`] when `offset` lies past its end.
    pub fn new(path: impl AsRef<Path>, offset: u64, count: usize) -> Result<Self> {
        let file_descriptor = open_fd(path.as_ref()).map_err(Error::SendfileNotFound)?;

        // Owned from here; dropping `transfer` closes the descriptor.
        let mut transfer = Self {
            file_descriptor,
            offset: 0,
            remaining: 0,
        };

        let mut info: stat = unsafe { mem::zeroed() };
        if unsafe { fstat(file_descriptor, &mut info) } < 0 {
            return Err(Error::SendfileNotFound(io::Error::last_os_error()));
        }

        if info.st_mode & S_IFMT != S_IFREG {
            return Err(Error::SendfileNotFile);
        }

        let size = info.st_size as u64;
        if offset > size {
            return Err(Error::SendfileBadOffset { offset, size });
        }

        let available = usize::try_from(size - offset).unwrap_or(usize::MAX);
        transfer.offset = offset as off_t;
        transfer.remaining = count.min(available);

        Ok(transfer)
    }

    /// True once every byte of the range has been sent.
    pub fn is_done(&self) -> bool {
        self.remaining == 0
    }

    /// Current position in the file.
    pub fn offset(&self) -> u64 {
        self.offset as u64
    }

    /// Bytes still to send.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Issues one `sendfile` for the rest of the range.
    ///
    /// Returns the bytes sent (`0` when the socket would block). On error
    /// nothing is consumed, so the caller may simply retry later or drop the
    /// connection.
    ///
    /// A file that was truncated below the range after creation fails with
    /// [`io::ErrorKind::UnexpectedEof`]; the transfer can never finish.
    pub fn work(&mut self, connection: &Connection) -> io::Result<usize> {
        if self.remaining == 0 {
            return Ok(0);
        }

        let ret = unsafe {
            libc::sendfile(
                connection.as_raw_fd(),
                self.file_descriptor,
                &mut self.offset,
                self.remaining,
            )
        };
        if ret == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "file ended before the transfer range",
            ));
        }

        let sent = nonblocking_result(ret)?;
        self.remaining -= sent.min(self.remaining);

        Ok(sent)
    }
}

impl Drop for SendfileTransfer {
    fn drop(&mut self) {
        unsafe {
            close(self.file_descriptor);
        }
    }
}

fn open_fd(path: &Path) -> io::Result<i32> {
    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains null byte"))?;

    let file_descriptor = unsafe { open(c_path.as_ptr(), O_RDONLY | O_CLOEXEC) };

    if file_descriptor < 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(file_descriptor)
}
