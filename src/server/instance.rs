//! One accepted connection paired with its protocol.
//!
//! The registry in the master holds the only strong reference to an
//! [`Instance`]. Messages carry [`Weak`](std::sync::Weak) handles that must be
//! upgraded before use; a failed upgrade just means the instance is gone.
//!
//! `use_lock` serializes protocol invocations. Workers only ever *try* it,
//! while the master takes it blocking before removal so it never tears down
//! a connection that a worker is still using.

use crate::net::Connection;
use crate::protocol::{Detail, Protocol, Signal};

use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, PoisonError, TryLockError};

pub(crate) struct Instance {
    key: usize,
    peer: Option<SocketAddr>,
    use_lock: Mutex<Session>,
}

pub(crate) struct Session {
    connection: Connection,
    protocol: Box<dyn Protocol>,
    retired: bool,
}

impl Instance {
    pub(crate) fn new(key: usize, connection: Connection, protocol: Box<dyn Protocol>) -> Self {
        Self {
            key,
            peer: connection.peer_addr(),
            use_lock: Mutex::new(Session {
                connection,
                protocol,
                retired: false,
            }),
        }
    }

    /// Slot of this instance in the master's registry.
    pub(crate) fn key(&self) -> usize {
        self.key
    }

    pub(crate) fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Runs the protocol once if nobody else holds `use_lock`.
    ///
    /// Returns `None` when the instance is busy or already retired; the
    /// caller drops the pulse in that case. A protocol error or panic comes
    /// back as [`Signal::TERMINATE`].
    pub(crate) fn try_process(&self, detail: &Detail) -> Option<Signal> {
        let mut session = match self.use_lock.try_lock() {
            Ok(session) => session,
            Err(TryLockError::WouldBlock) => return None,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };

        if session.retired {
            return None;
        }

        let Session {
            connection,
            protocol,
            ..
        } = &mut *session;

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| protocol.ready(connection, detail)));

        Some(match outcome {
            Ok(Ok(signal)) => signal,
            Ok(Err(_)) | Err(_) => Signal::TERMINATE,
        })
    }

    /// Waits for any in-flight invocation to finish, then marks the instance
    /// so that no further invocation starts.
    pub(crate) fn retire(&self) {
        let mut session = self.use_lock.lock().unwrap_or_else(PoisonError::into_inner);
        session.retired = true;
    }

    #[cfg(test)]
    pub(crate) fn hold(&self) -> std::sync::MutexGuard<'_, Session> {
        self.use_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
