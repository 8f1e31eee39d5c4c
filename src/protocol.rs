//! The contract between the server and per-connection behavior.
//!
//! The server never knows what a connection speaks. For every accepted
//! connection it asks a [`ProtocolFactory`] for a fresh [`Protocol`] and,
//! on every pulse, calls [`Protocol::ready`] with the connection and a
//! [`Detail`] saying why. The returned [`Signal`] tells the server whether
//! to keep the connection.
//!
//! A protocol that returns `Err(_)` or panics is treated exactly as if it had
//! returned [`Signal::TERMINATE`]; there is no need to signal termination
//! explicitly on failure paths, and I/O errors can simply be propagated with
//! `?`.
//!
//! ```ignore
//! struct Echo;
//!
//! impl Protocol for Echo {
//!     fn ready(&mut self, connection: &Connection, _: &Detail) -> Result<Signal, Fault> {
//!         let mut buf = Vec::new();
//!         connection.read_into(&mut buf, 4096)?;
//!         connection.write(&buf)?;
//!         Ok(Signal::CONTINUE)
//!     }
//! }
//! ```

use crate::net::Connection;

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Anything a protocol invocation can fail with.
pub type Fault = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Bitmask describing the outcome of one protocol invocation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Signal(u32);

impl Signal {
    /// Keep the connection.
    pub const CONTINUE: Signal = Signal(0);
    /// Remove the connection; its socket is closed once the master drops it.
    pub const TERMINATE: Signal = Signal(1 << 0);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Signal) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_terminate(self) -> bool {
        self.contains(Signal::TERMINATE)
    }
}

impl BitOr for Signal {
    type Output = Signal;

    fn bitor(self, rhs: Signal) -> Signal {
        Signal(self.0 | rhs.0)
    }
}

impl BitOrAssign for Signal {
    fn bitor_assign(&mut self, rhs: Signal) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_terminate() {
            write!(f, "Signal(TERMINATE | {:#x})", self.0 & !Signal::TERMINATE.0)
        } else {
            write!(f, "Signal({:#x})", self.0)
        }
    }
}

/// Why an invocation fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reason {
    /// Periodic pulse from the master.
    Pulse,
}

/// Payload handed to [`Protocol::ready`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detail {
    pub reason: Reason,
}

impl Detail {
    pub const fn new(reason: Reason) -> Self {
        Self { reason }
    }
}

/// Per-connection behavior driven by the server's workers.
///
/// Calls for one connection never overlap, but consecutive calls may run on
/// different worker threads.
pub trait Protocol: Send {
    fn ready(&mut self, connection: &Connection, detail: &Detail) -> Result<Signal, Fault>;
}

/// Produces one fresh [`Protocol`] per accepted connection.
///
/// Implemented for any `Fn() -> P` closure.
pub trait ProtocolFactory: Send + Sync {
    fn instantiate(&self) -> Box<dyn Protocol>;
}

impl<F, P> ProtocolFactory for F
where
    F: Fn() -> P + Send + Sync,
    P: Protocol + 'static,
{
    fn instantiate(&self) -> Box<dyn Protocol> {
        Box::new(self())
    }
}
