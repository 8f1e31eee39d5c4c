//! Lightweight non-blocking socket server.
//!
//! This crate provides a small, thread-based server framework: a listener
//! that drains pending connections without blocking, connections with
//! non-blocking read/write/sendfile, and a master/worker engine that runs
//! per-connection [`Protocol`] code on a fixed pool of threads.
//!
//! # Architecture
//!
//! - **Socket**: owns one descriptor and closes it exactly once
//! - **Connection**: non-blocking byte I/O and zero-copy sends
//! - **SendfileTransfer**: resumable transfer of a file range
//! - **Listener**: dual-stack accepting socket with a per-connection callback
//! - **Server**: instance registry, master loop and worker pool exchanging
//!   pulse and outcome messages
//! - **ServerBuilder**: fluent builder for server configuration
//!
//! Linux only: the socket layer uses `accept4`, `SOCK_NONBLOCK` and
//! `sendfile(2)` directly.

mod builder;
mod error;
pub mod fs;
pub mod net;
mod protocol;
mod server;
mod utils;

pub use builder::{DEFAULT_PULSE_INTERVAL, DEFAULT_WORKER_WAIT, ServerBuilder, ServerConfig};
pub use error::{Error, Result};
pub use fs::SendfileTransfer;
pub use net::{Connection, Listener, Socket};
pub use protocol::{Detail, Fault, Protocol, ProtocolFactory, Reason, Signal};
pub use server::Server;
