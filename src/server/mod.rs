//! Concurrent execution engine.
//!
//! One master owns the registry of live instances and a fixed pool of
//! workers runs protocol code:
//! - [`core`]: [`Server`] handle, shared state and shutdown
//! - [`master`]: accept, collect outcomes, emit pulses
//! - [`worker`]: drain pulses and invoke protocols
//! - [`instance`]: connection + protocol behind the `use_lock`
//! - [`message`]: pulse and outcome messages
//! - [`queue`]: the two FIFO message queues
//!
//! An instance is only ever invoked by one worker at a time. A pulse that
//! finds its instance busy is dropped, so under contention a slow protocol
//! can miss pulse cycles; the next cycle pulses it again.

pub(crate) mod core;
pub(crate) mod instance;
pub(crate) mod master;
pub(crate) mod message;
pub(crate) mod queue;
pub(crate) mod worker;

pub use self::core::Server;
