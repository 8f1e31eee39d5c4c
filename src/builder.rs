//! Fluent builder for Server construction.
//!
//! Collects the server's tuning knobs into a [`ServerConfig`] and builds a
//! [`Server`] from it.
//!
//! # Example
//! ```ignore
//! let server = ServerBuilder::new()
//!     .port(8080)
//!     .workers(4)
//!     .pulse_interval(Duration::from_millis(20))
//!     .build(|| Echo)?;
//! ```

use crate::error::Result;
use crate::protocol::ProtocolFactory;
use crate::server::Server;

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Default sleep between master cycles.
pub const DEFAULT_PULSE_INTERVAL: Duration = Duration::from_millis(50);

/// Default upper bound on how long an idle worker sleeps before re-checking
/// whether the server is still running.
pub const DEFAULT_WORKER_WAIT: Duration = Duration::from_secs(5);

/// Settings a [`Server`] is built with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Port to listen on; 0 lets the kernel pick.
    pub port: u16,
    /// Number of worker threads. At least one is always started.
    pub workers: usize,
    /// Whether the server runs its own master thread. When false the caller
    /// drives it with [`Server::master`].
    pub master_thread: bool,
    /// Sleep inside every master cycle. Trades accept latency for CPU.
    pub pulse_interval: Duration,
    /// Longest time an idle worker waits for pulses.
    pub worker_wait: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 0,
            workers: thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
            master_thread: true,
            pulse_interval: DEFAULT_PULSE_INTERVAL,
            worker_wait: DEFAULT_WORKER_WAIT,
        }
    }
}

/// Builder for constructing [`Server`] instances with a fluent API.
#[derive(Debug, Clone, Default)]
pub struct ServerBuilder {
    config: ServerConfig,
}

impl ServerBuilder {
    /// Creates a builder with [`ServerConfig::default`] settings.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    /// Spawn an internal master thread (the default) or leave the master to
    /// the caller.
    pub fn master_thread(mut self, enabled: bool) -> Self {
        self.config.master_thread = enabled;
        self
    }

    pub fn pulse_interval(mut self, interval: Duration) -> Self {
        self.config.pulse_interval = interval;
        self
    }

    pub fn worker_wait(mut self, wait: Duration) -> Self {
        self.config.worker_wait = wait;
        self
    }

    /// The configuration collected so far.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Binds the listener, starts the threads and returns the running server.
    ///
    /// # Errors
    /// Any listener setup fault, or [`Error::Spawn`](crate::Error::Spawn) if
    /// a thread could not be started.
    pub fn build<F>(self, factory: F) -> Result<Server>
    where
        F: ProtocolFactory + 'static,
    {
        Server::with_config(self.config, Arc::new(factory))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 0);
        assert!(config.workers >= 1);
        assert!(config.master_thread);
        assert_eq!(config.pulse_interval, Duration::from_millis(50));
        assert_eq!(config.worker_wait, Duration::from_secs(5));
    }

    #[test]
    fn test_builder_sets_fields() {
        let builder = ServerBuilder::new()
            .port(9000)
            .workers(3)
            .master_thread(false)
            .pulse_interval(Duration::from_millis(5))
            .worker_wait(Duration::from_millis(100));

        let config = builder.config();
        assert_eq!(config.port, 9000);
        assert_eq!(config.workers, 3);
        assert!(!config.master_thread);
        assert_eq!(config.pulse_interval, Duration::from_millis(5));
        assert_eq!(config.worker_wait, Duration::from_millis(100));
    }
}
