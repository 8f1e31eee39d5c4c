//! Server handle: listener, master, worker pool and shutdown.
//!
//! The server wires a [`Listener`] to a master (on its own thread, or driven
//! by the caller through [`Server::master`]) and a fixed pool of workers.
//! Dropping the server stops everything: the running flag is cleared, the
//! master thread is joined, workers are woken to finish whatever pulses are
//! still queued, and then joined too.

use crate::builder::ServerConfig;
use crate::error::{Error, Result};
use crate::net::Listener;
use crate::protocol::ProtocolFactory;
use crate::server::master::Master;
use crate::server::message::{Outcome, Pulse};
use crate::server::queue::MessageQueue;
use crate::server::worker::Worker;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, mpsc};
use std::thread::{self, JoinHandle};

/// State shared by the master and every worker.
pub(crate) struct Shared {
    running: AtomicBool,
    pub(crate) pulses: MessageQueue<Pulse>,
    pub(crate) outcomes: MessageQueue<Outcome>,
    pub(crate) live: AtomicUsize,
    pub(crate) config: ServerConfig,
}

impl Shared {
    pub(crate) fn new(config: ServerConfig) -> Self {
        Self {
            running: AtomicBool::new(true),
            pulses: MessageQueue::new(),
            outcomes: MessageQueue::new(),
            live: AtomicUsize::new(0),
            config,
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Clears the running flag and wakes every worker.
    pub(crate) fn stop(&self) {
        {
            // Taken so a worker between its check and its wait cannot miss
            // the wake-up.
            let _pulses = self.pulses.lock();
            self.running.store(false, Ordering::Release);
        }
        self.pulses.notify_all();
    }
}

/// A running socket server.
///
/// # Example
/// ```ignore
/// let mut server = Server::new(8080, false, 4, || Echo)?;
/// server.master(|| !shutdown_requested());
/// ```
pub struct Server {
    shared: Arc<Shared>,
    master: Option<Master>,
    master_thread: Option<JoinHandle<()>>,
    workers: Vec<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl Server {
    /// Binds `port`, starts `workers` worker threads and, when
    /// `create_master_thread` is set, a master thread. All other settings use
    /// [`ServerConfig::default`].
    pub fn new<F>(port: u16, create_master_thread: bool, workers: usize, factory: F) -> Result<Self>
    where
        F: ProtocolFactory + 'static,
    {
        let config = ServerConfig {
            port,
            workers,
            master_thread: create_master_thread,
            ..ServerConfig::default()
        };

        Self::with_config(config, Arc::new(factory))
    }

    pub(crate) fn with_config(config: ServerConfig, factory: Arc<dyn ProtocolFactory>) -> Result<Self> {
        let (sender, accepted) = mpsc::channel();
        let listener = Listener::new(config.port, move |connection| {
            // The receiver lives in the master; once it is gone there is
            // nobody to hand the connection to and dropping it closes it.
            let _ = sender.send(connection);
        })?;
        let local_addr = listener.local_addr().ok();

        let worker_count = config.workers.max(1);
        let master_thread = config.master_thread;
        let shared = Arc::new(Shared::new(config));
        let master = Master::new(listener, accepted, factory, shared.clone());

        // Built up in place so that a failed spawn still runs Drop and joins
        // whatever already started.
        let mut server = Self {
            shared,
            master: Some(master),
            master_thread: None,
            workers: Vec::with_capacity(worker_count),
            local_addr,
        };

        for id in 0..worker_count {
            let worker = Worker::new(id, server.shared.clone());
            let handle = thread::Builder::new()
                .name(format!("pulsar-worker-{id}"))
                .spawn(move || worker.run())
                .map_err(Error::Spawn)?;
            server.workers.push(handle);
        }

        if master_thread && let Some(mut master) = server.master.take() {
            let shared = server.shared.clone();
            let handle = thread::Builder::new()
                .name("pulsar-master".to_string())
                .spawn(move || {
                    while shared.is_running() {
                        master.cycle();
                    }
                })
                .map_err(Error::Spawn)?;
            server.master_thread = Some(handle);
        }

        tracing::info!(
            local = ?server.local_addr,
            workers = worker_count,
            master_thread,
            "server started"
        );

        Ok(server)
    }

    /// Runs master cycles on the calling thread for as long as `predicate`
    /// returns true.
    ///
    /// This is how a server built without a master thread is driven, for
    /// instance from inside an external event loop. When the server owns a
    /// master thread this returns immediately without calling `predicate`.
    pub fn master<P>(&mut self, mut predicate: P)
    where
        P: FnMut() -> bool,
    {
        let Some(master) = self.master.as_mut() else {
            tracing::debug!("master is driven by its own thread");
            return;
        };

        while predicate() {
            master.cycle();
        }
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Number of instances registered at the end of the last master step.
    pub fn live_instances(&self) -> usize {
        self.shared.live.load(Ordering::Acquire)
    }

    /// Stops and joins all threads, then closes every remaining connection.
    pub fn shutdown(self) {
        drop(self);
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.shared.stop();

        if let Some(handle) = self.master_thread.take() {
            let _ = handle.join();
        }

        self.shared.pulses.notify_all();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }

        // Registry, listener and any caller-driven master go last.
        drop(self.master.take());

        tracing::info!(local = ?self.local_addr, "server stopped");
    }
}
