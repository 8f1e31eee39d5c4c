//! Worker threads.
//!
//! A worker sleeps until the master queues pulses (or the wait times out),
//! then drains the pulse queue completely. Each pulse resolves its instance,
//! tries to claim it and runs the protocol once; the resulting signal goes
//! back to the master. A pulse for an instance that is gone or busy is
//! dropped, never requeued.

use crate::protocol::Detail;
use crate::server::core::Shared;
use crate::server::message::Outcome;

use std::sync::Arc;

pub(crate) struct Worker {
    id: usize,
    shared: Arc<Shared>,
}

impl Worker {
    pub(crate) fn new(id: usize, shared: Arc<Shared>) -> Self {
        Self { id, shared }
    }

    /// Runs until the server stops. Pulses still queued at shutdown are
    /// handled once more before the thread exits.
    pub(crate) fn run(&self) {
        tracing::debug!(worker = self.id, "worker started");

        loop {
            let shared = &self.shared;
            shared
                .pulses
                .wait_timeout(shared.config.worker_wait, || shared.is_running());

            let running = shared.is_running();
            self.drain();

            if !running {
                break;
            }
        }

        tracing::debug!(worker = self.id, "worker stopped");
    }

    /// Processes queued pulses until the queue is empty and returns how many
    /// protocol invocations ran.
    pub(crate) fn drain(&self) -> usize {
        let mut invoked = 0;

        while let Some(pulse) = self.shared.pulses.pop() {
            let Some(instance) = pulse.instance.upgrade() else {
                continue;
            };

            let Some(signal) = instance.try_process(&Detail::new(pulse.reason)) else {
                continue;
            };
            invoked += 1;

            // Drop the strong handle first so the master's removal is what
            // releases the connection.
            drop(instance);

            self.shared.outcomes.push(Outcome {
                instance: pulse.instance,
                signal,
            });
        }

        invoked
    }
}
