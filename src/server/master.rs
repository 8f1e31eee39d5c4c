//! The master side of the pulse/response protocol.
//!
//! The master is the only owner of the instance registry. One cycle:
//!
//! 1. accept every pending connection and register an instance for each
//! 2. sleep for the pulse interval
//! 3. drain worker outcomes, retiring and removing terminated instances
//! 4. queue one pulse per live instance and wake the workers

use crate::net::{Connection, Listener};
use crate::protocol::{ProtocolFactory, Reason};
use crate::server::core::Shared;
use crate::server::instance::Instance;
use crate::server::message::Pulse;
use crate::utils::slab::Slab;

use std::sync::atomic::Ordering;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread;

pub(crate) struct Master {
    listener: Listener,
    accepted: Receiver<Connection>,
    registry: Slab<Arc<Instance>>,
    factory: Arc<dyn ProtocolFactory>,
    shared: Arc<Shared>,
}

impl Master {
    /// `accepted` receives whatever the listener's callback forwards.
    pub(crate) fn new(
        listener: Listener,
        accepted: Receiver<Connection>,
        factory: Arc<dyn ProtocolFactory>,
        shared: Arc<Shared>,
    ) -> Self {
        Self {
            listener,
            accepted,
            registry: Slab::new(),
            factory,
            shared,
        }
    }

    pub(crate) fn cycle(&mut self) {
        let admitted = self.accept();

        thread::sleep(self.shared.config.pulse_interval);

        let removed = self.collect_outcomes();
        let pulsed = self.emit_pulses();

        tracing::trace!(admitted, removed, pulsed, live = self.len(), "master cycle");
    }

    /// Drains the listener and registers a fresh instance per connection.
    pub(crate) fn accept(&mut self) -> usize {
        self.listener.accept();

        let mut admitted = 0;
        while let Ok(connection) = self.accepted.try_recv() {
            self.admit(connection);
            admitted += 1;
        }

        admitted
    }

    pub(crate) fn admit(&mut self, connection: Connection) {
        let key = self.registry.vacant_key();
        let instance = Instance::new(key, connection, self.factory.instantiate());
        let peer = instance.peer();

        self.registry.insert(Arc::new(instance));
        self.publish_live();

        tracing::debug!(?peer, key, live = self.registry.len(), "instance admitted");
    }

    /// Handles every queued outcome and returns how many instances were
    /// removed.
    pub(crate) fn collect_outcomes(&mut self) -> usize {
        let mut removed = 0;

        for outcome in self.shared.outcomes.take_all() {
            let Some(instance) = outcome.instance.upgrade() else {
                continue;
            };

            if outcome.signal.is_terminate() && self.remove(&instance) {
                removed += 1;
            }
        }

        if removed > 0 {
            self.publish_live();
        }

        removed
    }

    /// Queues one pulse per live instance and wakes all workers.
    pub(crate) fn emit_pulses(&self) -> usize {
        let pulses = self.registry.iter().map(|instance| Pulse {
            instance: Arc::downgrade(instance),
            reason: Reason::Pulse,
        });

        let pulsed = self.shared.pulses.extend(pulses);
        self.shared.pulses.notify_all();

        pulsed
    }

    pub(crate) fn len(&self) -> usize {
        self.registry.len()
    }

    fn remove(&mut self, instance: &Arc<Instance>) -> bool {
        // The slot may already hold a newer instance if this one was removed
        // earlier and a worker still had it upgraded.
        let registered = self
            .registry
            .get(instance.key())
            .is_some_and(|current| Arc::ptr_eq(current, instance));
        if !registered {
            return false;
        }

        instance.retire();
        self.registry.remove(instance.key());

        tracing::debug!(
            peer = ?instance.peer(),
            key = instance.key(),
            live = self.registry.len(),
            "instance removed"
        );

        true
    }

    fn publish_live(&self) {
        self.shared.live.store(self.registry.len(), Ordering::Release);
    }

    #[cfg(test)]
    pub(crate) fn handles(&self) -> Vec<std::sync::Weak<Instance>> {
        self.registry.iter().map(Arc::downgrade).collect()
    }
}
