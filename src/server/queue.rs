//! Thread-safe FIFO message queues.
//!
//! Each queue has its own lock. The condition variable is only waited on by
//! workers (for pulses); the master never blocks on it.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

pub(crate) struct MessageQueue<T> {
    queue: Mutex<VecDeque<T>>,
    available: Condvar,
}

impl<T> MessageQueue<T> {
    pub(crate) fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn push(&self, message: T) {
        self.lock().push_back(message);
    }

    /// Enqueues a batch under a single lock and returns how many went in.
    pub(crate) fn extend<I: IntoIterator<Item = T>>(&self, messages: I) -> usize {
        let mut queue = self.lock();
        let before = queue.len();
        queue.extend(messages);
        queue.len() - before
    }

    pub(crate) fn pop(&self) -> Option<T> {
        self.lock().pop_front()
    }

    /// Removes everything currently queued, oldest first.
    pub(crate) fn take_all(&self) -> VecDeque<T> {
        std::mem::take(&mut *self.lock())
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Sleeps until woken or `timeout` elapses, unless messages are already
    /// queued or `keep_waiting` says otherwise (checked under the lock).
    pub(crate) fn wait_timeout(&self, timeout: Duration, keep_waiting: impl Fn() -> bool) {
        let queue = self.lock();

        if queue.is_empty() && keep_waiting() {
            let _ = self
                .available
                .wait_timeout(queue, timeout)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub(crate) fn notify_all(&self) {
        self.available.notify_all();
    }
}
