//! Messages exchanged between the master and the workers.
//!
//! Both kinds hold a weak handle so a queued message never keeps a removed
//! instance alive.

use crate::protocol::{Reason, Signal};
use crate::server::instance::Instance;

use std::sync::Weak;

/// Master to worker: invoke the instance's protocol.
pub(crate) struct Pulse {
    pub(crate) instance: Weak<Instance>,
    pub(crate) reason: Reason,
}

/// Worker to master: what the invocation returned.
pub(crate) struct Outcome {
    pub(crate) instance: Weak<Instance>,
    pub(crate) signal: Signal,
}
