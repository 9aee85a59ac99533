//! Online/offline state with edge-only notification.
//!
//! The host reports device connectivity through [`ConnectivityMonitor::set_online`];
//! the engine never infers connectivity from request failures. Subscribers
//! are notified only on actual transitions, so a polling host cannot
//! trigger redundant sync attempts.

use std::sync::Arc;
use tokio::sync::watch;

/// Shared connectivity state backed by a watch channel.
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    state: Arc<watch::Sender<bool>>,
}

impl ConnectivityMonitor {
    /// Creates a monitor with the given initial state.
    #[must_use]
    pub fn new(initially_online: bool) -> Self {
        let (tx, _rx) = watch::channel(initially_online);
        Self {
            state: Arc::new(tx),
        }
    }

    /// Reports the current device connectivity. Subscribers are only
    /// woken when the value actually changes. Returns whether a
    /// transition occurred.
    pub fn set_online(&self, online: bool) -> bool {
        self.state.send_if_modified(|current| {
            if *current != online {
                *current = online;
                true
            } else {
                false
            }
        })
    }

    /// Current state.
    #[must_use]
    pub fn is_online(&self) -> bool {
        *self.state.borrow()
    }

    /// Subscribes to transition notifications.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}
