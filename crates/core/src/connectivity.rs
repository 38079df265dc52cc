//! Online/offline state machine.
//!
//! Transitions are pushed in by whoever observes the network (the binary, or
//! a test injecting synthetic events) and fan out to subscribers over a
//! `tokio::sync::watch` channel. Nothing polls.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Connectivity state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    Online,
    Offline,
}

impl Connectivity {
    pub fn is_online(self) -> bool {
        self == Connectivity::Online
    }
}

impl fmt::Display for Connectivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Connectivity::Online => f.write_str("online"),
            Connectivity::Offline => f.write_str("offline"),
        }
    }
}

impl From<bool> for Connectivity {
    fn from(online: bool) -> Self {
        if online { Connectivity::Online } else { Connectivity::Offline }
    }
}

/// Owner of the current connectivity state.
#[derive(Debug)]
pub struct ConnectivityMonitor {
    tx: watch::Sender<Connectivity>,
}

impl ConnectivityMonitor {
    pub fn new(initial: Connectivity) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub fn state(&self) -> Connectivity {
        *self.tx.borrow()
    }

    pub fn is_online(&self) -> bool {
        self.state().is_online()
    }

    /// Move to `next`. Returns true (and notifies subscribers) only if the
    /// state actually changed.
    pub fn set(&self, next: Connectivity) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });

        if changed {
            tracing::info!(state = %next, subscribers = self.tx.receiver_count(), "connectivity changed");
        }
        changed
    }

    /// Start observing transitions. Drop the subscription to unsubscribe.
    pub fn subscribe(&self) -> ConnectivitySubscription {
        ConnectivitySubscription { rx: self.tx.subscribe() }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Receiving end of [`ConnectivityMonitor::subscribe`].
#[derive(Debug)]
pub struct ConnectivitySubscription {
    rx: watch::Receiver<Connectivity>,
}

impl ConnectivitySubscription {
    /// Wait for the next transition and return the new state.
    ///
    /// Transitions that happen faster than the subscriber reads them are
    /// coalesced; the latest state is always returned. Yields `None` once the
    /// monitor is gone.
    pub async fn changed(&mut self) -> Option<Connectivity> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }
}
