//! EventBus - broadcast-based registry lifecycle events.
//!
//! The registry publishes an event on every state change so that the
//! background service and diagnostics can follow requests without polling.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::registry::{RequestIndex, RequestState};

/// Events emitted by the pending request registry.
///
/// Events carry no transaction config; the resolved config only travels on
/// the request's continuation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RegistryEvent {
    /// A request was created
    Created {
        /// Request index
        index: RequestIndex,
    },
    /// A request's config became available to the controller
    ConfigLoaded {
        /// Request index
        index: RequestIndex,
    },
    /// An approval window attached and the request awaits a decision
    Attached {
        /// Request index
        index: RequestIndex,
    },
    /// The config was edited
    Updated {
        /// Request index
        index: RequestIndex,
    },
    /// The request reached a terminal state
    Resolved {
        /// Request index
        index: RequestIndex,
        /// Terminal state
        state: RequestState,
    },
}

impl RegistryEvent {
    /// Get the index from any event variant.
    #[must_use]
    pub fn index(&self) -> &RequestIndex {
        match self {
            Self::Created { index }
            | Self::ConfigLoaded { index }
            | Self::Attached { index }
            | Self::Updated { index }
            | Self::Resolved { index, .. } => index,
        }
    }
}

/// Broadcast-based event bus for registry events.
///
/// Slow subscribers will miss events (lagged) rather than blocking the publisher.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<RegistryEvent>,
}

impl EventBus {
    /// Create a new EventBus with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events. Returns a receiver that will get all future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all active subscribers.
    ///
    /// Returns the number of subscribers that received the event.
    pub fn publish(&self, event: RegistryEvent) -> usize {
        // send() returns Err if there are no receivers, which is fine
        self.sender.send(event).unwrap_or(0)
    }

    /// Get the current number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
