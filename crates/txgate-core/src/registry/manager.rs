//! In-memory registry of approval requests and their continuations.

use chrono::{Duration, Utc};
use std::collections::HashMap;
use tokio::sync::{oneshot, RwLock};
use tracing::{debug, info};

use super::types::{
    PendingRequest, RegistryError, RejectReason, RequestIndex, RequestState, Resolution,
};
use crate::event_bus::{EventBus, RegistryEvent};
use crate::tx::{TxConfig, TxConfigPatch};

type RegistryResult<T> = std::result::Result<T, RegistryError>;

/// Default time a terminal request is kept before `sweep` purges it
const DEFAULT_RETENTION_SECS: i64 = 60;

struct Entry {
    request: PendingRequest,
    /// Taken exactly once, on the terminal transition
    continuation: Option<oneshot::Sender<Resolution>>,
    /// Kept for late readers until the entry is swept
    resolution: Option<Resolution>,
}

/// Awaitable outcome of one request
#[derive(Debug)]
pub struct Completion {
    rx: oneshot::Receiver<Resolution>,
}

impl Completion {
    /// Wait for the request to leave its pending states.
    ///
    /// A registry that disappears without resolving counts as abandonment.
    pub async fn wait(self) -> Resolution {
        self.rx.await.unwrap_or(Resolution::Rejected {
            reason: RejectReason::Abandoned,
        })
    }
}

/// Authoritative store of in-flight approval requests
pub struct PendingRequestRegistry {
    entries: RwLock<HashMap<RequestIndex, Entry>>,
    retention: Duration,
    events: EventBus,
}

impl Default for PendingRequestRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingRequestRegistry {
    /// Create a registry with default retention
    #[must_use]
    pub fn new() -> Self {
        Self::with_retention_secs(DEFAULT_RETENTION_SECS)
    }

    /// Create with a custom tombstone retention
    #[must_use]
    pub fn with_retention_secs(retention_secs: i64) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            retention: Duration::seconds(retention_secs),
            events: EventBus::default(),
        }
    }

    /// Publish lifecycle events on `bus`
    #[must_use]
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.events = bus;
        self
    }

    /// Lifecycle event bus
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Store a new request.
    ///
    /// `config` may be `None` while it is still being populated; readers get
    /// `NotReady` until [`populate`](Self::populate) supplies it.
    pub async fn create(&self, config: Option<TxConfig>) -> (RequestIndex, Completion) {
        let index = RequestIndex::generate();
        let (tx, rx) = oneshot::channel();

        {
            let mut entries = self.entries.write().await;
            entries.insert(
                index.clone(),
                Entry {
                    request: PendingRequest::new(index.clone(), config),
                    continuation: Some(tx),
                    resolution: None,
                },
            );
        }

        info!(%index, "Approval request created");
        self.events.publish(RegistryEvent::Created {
            index: index.clone(),
        });

        (index, Completion { rx })
    }

    /// Supply the config of a request created without one
    pub async fn populate(&self, index: &RequestIndex, config: TxConfig) -> RegistryResult<()> {
        let mut entries = self.entries.write().await;
        let entry = entries.get_mut(index).ok_or_else(|| not_found(index))?;

        if entry.request.is_terminal() {
            debug!(%index, "Dropping config for finished request");
            return Ok(());
        }

        entry.request.config = Some(config);
        self.events.publish(RegistryEvent::ConfigLoaded {
            index: index.clone(),
        });
        Ok(())
    }

    /// Read a request's config.
    ///
    /// The first successful read moves the request to `AwaitingDecision`.
    pub async fn get(&self, index: &RequestIndex) -> RegistryResult<TxConfig> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(index)
            .filter(|e| !e.request.is_terminal())
            .ok_or_else(|| not_found(index))?;

        let config = entry
            .request
            .config
            .clone()
            .ok_or_else(|| RegistryError::NotReady {
                index: index.clone(),
            })?;

        if entry.request.state == RequestState::Created {
            entry.request.state = RequestState::AwaitingDecision;
            debug!(%index, "Approval window attached");
            self.events.publish(RegistryEvent::Attached {
                index: index.clone(),
            });
        }

        Ok(config)
    }

    /// Merge an edit into the stored config.
    ///
    /// Edits to finished requests are dropped without error.
    pub async fn update(&self, index: &RequestIndex, patch: TxConfigPatch) -> RegistryResult<()> {
        let mut entries = self.entries.write().await;
        let entry = entries.get_mut(index).ok_or_else(|| not_found(index))?;

        match entry.request.state {
            RequestState::AwaitingDecision => {
                if let Some(config) = entry.request.config.as_mut() {
                    config.apply(patch);
                }
                self.events.publish(RegistryEvent::Updated {
                    index: index.clone(),
                });
                Ok(())
            }
            state if state.is_terminal() => {
                debug!(%index, %state, "Dropping late update");
                Ok(())
            }
            state => Err(RegistryError::InvalidState {
                index: index.clone(),
                state,
            }),
        }
    }

    /// Approve with the final config and resolve the initiator
    pub async fn approve(&self, index: &RequestIndex, config: TxConfig) -> RegistryResult<()> {
        let mut entries = self.entries.write().await;
        let entry = awaiting_decision(&mut entries, index)?;

        entry.request.config = Some(config.clone());
        self.settle(entry, Resolution::Approved { config });
        Ok(())
    }

    /// Decline and reject the initiator
    pub async fn reject(&self, index: &RequestIndex, reason: impl Into<String>) -> RegistryResult<()> {
        let mut entries = self.entries.write().await;
        let entry = awaiting_decision(&mut entries, index)?;

        self.settle(
            entry,
            Resolution::Rejected {
                reason: RejectReason::Declined {
                    reason: reason.into(),
                },
            },
        );
        Ok(())
    }

    /// Terminate a request whose window went away.
    ///
    /// Idempotent: returns `false` when the request had already finished.
    pub async fn abandon(&self, index: &RequestIndex) -> RegistryResult<bool> {
        let mut entries = self.entries.write().await;
        let entry = entries.get_mut(index).ok_or_else(|| not_found(index))?;

        if entry.request.is_terminal() {
            debug!(%index, state = %entry.request.state, "Abandon ignored, already finished");
            return Ok(false);
        }

        self.settle(
            entry,
            Resolution::Rejected {
                reason: RejectReason::Abandoned,
            },
        );
        Ok(true)
    }

    /// Abandon every unfinished request, e.g. on shutdown.
    ///
    /// Returns how many were abandoned.
    pub async fn abandon_all(&self) -> usize {
        let mut entries = self.entries.write().await;
        let mut abandoned = 0;
        for entry in entries.values_mut() {
            if entry.request.is_terminal() {
                continue;
            }
            self.settle(
                entry,
                Resolution::Rejected {
                    reason: RejectReason::Abandoned,
                },
            );
            abandoned += 1;
        }
        abandoned
    }

    /// Outcome of a request, `None` while it is still pending.
    ///
    /// Answers for finished requests until they are swept.
    pub async fn status(&self, index: &RequestIndex) -> RegistryResult<Option<Resolution>> {
        let entries = self.entries.read().await;
        let entry = entries.get(index).ok_or_else(|| not_found(index))?;
        Ok(entry.resolution.clone())
    }

    /// Copy of a request, terminal ones included until swept
    pub async fn snapshot(&self, index: &RequestIndex) -> Option<PendingRequest> {
        let entries = self.entries.read().await;
        entries.get(index).map(|e| e.request.clone())
    }

    /// Number of requests not yet finished
    pub async fn pending_count(&self) -> usize {
        let entries = self.entries.read().await;
        entries.values().filter(|e| !e.request.is_terminal()).count()
    }

    /// Abandon requests whose initiator stopped waiting and purge finished
    /// requests older than the retention window.
    ///
    /// Returns the number of purged entries.
    pub async fn sweep(&self) -> usize {
        let mut entries = self.entries.write().await;

        for entry in entries.values_mut() {
            let orphaned = entry
                .continuation
                .as_ref()
                .is_some_and(oneshot::Sender::is_closed);
            if orphaned && !entry.request.is_terminal() {
                debug!(index = %entry.request.index, "Initiator gone, abandoning");
                self.settle(
                    entry,
                    Resolution::Rejected {
                        reason: RejectReason::Abandoned,
                    },
                );
            }
        }

        let initial_count = entries.len();
        let cutoff = Utc::now() - self.retention;
        entries.retain(|_, e| e.request.resolved_at.map_or(true, |at| at > cutoff));

        initial_count - entries.len()
    }

    fn settle(&self, entry: &mut Entry, resolution: Resolution) {
        let state = resolution.state();
        if !entry.request.finish(state) {
            return;
        }

        let index = entry.request.index.clone();
        entry.resolution = Some(resolution.clone());
        if let Some(tx) = entry.continuation.take() {
            if tx.send(resolution).is_err() {
                debug!(%index, "Initiator no longer waiting");
            }
        }

        info!(%index, %state, "Approval request resolved");
        self.events.publish(RegistryEvent::Resolved { index, state });
    }
}

fn not_found(index: &RequestIndex) -> RegistryError {
    RegistryError::NotFound {
        index: index.clone(),
    }
}

fn awaiting_decision<'a>(
    entries: &'a mut HashMap<RequestIndex, Entry>,
    index: &RequestIndex,
) -> RegistryResult<&'a mut Entry> {
    let entry = entries.get_mut(index).ok_or_else(|| not_found(index))?;
    match entry.request.state {
        RequestState::AwaitingDecision => Ok(entry),
        state => Err(RegistryError::InvalidState {
            index: index.clone(),
            state,
        }),
    }
}
