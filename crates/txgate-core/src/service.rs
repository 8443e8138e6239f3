//! Registry service (background context) and client (any context).
//!
//! The service owns the registry and answers JSON calls one at a time, in
//! arrival order. Clients only ever exchange strings with it.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::protocol::{RegistryCall, RegistryReply, ServerFrame};
use crate::registry::{Completion, RegistryApi, RequestIndex, Resolution, SharedRegistry};
use crate::settings::ApprovalSettings;
use crate::tx::{TxConfig, TxConfigPatch};


/// One call and the slot its reply goes to
type Envelope = (String, oneshot::Sender<String>);

/// Create a connected service/client pair around `registry`
pub fn channel(
    registry: SharedRegistry,
    settings: &ApprovalSettings,
) -> (RegistryService, RegistryClient) {
    let (outbox, inbox) = mpsc::channel(settings.inbox_capacity);
    let (outbound, frames) = broadcast::channel(settings.event_capacity);

    let service = RegistryService {
        registry,
        inbox,
        outbound,
        sweep_interval: settings.sweep_interval(),
    };
    let client = RegistryClient {
        outbox,
        frames: Arc::new(frames),
    };
    (service, client)
}

/// Background-context owner of the registry
pub struct RegistryService {
    registry: SharedRegistry,
    inbox: mpsc::Receiver<Envelope>,
    outbound: broadcast::Sender<String>,
    sweep_interval: Duration,
}

impl RegistryService {
    /// Serve calls until shutdown or until every client is gone
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("Registry service started");

        let mut events = self.registry.events().subscribe();
        let mut sweep = tokio::time::interval(self.sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                envelope = self.inbox.recv() => {
                    let Some((raw, reply_tx)) = envelope else {
                        debug!("All registry clients dropped");
                        break;
                    };
                    if let Some(reply) = self.handle_raw(&raw).await {
                        let _ = reply_tx.send(reply);
                    }
                }
                event = events.recv() => match event {
                    Ok(event) => self.broadcast(&ServerFrame::Event { event }),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Registry event forwarding lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = sweep.tick() => {
                    let purged = self.registry.sweep().await;
                    if purged > 0 {
                        debug!(purged, "Swept finished requests");
                    }
                }
            }
        }

        let abandoned = self.registry.abandon_all().await;
        info!(abandoned, "Registry service stopped");
    }

    /// Decode, apply and encode one call.
    ///
    /// Malformed calls get no reply; the caller sees a transport error.
    async fn handle_raw(&self, raw: &str) -> Option<String> {
        let call = match serde_json::from_str::<RegistryCall>(raw) {
            Ok(call) => call,
            Err(e) => {
                warn!(error = %e, "Malformed registry call");
                return None;
            }
        };

        let op = call.op();
        let reply = self.dispatch(call).await;
        if let RegistryReply::Error { error } = &reply {
            debug!(op, %error, "Registry call refused");
        }

        match serde_json::to_string(&reply) {
            Ok(encoded) => Some(encoded),
            Err(e) => {
                warn!(op, error = %e, "Failed to encode registry reply");
                None
            }
        }
    }

    async fn dispatch(&self, call: RegistryCall) -> RegistryReply {
        let registry = &self.registry;
        match call {
            RegistryCall::Create { config } => {
                let (index, completion) = registry.create(config).await;
                self.forward_resolution(index.clone(), completion);
                RegistryReply::Created { index }
            }
            RegistryCall::Populate { index, config } => {
                ack(registry.populate(&index, config).await)
            }
            RegistryCall::Get { index } => match registry.get(&index).await {
                Ok(config) => RegistryReply::Config { config },
                Err(e) => e.into(),
            },
            RegistryCall::Update { index, patch } => ack(registry.update(&index, patch).await),
            RegistryCall::Approve { index, config } => {
                ack(registry.approve(&index, config).await)
            }
            RegistryCall::Reject { index, reason } => ack(registry.reject(&index, reason).await),
            RegistryCall::Abandon { index } => match registry.abandon(&index).await {
                Ok(changed) => RegistryReply::Abandoned { changed },
                Err(e) => e.into(),
            },
            RegistryCall::Status { index } => match registry.status(&index).await {
                Ok(resolution) => RegistryReply::Status { resolution },
                Err(e) => e.into(),
            },
        }
    }

    /// Relay the request's continuation to every context as a frame
    fn forward_resolution(&self, index: RequestIndex, completion: Completion) {
        let outbound = self.outbound.clone();
        tokio::spawn(async move {
            let resolution = completion.wait().await;
            let frame = ServerFrame::Resolved { index, resolution };
            match serde_json::to_string(&frame) {
                Ok(encoded) => {
                    let _ = outbound.send(encoded);
                }
                Err(e) => warn!(error = %e, "Failed to encode resolution"),
            }
        });
    }

    fn broadcast(&self, frame: &ServerFrame) {
        match serde_json::to_string(frame) {
            Ok(encoded) => {
                // No subscribers is fine
                let _ = self.outbound.send(encoded);
            }
            Err(e) => warn!(error = %e, "Failed to encode frame"),
        }
    }
}

fn ack(result: std::result::Result<(), crate::registry::RegistryError>) -> RegistryReply {
    match result {
        Ok(()) => RegistryReply::Ack,
        Err(e) => e.into(),
    }
}

/// Handle to the registry service, usable from any context
#[derive(Clone)]
pub struct RegistryClient {
    outbox: mpsc::Sender<Envelope>,
    frames: Arc<broadcast::Receiver<String>>,
}

impl RegistryClient {
    /// Receive notifications sent from now on
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.frames.resubscribe(),
            client: self.clone(),
        }
    }

    /// Outcome of `index`, `None` while it is pending
    pub async fn status(&self, index: &RequestIndex) -> Result<Option<Resolution>> {
        let call = RegistryCall::Status {
            index: index.clone(),
        };
        match self.call(call).await? {
            RegistryReply::Status { resolution } => Ok(resolution),
            other => Err(unexpected("status", &other)),
        }
    }

    async fn call(&self, call: RegistryCall) -> Result<RegistryReply> {
        let op = call.op();
        let raw = serde_json::to_string(&call)?;
        let (reply_tx, reply_rx) = oneshot::channel();

        self.outbox
            .send((raw, reply_tx))
            .await
            .map_err(|_| Error::Transport("background context is gone".to_string()))?;
        let reply = reply_rx
            .await
            .map_err(|_| Error::Transport(format!("no reply to {op}")))?;

        match serde_json::from_str::<RegistryReply>(&reply)? {
            RegistryReply::Error { error } => Err(error.into()),
            reply => Ok(reply),
        }
    }
}

fn unexpected(op: &str, reply: &RegistryReply) -> Error {
    Error::Transport(format!("unexpected reply to {op}: {reply:?}"))
}

#[async_trait]
impl RegistryApi for RegistryClient {
    async fn create(&self, config: Option<TxConfig>) -> Result<RequestIndex> {
        match self.call(RegistryCall::Create { config }).await? {
            RegistryReply::Created { index } => Ok(index),
            other => Err(unexpected("create", &other)),
        }
    }

    async fn populate(&self, index: &RequestIndex, config: TxConfig) -> Result<()> {
        let call = RegistryCall::Populate {
            index: index.clone(),
            config,
        };
        match self.call(call).await? {
            RegistryReply::Ack => Ok(()),
            other => Err(unexpected("populate", &other)),
        }
    }

    async fn get(&self, index: &RequestIndex) -> Result<TxConfig> {
        let call = RegistryCall::Get {
            index: index.clone(),
        };
        match self.call(call).await? {
            RegistryReply::Config { config } => Ok(config),
            other => Err(unexpected("get", &other)),
        }
    }

    async fn update(&self, index: &RequestIndex, patch: TxConfigPatch) -> Result<()> {
        let call = RegistryCall::Update {
            index: index.clone(),
            patch,
        };
        match self.call(call).await? {
            RegistryReply::Ack => Ok(()),
            other => Err(unexpected("update", &other)),
        }
    }

    async fn approve(&self, index: &RequestIndex, config: TxConfig) -> Result<()> {
        let call = RegistryCall::Approve {
            index: index.clone(),
            config,
        };
        match self.call(call).await? {
            RegistryReply::Ack => Ok(()),
            other => Err(unexpected("approve", &other)),
        }
    }

    async fn reject(&self, index: &RequestIndex, reason: String) -> Result<()> {
        let call = RegistryCall::Reject {
            index: index.clone(),
            reason,
        };
        match self.call(call).await? {
            RegistryReply::Ack => Ok(()),
            other => Err(unexpected("reject", &other)),
        }
    }

    async fn abandon(&self, index: &RequestIndex) -> Result<bool> {
        let call = RegistryCall::Abandon {
            index: index.clone(),
        };
        match self.call(call).await? {
            RegistryReply::Abandoned { changed } => Ok(changed),
            other => Err(unexpected("abandon", &other)),
        }
    }
}

/// Stream of [`ServerFrame`]s for one context
pub struct Subscription {
    rx: broadcast::Receiver<String>,
    client: RegistryClient,
}

impl Subscription {
    /// Next frame from the background context
    pub async fn next_frame(&mut self) -> Result<ServerFrame> {
        loop {
            if let Some(frame) = self.recv().await? {
                return Ok(frame);
            }
        }
    }

    /// Wait for the resolution of `index`, ignoring everything else.
    ///
    /// Frames skipped by a lagging subscriber may include the resolution,
    /// so after a lag the registry is asked directly.
    pub async fn resolution(&mut self, index: &RequestIndex) -> Result<Resolution> {
        loop {
            match self.recv().await? {
                Some(ServerFrame::Resolved {
                    index: resolved,
                    resolution,
                }) if &resolved == index => return Ok(resolution),
                Some(_) => {}
                None => {
                    if let Some(resolution) = self.client.status(index).await? {
                        debug!(%index, "Resolution read back after lag");
                        return Ok(resolution);
                    }
                }
            }
        }
    }

    /// Next frame, or `None` when frames were skipped
    async fn recv(&mut self) -> Result<Option<ServerFrame>> {
        match self.rx.recv().await {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Notification subscriber lagged");
                Ok(None)
            }
            Err(broadcast::error::RecvError::Closed) => {
                Err(Error::Transport("background context is gone".to_string()))
            }
        }
    }
}
