//! Signing bridge
//!
//! The initiator side of an approval: creates the pending request, opens the
//! approval window addressed by its index and suspends until the registry
//! resolves it. An approved config is then handed to the external signer.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use txgate_window::{PlatformVariant, WindowSession, WindowSessionManager};

use crate::error::{Error, Result};
use crate::registry::{RegistryApi, RequestIndex, Resolution};
use crate::route::{ApprovalRoute, SignRoute};
use crate::service::{RegistryClient, Subscription};
use crate::settings::ApprovalSettings;
use crate::tx::{Coin, TxConfig};


/// A chain message to sign
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Msg {
    /// Message type, e.g. `cosmos-sdk/MsgSend`
    pub type_url: String,
    /// Message body
    pub value: serde_json::Value,
}

impl Msg {
    /// Bank transfer of `amount` from `from` to `to`
    #[must_use]
    pub fn bank_send(from: &str, to: &str, amount: &Coin) -> Self {
        Self {
            type_url: "cosmos-sdk/MsgSend".to_string(),
            value: json!({
                "from_address": from,
                "to_address": to,
                "amount": [{ "denom": amount.denom, "amount": amount.amount.to_string() }],
            }),
        }
    }
}

/// When the signer reports back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BroadcastMode {
    /// After the mempool check
    Sync,
    /// Immediately
    Async,
    /// After inclusion in a block
    Commit,
}

impl fmt::Display for BroadcastMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync => write!(f, "sync"),
            Self::Async => write!(f, "async"),
            Self::Commit => write!(f, "commit"),
        }
    }
}

/// What the signer reports on success
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    /// Transaction hash
    pub tx_hash: String,
    /// Block height, known in commit mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u64>,
}

/// Success continuation handed to a [`TxSigner`]
pub type OnSuccess = Box<dyn FnOnce(TxReceipt) + Send>;
/// Failure continuation handed to a [`TxSigner`]
pub type OnFailure = Box<dyn FnOnce(Error) + Send>;

/// External signing and broadcast facility.
///
/// Exactly one of the two callbacks is expected to run.
pub trait TxSigner: Send + Sync {
    /// Sign `msgs` with `config` and broadcast them
    fn sign_and_broadcast(
        &self,
        msgs: Vec<Msg>,
        config: TxConfig,
        on_success: OnSuccess,
        on_failure: OnFailure,
        mode: BroadcastMode,
    );
}

/// Turns "approve this config" into an awaitable call
#[derive(Clone)]
pub struct SigningBridge {
    registry: RegistryClient,
    windows: Arc<dyn WindowSessionManager>,
    settings: ApprovalSettings,
}

impl SigningBridge {
    /// Create a bridge
    pub fn new(
        registry: RegistryClient,
        windows: Arc<dyn WindowSessionManager>,
        settings: ApprovalSettings,
    ) -> Self {
        Self {
            registry,
            windows,
            settings,
        }
    }

    /// Window strategy in use
    #[must_use]
    pub fn variant(&self) -> PlatformVariant {
        self.windows.variant()
    }

    /// Ask the user to approve `config`; resolves with the final config.
    ///
    /// Fails with [`Error::Rejected`] when declined and
    /// [`Error::Abandoned`] when the window goes away without a decision.
    pub async fn request_approval(&self, config: TxConfig) -> Result<TxConfig> {
        self.approve(config).await.map(|(_, config)| config)
    }

    /// Like [`request_approval`](Self::request_approval), but opens the
    /// window before the config is known.
    ///
    /// The window shows a loading state until `estimate` completes. A failed
    /// estimate, or one that cannot be delivered, abandons the request and
    /// closes the window.
    pub async fn request_approval_estimated<F>(&self, estimate: F) -> Result<TxConfig>
    where
        F: Future<Output = Result<TxConfig>> + Send,
    {
        let (mut subscription, mut pending, session) = self.start(None).await?;
        let index = pending.index.clone();

        let populated = match estimate.await {
            Ok(config) => self
                .registry
                .populate(&index, config)
                .await
                .inspect_err(|e| warn!(%index, error = %e, "Estimated config not delivered")),
            Err(e) => {
                warn!(%index, error = %e, "Config estimation failed");
                Err(e)
            }
        };
        if let Err(e) = populated {
            pending.disarm();
            self.discard(&index, Some(&session)).await;
            return Err(e);
        }

        let result = self
            .await_resolution(&mut subscription, &index, &session)
            .await;
        pending.disarm();
        result
    }

    /// Approval followed by signing and broadcast
    pub async fn send_msgs(
        &self,
        signer: &dyn TxSigner,
        msgs: Vec<Msg>,
        config: TxConfig,
        mode: BroadcastMode,
    ) -> Result<TxReceipt> {
        let (index, config) = self.approve(config).await?;

        if self.variant().keeps_caller_window() {
            let route = SignRoute { index };
            let url = route.to_url(&self.settings.extension_base_url);
            if let Err(e) = self.windows.open(&url, self.settings.popup_size()).await {
                warn!(index = %route.index, error = %e, "Signing screen not shown");
            }
        }

        info!(msgs = msgs.len(), %mode, "Signing approved transaction");
        sign(signer, msgs, config, mode).await
    }

    async fn approve(&self, config: TxConfig) -> Result<(RequestIndex, TxConfig)> {
        let (mut subscription, mut pending, session) = self.start(Some(config)).await?;
        let index = pending.index.clone();

        let result = self
            .await_resolution(&mut subscription, &index, &session)
            .await;
        pending.disarm();
        Ok((index, result?))
    }

    /// Create the request and open its window.
    ///
    /// The returned guard abandons the request if the caller stops waiting.
    async fn start(
        &self,
        config: Option<TxConfig>,
    ) -> Result<(Subscription, PendingApproval, WindowSession)> {
        let subscription = self.registry.subscribe();
        let index = self.registry.create(config).await?;
        let mut pending = PendingApproval {
            bridge: self.clone(),
            index,
            session: None,
            armed: true,
        };

        match self.open_approval(&pending.index).await {
            Ok(session) => {
                pending.session = Some(session.clone());
                Ok((subscription, pending, session))
            }
            Err(e) => {
                // Already abandoned by open_approval
                pending.disarm();
                Err(e)
            }
        }
    }

    async fn open_approval(&self, index: &RequestIndex) -> Result<WindowSession> {
        let url = ApprovalRoute::external(index.clone()).to_url(&self.settings.extension_base_url);

        match self.windows.open(&url, self.settings.popup_size()).await {
            Ok(session) => {
                info!(%index, window_id = %session.id(), "Approval window opened");
                Ok(session)
            }
            Err(e) => {
                warn!(%index, error = %e, "Approval window failed to open");
                if let Err(abandon) = self.registry.abandon(index).await {
                    debug!(%index, error = %abandon, "Abandon not applied");
                }
                Err(e.into())
            }
        }
    }

    async fn await_resolution(
        &self,
        subscription: &mut Subscription,
        index: &RequestIndex,
        session: &WindowSession,
    ) -> Result<TxConfig> {
        let unload = session.unload_token();
        let resolution = tokio::select! {
            resolution = subscription.resolution(index) => resolution?,
            _ = unload.cancelled() => {
                // No-op when the window went away after a decision
                if let Err(e) = self.registry.abandon(index).await {
                    debug!(%index, error = %e, "Abandon not applied");
                }
                subscription.resolution(index).await?
            }
        };
        info!(%index, state = %resolution.state(), "Approval resolved");

        if !matches!(resolution, Resolution::Approved { .. }) {
            if let Err(e) = self.windows.close(session) {
                debug!(%index, error = %e, "Approval window already gone");
            }
        }
        resolution.into_result()
    }

    async fn discard(&self, index: &RequestIndex, session: Option<&WindowSession>) {
        if let Err(e) = self.registry.abandon(index).await {
            debug!(%index, error = %e, "Abandon not applied");
        }
        if let Some(session) = session {
            if let Err(e) = self.windows.close(session) {
                debug!(%index, error = %e, "Approval window already gone");
            }
        }
    }
}

/// A request the initiator is still waiting on.
///
/// Dropped while armed, e.g. when the awaiting future is cancelled, it
/// abandons the request and closes its window.
struct PendingApproval {
    bridge: SigningBridge,
    index: RequestIndex,
    session: Option<WindowSession>,
    armed: bool,
}

impl PendingApproval {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for PendingApproval {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(index = %self.index, "No runtime to abandon request of a cancelled initiator");
            return;
        };

        let bridge = self.bridge.clone();
        let index = self.index.clone();
        let session = self.session.take();
        runtime.spawn(async move {
            info!(%index, "Initiator stopped waiting");
            bridge.discard(&index, session.as_ref()).await;
        });
    }
}

type SignSlot = Arc<Mutex<Option<oneshot::Sender<Result<TxReceipt>>>>>;

/// Bridge the signer's callbacks into one awaitable result
async fn sign(
    signer: &dyn TxSigner,
    msgs: Vec<Msg>,
    config: TxConfig,
    mode: BroadcastMode,
) -> Result<TxReceipt> {
    let (tx, rx) = oneshot::channel();
    let slot: SignSlot = Arc::new(Mutex::new(Some(tx)));

    let on_success: OnSuccess = {
        let slot = slot.clone();
        Box::new(move |receipt| settle(&slot, Ok(receipt)))
    };
    let on_failure: OnFailure = {
        let slot = slot.clone();
        Box::new(move |error| settle(&slot, Err(error)))
    };

    signer.sign_and_broadcast(msgs, config, on_success, on_failure, mode);
    drop(slot);

    let receipt = rx
        .await
        .map_err(|_| Error::Signing("signer dropped its callbacks".to_string()))??;
    info!(tx_hash = %receipt.tx_hash, height = ?receipt.height, "Transaction broadcast");
    Ok(receipt)
}

fn settle(slot: &SignSlot, result: Result<TxReceipt>) {
    let sender = slot.lock().unwrap_or_else(|e| e.into_inner()).take();
    if let Some(sender) = sender {
        let _ = sender.send(result);
    }
}
