//! Approval flow controller
//!
//! Runs inside an approval popup, bound to one request index:
//!
//! ```text
//! Attaching ──► Loaded ──► Submitting ──► Done(outcome)
//!     └──────────────────────────────────► Done(Abandoned)
//! ```
//!
//! Abandonment is wired to two hooks: dropping the controller (component
//! teardown) and the page's unload token (host about to unload). Both may
//! fire; the registry ignores the second.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use txgate_window::{LogicalSize, PageWindow, WindowSessionManager};

use crate::error::{Error, Result};
use crate::registry::{RegistryApi, RegistryError, RequestIndex};
use crate::route::ApprovalRoute;
use crate::settings::ApprovalSettings;
use crate::tx::{parse_gas, Coin, TxConfig, TxConfigPatch};

#[cfg(test)]
mod tests;

/// How a flow ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The user approved
    Approved,
    /// The user declined
    Declined,
    /// The flow was torn down before a decision
    Abandoned,
    /// Another trigger had already resolved the request
    AlreadyResolved,
    /// The index was unknown or already consumed
    Invalid,
}

/// Controller state
#[derive(Debug, Clone, PartialEq)]
pub enum FlowState {
    /// Waiting for the config
    Attaching,
    /// Config loaded and editable
    Loaded,
    /// Decision sent, waiting for the registry
    Submitting,
    /// Finished
    Done(Outcome),
}

/// Client-side state machine for one approval window
pub struct ApprovalFlowController {
    registry: Arc<dyn RegistryApi>,
    windows: Arc<dyn WindowSessionManager>,
    page: Arc<dyn PageWindow>,
    route: ApprovalRoute,
    size: LogicalSize,
    poll_interval: Duration,
    state: FlowState,
    form: Option<TxConfig>,
    unload_watch: Option<JoinHandle<()>>,
}

impl ApprovalFlowController {
    /// Bind a controller to `route` inside `page`
    pub fn new(
        registry: Arc<dyn RegistryApi>,
        windows: Arc<dyn WindowSessionManager>,
        page: Arc<dyn PageWindow>,
        route: ApprovalRoute,
        settings: &ApprovalSettings,
    ) -> Self {
        Self {
            registry,
            windows,
            page,
            route,
            size: settings.popup_size(),
            poll_interval: settings.attach_poll_interval(),
            state: FlowState::Attaching,
            form: None,
            unload_watch: None,
        }
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> &FlowState {
        &self.state
    }

    /// Index this controller is bound to
    #[must_use]
    pub fn index(&self) -> &RequestIndex {
        &self.route.index
    }

    /// Route this controller was opened with
    #[must_use]
    pub fn route(&self) -> &ApprovalRoute {
        &self.route
    }

    /// Locally edited config, once loaded
    #[must_use]
    pub fn config(&self) -> Option<&TxConfig> {
        self.form.as_ref()
    }

    /// Whether submission is blocked because nothing is loaded yet
    #[must_use]
    pub fn is_initializing(&self) -> bool {
        self.state == FlowState::Attaching
    }

    /// Whether a decision is in flight
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.state == FlowState::Submitting
    }

    /// Prepare the window and wait for the request's config.
    ///
    /// Ends in `Loaded`, `Done(Invalid)` for unknown indices, or
    /// `Done(Abandoned)` if the page unloads first.
    pub async fn attach(&mut self) -> Result<()> {
        if self.route.external {
            self.windows.fit_current_window(self.page.as_ref(), self.size);
            self.windows.lock_scroll(self.page.as_ref());
        } else {
            self.windows.unlock_scroll(self.page.as_ref());
        }

        self.watch_unload();
        let unload = self.page.unload_token();
        let index = self.route.index.clone();

        loop {
            if unload.is_cancelled() {
                self.stop_unload_watch();
                abandon_quietly(self.registry.as_ref(), &index, "unload").await;
                self.state = FlowState::Done(Outcome::Abandoned);
                return Ok(());
            }

            match self.registry.get(&index).await {
                Ok(config) => {
                    debug!(%index, "Approval config loaded");
                    self.form = Some(config);
                    self.state = FlowState::Loaded;
                    return Ok(());
                }
                Err(Error::Registry(RegistryError::NotReady { .. })) => {
                    tokio::select! {
                        _ = unload.cancelled() => {}
                        _ = tokio::time::sleep(self.poll_interval) => {}
                    }
                }
                Err(Error::Registry(RegistryError::NotFound { .. })) => {
                    info!(%index, "Request already completed or invalid");
                    self.stop_unload_watch();
                    self.state = FlowState::Done(Outcome::Invalid);
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Apply an edit locally and forward it to the registry.
    ///
    /// The registry is the merge authority; its answer is only logged.
    pub async fn edit(&mut self, patch: TxConfigPatch) -> Result<()> {
        self.loaded_form_mut()?.apply(patch.clone());

        if let Err(e) = self.registry.update(&self.route.index, patch).await {
            debug!(index = %self.route.index, error = %e, "Edit not applied by registry");
        }
        Ok(())
    }

    /// Edit the gas field from user input
    pub async fn set_gas(&mut self, raw: &str) -> Result<()> {
        let gas = parse_gas(raw)?;
        self.edit(TxConfigPatch::gas(gas)).await
    }

    /// Edit the memo field
    pub async fn set_memo(&mut self, memo: &str) -> Result<()> {
        self.edit(TxConfigPatch::memo(memo)).await
    }

    /// Pick a fee
    pub async fn set_fee(&mut self, fee: Coin) -> Result<()> {
        self.edit(TxConfigPatch::fee(fee)).await
    }

    /// Approve with the locally edited config.
    ///
    /// A config failing validation is refused inline and the flow stays
    /// `Loaded`.
    pub async fn submit(&mut self) -> Result<Outcome> {
        let config = self.loaded_form()?.clone();
        config.validate()?;

        self.state = FlowState::Submitting;
        let result = self.registry.approve(&self.route.index, config).await;
        self.settle(result, Outcome::Approved)
    }

    /// Decline the request
    pub async fn decline(&mut self, reason: &str) -> Result<Outcome> {
        self.loaded_form()?;

        self.state = FlowState::Submitting;
        let result = self
            .registry
            .reject(&self.route.index, reason.to_string())
            .await;
        self.settle(result, Outcome::Declined)
    }

    /// In-app back navigation: leave without a decision
    pub async fn back(&mut self) {
        self.teardown().await;
    }

    /// Abandon the current request unless already decided
    pub async fn teardown(&mut self) {
        if matches!(self.state, FlowState::Done(_)) {
            return;
        }
        self.stop_unload_watch();
        abandon_quietly(self.registry.as_ref(), &self.route.index, "teardown").await;
        self.state = FlowState::Done(Outcome::Abandoned);
    }

    /// Switch to another request, abandoning the previous one
    pub async fn retarget(&mut self, index: RequestIndex) -> Result<()> {
        if index == self.route.index {
            return Ok(());
        }

        self.teardown().await;
        info!(from = %self.route.index, to = %index, "Approval window retargeted");
        self.route.index = index;
        self.form = None;
        self.state = FlowState::Attaching;
        self.attach().await
    }

    fn settle(&mut self, result: Result<()>, outcome: Outcome) -> Result<Outcome> {
        match result {
            Ok(()) => Ok(self.finish(outcome)),
            Err(Error::Registry(
                RegistryError::InvalidState { .. } | RegistryError::NotFound { .. },
            )) => {
                info!(index = %self.route.index, "Request resolved elsewhere");
                Ok(self.finish(Outcome::AlreadyResolved))
            }
            Err(e) => {
                self.state = FlowState::Loaded;
                Err(e)
            }
        }
    }

    fn finish(&mut self, outcome: Outcome) -> Outcome {
        self.stop_unload_watch();
        self.state = FlowState::Done(outcome);
        if self.route.external {
            self.windows.release(self.page.as_ref());
        }
        outcome
    }

    fn loaded_form(&self) -> Result<&TxConfig> {
        match (&self.state, &self.form) {
            (FlowState::Loaded, Some(form)) => Ok(form),
            _ => Err(Error::Internal("config is not loaded".to_string())),
        }
    }

    fn loaded_form_mut(&mut self) -> Result<&mut TxConfig> {
        match (&self.state, self.form.as_mut()) {
            (FlowState::Loaded, Some(form)) => Ok(form),
            _ => Err(Error::Internal("config is not loaded".to_string())),
        }
    }

    fn watch_unload(&mut self) {
        self.stop_unload_watch();

        let registry = self.registry.clone();
        let index = self.route.index.clone();
        let unload = self.page.unload_token();
        self.unload_watch = Some(tokio::spawn(async move {
            unload.cancelled().await;
            abandon_quietly(registry.as_ref(), &index, "unload").await;
        }));
    }

    fn stop_unload_watch(&mut self) {
        if let Some(watch) = self.unload_watch.take() {
            watch.abort();
        }
    }
}

impl Drop for ApprovalFlowController {
    fn drop(&mut self) {
        if matches!(self.state, FlowState::Done(_)) {
            self.stop_unload_watch();
            return;
        }

        // The unload watcher stays alive; whichever hook reaches the
        // registry second is a no-op there.
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(index = %self.route.index, "No runtime to abandon request on teardown");
            return;
        };
        let registry = self.registry.clone();
        let index = self.route.index.clone();
        runtime.spawn(async move {
            abandon_quietly(registry.as_ref(), &index, "teardown").await;
        });
    }
}

async fn abandon_quietly(registry: &dyn RegistryApi, index: &RequestIndex, trigger: &'static str) {
    match registry.abandon(index).await {
        Ok(true) => info!(%index, trigger, "Approval abandoned"),
        Ok(false) => debug!(%index, trigger, "Approval already finished"),
        Err(e) => debug!(%index, trigger, error = %e, "Abandon not applied"),
    }
}
