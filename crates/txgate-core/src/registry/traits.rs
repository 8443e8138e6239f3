//! Async registry interface used by popups and initiators.

use super::types::RequestIndex;
use crate::tx::{TxConfig, TxConfigPatch};

/// The registry operations available outside the background context.
///
/// Registry-level failures come back as [`crate::Error::Registry`];
/// messaging failures as [`crate::Error::Transport`].
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RegistryApi: Send + Sync {
    /// Create a request, `None` when the config is still being populated
    async fn create(&self, config: Option<TxConfig>) -> crate::Result<RequestIndex>;

    /// Supply a config for a request created without one
    async fn populate(&self, index: &RequestIndex, config: TxConfig) -> crate::Result<()>;

    /// Read the config, attaching to the request
    async fn get(&self, index: &RequestIndex) -> crate::Result<TxConfig>;

    /// Merge an edit
    async fn update(&self, index: &RequestIndex, patch: TxConfigPatch) -> crate::Result<()>;

    /// Approve with the final config
    async fn approve(&self, index: &RequestIndex, config: TxConfig) -> crate::Result<()>;

    /// Decline
    async fn reject(&self, index: &RequestIndex, reason: String) -> crate::Result<()>;

    /// Abandon; `false` if the request had already finished
    async fn abandon(&self, index: &RequestIndex) -> crate::Result<bool>;
}
