//! Registry - pending approval requests
//!
//! The registry lives in the background context and is the single owner of
//! request state. Popups and initiators reach it only through
//! [`RegistryApi`], which is implemented over the message transport in
//! [`crate::service`].

use std::sync::Arc;

pub mod manager;
pub mod traits;
pub mod types;

pub use manager::{Completion, PendingRequestRegistry};
pub use traits::RegistryApi;
#[cfg(test)]
pub use traits::MockRegistryApi;
pub use types::{
    PendingRequest, RegistryError, RejectReason, RequestIndex, RequestState, Resolution,
};

/// Shared registry type
pub type SharedRegistry = Arc<PendingRequestRegistry>;

#[cfg(test)]
mod tests;
