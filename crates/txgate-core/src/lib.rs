//! Txgate Core - cross-context transaction approval
//!
//! This crate turns "ask the user to approve this transaction" into an
//! awaitable operation spanning isolated execution contexts:
//! - Registry: pending requests keyed by index, owned by the background
//! - Service: JSON message transport between contexts
//! - Controller: the approval popup's state machine
//! - Bridge: the initiator's awaitable approval and signing call

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bridge;
pub mod controller;
pub mod error;
pub mod event_bus;
pub mod protocol;
pub mod registry;
pub mod route;
pub mod send;
pub mod service;
pub mod settings;
pub mod tx;

pub use bridge::{BroadcastMode, Msg, OnFailure, OnSuccess, SigningBridge, TxReceipt, TxSigner};
pub use controller::{ApprovalFlowController, FlowState, Outcome};
pub use error::{format_error_for_display, Error, Result, UserFriendlyError};
pub use event_bus::{EventBus, RegistryEvent};
pub use protocol::{RegistryCall, RegistryReply, ServerFrame};
pub use registry::{
    PendingRequest, PendingRequestRegistry, RegistryApi, RegistryError, RejectReason,
    RequestIndex, RequestState, Resolution, SharedRegistry,
};
pub use route::{ApprovalRoute, SignRoute};
pub use send::{AccountSource, SendFlow, SendForm};
pub use service::{channel, RegistryClient, RegistryService, Subscription};
pub use settings::ApprovalSettings;
pub use tx::{parse_gas, Coin, Gas, TxConfig, TxConfigPatch, DEFAULT_SEND_GAS};
