//! Registry wire protocol.
//!
//! Background and popup contexts share no memory; every registry operation
//! travels as a JSON-encoded [`RegistryCall`] answered by a [`RegistryReply`].
//! Registry errors are part of the reply, never a transport failure.
//! Unsolicited notifications travel as [`ServerFrame`]s.

use serde::{Deserialize, Serialize};

use crate::event_bus::RegistryEvent;
use crate::registry::{RegistryError, RequestIndex, Resolution};
use crate::tx::{TxConfig, TxConfigPatch};

/// Context → background: one registry operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RegistryCall {
    /// Store a new request
    Create {
        /// Config, absent while still being populated
        #[serde(default)]
        config: Option<TxConfig>,
    },
    /// Supply a deferred config
    Populate {
        /// Target
        index: RequestIndex,
        /// Config
        config: TxConfig,
    },
    /// Read and attach
    Get {
        /// Target
        index: RequestIndex,
    },
    /// Merge an edit
    Update {
        /// Target
        index: RequestIndex,
        /// Edit
        patch: TxConfigPatch,
    },
    /// Approve
    Approve {
        /// Target
        index: RequestIndex,
        /// Final config
        config: TxConfig,
    },
    /// Decline
    Reject {
        /// Target
        index: RequestIndex,
        /// Reason
        reason: String,
    },
    /// Abandon
    Abandon {
        /// Target
        index: RequestIndex,
    },
    /// Read the outcome without attaching
    Status {
        /// Target
        index: RequestIndex,
    },
}

impl RegistryCall {
    /// Operation name, for logging
    #[must_use]
    pub fn op(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Populate { .. } => "populate",
            Self::Get { .. } => "get",
            Self::Update { .. } => "update",
            Self::Approve { .. } => "approve",
            Self::Reject { .. } => "reject",
            Self::Abandon { .. } => "abandon",
            Self::Status { .. } => "status",
        }
    }
}

/// Background → context: answer to one [`RegistryCall`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum RegistryReply {
    /// Request stored
    Created {
        /// Allocated index
        index: RequestIndex,
    },
    /// Config read
    Config {
        /// Current config
        config: TxConfig,
    },
    /// Operation applied (or dropped as a no-op)
    Ack,
    /// Abandon processed
    Abandoned {
        /// Whether this call caused the transition
        changed: bool,
    },
    /// Outcome read
    Status {
        /// `None` while the request is pending
        resolution: Option<Resolution>,
    },
    /// Registry-level error
    Error {
        /// The error
        error: RegistryError,
    },
}

impl From<RegistryError> for RegistryReply {
    fn from(error: RegistryError) -> Self {
        Self::Error { error }
    }
}

/// Background → all contexts: unsolicited notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "frame", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Lifecycle event
    Event {
        /// The event
        event: RegistryEvent,
    },
    /// A request's continuation fired
    Resolved {
        /// Request index
        index: RequestIndex,
        /// Outcome, including the final config when approved
        resolution: Resolution,
    },
}
