//! Request, state and resolution types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::tx::TxConfig;

/// Opaque identifier addressing one request across contexts
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestIndex(String);

impl RequestIndex {
    /// Allocate a fresh index
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Index as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RequestIndex {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RequestIndex {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for RequestIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    /// Stored, no window has read it yet
    Created,
    /// A window has loaded the config
    AwaitingDecision,
    /// User approved
    Approved,
    /// User declined
    Rejected,
    /// Window went away without a decision
    Abandoned,
}

impl RequestState {
    /// Whether no further transition is possible
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected | Self::Abandoned)
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::AwaitingDecision => write!(f, "awaiting_decision"),
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
            Self::Abandoned => write!(f, "abandoned"),
        }
    }
}

/// Why a request did not end in approval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectReason {
    /// The user declined explicitly
    Declined {
        /// Reason shown to the initiator
        reason: String,
    },
    /// No decision before the window went away
    Abandoned,
}

/// What a request's continuation receives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Resolution {
    /// Approved with the final config
    Approved {
        /// Config to sign
        config: TxConfig,
    },
    /// Declined or abandoned
    Rejected {
        /// Why
        reason: RejectReason,
    },
}

impl Resolution {
    /// Approved config, or the matching error
    pub fn into_result(self) -> Result<TxConfig> {
        match self {
            Self::Approved { config } => Ok(config),
            Self::Rejected {
                reason: RejectReason::Declined { reason },
            } => Err(Error::Rejected { reason }),
            Self::Rejected {
                reason: RejectReason::Abandoned,
            } => Err(Error::Abandoned),
        }
    }

    /// Terminal state this resolution corresponds to
    #[must_use]
    pub fn state(&self) -> RequestState {
        match self {
            Self::Approved { .. } => RequestState::Approved,
            Self::Rejected {
                reason: RejectReason::Declined { .. },
            } => RequestState::Rejected,
            Self::Rejected {
                reason: RejectReason::Abandoned,
            } => RequestState::Abandoned,
        }
    }
}

/// A request held by the registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingRequest {
    /// Addressing key
    pub index: RequestIndex,
    /// Config, `None` while still being populated
    pub config: Option<TxConfig>,
    /// Current state
    pub state: RequestState,
    /// When the request was created
    pub created_at: DateTime<Utc>,
    /// When the request reached a terminal state
    pub resolved_at: Option<DateTime<Utc>>,
}

impl PendingRequest {
    /// Create a request in `Created`
    #[must_use]
    pub fn new(index: RequestIndex, config: Option<TxConfig>) -> Self {
        Self {
            index,
            config,
            state: RequestState::Created,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }

    /// Whether the request is finished
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Move to a terminal state.
    ///
    /// Returns false if the request was already terminal.
    pub fn finish(&mut self, state: RequestState) -> bool {
        debug_assert!(state.is_terminal());
        if self.is_terminal() {
            return false;
        }
        self.state = state;
        self.resolved_at = Some(Utc::now());
        true
    }
}

/// Registry-level error, carried inside replies across the context boundary
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum RegistryError {
    /// The index never existed or was already consumed
    #[error("request {index} not found")]
    NotFound {
        /// Requested index
        index: RequestIndex,
    },

    /// The config is still being populated
    #[error("request {index} is not ready")]
    NotReady {
        /// Requested index
        index: RequestIndex,
    },

    /// The request is not in the state the operation needs
    #[error("request {index} is {state}")]
    InvalidState {
        /// Requested index
        index: RequestIndex,
        /// Actual state
        state: RequestState,
    },
}
