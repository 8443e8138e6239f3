//! Error types for txgate-core
//!
//! This module provides error types and user-friendly error formatting.

use thiserror::Error;

use crate::registry::RegistryError;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// Registry answered with an error
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Fee, gas or memo failed validation
    #[error("invalid {field}: {message}")]
    ConfigInvalid {
        /// Offending field
        field: String,
        /// Detailed message
        message: String,
    },

    /// The user declined the transaction
    #[error("transaction rejected: {reason}")]
    Rejected {
        /// Reason given when declining
        reason: String,
    },

    /// The approval window went away without a decision
    #[error("approval abandoned")]
    Abandoned,

    /// Cross-context messaging failed
    #[error("transport error: {0}")]
    Transport(String),

    /// Route could not be parsed
    #[error("invalid route: {0}")]
    InvalidRoute(String),

    /// The external signer reported a failure
    #[error("signing error: {0}")]
    Signing(String),

    /// Window management error
    #[error("window error: {0}")]
    Window(#[from] txgate_window::WindowError),

    /// Wire encoding error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for [`Error::ConfigInvalid`]
    pub fn config_invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Whether the transaction was not sent because of a user decision
    /// (explicit decline or walking away)
    #[must_use]
    pub fn is_not_sent(&self) -> bool {
        matches!(self, Self::Rejected { .. } | Self::Abandoned)
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Trait for user-friendly error messages
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get a suggestion for how to fix the error
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for Error {
    fn user_message(&self) -> String {
        match self {
            // Declining and walking away look the same to the initiator.
            Error::Rejected { .. } | Error::Abandoned => "Transaction not sent.".to_string(),
            Error::ConfigInvalid { field, message } => format!("Check {field}: {message}"),
            Error::Registry(RegistryError::NotFound { .. }) => {
                "This request was already completed or is invalid.".to_string()
            }
            Error::Signing(msg) => format!("Signing failed: {msg}"),
            Error::Transport(_) => "Lost connection to the wallet background.".to_string(),
            _ => format!("Something went wrong: {self}"),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            Error::ConfigInvalid { .. } => Some("Fix the highlighted field and submit again.".to_string()),
            Error::Transport(_) => Some("Reopen the wallet popup and retry.".to_string()),
            _ => None,
        }
    }
}

/// Format an error for a one-line status display
pub fn format_error_for_display(error: &Error) -> String {
    match error.suggestion() {
        Some(hint) => format!("{} {}", error.user_message(), hint),
        None => error.user_message(),
    }
}
