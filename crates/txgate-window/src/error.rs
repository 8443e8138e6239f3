//! Error types for txgate-window

use thiserror::Error;

use crate::types::WindowId;

/// Window management error
#[derive(Debug, Error)]
pub enum WindowError {
    /// The host exposes neither a window API nor a window opener
    #[error("no window management capability available")]
    Unsupported,

    /// The window handle does not refer to a live window
    #[error("window {0} not found")]
    NotFound(WindowId),

    /// The host refused to create the window
    #[error("failed to open window: {0}")]
    OpenFailed(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, WindowError>;
