//! Host capability traits
//!
//! A host offers some subset of these. Nothing here queries ambient
//! "current window" state: the page a caller runs in is always passed
//! explicitly as a [`PageWindow`].

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::types::{LogicalSize, WindowId};

/// A freshly opened host window
#[derive(Debug, Clone)]
pub struct OpenedWindow {
    /// Host identifier of the window
    pub id: WindowId,
    /// Fired when the host is about to unload the window
    pub unload: CancellationToken,
}

/// Extension window API (`windows.create` / `windows.update` / `windows.remove`)
pub trait WindowsApi: Send + Sync {
    /// Create a popup window showing `url` with the given outer size
    fn create(&self, url: &str, size: LogicalSize) -> Result<OpenedWindow>;

    /// Resize a window (outer size)
    fn update(&self, id: WindowId, size: LogicalSize) -> Result<()>;

    /// Destroy a window
    fn remove(&self, id: WindowId) -> Result<()>;

    /// Whether pages inside windows created by this API may close themselves
    fn allows_scripts_to_close(&self) -> bool;
}

/// Page-level `window.open(url, name, features, replace)`
pub trait NamedWindowOpener: Send + Sync {
    /// Open `url` in the popup called `name`, reusing it when it already exists
    fn open_named(&self, name: &str, url: &str, size: LogicalSize) -> Result<OpenedWindow>;
}

/// The window a piece of code is currently running in
pub trait PageWindow: Send + Sync {
    /// Host id of this window, if the host can resolve it
    fn window_id(&self) -> Option<WindowId>;

    /// Outer size including chrome (title bar, borders)
    fn outer_size(&self) -> LogicalSize;

    /// Content area size
    fn inner_size(&self) -> LogicalSize;

    /// Low-level outer resize (`window.resizeTo`)
    fn resize_to(&self, outer: LogicalSize);

    /// Toggle `overflow: hidden` on the document root
    fn set_overflow_hidden(&self, hidden: bool);

    /// Close this window (`window.close`)
    fn close(&self);

    /// Fired when the host is about to unload this page
    fn unload_token(&self) -> CancellationToken;
}

/// Capabilities discovered on the host at startup
#[derive(Clone, Default)]
pub struct HostCapabilities {
    /// Extension window API, if exposed
    pub windows: Option<Arc<dyn WindowsApi>>,
    /// Page-level window opener, if exposed
    pub opener: Option<Arc<dyn NamedWindowOpener>>,
}

impl HostCapabilities {
    /// No capabilities at all
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }
}

impl std::fmt::Debug for HostCapabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostCapabilities")
            .field("windows", &self.windows.is_some())
            .field("opener", &self.opener.is_some())
            .finish()
    }
}
