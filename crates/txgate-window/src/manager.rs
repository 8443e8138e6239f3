//! Window session managers
//!
//! Two concrete strategies behind [`WindowSessionManager`]; which one is used
//! is decided once by [`select_manager`] from the probed [`HostCapabilities`].

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Result, WindowError};
use crate::host::{HostCapabilities, NamedWindowOpener, PageWindow, WindowsApi};
use crate::types::{LogicalSize, PlatformVariant, WindowId};


/// Name of the reusable popup under the replace strategy
pub const POPUP_NAME: &str = "Txgate";

/// An opened approval window
#[derive(Debug, Clone)]
pub struct WindowSession {
    id: WindowId,
    variant: PlatformVariant,
    url: String,
    unload: CancellationToken,
}

impl WindowSession {
    /// Host id of the window
    #[must_use]
    pub fn id(&self) -> WindowId {
        self.id
    }

    /// Strategy that opened this window
    #[must_use]
    pub fn variant(&self) -> PlatformVariant {
        self.variant
    }

    /// URL the window was opened with
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Token fired when the host unloads the window
    #[must_use]
    pub fn unload_token(&self) -> CancellationToken {
        self.unload.clone()
    }
}

/// Host-agnostic popup window operations
#[async_trait]
pub trait WindowSessionManager: Send + Sync {
    /// Active strategy
    fn variant(&self) -> PlatformVariant;

    /// Open a window showing `url`
    async fn open(&self, url: &str, size: LogicalSize) -> Result<WindowSession>;

    /// Resize `page` so that its content area equals `size`.
    ///
    /// Never fails: an unresolvable window id skips the resize.
    fn fit_current_window(&self, page: &dyn PageWindow, size: LogicalSize);

    /// Disable page scrolling (fixed-size overlay)
    fn lock_scroll(&self, page: &dyn PageWindow) {
        page.set_overflow_hidden(true);
    }

    /// Re-enable page scrolling (embedded page)
    fn unlock_scroll(&self, page: &dyn PageWindow) {
        page.set_overflow_hidden(false);
    }

    /// Give up the approval window `page` after a decision.
    fn release(&self, page: &dyn PageWindow);

    /// Close a session from outside its page.
    ///
    /// Only spawned windows are destroyed; a replaced window stays alive.
    fn close(&self, session: &WindowSession) -> Result<()>;
}

/// Fit `page` to a content size, measuring its chrome first.
///
/// With a window API the host window is updated; without one the page
/// resizes itself.
pub fn fit_window(api: Option<&dyn WindowsApi>, page: &dyn PageWindow, size: LogicalSize) {
    let gap = page.outer_size().gap_to(page.inner_size());
    let target = size + gap;

    let Some(api) = api else {
        debug!(%target, "No window API, resizing page directly");
        page.resize_to(target);
        return;
    };

    let Some(id) = page.window_id() else {
        debug!("Current window id unavailable, skipping resize");
        return;
    };

    if let Err(e) = api.update(id, target) {
        warn!(window_id = %id, error = %e, "Window resize failed");
    }
}

/// Strategy A: reuse a named popup and keep it alive for signing
pub struct ReplacingWindowManager {
    opener: Arc<dyn NamedWindowOpener>,
    windows: Option<Arc<dyn WindowsApi>>,
}

impl ReplacingWindowManager {
    /// Create the manager; `windows` is only used for resizing
    #[must_use]
    pub fn new(opener: Arc<dyn NamedWindowOpener>, windows: Option<Arc<dyn WindowsApi>>) -> Self {
        Self { opener, windows }
    }
}

#[async_trait]
impl WindowSessionManager for ReplacingWindowManager {
    fn variant(&self) -> PlatformVariant {
        PlatformVariant::ReplaceCurrent
    }

    async fn open(&self, url: &str, size: LogicalSize) -> Result<WindowSession> {
        let opened = self.opener.open_named(POPUP_NAME, url, size)?;
        debug!(window_id = %opened.id, url, "Opened named popup");
        Ok(WindowSession {
            id: opened.id,
            variant: self.variant(),
            url: url.to_string(),
            unload: opened.unload,
        })
    }

    fn fit_current_window(&self, page: &dyn PageWindow, size: LogicalSize) {
        fit_window(self.windows.as_deref(), page, size);
    }

    fn release(&self, page: &dyn PageWindow) {
        // The signing screen replaces this page in the same popup.
        debug!(window_id = ?page.window_id(), "Keeping approval window for signing");
    }

    fn close(&self, session: &WindowSession) -> Result<()> {
        debug!(window_id = %session.id, "Named popup stays open");
        Ok(())
    }
}

/// Strategy B: spawn a separate window and destroy it after the decision
pub struct SpawningWindowManager {
    windows: Arc<dyn WindowsApi>,
}

impl SpawningWindowManager {
    /// Create the manager
    #[must_use]
    pub fn new(windows: Arc<dyn WindowsApi>) -> Self {
        Self { windows }
    }
}

#[async_trait]
impl WindowSessionManager for SpawningWindowManager {
    fn variant(&self) -> PlatformVariant {
        PlatformVariant::SpawnSeparate
    }

    async fn open(&self, url: &str, size: LogicalSize) -> Result<WindowSession> {
        let opened = self.windows.create(url, size)?;
        debug!(window_id = %opened.id, url, "Spawned popup window");
        Ok(WindowSession {
            id: opened.id,
            variant: self.variant(),
            url: url.to_string(),
            unload: opened.unload,
        })
    }

    fn fit_current_window(&self, page: &dyn PageWindow, size: LogicalSize) {
        fit_window(Some(self.windows.as_ref()), page, size);
    }

    fn release(&self, page: &dyn PageWindow) {
        debug!(window_id = ?page.window_id(), "Closing approval window");
        page.close();
    }

    fn close(&self, session: &WindowSession) -> Result<()> {
        if session.unload.is_cancelled() {
            return Ok(());
        }
        self.windows.remove(session.id)
    }
}

/// Pick the window strategy for this host.
///
/// A window API that lets scripts close their own windows wins; otherwise a
/// page-level opener; otherwise any window API.
pub fn select_manager(caps: &HostCapabilities) -> Result<Arc<dyn WindowSessionManager>> {
    let manager: Arc<dyn WindowSessionManager> = match (&caps.windows, &caps.opener) {
        (Some(windows), _) if windows.allows_scripts_to_close() => {
            Arc::new(SpawningWindowManager::new(windows.clone()))
        }
        (windows, Some(opener)) => {
            Arc::new(ReplacingWindowManager::new(opener.clone(), windows.clone()))
        }
        (Some(windows), None) => Arc::new(SpawningWindowManager::new(windows.clone())),
        (None, None) => return Err(WindowError::Unsupported),
    };

    info!(variant = %manager.variant(), "Selected window strategy");
    Ok(manager)
}
