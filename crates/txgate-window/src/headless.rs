//! Headless window host
//!
//! An in-memory desktop implementing every host capability. It backs the
//! CLI simulation and the tests: windows have a fixed chrome gap, can be
//! resized, navigated, scroll-locked and closed, and fire their unload token
//! when closed or navigated away from.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Result, WindowError};
use crate::host::{HostCapabilities, NamedWindowOpener, OpenedWindow, PageWindow, WindowsApi};
use crate::types::{LogicalSize, PlatformVariant, WindowId};


struct HeadlessWindow {
    url: String,
    outer: LogicalSize,
    overflow_hidden: bool,
    open: bool,
    unload: CancellationToken,
}

#[derive(Default)]
struct DesktopState {
    next_id: u64,
    windows: HashMap<WindowId, HeadlessWindow>,
    names: HashMap<String, WindowId>,
}

/// Point-in-time view of a headless window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSnapshot {
    /// Window id
    pub id: WindowId,
    /// Currently displayed URL
    pub url: String,
    /// Outer size
    pub outer: LogicalSize,
    /// Content size
    pub inner: LogicalSize,
    /// Whether scrolling is locked
    pub overflow_hidden: bool,
    /// Whether the window is still open
    pub open: bool,
}

/// In-memory desktop
#[derive(Clone)]
pub struct HeadlessDesktop {
    state: Arc<Mutex<DesktopState>>,
    chrome_gap: LogicalSize,
    scripts_can_close: bool,
    resolves_ids: bool,
}

impl HeadlessDesktop {
    /// Create a desktop whose windows all carry `chrome_gap` of decoration
    #[must_use]
    pub fn new(chrome_gap: LogicalSize) -> Self {
        Self {
            state: Arc::new(Mutex::new(DesktopState::default())),
            chrome_gap,
            scripts_can_close: false,
            resolves_ids: true,
        }
    }

    /// Simulate a host that cannot resolve the current window id
    #[must_use]
    pub fn without_id_resolution(mut self) -> Self {
        self.resolves_ids = false;
        self
    }

    /// Capabilities matching one of the two host strategies
    #[must_use]
    pub fn capabilities(&self, variant: PlatformVariant) -> HostCapabilities {
        let mut host = self.clone();
        host.scripts_can_close = variant == PlatformVariant::SpawnSeparate;
        let host = Arc::new(host);
        HostCapabilities {
            windows: Some(host.clone()),
            opener: Some(host),
        }
    }

    /// Capabilities of a host with only a page-level opener (no window API)
    #[must_use]
    pub fn opener_only(&self) -> HostCapabilities {
        HostCapabilities {
            windows: None,
            opener: Some(Arc::new(self.clone())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, DesktopState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn insert(&self, url: &str, outer: LogicalSize) -> OpenedWindow {
        let mut state = self.lock();
        state.next_id += 1;
        let id = WindowId(state.next_id);
        let unload = CancellationToken::new();
        state.windows.insert(
            id,
            HeadlessWindow {
                url: url.to_string(),
                outer,
                overflow_hidden: false,
                open: true,
                unload: unload.clone(),
            },
        );
        OpenedWindow { id, unload }
    }

    /// Open a top-level window, e.g. the extension popup a flow starts in
    pub fn open_page(&self, url: &str, outer: LogicalSize) -> HeadlessPage {
        let opened = self.insert(url, outer);
        self.page(opened.id)
    }

    /// Handle to the page running in window `id`
    #[must_use]
    pub fn page(&self, id: WindowId) -> HeadlessPage {
        HeadlessPage {
            desktop: self.clone(),
            id,
        }
    }

    /// Snapshot of a window
    #[must_use]
    pub fn window(&self, id: WindowId) -> Option<WindowSnapshot> {
        let state = self.lock();
        state.windows.get(&id).map(|w| self.snapshot(id, w))
    }

    /// All windows still open
    #[must_use]
    pub fn open_windows(&self) -> Vec<WindowSnapshot> {
        let state = self.lock();
        let mut open: Vec<_> = state
            .windows
            .iter()
            .filter(|(_, w)| w.open)
            .map(|(id, w)| self.snapshot(*id, w))
            .collect();
        open.sort_by_key(|w| w.id.0);
        open
    }

    /// The user closes a window through its title bar
    pub fn user_close(&self, id: WindowId) {
        self.close_window(id);
    }

    fn snapshot(&self, id: WindowId, w: &HeadlessWindow) -> WindowSnapshot {
        WindowSnapshot {
            id,
            url: w.url.clone(),
            outer: w.outer,
            inner: w.outer.gap_to(self.chrome_gap),
            overflow_hidden: w.overflow_hidden,
            open: w.open,
        }
    }

    fn close_window(&self, id: WindowId) -> bool {
        let mut state = self.lock();
        match state.windows.get_mut(&id) {
            Some(w) if w.open => {
                w.open = false;
                w.unload.cancel();
                debug!(window_id = %id, "Headless window closed");
                true
            }
            _ => false,
        }
    }

    fn with_window<T>(&self, id: WindowId, f: impl FnOnce(&mut HeadlessWindow) -> T) -> Result<T> {
        let mut state = self.lock();
        state
            .windows
            .get_mut(&id)
            .filter(|w| w.open)
            .map(f)
            .ok_or(WindowError::NotFound(id))
    }
}

impl WindowsApi for HeadlessDesktop {
    fn create(&self, url: &str, size: LogicalSize) -> Result<OpenedWindow> {
        Ok(self.insert(url, size))
    }

    fn update(&self, id: WindowId, size: LogicalSize) -> Result<()> {
        self.with_window(id, |w| w.outer = size)
    }

    fn remove(&self, id: WindowId) -> Result<()> {
        if self.close_window(id) {
            Ok(())
        } else {
            Err(WindowError::NotFound(id))
        }
    }

    fn allows_scripts_to_close(&self) -> bool {
        self.scripts_can_close
    }
}

impl NamedWindowOpener for HeadlessDesktop {
    fn open_named(&self, name: &str, url: &str, size: LogicalSize) -> Result<OpenedWindow> {
        let existing = self.lock().names.get(name).copied();
        if let Some(id) = existing {
            let navigated = self.with_window(id, |w| {
                // Navigation unloads the previous page.
                w.unload.cancel();
                w.unload = CancellationToken::new();
                w.url = url.to_string();
                w.unload.clone()
            });
            if let Ok(unload) = navigated {
                debug!(window_id = %id, url, "Reused named window");
                return Ok(OpenedWindow { id, unload });
            }
        }

        let opened = self.insert(url, size);
        self.lock().names.insert(name.to_string(), opened.id);
        Ok(opened)
    }
}

/// A page running inside a headless window
#[derive(Clone)]
pub struct HeadlessPage {
    desktop: HeadlessDesktop,
    id: WindowId,
}

impl HeadlessPage {
    /// Id of the underlying window, regardless of id resolution
    #[must_use]
    pub fn id(&self) -> WindowId {
        self.id
    }
}

impl PageWindow for HeadlessPage {
    fn window_id(&self) -> Option<WindowId> {
        self.desktop.resolves_ids.then_some(self.id)
    }

    fn outer_size(&self) -> LogicalSize {
        self.desktop
            .window(self.id)
            .map(|w| w.outer)
            .unwrap_or_default()
    }

    fn inner_size(&self) -> LogicalSize {
        self.desktop
            .window(self.id)
            .map(|w| w.inner)
            .unwrap_or_default()
    }

    fn resize_to(&self, outer: LogicalSize) {
        let _ = self.desktop.with_window(self.id, |w| w.outer = outer);
    }

    fn set_overflow_hidden(&self, hidden: bool) {
        let _ = self
            .desktop
            .with_window(self.id, |w| w.overflow_hidden = hidden);
    }

    fn close(&self) {
        self.desktop.close_window(self.id);
    }

    fn unload_token(&self) -> CancellationToken {
        let state = self.desktop.lock();
        match state.windows.get(&self.id) {
            Some(w) => w.unload.clone(),
            None => {
                let token = CancellationToken::new();
                token.cancel();
                token
            }
        }
    }
}
