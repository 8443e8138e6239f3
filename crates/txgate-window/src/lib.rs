//! Txgate Window - popup window sessions
//!
//! This crate hides the two host window-management strategies behind one
//! capability set:
//! - Replace: `window.open`-style hosts that reuse a named popup, keeping the
//!   caller's window alive as the eventual signing surface
//! - Spawn: `windows.create`-style hosts that spawn a separate window and
//!   destroy it once a decision is made
//!
//! The strategy is picked once at startup by [`select_manager`]; call sites
//! only ever see [`WindowSessionManager`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod headless;
pub mod host;
pub mod manager;
pub mod types;

pub use error::{Result, WindowError};
pub use headless::{HeadlessDesktop, HeadlessPage, WindowSnapshot};
pub use host::{HostCapabilities, NamedWindowOpener, OpenedWindow, PageWindow, WindowsApi};
pub use manager::{
    fit_window, select_manager, ReplacingWindowManager, SpawningWindowManager, WindowSession,
    WindowSessionManager,
};
pub use types::{LogicalSize, PlatformVariant, WindowId, POPUP_SIZE};
