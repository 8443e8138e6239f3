//! Approval settings
//!
//! Deserialized from the `[approval]` table of the application config.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use txgate_window::LogicalSize;

/// Tunables for the approval machinery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalSettings {
    /// Extension page that hosts every route
    #[serde(default = "default_extension_base_url")]
    pub extension_base_url: String,
    /// Popup content width
    #[serde(default = "default_popup_width")]
    pub popup_width: u32,
    /// Popup content height
    #[serde(default = "default_popup_height")]
    pub popup_height: u32,
    /// Delay between `get` attempts while a config is not ready
    #[serde(default = "default_attach_poll_interval_ms")]
    pub attach_poll_interval_ms: u64,
    /// How long finished requests stay visible before being purged
    #[serde(default = "default_retention_secs")]
    pub retention_secs: i64,
    /// Interval of the background sweep
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Queued calls before senders wait
    #[serde(default = "default_inbox_capacity")]
    pub inbox_capacity: usize,
    /// Buffered notifications per subscriber
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl ApprovalSettings {
    /// Popup content size
    #[must_use]
    pub fn popup_size(&self) -> LogicalSize {
        LogicalSize::new(self.popup_width, self.popup_height)
    }

    /// Attach poll interval
    #[must_use]
    pub fn attach_poll_interval(&self) -> Duration {
        Duration::from_millis(self.attach_poll_interval_ms)
    }

    /// Sweep interval
    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

impl Default for ApprovalSettings {
    fn default() -> Self {
        Self {
            extension_base_url: default_extension_base_url(),
            popup_width: default_popup_width(),
            popup_height: default_popup_height(),
            attach_poll_interval_ms: default_attach_poll_interval_ms(),
            retention_secs: default_retention_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            inbox_capacity: default_inbox_capacity(),
            event_capacity: default_event_capacity(),
        }
    }
}

fn default_extension_base_url() -> String {
    "chrome-extension://txgate/popup.html".to_string()
}
fn default_popup_width() -> u32 {
    txgate_window::POPUP_SIZE.width
}
fn default_popup_height() -> u32 {
    txgate_window::POPUP_SIZE.height
}
fn default_attach_poll_interval_ms() -> u64 {
    100
}
fn default_retention_secs() -> i64 {
    60
}
fn default_sweep_interval_secs() -> u64 {
    30
}
fn default_inbox_capacity() -> usize {
    64
}
fn default_event_capacity() -> usize {
    256
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_popup() {
        let settings = ApprovalSettings::default();
        assert_eq!(settings.popup_size(), txgate_window::POPUP_SIZE);
        assert_eq!(settings.attach_poll_interval(), Duration::from_millis(100));
    }

    #[test]
    fn test_partial_table_fills_defaults() {
        let settings: ApprovalSettings =
            serde_json::from_str(r#"{"attach_poll_interval_ms": 5}"#).unwrap();
        assert_eq!(settings.attach_poll_interval_ms, 5);
        assert_eq!(settings.retention_secs, 60);
    }
}
