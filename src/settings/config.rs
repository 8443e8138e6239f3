//! Application configuration types

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use txgate_core::ApprovalSettings;
use txgate_window::{LogicalSize, PlatformVariant};

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub approval: ApprovalSettings,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// Headless host used by `txgate simulate`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_chrome_gap_width")]
    pub chrome_gap_width: u32,
    #[serde(default = "default_chrome_gap_height")]
    pub chrome_gap_height: u32,
    /// `replace` or `spawn`
    #[serde(default = "default_variant")]
    pub variant: String,
    #[serde(default = "default_fee_denom")]
    pub fee_denom: String,
    /// Balance of the simulated account, in `fee_denom`
    #[serde(default = "default_balance")]
    pub balance: u64,
}

fn default_chrome_gap_width() -> u32 {
    16
}
fn default_chrome_gap_height() -> u32 {
    60
}
fn default_variant() -> String {
    "spawn".to_string()
}
fn default_fee_denom() -> String {
    "uatom".to_string()
}
fn default_balance() -> u64 {
    100_000
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            chrome_gap_width: default_chrome_gap_width(),
            chrome_gap_height: default_chrome_gap_height(),
            variant: default_variant(),
            fee_denom: default_fee_denom(),
            balance: default_balance(),
        }
    }
}

impl SimulationConfig {
    pub fn chrome_gap(&self) -> LogicalSize {
        LogicalSize::new(self.chrome_gap_width, self.chrome_gap_height)
    }

    pub fn variant(&self) -> Result<PlatformVariant> {
        self.variant
            .parse()
            .map_err(|e: String| anyhow::anyhow!("simulation.variant: {e}"))
    }
}

impl AppConfig {
    /// Reject values the approval machinery cannot run with
    pub fn validate(&self) -> Result<()> {
        let approval = &self.approval;
        if approval.extension_base_url.trim().is_empty() {
            bail!("approval.extension_base_url must not be empty");
        }
        if approval.popup_width == 0 || approval.popup_height == 0 {
            bail!(
                "approval popup size must be positive, got {}",
                approval.popup_size()
            );
        }
        if approval.attach_poll_interval_ms == 0 {
            bail!("approval.attach_poll_interval_ms must be positive");
        }
        if approval.retention_secs < 0 {
            bail!("approval.retention_secs must not be negative");
        }
        if approval.inbox_capacity == 0 || approval.event_capacity == 0 {
            bail!("approval channel capacities must be positive");
        }
        self.simulation.variant()?;
        Ok(())
    }
}
