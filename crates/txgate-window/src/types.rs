use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;

/// Content area every approval popup is fitted to.
pub const POPUP_SIZE: LogicalSize = LogicalSize::new(360, 580);

/// Size in logical (CSS) pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct LogicalSize {
    /// Width in logical pixels
    pub width: u32,
    /// Height in logical pixels
    pub height: u32,
}

impl LogicalSize {
    /// Create a size
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Component-wise difference, clamped at zero.
    ///
    /// Used to measure window chrome: `outer.gap_to(inner)`.
    #[must_use]
    pub fn gap_to(self, inner: Self) -> Self {
        Self {
            width: self.width.saturating_sub(inner.width),
            height: self.height.saturating_sub(inner.height),
        }
    }
}

impl Add for LogicalSize {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            width: self.width.saturating_add(rhs.width),
            height: self.height.saturating_add(rhs.height),
        }
    }
}

impl fmt::Display for LogicalSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Host window identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(pub u64);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which host window-management strategy is active.
///
/// The variants differ in window lifetime, not in protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformVariant {
    /// Opening reuses a named popup; the caller's window survives and is
    /// later replaced by the signing screen.
    ReplaceCurrent,
    /// Opening spawns a separate window which must be closed explicitly.
    SpawnSeparate,
}

impl PlatformVariant {
    /// Whether a decided approval window stays open for the signing screen
    #[must_use]
    pub fn keeps_caller_window(self) -> bool {
        matches!(self, Self::ReplaceCurrent)
    }
}

impl fmt::Display for PlatformVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReplaceCurrent => write!(f, "replace"),
            Self::SpawnSeparate => write!(f, "spawn"),
        }
    }
}

impl std::str::FromStr for PlatformVariant {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "replace" | "replace_current" => Ok(Self::ReplaceCurrent),
            "spawn" | "spawn_separate" => Ok(Self::SpawnSeparate),
            other => Err(format!("unknown platform variant: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gap_is_clamped() {
        let outer = LogicalSize::new(376, 620);
        let inner = LogicalSize::new(360, 580);
        assert_eq!(outer.gap_to(inner), LogicalSize::new(16, 40));
        assert_eq!(inner.gap_to(outer), LogicalSize::new(0, 0));
    }

    #[test]
    fn test_variant_parse() {
        assert_eq!(
            "spawn".parse::<PlatformVariant>().unwrap(),
            PlatformVariant::SpawnSeparate
        );
        assert!("tabs".parse::<PlatformVariant>().is_err());
        assert!(PlatformVariant::ReplaceCurrent.keeps_caller_window());
        assert!(!PlatformVariant::SpawnSeparate.keeps_caller_window());
    }
}
