//! Session configuration

use capture::ResolverConfig;
use overlay::{LocatorConfig, DEFAULT_POLL_INTERVAL, MIN_SELECTION_SIZE};
use std::time::Duration;

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Element hover polling cadence
    pub poll_interval: Duration,
    pub locator: LocatorConfig,
    pub resolver: ResolverConfig,
    /// Area selections must exceed this on both sides
    pub min_selection_size: f64,
    /// Re-enables of a disabled input tap before the session gives up
    pub max_tap_restarts: u32,
    /// Windows of this process are never targets
    pub own_pid: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            locator: LocatorConfig::default(),
            resolver: ResolverConfig::default(),
            min_selection_size: MIN_SELECTION_SIZE,
            max_tap_restarts: 3,
            own_pid: std::process::id(),
        }
    }
}
