//! Targeting overlay for Pinpoint
//!
//! Element/window location, area selection, input interception and cursor
//! tracking. Rendering itself is left to an `OverlayRenderer`.

pub mod intercept;
pub mod locator;
pub mod platform;
pub mod selection;
pub mod tracking;

pub use intercept::{
    Disposition, InputEvent, InputInterceptor, InterceptCommand, Interception, InterceptionGate,
    Key, ManualInterceptor, MonitorCallback, MonitorScope, MouseButton, SubscriptionId,
    TapCallback, WatchdogVerdict,
};
pub use locator::{
    AccessibilityProvider, DetectedFrame, ElementLocator, FrameDebouncer, FrameSource,
    LocatorConfig, NoAccessibility, WindowInfo, WindowListProvider,
};
pub use selection::{calc_selection_rect, is_valid_selection, AreaSelection, MIN_SELECTION_SIZE};
pub use tracking::{CursorSource, MouseTracker, TickReport, DEFAULT_POLL_INTERVAL};

use capture::{HelperWindows, Rect, ScreenId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OverlayError {
    #[cfg(windows)]
    #[error("Windows API error: {0}")]
    Windows(#[from] windows::core::Error),

    #[error("input interception unavailable: {0}")]
    InterceptionUnavailable(String),

    #[error("unknown subscription {0:?}")]
    UnknownSubscription(SubscriptionId),
}

pub type OverlayResult<T> = Result<T, OverlayError>;

/// Where to draw, in both bases the renderer may need
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HighlightGeometry {
    pub screen: ScreenId,
    /// Local basis
    pub local: Rect,
    /// Global basis (top-left origin)
    pub global: Rect,
}

/// Draws the transient UI; the core only computes geometry
pub trait OverlayRenderer {
    fn show_highlight(&mut self, geometry: &HighlightGeometry);

    /// Rubber band while dragging out an area
    fn show_selection(&mut self, geometry: &HighlightGeometry);

    fn hide(&mut self);

    /// Brief confirmation after a capture
    fn flash(&mut self, geometry: &HighlightGeometry);

    fn set_crosshair_cursor(&mut self, enabled: bool);

    /// Windows this renderer owns, kept out of captures and hit-testing
    fn helper_windows(&self) -> HelperWindows {
        HelperWindows::default()
    }
}
