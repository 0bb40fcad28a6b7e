//! Capture geometry and screen capture resolution for Pinpoint
//!
//! Owns the display model, the coordinate reconciler and the resolver that
//! turns a validated rectangle into pixels.

pub mod coords;
pub mod frame;
pub mod geometry;
pub mod platform;
pub mod resolver;
pub mod screen;

pub use coords::{to_display_local, CoordinateReconciler};
pub use frame::{CapturedImage, RawCapture};
pub use geometry::{PixelRect, Point, Rect};
pub use resolver::{
    output_scale, CaptureMode, CaptureRegion, CaptureRequest, DisplayCaptureRequest,
    DisplayCapturer, HelperWindows, PlatformCaptureError, ResolverConfig,
    ScreenCaptureResolver, WindowId,
};
pub use screen::{DisplayProvider, ScreenDescriptor, ScreenId, ScreenLayout};

use std::fmt;
use thiserror::Error;

/// Which OS permission a failure refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermissionKind {
    Accessibility,
    ScreenRecording,
}

impl fmt::Display for PermissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionKind::Accessibility => f.write_str("accessibility"),
            PermissionKind::ScreenRecording => f.write_str("screen recording"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptureError {
    #[error("{0} permission not granted")]
    PermissionDenied(PermissionKind),

    #[error("display {0} could not be resolved")]
    NoDisplay(ScreenId),

    #[error("no display under the cursor")]
    NoDisplayAtCursor,

    #[error("no capturable element")]
    NoElement,

    #[error("capture failed: {0}")]
    CaptureFailed(String),

    #[error("Windows API error: {0}")]
    Windows(String),
}

impl CaptureError {
    /// `NoElement` just means "nothing yet"; everything else ends the request
    pub fn is_fatal(&self) -> bool {
        !matches!(self, CaptureError::NoElement)
    }
}

#[cfg(windows)]
impl From<windows::core::Error> for CaptureError {
    fn from(e: windows::core::Error) -> Self {
        CaptureError::Windows(e.to_string())
    }
}

pub type CaptureResult<T> = Result<T, CaptureError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_missing_element_is_not_fatal() {
        assert!(!CaptureError::NoElement.is_fatal());
        assert!(CaptureError::NoDisplayAtCursor.is_fatal());
        assert!(CaptureError::PermissionDenied(PermissionKind::ScreenRecording).is_fatal());
        assert!(CaptureError::CaptureFailed("device lost".into()).is_fatal());
    }
}
