//! Screen capture resolver
//!
//! Turns a validated local-basis rectangle plus a target screen into a
//! platform capture call, and the call's pixels into a `CapturedImage`.

use crate::coords::to_display_local;
use crate::frame::{CapturedImage, RawCapture};
use crate::geometry::{PixelRect, Rect};
use crate::screen::{ScreenDescriptor, ScreenId, ScreenLayout};
use crate::{CaptureError, CaptureResult, PermissionKind};
use crossbeam_channel::{bounded, RecvTimeoutError};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

/// OS window identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(pub u64);

/// Capture mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureMode {
    /// Hover a UI element and click it
    Element,
    /// Drag out a rectangle
    Area,
    /// Window under the cursor
    Window,
    /// Whole screen under the cursor
    Fullscreen,
}

/// A validated target ready for resolution
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureRequest {
    /// Target in the local basis of `screen`
    pub rect: Rect,
    pub screen: ScreenId,
    pub mode: CaptureMode,
    pub excluded_windows: BTreeSet<WindowId>,
}

impl CaptureRequest {
    pub fn new(rect: Rect, screen: ScreenId, mode: CaptureMode) -> Self {
        Self {
            rect,
            screen,
            mode,
            excluded_windows: BTreeSet::new(),
        }
    }
}

/// Tool-owned transient windows that never appear in captures.
///
/// The editor window is deliberately not part of this set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HelperWindows {
    pub highlight: Option<WindowId>,
    pub area_selection: Option<WindowId>,
    pub preview: Option<WindowId>,
}

impl HelperWindows {
    pub fn ids(&self) -> impl Iterator<Item = WindowId> + '_ {
        [self.highlight, self.area_selection, self.preview]
            .into_iter()
            .flatten()
    }

    pub fn contains(&self, id: WindowId) -> bool {
        self.ids().any(|w| w == id)
    }
}

/// Resolver tuning
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Edge tolerance for treating a rectangle as the whole screen
    pub full_screen_tolerance: f64,
    /// Upper bound on output pixels per point
    pub max_scale: f64,
    /// Upper bound on one platform capture call
    pub capture_timeout: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            full_screen_tolerance: 0.5,
            max_scale: 4.0,
            capture_timeout: Duration::from_secs(5),
        }
    }
}

/// Area of the display to read, in display-local points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureRegion {
    FullDisplay,
    Region(PixelRect),
}

/// What the platform capturer is asked for
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayCaptureRequest {
    pub display: ScreenId,
    pub region: CaptureRegion,
    pub output_width: u32,
    pub output_height: u32,
    pub scale: f64,
    pub excluded_windows: Vec<WindowId>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformCaptureError {
    #[error("screen recording permission denied")]
    PermissionDenied,

    #[error("{0}")]
    Failed(String),
}

/// Platform screen-capture API
pub trait DisplayCapturer: Send + Sync {
    fn capture_display(
        &self,
        request: &DisplayCaptureRequest,
    ) -> Result<RawCapture, PlatformCaptureError>;
}

/// Output pixels per point for `screen`.
///
/// Largest of the native-buffer ratio, the display mode ratio and the backing
/// scale, capped at `max_scale`.
pub fn output_scale(screen: &ScreenDescriptor, max_scale: f64) -> f64 {
    let native_ratio = if screen.frame.width > 0.0 {
        screen.native_width as f64 / screen.frame.width
    } else {
        1.0
    };
    let scale = [native_ratio, screen.mode_scale.unwrap_or(1.0), screen.backing_scale]
        .into_iter()
        .filter(|s| s.is_finite() && *s > 0.0)
        .fold(1.0_f64, f64::max);
    scale.min(max_scale)
}

/// Capture resolver
pub struct ScreenCaptureResolver {
    capturer: Arc<dyn DisplayCapturer>,
    helpers: HelperWindows,
    config: ResolverConfig,
}

impl ScreenCaptureResolver {
    pub fn new(capturer: Arc<dyn DisplayCapturer>, config: ResolverConfig) -> Self {
        Self {
            capturer,
            helpers: HelperWindows::default(),
            config,
        }
    }

    /// Register the overlay windows to keep out of captures
    pub fn set_helper_windows(&mut self, helpers: HelperWindows) {
        self.helpers = helpers;
    }

    pub fn helper_windows(&self) -> &HelperWindows {
        &self.helpers
    }

    /// Resolve a request against `screen` without touching the platform
    pub fn plan(
        &self,
        request: &CaptureRequest,
        screen: &ScreenDescriptor,
    ) -> CaptureResult<DisplayCaptureRequest> {
        if request.screen != screen.id {
            return Err(CaptureError::NoDisplay(request.screen));
        }
        if !request.rect.is_finite() {
            return Err(CaptureError::NoElement);
        }

        // At least one output pixel per side
        let scale = output_scale(screen, self.config.max_scale);
        let clamped = request
            .rect
            .intersection(&screen.frame)
            .filter(|r| r.width * scale >= 1.0 && r.height * scale >= 1.0)
            .ok_or(CaptureError::NoElement)?;

        let mut excluded: BTreeSet<WindowId> = request.excluded_windows.clone();
        excluded.extend(self.helpers.ids());
        let excluded_windows = excluded.into_iter().collect();

        if clamped.approx_eq(&screen.frame, self.config.full_screen_tolerance) {
            return Ok(DisplayCaptureRequest {
                display: screen.id,
                region: CaptureRegion::FullDisplay,
                output_width: (screen.frame.width * scale).round() as u32,
                output_height: (screen.frame.height * scale).round() as u32,
                scale,
                excluded_windows,
            });
        }

        let region = PixelRect::covering(&to_display_local(&clamped, screen));
        Ok(DisplayCaptureRequest {
            display: screen.id,
            region: CaptureRegion::Region(region),
            output_width: (region.width as f64 * scale).round() as u32,
            output_height: (region.height as f64 * scale).round() as u32,
            scale,
            excluded_windows,
        })
    }

    /// Resolve and issue a capture, bounded by the configured timeout
    pub fn capture(
        &self,
        request: &CaptureRequest,
        layout: &ScreenLayout,
    ) -> CaptureResult<CapturedImage> {
        let screen = layout
            .get(request.screen)
            .ok_or(CaptureError::NoDisplay(request.screen))?;
        let plan = self.plan(request, screen)?;

        log::debug!(
            "Capturing {:?} on {} at {:.2}x -> {}x{}",
            plan.region,
            plan.display,
            plan.scale,
            plan.output_width,
            plan.output_height
        );

        let started = Instant::now();
        let raw = self.issue(plan.clone())?;
        let image = CapturedImage::from_raw(raw, plan.display)?;
        log::info!(
            "Captured {}x{} from {} in {:?}",
            image.width,
            image.height,
            image.screen,
            started.elapsed()
        );
        Ok(image)
    }

    fn issue(&self, plan: DisplayCaptureRequest) -> CaptureResult<RawCapture> {
        let (tx, rx) = bounded(1);
        let capturer = Arc::clone(&self.capturer);

        thread::Builder::new()
            .name("display-capture".into())
            .spawn(move || {
                let _ = tx.send(capturer.capture_display(&plan));
            })
            .map_err(|e| CaptureError::CaptureFailed(format!("capture thread: {e}")))?;

        match rx.recv_timeout(self.config.capture_timeout) {
            Ok(Ok(raw)) => Ok(raw),
            Ok(Err(PlatformCaptureError::PermissionDenied)) => {
                Err(CaptureError::PermissionDenied(PermissionKind::ScreenRecording))
            }
            Ok(Err(PlatformCaptureError::Failed(reason))) => {
                Err(CaptureError::CaptureFailed(reason))
            }
            Err(RecvTimeoutError::Timeout) => Err(CaptureError::CaptureFailed(format!(
                "timed out after {:?}",
                self.config.capture_timeout
            ))),
            Err(RecvTimeoutError::Disconnected) => {
                Err(CaptureError::CaptureFailed("capture thread exited without a result".into()))
            }
        }
    }
}
