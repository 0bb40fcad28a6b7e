//! Cursor polling for element hover

use crate::locator::{DetectedFrame, ElementLocator, FrameDebouncer};
use crate::{HighlightGeometry, OverlayRenderer};
use capture::{CoordinateReconciler, Point, ScreenId, ScreenLayout};
use std::time::Duration;

/// Roughly 60 Hz
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(16);

/// Current cursor position
pub trait CursorSource {
    /// Position in the local basis
    fn location(&self) -> Point;
}

/// Outcome of one poll
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TickReport {
    pub cursor: Point,
    pub screen: Option<ScreenId>,
    pub screen_changed: bool,
    /// `Some` when the detected frame changed beyond the debounce tolerance
    pub change: Option<Option<DetectedFrame>>,
}

/// Drives the locator from the cursor position on every tick
pub struct MouseTracker {
    locator: ElementLocator,
    debouncer: FrameDebouncer,
    current_screen: Option<ScreenId>,
}

impl MouseTracker {
    pub fn new(locator: ElementLocator) -> Self {
        let tolerance = locator.config().debounce_tolerance;
        Self {
            locator,
            debouncer: FrameDebouncer::new(tolerance),
            current_screen: None,
        }
    }

    pub fn locator(&self) -> &ElementLocator {
        &self.locator
    }

    /// Last frame that was propagated
    pub fn current(&self) -> Option<&DetectedFrame> {
        self.debouncer.current()
    }

    /// Forget the screen and the debounced frame.
    ///
    /// Called when the layout changes so nothing from the old geometry is
    /// reported as valid.
    pub fn reset(&mut self) {
        self.current_screen = None;
        self.debouncer.reset();
    }

    /// Poll once: resolve the screen, re-run the locator, update the highlight
    pub fn tick(
        &mut self,
        cursor: &dyn CursorSource,
        layout: &ScreenLayout,
        reconciler: &CoordinateReconciler,
        renderer: &mut dyn OverlayRenderer,
    ) -> TickReport {
        let point = cursor.location();
        let screen = layout.screen_containing(point);
        let screen_id = screen.map(|s| s.id);

        let screen_changed = screen_id != self.current_screen;
        if screen_changed {
            log::debug!("Cursor moved to screen {:?}", screen_id);
            self.current_screen = screen_id;
            // Stale frames from the previous screen must not survive the move
            self.debouncer.reset();
            renderer.hide();
        }

        let detected = screen.and_then(|s| self.locator.locate(point, s, reconciler));
        let change = self.debouncer.update(detected);

        match &change {
            Some(Some(frame)) => match reconciler.to_global_rect(frame.rect) {
                Some(global) => renderer.show_highlight(&HighlightGeometry {
                    screen: frame.screen,
                    local: frame.rect,
                    global,
                }),
                None => renderer.hide(),
            },
            Some(None) => renderer.hide(),
            None => {}
        }

        TickReport {
            cursor: point,
            screen: screen_id,
            screen_changed,
            change,
        }
    }
}
