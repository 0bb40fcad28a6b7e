//! Conversion between the three coordinate bases
//!
//! * local: per-screen frames, origin at the primary display's bottom-left, y up
//! * global: accessibility / window-manager space, origin at the primary
//!   display's top edge, y down
//! * display-local: capture API space, origin at the top-left of one display
//!
//! Local and global differ only by a vertical flip around the primary
//! display's top edge. The topmost point of the whole desktop is irrelevant.

use crate::geometry::{Point, Rect};
use crate::screen::{ScreenDescriptor, ScreenLayout};

/// Converts between local and global bases for one display layout
#[derive(Debug, Clone, Default)]
pub struct CoordinateReconciler {
    reference_top: Option<f64>,
}

impl CoordinateReconciler {
    /// Reconciler for `layout`
    pub fn new(layout: &ScreenLayout) -> Self {
        let mut reconciler = Self::default();
        reconciler.resync(layout);
        reconciler
    }

    /// Recompute the reference edge after a display configuration change
    pub fn resync(&mut self, layout: &ScreenLayout) {
        self.reference_top = layout.main_display().map(|s| s.frame.max_y());
        log::debug!("Reference top edge: {:?}", self.reference_top);
    }

    /// Top edge of the primary display in the local basis
    pub fn reference_top_y(&self) -> Option<f64> {
        self.reference_top
    }

    pub fn to_global(&self, local: Point) -> Option<Point> {
        let top = self.reference_top?;
        Some(Point::new(local.x, top - local.y))
    }

    pub fn to_local_point(&self, global: Point) -> Option<Point> {
        let top = self.reference_top?;
        Some(Point::new(global.x, top - global.y))
    }

    pub fn to_global_rect(&self, local: Rect) -> Option<Rect> {
        let top = self.reference_top?;
        Some(Rect::new(local.x, top - local.max_y(), local.width, local.height))
    }

    /// Global rectangle (top-left origin) into the local basis
    pub fn to_local(&self, global: Rect) -> Option<Rect> {
        let top = self.reference_top?;
        Some(Rect::new(global.x, top - global.max_y(), global.width, global.height))
    }

    /// Points to hit-test for a local cursor position.
    ///
    /// The global conversion comes first; the raw local point follows because
    /// hit-testing calls disagree on which convention they expect. Callers
    /// query in order and keep the first valid result.
    pub fn candidate_query_points(&self, local: Point) -> Vec<Point> {
        let mut points = Vec::with_capacity(2);
        if let Some(global) = self.to_global(local) {
            points.push(global);
        }
        if !points.iter().any(|p| p.approx_eq(&local, f64::EPSILON)) {
            points.push(local);
        }
        points
    }
}

/// Local rectangle into `screen`'s own top-left-origin space.
///
/// Flips with the screen's own height, never the desktop's.
pub fn to_display_local(rect: &Rect, screen: &ScreenDescriptor) -> Rect {
    let x = rect.x - screen.frame.x;
    let y_from_bottom = rect.y - screen.frame.y;
    Rect::new(
        x,
        screen.frame.height - (y_from_bottom + rect.height),
        rect.width,
        rect.height,
    )
}
