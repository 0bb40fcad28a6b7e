//! Element and window lookup under a point
//!
//! Accessibility hit-testing first, the on-screen window list as fallback.
//! Every failure is "no element"; nothing here returns an error.

use capture::{
    CoordinateReconciler, HelperWindows, Point, Rect, ScreenDescriptor, ScreenId, WindowId,
};

/// Accessibility hierarchy lookup
pub trait AccessibilityProvider {
    /// Frame of the deepest element at `point`, both in the global basis
    fn element_frame_at(&self, point: Point) -> Option<Rect>;
}

/// For platforms without an accessibility tree
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAccessibility;

impl AccessibilityProvider for NoAccessibility {
    fn element_frame_at(&self, _point: Point) -> Option<Rect> {
        None
    }
}

/// Window information for selection
#[derive(Debug, Clone, PartialEq)]
pub struct WindowInfo {
    pub id: WindowId,
    /// Bounds in the global basis
    pub bounds: Rect,
    pub owner_pid: u32,
    pub title: String,
}

/// Window manager enumeration
pub trait WindowListProvider {
    /// On-screen windows, topmost first
    fn on_screen_windows(&self) -> Vec<WindowInfo>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSource {
    Accessibility,
    WindowList,
}

/// A validated, clipped and padded target rectangle.
///
/// Holding one means it passed validation this tick; absence is "no element".
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedFrame {
    /// Local basis, always inside the reporting screen
    pub rect: Rect,
    pub screen: ScreenId,
    pub source: FrameSource,
    pub window: Option<WindowId>,
}

#[derive(Debug, Clone)]
pub struct LocatorConfig {
    /// Outward margin added around accepted frames; the padded frame is both
    /// highlighted and captured
    pub padding: f64,
    /// Edge movement below this is jitter
    pub debounce_tolerance: f64,
    /// Slack when checking that a frame contains the query point
    pub containment_epsilon: f64,
    /// Frames larger than this multiple of the screen are bogus
    pub max_extent_factor: f64,
    /// Windows at or below this size in either dimension are skipped
    pub min_window_size: f64,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            padding: 4.0,
            debounce_tolerance: 1.0,
            containment_epsilon: 2.0,
            max_extent_factor: 4.0,
            min_window_size: 50.0,
        }
    }
}

/// Check a reported frame (local basis) against the screen and query point
pub fn sanitize(
    rect: Rect,
    screen: &ScreenDescriptor,
    query: Point,
    config: &LocatorConfig,
) -> Option<Rect> {
    if !rect.is_finite() || !rect.has_positive_size() {
        return None;
    }
    if !rect.intersects(&screen.frame) {
        return None;
    }
    let limit = screen.largest_dimension() * config.max_extent_factor;
    if rect.width > limit || rect.height > limit {
        return None;
    }
    if !rect.outset(config.containment_epsilon).contains(query) {
        return None;
    }
    Some(rect)
}

/// Finds the capturable rectangle under a point
pub struct ElementLocator {
    accessibility: Box<dyn AccessibilityProvider>,
    windows: Box<dyn WindowListProvider>,
    helpers: HelperWindows,
    own_pid: u32,
    config: LocatorConfig,
}

impl ElementLocator {
    pub fn new(
        accessibility: Box<dyn AccessibilityProvider>,
        windows: Box<dyn WindowListProvider>,
        config: LocatorConfig,
    ) -> Self {
        Self {
            accessibility,
            windows,
            helpers: HelperWindows::default(),
            own_pid: std::process::id(),
            config,
        }
    }

    /// Windows owned by this process are never targets
    pub fn with_own_pid(mut self, pid: u32) -> Self {
        self.own_pid = pid;
        self
    }

    pub fn set_helper_windows(&mut self, helpers: HelperWindows) {
        self.helpers = helpers;
    }

    pub fn config(&self) -> &LocatorConfig {
        &self.config
    }

    /// Element under a local-basis point on `screen`
    pub fn locate(
        &self,
        point: Point,
        screen: &ScreenDescriptor,
        reconciler: &CoordinateReconciler,
    ) -> Option<DetectedFrame> {
        if !screen.frame.contains(point) {
            return None;
        }

        for candidate in reconciler.candidate_query_points(point) {
            let accepted = self
                .accessibility
                .element_frame_at(candidate)
                .and_then(|global| reconciler.to_local(global))
                .and_then(|local| sanitize(local, screen, point, &self.config))
                .and_then(|rect| self.finish(rect, screen));

            if let Some(rect) = accepted {
                return Some(DetectedFrame {
                    rect,
                    screen: screen.id,
                    source: FrameSource::Accessibility,
                    window: None,
                });
            }
        }

        self.window_at(point, screen, reconciler)
    }

    /// Topmost eligible window under a local-basis point
    pub fn window_at(
        &self,
        point: Point,
        screen: &ScreenDescriptor,
        reconciler: &CoordinateReconciler,
    ) -> Option<DetectedFrame> {
        let min = self.config.min_window_size;

        self.windows
            .on_screen_windows()
            .into_iter()
            .filter(|w| w.owner_pid != self.own_pid && !self.helpers.contains(w.id))
            .filter(|w| w.bounds.width > min && w.bounds.height > min)
            .find_map(|w| {
                let local = reconciler.to_local(w.bounds)?;
                if !local.contains(point) {
                    return None;
                }
                let rect = self.finish(local, screen)?;
                Some(DetectedFrame {
                    rect,
                    screen: screen.id,
                    source: FrameSource::WindowList,
                    window: Some(w.id),
                })
            })
    }

    /// Clip to the screen, pad, and clip again so the result stays on screen
    fn finish(&self, rect: Rect, screen: &ScreenDescriptor) -> Option<Rect> {
        rect.intersection(&screen.frame)?
            .outset(self.config.padding)
            .intersection(&screen.frame)
    }
}

/// Suppresses sub-pixel jitter between successive detections
#[derive(Debug, Clone)]
pub struct FrameDebouncer {
    last: Option<DetectedFrame>,
    tolerance: f64,
}

impl FrameDebouncer {
    pub fn new(tolerance: f64) -> Self {
        Self { last: None, tolerance }
    }

    /// Feed this tick's detection; returns `Some` when the change should propagate
    pub fn update(&mut self, next: Option<DetectedFrame>) -> Option<Option<DetectedFrame>> {
        let changed = match (&self.last, &next) {
            (None, None) => false,
            (Some(prev), Some(new)) => {
                prev.screen != new.screen || !prev.rect.approx_eq(&new.rect, self.tolerance)
            }
            _ => true,
        };

        if changed {
            self.last = next.clone();
            Some(next)
        } else {
            None
        }
    }

    pub fn current(&self) -> Option<&DetectedFrame> {
        self.last.as_ref()
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capture::ScreenLayout;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct FixedElement {
        frame: Option<Rect>,
        queried: Rc<RefCell<Vec<Point>>>,
        answer_only_at: Option<Point>,
    }

    impl AccessibilityProvider for FixedElement {
        fn element_frame_at(&self, point: Point) -> Option<Rect> {
            self.queried.borrow_mut().push(point);
            match self.answer_only_at {
                Some(p) if p != point => None,
                _ => self.frame,
            }
        }
    }

    struct FixedWindows(Vec<WindowInfo>);

    impl WindowListProvider for FixedWindows {
        fn on_screen_windows(&self) -> Vec<WindowInfo> {
            self.0.clone()
        }
    }

    fn screen() -> ScreenDescriptor {
        ScreenDescriptor::new(ScreenId(1), Rect::new(0.0, 0.0, 1920.0, 1080.0)).primary()
    }

    fn reconciler() -> CoordinateReconciler {
        CoordinateReconciler::new(&ScreenLayout::new(vec![screen()], Some(ScreenId(1))))
    }

    fn window(id: u64, bounds: Rect, pid: u32) -> WindowInfo {
        WindowInfo {
            id: WindowId(id),
            bounds,
            owner_pid: pid,
            title: format!("w{id}"),
        }
    }

    fn locator(
        frame: Option<Rect>,
        windows: Vec<WindowInfo>,
    ) -> (ElementLocator, Rc<RefCell<Vec<Point>>>) {
        let queried = Rc::new(RefCell::new(Vec::new()));
        let ax = FixedElement {
            frame,
            queried: queried.clone(),
            answer_only_at: None,
        };
        let l = ElementLocator::new(
            Box::new(ax),
            Box::new(FixedWindows(windows)),
            LocatorConfig::default(),
        )
        .with_own_pid(1);
        (l, queried)
    }

    #[test]
    fn accessibility_frame_is_converted_and_padded() {
        // Global top-left (400,300), 400x300 -> local y = 1080 - 600 = 480
        let (l, _) = locator(Some(Rect::new(400.0, 300.0, 400.0, 300.0)), vec![]);
        let found = l.locate(Point::new(500.0, 500.0), &screen(), &reconciler()).unwrap();
        assert_eq!(found.source, FrameSource::Accessibility);
        assert_eq!(found.rect, Rect::new(396.0, 476.0, 408.0, 308.0));
    }

    #[test]
    fn second_candidate_is_used_when_first_misses() {
        let queried = Rc::new(RefCell::new(Vec::new()));
        let ax = FixedElement {
            // Only answers the raw local point; frame given in global basis
            frame: Some(Rect::new(400.0, 300.0, 400.0, 300.0)),
            queried: queried.clone(),
            answer_only_at: Some(Point::new(500.0, 500.0)),
        };
        let l = ElementLocator::new(
            Box::new(ax),
            Box::new(FixedWindows(vec![])),
            LocatorConfig::default(),
        );
        let found = l.locate(Point::new(500.0, 500.0), &screen(), &reconciler());
        assert!(found.is_some());
        assert_eq!(*queried.borrow(), vec![Point::new(500.0, 580.0), Point::new(500.0, 500.0)]);
    }

    #[test]
    fn sanitize_rejects_bad_frames() {
        let s = screen();
        let cfg = LocatorConfig::default();
        let q = Point::new(100.0, 100.0);

        assert!(sanitize(Rect::new(f64::NAN, 0.0, 10.0, 10.0), &s, q, &cfg).is_none());
        assert!(sanitize(Rect::new(90.0, 90.0, 0.0, 20.0), &s, q, &cfg).is_none());
        assert!(sanitize(Rect::new(5000.0, 90.0, 20.0, 20.0), &s, q, &cfg).is_none());
        assert!(sanitize(Rect::new(0.0, 0.0, 8000.0, 200.0), &s, q, &cfg).is_none());
        // Stale frame nowhere near the cursor
        assert!(sanitize(Rect::new(500.0, 500.0, 20.0, 20.0), &s, q, &cfg).is_none());
        // Just outside but within epsilon
        assert!(sanitize(Rect::new(101.5, 90.0, 20.0, 20.0), &s, q, &cfg).is_some());
    }

    #[test]
    fn window_fallback_skips_own_and_slivers() {
        let windows = vec![
            window(1, Rect::new(0.0, 0.0, 1920.0, 30.0), 50),     // sliver
            window(2, Rect::new(0.0, 0.0, 1000.0, 1000.0), 1),    // own process
            window(3, Rect::new(100.0, 100.0, 800.0, 900.0), 50), // hit
            window(4, Rect::new(0.0, 0.0, 1920.0, 1080.0), 50),   // below
        ];
        let (l, _) = locator(None, windows);
        let found = l.locate(Point::new(500.0, 500.0), &screen(), &reconciler()).unwrap();
        assert_eq!(found.source, FrameSource::WindowList);
        assert_eq!(found.window, Some(WindowId(3)));
    }

    #[test]
    fn helper_windows_are_never_targets() {
        let windows = vec![
            window(9, Rect::new(0.0, 0.0, 1920.0, 1080.0), 77),
            window(4, Rect::new(0.0, 0.0, 1000.0, 1000.0), 50),
        ];
        let (mut l, _) = locator(None, windows);
        l.set_helper_windows(HelperWindows {
            highlight: Some(WindowId(9)),
            ..Default::default()
        });
        let found = l.locate(Point::new(500.0, 500.0), &screen(), &reconciler()).unwrap();
        assert_eq!(found.window, Some(WindowId(4)));
    }

    #[test]
    fn result_stays_on_screen() {
        // Element hanging off the left edge
        let (l, _) = locator(Some(Rect::new(-200.0, 0.0, 400.0, 1080.0)), vec![]);
        let found = l.locate(Point::new(50.0, 500.0), &screen(), &reconciler()).unwrap();
        let bounds = screen().frame;
        assert!(found.rect.x >= bounds.x && found.rect.max_x() <= bounds.max_x());
        assert!(found.rect.y >= bounds.y && found.rect.max_y() <= bounds.max_y());
    }

    #[test]
    fn point_off_screen_finds_nothing() {
        let (l, queried) = locator(Some(Rect::new(0.0, 0.0, 100.0, 100.0)), vec![]);
        assert!(l.locate(Point::new(-50.0, 10.0), &screen(), &reconciler()).is_none());
        assert!(queried.borrow().is_empty());
    }

    #[test]
    fn debouncer_suppresses_jitter() {
        let frame = |x: f64| DetectedFrame {
            rect: Rect::new(x, 10.0, 100.0, 100.0),
            screen: ScreenId(1),
            source: FrameSource::Accessibility,
            window: None,
        };
        let mut d = FrameDebouncer::new(1.0);

        assert_eq!(d.update(Some(frame(10.0))), Some(Some(frame(10.0))));
        assert_eq!(d.update(Some(frame(10.4))), None);
        assert_eq!(d.update(Some(frame(12.0))), Some(Some(frame(12.0))));
        assert_eq!(d.update(None), Some(None));
        assert_eq!(d.update(None), None);

        d.update(Some(frame(12.0)));
        d.reset();
        assert!(d.current().is_none());
        assert_eq!(d.update(Some(frame(12.0))), Some(Some(frame(12.0))));
    }
}
