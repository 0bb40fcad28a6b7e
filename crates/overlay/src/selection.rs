//! Drag-to-select area logic

use capture::{Point, Rect, ScreenDescriptor, ScreenId};

/// Default minimum selection size; both sides must exceed it
pub const MIN_SELECTION_SIZE: f64 = 10.0;

/// Calculate selection rectangle from drag points
pub fn calc_selection_rect(start: Point, end: Point) -> Rect {
    Rect::from_corners(start, end)
}

/// Check if selection is large enough (strictly greater than `min`)
pub fn is_valid_selection(rect: &Rect, min: f64) -> bool {
    rect.width > min && rect.height > min
}

/// Rubber-band state for one drag, confined to the screen it started on
#[derive(Debug, Clone, Default)]
pub struct AreaSelection {
    start: Option<Point>,
    bounds: Option<Rect>,
    screen: Option<ScreenId>,
    current: Option<Rect>,
}

impl AreaSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a drag at a local-basis point
    pub fn begin(&mut self, point: Point, screen: &ScreenDescriptor) {
        self.start = Some(point);
        self.bounds = Some(screen.frame);
        self.screen = Some(screen.id);
        self.current = Some(Rect::new(point.x, point.y, 0.0, 0.0));
    }

    pub fn is_dragging(&self) -> bool {
        self.start.is_some()
    }

    pub fn screen(&self) -> Option<ScreenId> {
        self.screen
    }

    pub fn current(&self) -> Option<Rect> {
        self.current
    }

    /// Move the free corner; returns the rectangle to display
    pub fn update(&mut self, point: Point) -> Option<Rect> {
        let start = self.start?;
        let end = self.clamp(point);
        self.current = Some(calc_selection_rect(start, end));
        self.current
    }

    /// Finish the drag; the rectangle if it passes the size threshold
    pub fn release(&mut self, point: Point, min: f64) -> Option<(Rect, ScreenId)> {
        let rect = self.update(point)?;
        let screen = self.screen?;
        self.clear();
        is_valid_selection(&rect, min).then_some((rect, screen))
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    fn clamp(&self, p: Point) -> Point {
        match self.bounds {
            Some(b) => Point::new(p.x.clamp(b.x, b.max_x()), p.y.clamp(b.y, b.max_y())),
            None => p,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn screen() -> ScreenDescriptor {
        ScreenDescriptor::new(ScreenId(2), Rect::new(1920.0, 0.0, 1920.0, 1080.0))
    }

    #[test]
    fn threshold_is_exclusive() {
        assert!(!is_valid_selection(&Rect::new(0.0, 0.0, 10.0, 10.0), MIN_SELECTION_SIZE));
        assert!(!is_valid_selection(&Rect::new(0.0, 0.0, 11.0, 10.0), MIN_SELECTION_SIZE));
        assert!(is_valid_selection(&Rect::new(0.0, 0.0, 11.0, 11.0), MIN_SELECTION_SIZE));
    }

    #[test]
    fn drag_is_clamped_to_start_screen() {
        let mut sel = AreaSelection::new();
        sel.begin(Point::new(2000.0, 100.0), &screen());
        let rect = sel.update(Point::new(100.0, -50.0)).unwrap();
        assert_eq!(rect, Rect::new(1920.0, 0.0, 80.0, 100.0));
    }

    #[test]
    fn release_validates_and_clears() {
        let mut sel = AreaSelection::new();
        sel.begin(Point::new(2000.0, 100.0), &screen());
        assert!(sel.release(Point::new(2010.0, 110.0), MIN_SELECTION_SIZE).is_none());
        assert!(!sel.is_dragging());

        sel.begin(Point::new(2000.0, 100.0), &screen());
        let (rect, id) = sel.release(Point::new(2011.0, 89.0), MIN_SELECTION_SIZE).unwrap();
        assert_eq!(rect, Rect::new(2000.0, 89.0, 11.0, 11.0));
        assert_eq!(id, ScreenId(2));
    }

    #[test]
    fn release_without_begin_is_none() {
        let mut sel = AreaSelection::new();
        assert!(sel.release(Point::new(1.0, 1.0), MIN_SELECTION_SIZE).is_none());
    }
}
