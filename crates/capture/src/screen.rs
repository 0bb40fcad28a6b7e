//! Display descriptors and the current multi-monitor layout

use crate::geometry::{Point, Rect};
use std::fmt;

/// Stable display identifier as reported by the OS
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScreenId(pub u64);

impl fmt::Display for ScreenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One display, with its frame in the per-screen local basis
/// (origin at the primary display's bottom-left, y axis up).
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenDescriptor {
    pub id: ScreenId,
    pub frame: Rect,
    /// Physical pixels per point
    pub backing_scale: f64,
    /// Size of the display's native pixel buffer
    pub native_width: u32,
    pub native_height: u32,
    /// Pixel:point ratio of the active display mode, when the OS reports one
    pub mode_scale: Option<f64>,
    pub is_primary: bool,
}

impl ScreenDescriptor {
    /// A 1x display whose native buffer matches its frame
    pub fn new(id: ScreenId, frame: Rect) -> Self {
        Self {
            id,
            frame,
            backing_scale: 1.0,
            native_width: frame.width.round().max(0.0) as u32,
            native_height: frame.height.round().max(0.0) as u32,
            mode_scale: None,
            is_primary: false,
        }
    }

    /// Set the backing scale and derive the native buffer size from it
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.backing_scale = scale;
        self.native_width = (self.frame.width * scale).round().max(0.0) as u32;
        self.native_height = (self.frame.height * scale).round().max(0.0) as u32;
        self
    }

    pub fn with_native_size(mut self, width: u32, height: u32) -> Self {
        self.native_width = width;
        self.native_height = height;
        self
    }

    pub fn with_mode_scale(mut self, scale: f64) -> Self {
        self.mode_scale = Some(scale);
        self
    }

    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self
    }

    /// Half-open containment, so shared edges belong to one screen only
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.frame.x
            && p.x < self.frame.max_x()
            && p.y >= self.frame.y
            && p.y < self.frame.max_y()
    }

    pub fn largest_dimension(&self) -> f64 {
        self.frame.width.max(self.frame.height)
    }
}

/// Source of display enumeration
pub trait DisplayProvider {
    /// All active displays, in no particular order
    fn screens(&self) -> Vec<ScreenDescriptor>;

    /// Identifier the OS reports as the main display
    fn main_display_id(&self) -> Option<ScreenId>;
}

/// Snapshot of the display configuration
#[derive(Debug, Clone, Default)]
pub struct ScreenLayout {
    screens: Vec<ScreenDescriptor>,
    main_id: Option<ScreenId>,
}

impl ScreenLayout {
    pub fn new(screens: Vec<ScreenDescriptor>, main_id: Option<ScreenId>) -> Self {
        Self { screens, main_id }
    }

    /// Enumerate displays from the platform
    pub fn from_provider(provider: &dyn DisplayProvider) -> Self {
        let layout = Self::new(provider.screens(), provider.main_display_id());
        log::debug!(
            "Display layout: {} screen(s), main {:?}",
            layout.screens.len(),
            layout.main_id
        );
        layout
    }

    pub fn screens(&self) -> &[ScreenDescriptor] {
        &self.screens
    }

    pub fn main_display_id(&self) -> Option<ScreenId> {
        self.main_id
    }

    pub fn get(&self, id: ScreenId) -> Option<&ScreenDescriptor> {
        self.screens.iter().find(|s| s.id == id)
    }

    /// The display the OS reports as main.
    ///
    /// Resolved by identifier only. Enumeration order is not stable across
    /// relaunches, so the first entry is never assumed to be the main one.
    pub fn main_display(&self) -> Option<&ScreenDescriptor> {
        if let Some(screen) = self.main_id.and_then(|id| self.get(id)) {
            return Some(screen);
        }

        let fallback = self
            .screens
            .iter()
            .find(|s| s.is_primary)
            .or_else(|| {
                self.screens
                    .iter()
                    .find(|s| s.frame.x == 0.0 && s.frame.y == 0.0)
            });
        if let Some(screen) = fallback {
            log::warn!(
                "Main display id {:?} not in layout, using {}",
                self.main_id,
                screen.id
            );
        }
        fallback
    }

    /// Screen under a local-basis point
    pub fn screen_containing(&self, p: Point) -> Option<&ScreenDescriptor> {
        if !p.is_finite() {
            return None;
        }
        self.screens
            .iter()
            .find(|s| s.contains(p))
            // Far edges of the outermost screens
            .or_else(|| self.screens.iter().find(|s| s.frame.contains(p)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dual() -> ScreenLayout {
        let a = ScreenDescriptor::new(ScreenId(7), Rect::new(0.0, 0.0, 1920.0, 1080.0));
        let b = ScreenDescriptor::new(ScreenId(3), Rect::new(1920.0, 0.0, 1920.0, 1080.0));
        // Secondary enumerated first on purpose
        ScreenLayout::new(vec![b, a], Some(ScreenId(7)))
    }

    #[test]
    fn main_display_uses_reported_id_not_order() {
        let layout = dual();
        assert_eq!(layout.main_display().map(|s| s.id), Some(ScreenId(7)));
    }

    #[test]
    fn main_display_falls_back_to_primary_flag() {
        let a = ScreenDescriptor::new(ScreenId(1), Rect::new(-1920.0, 0.0, 1920.0, 1080.0));
        let b = ScreenDescriptor::new(ScreenId(2), Rect::new(0.0, 0.0, 2560.0, 1440.0)).primary();
        let layout = ScreenLayout::new(vec![a, b], Some(ScreenId(99)));
        assert_eq!(layout.main_display().map(|s| s.id), Some(ScreenId(2)));
    }

    #[test]
    fn shared_edge_belongs_to_one_screen() {
        let layout = dual();
        let hit = layout.screen_containing(Point::new(1920.0, 500.0));
        assert_eq!(hit.map(|s| s.id), Some(ScreenId(3)));
    }

    #[test]
    fn outer_far_edge_still_resolves() {
        let layout = dual();
        let hit = layout.screen_containing(Point::new(3840.0, 1080.0));
        assert_eq!(hit.map(|s| s.id), Some(ScreenId(3)));
    }

    #[test]
    fn point_off_every_screen_is_none() {
        let layout = dual();
        assert!(layout.screen_containing(Point::new(-5.0, 10.0)).is_none());
        assert!(layout.screen_containing(Point::new(f64::NAN, 10.0)).is_none());
    }
}
