//! In-memory platform for driving `CaptureCoordinator` in tests

#![allow(dead_code)]

use capture::{
    CaptureResult, CapturedImage, DisplayCaptureRequest, DisplayCapturer, DisplayProvider,
    HelperWindows, PlatformCaptureError, Point, RawCapture, Rect, ScreenDescriptor, ScreenId,
    WindowId,
};
use overlay::{
    AccessibilityProvider, CursorSource, HighlightGeometry, InputEvent, InputInterceptor,
    ManualInterceptor, MonitorCallback, MonitorScope, OverlayRenderer, OverlayResult,
    SubscriptionId, TapCallback, WindowInfo, WindowListProvider,
};
use parking_lot::Mutex;
use session::{
    CaptureConsumer, CaptureCoordinator, PermissionProvider, Platform, SessionConfig, SessionEvent,
    SessionObserver,
};
use std::sync::Arc;

pub const OWN_PID: u32 = 4242;
pub const HIGHLIGHT_WINDOW: WindowId = WindowId(999);

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Screen A: primary, (0,0)-(1920,1080) at 1x
pub fn screen_a() -> ScreenDescriptor {
    ScreenDescriptor::new(ScreenId(1), Rect::new(0.0, 0.0, 1920.0, 1080.0)).primary()
}

/// Screen B: right of A, origin (1920,0), 2x backing
pub fn screen_b() -> ScreenDescriptor {
    ScreenDescriptor::new(ScreenId(2), Rect::new(1920.0, 0.0, 1920.0, 1080.0)).with_scale(2.0)
}

#[derive(Clone)]
pub struct Displays(pub Arc<Mutex<(Vec<ScreenDescriptor>, Option<ScreenId>)>>);

impl DisplayProvider for Displays {
    fn screens(&self) -> Vec<ScreenDescriptor> {
        self.0.lock().0.clone()
    }

    fn main_display_id(&self) -> Option<ScreenId> {
        self.0.lock().1
    }
}

#[derive(Clone)]
pub struct Cursor(pub Arc<Mutex<Point>>);

impl CursorSource for Cursor {
    fn location(&self) -> Point {
        *self.0.lock()
    }
}

/// Reports one global frame for every query point
#[derive(Clone)]
pub struct Accessibility(pub Arc<Mutex<Option<Rect>>>);

impl AccessibilityProvider for Accessibility {
    fn element_frame_at(&self, _point: Point) -> Option<Rect> {
        *self.0.lock()
    }
}

#[derive(Clone)]
pub struct Windows(pub Arc<Mutex<Vec<WindowInfo>>>);

impl WindowListProvider for Windows {
    fn on_screen_windows(&self) -> Vec<WindowInfo> {
        self.0.lock().clone()
    }
}

#[derive(Default)]
pub struct CapturerLog {
    pub requests: Vec<DisplayCaptureRequest>,
    pub fail_with: Option<PlatformCaptureError>,
}

/// Returns a blank buffer of the requested size
#[derive(Clone, Default)]
pub struct Capturer(pub Arc<Mutex<CapturerLog>>);

impl DisplayCapturer for Capturer {
    fn capture_display(
        &self,
        request: &DisplayCaptureRequest,
    ) -> Result<RawCapture, PlatformCaptureError> {
        let mut log = self.0.lock();
        log.requests.push(request.clone());
        if let Some(e) = log.fail_with.clone() {
            return Err(e);
        }
        let (w, h) = (request.output_width, request.output_height);
        Ok(RawCapture::packed(vec![0; (w * h * 4) as usize], w, h))
    }
}

/// `ManualInterceptor` shared with the test so it can inject events
#[derive(Clone, Default)]
pub struct Interceptor(pub Arc<Mutex<ManualInterceptor>>);

impl Interceptor {
    pub fn deliver(&self, event: InputEvent) -> overlay::Disposition {
        self.0.lock().deliver(event)
    }

    pub fn subscriptions(&self) -> usize {
        self.0.lock().subscription_count()
    }
}

impl InputInterceptor for Interceptor {
    fn install_tap(&mut self, callback: TapCallback) -> OverlayResult<SubscriptionId> {
        self.0.lock().install_tap(callback)
    }

    fn install_monitor(
        &mut self,
        scope: MonitorScope,
        callback: MonitorCallback,
    ) -> OverlayResult<SubscriptionId> {
        self.0.lock().install_monitor(scope, callback)
    }

    fn is_tap_enabled(&self, id: SubscriptionId) -> bool {
        self.0.lock().is_tap_enabled(id)
    }

    fn enable_tap(&mut self, id: SubscriptionId) -> OverlayResult<()> {
        self.0.lock().enable_tap(id)
    }

    fn remove(&mut self, id: SubscriptionId) {
        self.0.lock().remove(id)
    }
}

#[derive(Default)]
pub struct RendererLog {
    pub highlights: Vec<HighlightGeometry>,
    pub selections: Vec<HighlightGeometry>,
    pub flashes: Vec<HighlightGeometry>,
    pub hides: usize,
    pub crosshair: bool,
}

#[derive(Clone, Default)]
pub struct Renderer(pub Arc<Mutex<RendererLog>>);

impl OverlayRenderer for Renderer {
    fn show_highlight(&mut self, geometry: &HighlightGeometry) {
        self.0.lock().highlights.push(*geometry);
    }

    fn show_selection(&mut self, geometry: &HighlightGeometry) {
        self.0.lock().selections.push(*geometry);
    }

    fn hide(&mut self) {
        self.0.lock().hides += 1;
    }

    fn flash(&mut self, geometry: &HighlightGeometry) {
        self.0.lock().flashes.push(*geometry);
    }

    fn set_crosshair_cursor(&mut self, enabled: bool) {
        self.0.lock().crosshair = enabled;
    }

    fn helper_windows(&self) -> HelperWindows {
        HelperWindows {
            highlight: Some(HIGHLIGHT_WINDOW),
            ..Default::default()
        }
    }
}

/// (accessibility, screen recording)
#[derive(Clone)]
pub struct Permissions(pub Arc<Mutex<(bool, bool)>>);

impl PermissionProvider for Permissions {
    fn is_accessibility_granted(&self) -> bool {
        self.0.lock().0
    }

    fn is_screen_recording_granted(&self) -> bool {
        self.0.lock().1
    }

    fn request_screen_recording(&self) -> bool {
        false
    }
}

#[derive(Clone, Default)]
pub struct Consumer(pub Arc<Mutex<Vec<CaptureResult<CapturedImage>>>>);

impl CaptureConsumer for Consumer {
    fn deliver(&mut self, result: CaptureResult<CapturedImage>) {
        self.0.lock().push(result);
    }
}

#[derive(Clone, Default)]
pub struct Observer(pub Arc<Mutex<Vec<SessionEvent>>>);

impl SessionObserver for Observer {
    fn on_event(&mut self, event: &SessionEvent) {
        self.0.lock().push(event.clone());
    }
}

/// Handles onto every fake the coordinator owns
pub struct Harness {
    pub displays: Displays,
    pub cursor: Cursor,
    pub accessibility: Accessibility,
    pub windows: Windows,
    pub capturer: Capturer,
    pub interceptor: Interceptor,
    pub renderer: Renderer,
    pub permissions: Permissions,
    pub consumer: Consumer,
    pub observer: Observer,
}

impl Harness {
    /// Screens A and B, cursor on A, nothing under it
    pub fn new() -> Self {
        init_logging();
        Self {
            displays: Displays(Arc::new(Mutex::new((
                vec![screen_a(), screen_b()],
                Some(ScreenId(1)),
            )))),
            cursor: Cursor(Arc::new(Mutex::new(Point::new(500.0, 500.0)))),
            accessibility: Accessibility(Arc::new(Mutex::new(None))),
            windows: Windows(Arc::new(Mutex::new(Vec::new()))),
            capturer: Capturer::default(),
            interceptor: Interceptor::default(),
            renderer: Renderer::default(),
            permissions: Permissions(Arc::new(Mutex::new((true, true)))),
            consumer: Consumer::default(),
            observer: Observer::default(),
        }
    }

    pub fn coordinator(&self) -> CaptureCoordinator {
        let platform = Platform {
            displays: Box::new(self.displays.clone()),
            cursor: Box::new(self.cursor.clone()),
            accessibility: Box::new(self.accessibility.clone()),
            windows: Box::new(self.windows.clone()),
            capturer: Arc::new(self.capturer.clone()),
            interceptor: Box::new(self.interceptor.clone()),
            renderer: Box::new(self.renderer.clone()),
            permissions: Box::new(self.permissions.clone()),
            consumer: Box::new(self.consumer.clone()),
            observer: Box::new(self.observer.clone()),
        };
        let config = SessionConfig {
            own_pid: OWN_PID,
            ..Default::default()
        };
        CaptureCoordinator::new(platform, config)
    }

    pub fn move_cursor(&self, x: f64, y: f64) {
        *self.cursor.0.lock() = Point::new(x, y);
    }

    pub fn set_element(&self, global: Option<Rect>) {
        *self.accessibility.0.lock() = global;
    }

    pub fn events(&self) -> Vec<SessionEvent> {
        self.observer.0.lock().clone()
    }

    pub fn capture_requests(&self) -> Vec<DisplayCaptureRequest> {
        self.capturer.0.lock().requests.clone()
    }
}

pub fn window(id: u64, global: Rect, pid: u32) -> WindowInfo {
    WindowInfo {
        id: WindowId(id),
        bounds: global,
        owner_pid: pid,
        title: format!("window {id}"),
    }
}
