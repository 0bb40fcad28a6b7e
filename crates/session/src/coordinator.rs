//! Capture session coordinator
//!
//! Owns at most one session at a time. Every way out of an interactive state
//! goes through `teardown`, which releases interception, the cursor override,
//! the highlight and any pending commands, and is safe to call repeatedly.

use crate::config::SessionConfig;
use crate::events::{
    CaptureConsumer, CaptureSummary, EndReason, PermissionProvider, SessionCommand, SessionEvent,
    SessionObserver,
};
use crate::state::{SessionState, StateMachine};
use crate::{SessionError, SessionResult};
use capture::{
    CaptureError, CaptureMode, CaptureRequest, CoordinateReconciler, DisplayCapturer,
    DisplayProvider, PermissionKind, Point, Rect, ScreenCaptureResolver, ScreenId, ScreenLayout,
};
use crossbeam_channel::{select, tick, unbounded, Receiver, Sender};
use overlay::{
    AccessibilityProvider, AreaSelection, CursorSource, DetectedFrame, ElementLocator,
    HighlightGeometry, InputInterceptor, Interception, MouseTracker, OverlayRenderer, TickReport,
    WatchdogVerdict, WindowListProvider,
};
use std::sync::Arc;
use uuid::Uuid;

/// Platform collaborators the coordinator is built from
pub struct Platform {
    pub displays: Box<dyn DisplayProvider>,
    pub cursor: Box<dyn CursorSource>,
    pub accessibility: Box<dyn AccessibilityProvider>,
    pub windows: Box<dyn WindowListProvider>,
    pub capturer: Arc<dyn DisplayCapturer>,
    pub interceptor: Box<dyn InputInterceptor>,
    pub renderer: Box<dyn OverlayRenderer>,
    pub permissions: Box<dyn PermissionProvider>,
    pub consumer: Box<dyn CaptureConsumer>,
    pub observer: Box<dyn SessionObserver>,
}

/// Per-session state, dropped on teardown
struct ActiveSession {
    id: Uuid,
    mode: CaptureMode,
    selection: AreaSelection,
    crosshair: bool,
}

pub struct CaptureCoordinator {
    config: SessionConfig,
    displays: Box<dyn DisplayProvider>,
    cursor: Box<dyn CursorSource>,
    interceptor: Box<dyn InputInterceptor>,
    renderer: Box<dyn OverlayRenderer>,
    permissions: Box<dyn PermissionProvider>,
    consumer: Box<dyn CaptureConsumer>,
    observer: Box<dyn SessionObserver>,
    resolver: ScreenCaptureResolver,
    tracker: MouseTracker,
    layout: ScreenLayout,
    reconciler: CoordinateReconciler,
    machine: StateMachine,
    interception: Interception,
    command_tx: Sender<SessionCommand>,
    command_rx: Receiver<SessionCommand>,
    session: Option<ActiveSession>,
}

impl CaptureCoordinator {
    pub fn new(platform: Platform, config: SessionConfig) -> Self {
        let layout = ScreenLayout::from_provider(platform.displays.as_ref());
        let reconciler = CoordinateReconciler::new(&layout);
        let helpers = platform.renderer.helper_windows();

        let mut locator = ElementLocator::new(
            platform.accessibility,
            platform.windows,
            config.locator.clone(),
        )
        .with_own_pid(config.own_pid);
        locator.set_helper_windows(helpers.clone());

        let mut resolver = ScreenCaptureResolver::new(platform.capturer, config.resolver.clone());
        resolver.set_helper_windows(helpers);

        let (command_tx, command_rx) = unbounded();

        Self {
            tracker: MouseTracker::new(locator),
            interception: Interception::new(config.max_tap_restarts),
            displays: platform.displays,
            cursor: platform.cursor,
            interceptor: platform.interceptor,
            renderer: platform.renderer,
            permissions: platform.permissions,
            consumer: platform.consumer,
            observer: platform.observer,
            resolver,
            layout,
            reconciler,
            machine: StateMachine::new(),
            command_tx,
            command_rx,
            session: None,
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Sender for commands from outside the main loop
    pub fn commands(&self) -> Sender<SessionCommand> {
        self.command_tx.clone()
    }

    pub fn state(&self) -> SessionState {
        self.machine.state()
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.session.as_ref().map(|s| s.id)
    }

    pub fn mode(&self) -> Option<CaptureMode> {
        self.session.as_ref().map(|s| s.mode)
    }

    pub fn layout(&self) -> &ScreenLayout {
        &self.layout
    }

    /// Element currently highlighted, if any
    pub fn current_frame(&self) -> Option<&DetectedFrame> {
        self.tracker.current()
    }

    /// Start a session, replacing any active one.
    ///
    /// Window and fullscreen modes capture before this returns.
    pub fn start(&mut self, mode: CaptureMode) -> SessionResult<()> {
        if let Some(previous) = &self.session {
            log::info!("Session {} replaced by a new {mode:?} session", previous.id);
            self.teardown(EndReason::Cancelled);
        }

        if !self.permissions.is_screen_recording_granted()
            && !self.permissions.request_screen_recording()
        {
            return Err(self.refuse(PermissionKind::ScreenRecording));
        }
        if !self.permissions.is_accessibility_granted() {
            return Err(self.refuse(PermissionKind::Accessibility));
        }

        self.refresh_layout();

        self.machine.start(mode);
        let id = Uuid::new_v4();
        self.session = Some(ActiveSession {
            id,
            mode,
            selection: AreaSelection::new(),
            crosshair: false,
        });
        log::info!("Session {id} started ({mode:?})");
        self.emit(SessionEvent::SessionStarted(mode));

        match mode {
            CaptureMode::Element | CaptureMode::Area => self.enter_interactive(mode),
            CaptureMode::Window => {
                self.capture_window_under_cursor();
                Ok(())
            }
            CaptureMode::Fullscreen => {
                self.capture_screen_under_cursor();
                Ok(())
            }
        }
    }

    /// Cancel the active session, if any
    pub fn stop(&mut self) {
        if self.session.is_some() {
            self.teardown(EndReason::Cancelled);
        }
    }

    /// One polling step: hover tracking, rubber band, tap supervision
    pub fn tick(&mut self) -> Option<TickReport> {
        match self.machine.state() {
            SessionState::ElementHover => {
                self.supervise_tap();
                if self.machine.state() != SessionState::ElementHover {
                    return None;
                }

                let report = self.tracker.tick(
                    self.cursor.as_ref(),
                    &self.layout,
                    &self.reconciler,
                    self.renderer.as_mut(),
                );
                if let Some(change) = &report.change {
                    self.interception.gate().set_frame_valid(change.is_some());
                    match change {
                        Some(frame) => log::debug!(
                            "Element {:?} on {} ({:?})",
                            frame.rect,
                            frame.screen,
                            frame.source
                        ),
                        None => log::debug!("No element under cursor"),
                    }
                    self.emit(SessionEvent::ElementChanged(change.clone()));
                }
                Some(report)
            }
            SessionState::AreaSelecting => {
                self.supervise_tap();
                let dragging = self.session.as_ref().map_or(false, |s| s.selection.is_dragging());
                if dragging {
                    let point = self.cursor.location();
                    self.drag_to(point);
                }
                None
            }
            _ => None,
        }
    }

    /// Handle every queued command; returns how many were handled
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(command) = self.command_rx.try_recv() {
            self.handle_command(command);
            handled += 1;
        }
        handled
    }

    /// Block until the current session ends, ticking at the poll interval
    pub fn run(&mut self) {
        let ticker = tick(self.config.poll_interval);
        let commands = self.command_rx.clone();

        while self.is_active() {
            select! {
                recv(ticker) -> _ => {
                    self.tick();
                }
                recv(commands) -> command => {
                    if let Ok(command) = command {
                        self.handle_command(command);
                    }
                }
            }
        }
    }

    pub fn handle_command(&mut self, command: SessionCommand) {
        if self.session.is_none() {
            log::debug!("Ignoring {command:?} with no active session");
            return;
        }

        match command {
            SessionCommand::Confirm => self.confirm(),
            SessionCommand::Cancel => {
                if self.machine.state().is_interactive() {
                    self.teardown(EndReason::Cancelled);
                }
            }
            SessionCommand::TapDisabled => self.supervise_tap(),
            SessionCommand::DragStart(point) => self.drag_start(point),
            SessionCommand::DragMove(point) => self.drag_to(point),
            SessionCommand::DragEnd(point) => self.drag_end(point),
            SessionCommand::DisplaysChanged => self.on_display_configuration_changed(),
        }
    }

    /// Re-read displays and drop everything derived from the old layout
    pub fn on_display_configuration_changed(&mut self) {
        log::info!("Display configuration changed");
        self.refresh_layout();
        self.tracker.reset();
        self.interception.gate().set_frame_valid(false);
        if let Some(session) = self.session.as_mut() {
            session.selection.clear();
        }
        self.renderer.hide();
    }

    fn refresh_layout(&mut self) {
        self.layout = ScreenLayout::from_provider(self.displays.as_ref());
        self.reconciler.resync(&self.layout);
        log::debug!(
            "{} screen(s), main display {:?}, reference top {:?}",
            self.layout.screens().len(),
            self.layout.main_display_id(),
            self.reconciler.reference_top_y()
        );
    }

    fn refuse(&mut self, kind: PermissionKind) -> SessionError {
        log::error!("Cannot start session: {kind} permission not granted");
        self.emit(SessionEvent::SessionEnded(EndReason::PermissionDenied));
        SessionError::Capture(CaptureError::PermissionDenied(kind))
    }

    fn enter_interactive(&mut self, mode: CaptureMode) -> SessionResult<()> {
        let installed = self
            .interception
            .install(self.interceptor.as_mut(), self.command_tx.clone());
        if let Err(e) = installed {
            log::error!("Input interception unavailable: {e}");
            self.teardown(EndReason::Failed);
            return Err(e.into());
        }

        let gate = self.interception.gate();
        gate.set_element_hover(mode == CaptureMode::Element);
        gate.set_area_selecting(mode == CaptureMode::Area);

        self.tracker.reset();
        self.renderer.set_crosshair_cursor(true);
        if let Some(session) = self.session.as_mut() {
            session.crosshair = true;
        }
        Ok(())
    }

    /// End the session on lost permissions, otherwise keep the tap alive
    fn supervise_tap(&mut self) {
        let accessibility = self.permissions.is_accessibility_granted();
        let screen_recording = self.permissions.is_screen_recording_granted();
        if !accessibility || !screen_recording {
            let kind = if accessibility {
                PermissionKind::ScreenRecording
            } else {
                PermissionKind::Accessibility
            };
            log::error!("{kind} permission revoked during the session");
            self.teardown(EndReason::PermissionDenied);
            return;
        }

        match self.interception.supervise(self.interceptor.as_mut(), accessibility) {
            WatchdogVerdict::Healthy | WatchdogVerdict::Resumed => {}
            WatchdogVerdict::Revoked => self.teardown(EndReason::PermissionDenied),
            WatchdogVerdict::Exhausted => self.teardown(EndReason::Cancelled),
        }
    }

    fn confirm(&mut self) {
        if self.machine.state() != SessionState::ElementHover {
            return;
        }
        match self.tracker.current().cloned() {
            Some(frame) => self.capture(frame.rect, frame.screen, CaptureMode::Element),
            None => log::debug!("Click with no element under cursor"),
        }
    }

    fn drag_start(&mut self, point: Point) {
        if self.machine.state() != SessionState::AreaSelecting {
            return;
        }
        let Some(screen) = self.layout.screen_containing(point) else {
            log::debug!("Drag started off every screen at {point:?}");
            return;
        };
        if let Some(session) = self.session.as_mut() {
            session.selection.begin(point, screen);
        }
    }

    fn drag_to(&mut self, point: Point) {
        if self.machine.state() != SessionState::AreaSelecting {
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let (Some(rect), Some(screen)) =
            (session.selection.update(point), session.selection.screen())
        else {
            return;
        };
        if let Some(geometry) = self.geometry(rect, screen) {
            self.renderer.show_selection(&geometry);
        }
    }

    fn drag_end(&mut self, point: Point) {
        if self.machine.state() != SessionState::AreaSelecting {
            return;
        }
        let min = self.config.min_selection_size;
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if !session.selection.is_dragging() {
            return;
        }

        match session.selection.release(point, min) {
            Some((rect, screen)) => self.capture(rect, screen, CaptureMode::Area),
            None => {
                log::info!("Selection not larger than {min} on both sides, cancelling");
                self.teardown(EndReason::Cancelled);
            }
        }
    }

    fn capture_window_under_cursor(&mut self) {
        let point = self.cursor.location();
        let frame = self
            .layout
            .screen_containing(point)
            .and_then(|screen| self.tracker.locator().window_at(point, screen, &self.reconciler));

        match frame {
            Some(frame) => self.capture(frame.rect, frame.screen, CaptureMode::Window),
            None => self.fail_before_capture(CaptureError::NoElement),
        }
    }

    fn capture_screen_under_cursor(&mut self) {
        let point = self.cursor.location();
        match self.layout.screen_containing(point).map(|s| (s.frame, s.id)) {
            Some((frame, id)) => self.capture(frame, id, CaptureMode::Fullscreen),
            None => self.fail_before_capture(CaptureError::NoDisplayAtCursor),
        }
    }

    /// Entry-time capture modes that found nothing to capture
    fn fail_before_capture(&mut self, error: CaptureError) {
        log::warn!("Nothing to capture: {error}");
        self.machine.begin_capture();
        self.complete(Err(error));
    }

    fn capture(&mut self, rect: Rect, screen: ScreenId, mode: CaptureMode) {
        if !self.machine.begin_capture() {
            return;
        }
        // No more swallowing while the call is in flight
        self.interception.gate().close();

        let request = CaptureRequest::new(rect, screen, mode);
        let result = self.resolver.capture(&request, &self.layout);

        if result.is_ok() {
            if let Some(geometry) = self.geometry(rect, screen) {
                self.renderer.flash(&geometry);
            }
        }
        self.complete(result);
    }

    fn complete(&mut self, result: capture::CaptureResult<capture::CapturedImage>) {
        let reason = match &result {
            Ok(_) => EndReason::Completed,
            Err(CaptureError::PermissionDenied(_)) => EndReason::PermissionDenied,
            Err(_) => EndReason::Failed,
        };
        match &result {
            Err(e) if e.is_fatal() => log::warn!("Capture failed: {e}"),
            Err(e) => log::debug!("Nothing captured: {e}"),
            Ok(_) => {}
        }

        let summary = result.as_ref().map(CaptureSummary::from).map_err(Clone::clone);
        self.emit(SessionEvent::CaptureCompleted(summary));
        self.consumer.deliver(result);
        self.machine.finish_capture();
        self.teardown(reason);
    }

    fn geometry(&self, local: Rect, screen: ScreenId) -> Option<HighlightGeometry> {
        let global = self.reconciler.to_global_rect(local)?;
        Some(HighlightGeometry { screen, local, global })
    }

    /// Release everything the session holds. No-op without a session.
    fn teardown(&mut self, reason: EndReason) {
        let Some(session) = self.session.take() else {
            return;
        };

        self.interception.teardown(self.interceptor.as_mut());
        if session.crosshair {
            self.renderer.set_crosshair_cursor(false);
        }
        self.renderer.hide();
        self.tracker.reset();

        // Commands from the old session must not leak into the next one
        while self.command_rx.try_recv().is_ok() {}

        if self.machine.state().is_interactive() {
            self.machine.cancel();
        }
        self.machine.reset();

        log::info!("Session {} ended ({reason:?})", session.id);
        self.emit(SessionEvent::SessionEnded(reason));
    }

    fn emit(&mut self, event: SessionEvent) {
        self.observer.on_event(&event);
    }
}

impl Drop for CaptureCoordinator {
    fn drop(&mut self) {
        self.teardown(EndReason::Cancelled);
    }
}
