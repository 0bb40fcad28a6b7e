//! Global input interception during an interactive session
//!
//! Platform callbacks run outside the normal event flow. They only read the
//! lock-free `InterceptionGate` to decide whether to swallow an event, then
//! forward a command over a channel; the session consumes it on its own loop.

use crate::{OverlayError, OverlayResult};
use capture::Point;
use crossbeam_channel::Sender;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Other,
}

/// Platform-neutral key identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Escape,
    Return,
    Other(u32),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    /// `location` is in the local basis
    MouseDown { button: MouseButton, location: Point },
    MouseUp { button: MouseButton, location: Point },
    KeyDown(Key),
    /// The platform switched the tap off (responsiveness timeout)
    TapDisabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Swallow,
    PassThrough,
}

/// What an intercepted event asks the session to do
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InterceptCommand {
    Confirm,
    Escape,
    TapDisabled,
    /// Area drag, local basis
    DragStart(Point),
    DragEnd(Point),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorScope {
    /// Events delivered to our own windows
    Local,
    /// Events delivered to other applications
    Global,
}

pub type TapCallback = Box<dyn Fn(&InputEvent) -> Disposition + Send + Sync>;
pub type MonitorCallback = Box<dyn Fn(&InputEvent) + Send + Sync>;

/// Platform event tap and monitors
pub trait InputInterceptor {
    /// Install the primary tap, which may swallow events
    fn install_tap(&mut self, callback: TapCallback) -> OverlayResult<SubscriptionId>;

    /// Install an observe-only monitor
    fn install_monitor(
        &mut self,
        scope: MonitorScope,
        callback: MonitorCallback,
    ) -> OverlayResult<SubscriptionId>;

    fn is_tap_enabled(&self, id: SubscriptionId) -> bool;

    fn enable_tap(&mut self, id: SubscriptionId) -> OverlayResult<()>;

    fn remove(&mut self, id: SubscriptionId);
}

/// Shared decision state read by interception callbacks
#[derive(Debug, Default)]
pub struct InterceptionGate {
    interactive: AtomicBool,
    element_hover: AtomicBool,
    area_selecting: AtomicBool,
    frame_valid: AtomicBool,
}

impl InterceptionGate {
    pub fn set_interactive(&self, on: bool) {
        self.interactive.store(on, Ordering::SeqCst);
    }

    pub fn set_element_hover(&self, on: bool) {
        self.element_hover.store(on, Ordering::SeqCst);
    }

    pub fn set_area_selecting(&self, on: bool) {
        self.area_selecting.store(on, Ordering::SeqCst);
    }

    pub fn set_frame_valid(&self, valid: bool) {
        self.frame_valid.store(valid, Ordering::SeqCst);
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive.load(Ordering::SeqCst)
    }

    /// Clear everything; nothing is intercepted afterwards
    pub fn close(&self) {
        self.set_interactive(false);
        self.set_element_hover(false);
        self.set_area_selecting(false);
        self.set_frame_valid(false);
    }

    /// Primary tap contract
    pub fn decide(&self, event: &InputEvent) -> (Disposition, Option<InterceptCommand>) {
        if let InputEvent::TapDisabled = event {
            return (Disposition::PassThrough, Some(InterceptCommand::TapDisabled));
        }
        if !self.is_interactive() {
            return (Disposition::PassThrough, None);
        }

        match event {
            InputEvent::MouseDown {
                button: MouseButton::Left,
                ..
            } if self.element_hover.load(Ordering::SeqCst)
                && self.frame_valid.load(Ordering::SeqCst) =>
            {
                (Disposition::Swallow, Some(InterceptCommand::Confirm))
            }
            InputEvent::MouseDown {
                button: MouseButton::Left,
                location,
            } if self.area_selecting.load(Ordering::SeqCst) => {
                (Disposition::Swallow, Some(InterceptCommand::DragStart(*location)))
            }
            InputEvent::MouseUp {
                button: MouseButton::Left,
                location,
            } if self.area_selecting.load(Ordering::SeqCst) => {
                (Disposition::Swallow, Some(InterceptCommand::DragEnd(*location)))
            }
            InputEvent::KeyDown(Key::Escape) => {
                (Disposition::Swallow, Some(InterceptCommand::Escape))
            }
            _ => (Disposition::PassThrough, None),
        }
    }

    /// Monitor contract: Escape only
    pub fn observe(&self, event: &InputEvent) -> Option<InterceptCommand> {
        match event {
            InputEvent::KeyDown(Key::Escape) if self.is_interactive() => {
                Some(InterceptCommand::Escape)
            }
            _ => None,
        }
    }
}

/// Result of a watchdog check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogVerdict {
    /// Tap is running (or none is installed)
    Healthy,
    /// Tap was off and has been switched back on
    Resumed,
    /// Permission is gone; the session must end
    Revoked,
    /// Restart budget spent; the session must end
    Exhausted,
}

#[derive(Debug, Default)]
struct InterceptionHandles {
    tap: Option<SubscriptionId>,
    monitors: Vec<SubscriptionId>,
    restarts: u32,
}

/// Owns every interception subscription of one session
#[derive(Debug)]
pub struct Interception {
    gate: Arc<InterceptionGate>,
    handles: Option<InterceptionHandles>,
    max_restarts: u32,
}

impl Interception {
    pub fn new(max_restarts: u32) -> Self {
        Self {
            gate: Arc::new(InterceptionGate::default()),
            handles: None,
            max_restarts,
        }
    }

    pub fn gate(&self) -> &Arc<InterceptionGate> {
        &self.gate
    }

    /// Install the primary tap plus local and global Escape monitors.
    ///
    /// Commands are sent on `commands`. A failing monitor is logged and
    /// skipped; a failing tap is an error and leaves nothing installed.
    pub fn install<C>(
        &mut self,
        interceptor: &mut dyn InputInterceptor,
        commands: Sender<C>,
    ) -> OverlayResult<()>
    where
        C: From<InterceptCommand> + Send + 'static,
    {
        self.teardown(interceptor);

        let gate = Arc::clone(&self.gate);
        let tx = commands.clone();
        let tap = interceptor.install_tap(Box::new(move |event| {
            let (disposition, command) = gate.decide(event);
            if let Some(command) = command {
                let _ = tx.send(C::from(command));
            }
            disposition
        }))?;

        let mut handles = InterceptionHandles {
            tap: Some(tap),
            ..Default::default()
        };

        for scope in [MonitorScope::Local, MonitorScope::Global] {
            let gate = Arc::clone(&self.gate);
            let tx = commands.clone();
            let installed = interceptor.install_monitor(
                scope,
                Box::new(move |event| {
                    if let Some(command) = gate.observe(event) {
                        let _ = tx.send(C::from(command));
                    }
                }),
            );
            match installed {
                Ok(id) => handles.monitors.push(id),
                Err(e) => log::warn!("{scope:?} escape monitor unavailable: {e}"),
            }
        }

        self.gate.set_interactive(true);
        self.handles = Some(handles);
        Ok(())
    }

    /// Release every subscription. Safe to call repeatedly.
    pub fn teardown(&mut self, interceptor: &mut dyn InputInterceptor) {
        self.gate.close();
        if let Some(handles) = self.handles.take() {
            for id in handles.tap.into_iter().chain(handles.monitors) {
                interceptor.remove(id);
            }
            log::debug!("Interception released");
        }
    }

    /// Re-enable a tap the platform switched off, if still permitted
    pub fn supervise(
        &mut self,
        interceptor: &mut dyn InputInterceptor,
        permission_granted: bool,
    ) -> WatchdogVerdict {
        let Some(handles) = self.handles.as_mut() else {
            return WatchdogVerdict::Healthy;
        };
        let Some(tap) = handles.tap else {
            return WatchdogVerdict::Healthy;
        };
        if interceptor.is_tap_enabled(tap) {
            return WatchdogVerdict::Healthy;
        }
        if !permission_granted {
            log::error!("Input tap disabled and accessibility permission revoked");
            return WatchdogVerdict::Revoked;
        }
        if handles.restarts >= self.max_restarts {
            log::warn!("Input tap disabled again after {} restart(s), giving up", handles.restarts);
            return WatchdogVerdict::Exhausted;
        }

        match interceptor.enable_tap(tap) {
            Ok(()) => {
                handles.restarts += 1;
                log::warn!("Input tap re-enabled ({}/{})", handles.restarts, self.max_restarts);
                WatchdogVerdict::Resumed
            }
            Err(e) => {
                log::warn!("Input tap could not be re-enabled: {e}");
                WatchdogVerdict::Exhausted
            }
        }
    }
}

/// In-memory interceptor for tests and headless hosts
#[derive(Default)]
pub struct ManualInterceptor {
    next_id: u64,
    taps: Vec<(SubscriptionId, TapCallback, bool)>,
    monitors: Vec<(SubscriptionId, MonitorScope, MonitorCallback)>,
    fail_monitors: bool,
}

impl ManualInterceptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make monitor installation fail
    pub fn failing_monitors(mut self) -> Self {
        self.fail_monitors = true;
        self
    }

    /// Deliver an event as the OS would: tap first, then monitors
    pub fn deliver(&self, event: InputEvent) -> Disposition {
        let mut disposition = Disposition::PassThrough;
        for (_, callback, enabled) in &self.taps {
            if *enabled || event == InputEvent::TapDisabled {
                if callback(&event) == Disposition::Swallow {
                    disposition = Disposition::Swallow;
                }
            }
        }
        for (_, _, callback) in &self.monitors {
            callback(&event);
        }
        disposition
    }

    /// Simulate the platform disabling every tap
    pub fn disable_taps(&mut self) {
        for (_, _, enabled) in &mut self.taps {
            *enabled = false;
        }
        self.deliver(InputEvent::TapDisabled);
    }

    pub fn subscription_count(&self) -> usize {
        self.taps.len() + self.monitors.len()
    }

    fn next(&mut self) -> SubscriptionId {
        self.next_id += 1;
        SubscriptionId(self.next_id)
    }
}

impl InputInterceptor for ManualInterceptor {
    fn install_tap(&mut self, callback: TapCallback) -> OverlayResult<SubscriptionId> {
        let id = self.next();
        self.taps.push((id, callback, true));
        Ok(id)
    }

    fn install_monitor(
        &mut self,
        scope: MonitorScope,
        callback: MonitorCallback,
    ) -> OverlayResult<SubscriptionId> {
        if self.fail_monitors {
            return Err(OverlayError::InterceptionUnavailable(format!("{scope:?} monitor")));
        }
        let id = self.next();
        self.monitors.push((id, scope, callback));
        Ok(id)
    }

    fn is_tap_enabled(&self, id: SubscriptionId) -> bool {
        self.taps.iter().any(|(t, _, enabled)| *t == id && *enabled)
    }

    fn enable_tap(&mut self, id: SubscriptionId) -> OverlayResult<()> {
        let tap = self
            .taps
            .iter_mut()
            .find(|(t, _, _)| *t == id)
            .ok_or(OverlayError::UnknownSubscription(id))?;
        tap.2 = true;
        Ok(())
    }

    fn remove(&mut self, id: SubscriptionId) {
        self.taps.retain(|(t, _, _)| *t != id);
        self.monitors.retain(|(m, _, _)| *m != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    fn left_click() -> InputEvent {
        InputEvent::MouseDown {
            button: MouseButton::Left,
            location: Point::new(10.0, 10.0),
        }
    }

    #[test]
    fn click_swallowed_only_with_valid_frame_in_hover() {
        let gate = InterceptionGate::default();
        gate.set_interactive(true);
        assert_eq!(gate.decide(&left_click()), (Disposition::PassThrough, None));

        gate.set_element_hover(true);
        assert_eq!(gate.decide(&left_click()), (Disposition::PassThrough, None));

        gate.set_frame_valid(true);
        assert_eq!(
            gate.decide(&left_click()),
            (Disposition::Swallow, Some(InterceptCommand::Confirm))
        );

        let right = InputEvent::MouseDown {
            button: MouseButton::Right,
            location: Point::new(10.0, 10.0),
        };
        assert_eq!(gate.decide(&right), (Disposition::PassThrough, None));
    }

    #[test]
    fn escape_swallowed_in_any_interactive_state() {
        let gate = InterceptionGate::default();
        assert_eq!(gate.decide(&InputEvent::KeyDown(Key::Escape)).0, Disposition::PassThrough);

        gate.set_interactive(true);
        assert_eq!(
            gate.decide(&InputEvent::KeyDown(Key::Escape)),
            (Disposition::Swallow, Some(InterceptCommand::Escape))
        );
        assert_eq!(gate.decide(&InputEvent::KeyDown(Key::Return)).0, Disposition::PassThrough);
    }

    #[test]
    fn area_drag_is_claimed_only_while_selecting() {
        let gate = InterceptionGate::default();
        gate.set_interactive(true);
        let up = InputEvent::MouseUp {
            button: MouseButton::Left,
            location: Point::new(40.0, 50.0),
        };
        assert_eq!(gate.decide(&up), (Disposition::PassThrough, None));

        gate.set_area_selecting(true);
        assert_eq!(
            gate.decide(&left_click()),
            (Disposition::Swallow, Some(InterceptCommand::DragStart(Point::new(10.0, 10.0))))
        );
        assert_eq!(
            gate.decide(&up),
            (Disposition::Swallow, Some(InterceptCommand::DragEnd(Point::new(40.0, 50.0))))
        );

        gate.close();
        assert_eq!(gate.decide(&up), (Disposition::PassThrough, None));
    }

    #[test]
    fn escape_reaches_session_through_monitors_when_tap_is_off() {
        let mut platform = ManualInterceptor::new();
        let mut interception = Interception::new(3);
        let (tx, rx) = unbounded::<InterceptCommand>();
        interception.install(&mut platform, tx).unwrap();

        platform.disable_taps();
        assert_eq!(rx.try_recv(), Ok(InterceptCommand::TapDisabled));

        platform.deliver(InputEvent::KeyDown(Key::Escape));
        // Local and global monitors both report it
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![InterceptCommand::Escape; 2]);
    }

    #[test]
    fn teardown_releases_everything_and_is_idempotent() {
        let mut platform = ManualInterceptor::new();
        let mut interception = Interception::new(3);
        let (tx, _rx) = unbounded::<InterceptCommand>();
        interception.install(&mut platform, tx).unwrap();
        assert_eq!(platform.subscription_count(), 3);

        interception.teardown(&mut platform);
        interception.teardown(&mut platform);
        assert_eq!(platform.subscription_count(), 0);
        assert!(!interception.gate().is_interactive());
    }

    #[test]
    fn monitor_failure_is_not_fatal() {
        let mut platform = ManualInterceptor::new().failing_monitors();
        let mut interception = Interception::new(3);
        let (tx, _rx) = unbounded::<InterceptCommand>();
        assert!(interception.install(&mut platform, tx).is_ok());
        assert_eq!(platform.subscription_count(), 1);
    }

    #[test]
    fn watchdog_resumes_then_gives_up() {
        let mut platform = ManualInterceptor::new();
        let mut interception = Interception::new(1);
        let (tx, _rx) = unbounded::<InterceptCommand>();
        interception.install(&mut platform, tx).unwrap();

        assert_eq!(interception.supervise(&mut platform, true), WatchdogVerdict::Healthy);

        platform.disable_taps();
        assert_eq!(interception.supervise(&mut platform, true), WatchdogVerdict::Resumed);
        assert_eq!(interception.supervise(&mut platform, true), WatchdogVerdict::Healthy);

        platform.disable_taps();
        assert_eq!(interception.supervise(&mut platform, true), WatchdogVerdict::Exhausted);
    }

    #[test]
    fn watchdog_reports_revoked_permission() {
        let mut platform = ManualInterceptor::new();
        let mut interception = Interception::new(3);
        let (tx, _rx) = unbounded::<InterceptCommand>();
        interception.install(&mut platform, tx).unwrap();

        platform.disable_taps();
        assert_eq!(interception.supervise(&mut platform, false), WatchdogVerdict::Revoked);
    }
}
