//! Capture mode state machine

use capture::CaptureMode;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session
    Idle,
    /// Hovering UI elements, waiting for a click
    ElementHover,
    /// Dragging out a rectangle
    AreaSelecting,
    /// Window under the cursor, captured on entry
    WindowPick,
    /// Screen under the cursor, captured on entry
    FullscreenPending,
    /// Capture call in flight
    Capturing,
    /// Interactive state left without a capture
    Cancelled,
}

impl SessionState {
    /// Entry state for a capture mode
    pub fn for_mode(mode: CaptureMode) -> Self {
        match mode {
            CaptureMode::Element => SessionState::ElementHover,
            CaptureMode::Area => SessionState::AreaSelecting,
            CaptureMode::Window => SessionState::WindowPick,
            CaptureMode::Fullscreen => SessionState::FullscreenPending,
        }
    }

    /// States that wait on the user (or are about to capture)
    pub fn is_interactive(&self) -> bool {
        matches!(
            self,
            SessionState::ElementHover
                | SessionState::AreaSelecting
                | SessionState::WindowPick
                | SessionState::FullscreenPending
        )
    }

    pub fn display_text(&self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::ElementHover => "Pick an element...",
            SessionState::AreaSelecting => "Drag to select...",
            SessionState::WindowPick => "Picking window",
            SessionState::FullscreenPending => "Capturing screen",
            SessionState::Capturing => "Capturing...",
            SessionState::Cancelled => "Cancelled",
        }
    }
}

/// State machine transitions
#[derive(Debug)]
pub struct StateMachine {
    state: SessionState,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Leave Idle for the mode's entry state
    pub fn start(&mut self, mode: CaptureMode) -> bool {
        if matches!(self.state, SessionState::Idle) {
            self.state = SessionState::for_mode(mode);
            true
        } else {
            false
        }
    }

    /// Interactive state -> Capturing
    pub fn begin_capture(&mut self) -> bool {
        if self.state.is_interactive() {
            self.state = SessionState::Capturing;
            true
        } else {
            false
        }
    }

    /// Interactive state -> Cancelled
    pub fn cancel(&mut self) -> bool {
        if self.state.is_interactive() {
            self.state = SessionState::Cancelled;
            true
        } else {
            false
        }
    }

    /// Capturing -> Idle, whatever the outcome
    pub fn finish_capture(&mut self) -> bool {
        if matches!(self.state, SessionState::Capturing) {
            self.state = SessionState::Idle;
            true
        } else {
            false
        }
    }

    /// Reset to idle
    pub fn reset(&mut self) {
        self.state = SessionState::Idle;
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}
