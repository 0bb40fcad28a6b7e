//! Session events, commands and collaborator seams

use capture::{CaptureError, CaptureMode, CaptureResult, CapturedImage, Point, ScreenId};
use overlay::{DetectedFrame, InterceptCommand};

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    Completed,
    Cancelled,
    PermissionDenied,
    /// Capture failed for a non-permission reason
    Failed,
}

/// What was captured, without the pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSummary {
    pub screen: ScreenId,
    pub width: u32,
    pub height: u32,
}

impl From<&CapturedImage> for CaptureSummary {
    fn from(image: &CapturedImage) -> Self {
        Self {
            screen: image.screen,
            width: image.width,
            height: image.height,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    SessionStarted(CaptureMode),
    ElementChanged(Option<DetectedFrame>),
    CaptureCompleted(Result<CaptureSummary, CaptureError>),
    SessionEnded(EndReason),
}

/// Work for the session's own loop
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionCommand {
    /// Capture the hovered element
    Confirm,
    Cancel,
    /// The platform switched the input tap off
    TapDisabled,
    /// Area drag in the local basis
    DragStart(Point),
    DragMove(Point),
    DragEnd(Point),
    /// Displays were added, removed or rearranged
    DisplaysChanged,
}

impl From<InterceptCommand> for SessionCommand {
    fn from(command: InterceptCommand) -> Self {
        match command {
            InterceptCommand::Confirm => SessionCommand::Confirm,
            InterceptCommand::Escape => SessionCommand::Cancel,
            InterceptCommand::TapDisabled => SessionCommand::TapDisabled,
            InterceptCommand::DragStart(p) => SessionCommand::DragStart(p),
            InterceptCommand::DragEnd(p) => SessionCommand::DragEnd(p),
        }
    }
}

/// OS permission state; prompting is the implementor's business
pub trait PermissionProvider {
    fn is_accessibility_granted(&self) -> bool;
    fn is_screen_recording_granted(&self) -> bool;
    /// Ask for screen recording access; returns whether it is now granted
    fn request_screen_recording(&self) -> bool;
}

/// Platforms without capture permissions
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysGranted;

impl PermissionProvider for AlwaysGranted {
    fn is_accessibility_granted(&self) -> bool {
        true
    }

    fn is_screen_recording_granted(&self) -> bool {
        true
    }

    fn request_screen_recording(&self) -> bool {
        true
    }
}

/// Takes ownership of a finished capture
pub trait CaptureConsumer {
    fn deliver(&mut self, result: CaptureResult<CapturedImage>);
}

pub trait SessionObserver {
    fn on_event(&mut self, event: &SessionEvent);
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoObserver;

impl SessionObserver for NoObserver {
    fn on_event(&mut self, _event: &SessionEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_maps_to_cancel() {
        assert_eq!(SessionCommand::from(InterceptCommand::Escape), SessionCommand::Cancel);
        assert_eq!(
            SessionCommand::from(InterceptCommand::DragEnd(Point::new(3.0, 4.0))),
            SessionCommand::DragEnd(Point::new(3.0, 4.0))
        );
    }

    #[test]
    fn summary_drops_pixels() {
        let image = CapturedImage {
            data: vec![0; 4 * 6],
            width: 3,
            height: 2,
            screen: ScreenId(9),
        };
        assert_eq!(
            CaptureSummary::from(&image),
            CaptureSummary {
                screen: ScreenId(9),
                width: 3,
                height: 2
            }
        );
    }
}
