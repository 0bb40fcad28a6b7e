//! Capture sessions for Pinpoint
//!
//! `CaptureCoordinator` drives one capture session at a time across the
//! element, area, window and fullscreen modes, on top of the `capture` and
//! `overlay` crates.

pub mod config;
pub mod coordinator;
pub mod events;
pub mod state;

pub use config::SessionConfig;
pub use coordinator::{CaptureCoordinator, Platform};
pub use events::{
    AlwaysGranted, CaptureConsumer, CaptureSummary, EndReason, NoObserver, PermissionProvider,
    SessionCommand, SessionEvent, SessionObserver,
};
pub use state::{SessionState, StateMachine};

use capture::CaptureError;
use overlay::OverlayError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Overlay(#[from] OverlayError),
}

impl SessionError {
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, SessionError::Capture(CaptureError::PermissionDenied(_)))
    }
}

pub type SessionResult<T> = Result<T, SessionError>;
