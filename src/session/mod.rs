//! Capture session: the single task owning presentation-visible state

mod capture;

pub use capture::{CaptureSession, SessionCommand, SessionHandle, SessionSnapshot};
