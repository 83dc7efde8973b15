//! Hotkey module for global keyboard event listening
//!
//! Watches the system-wide key stream for a double press of the
//! configured trigger key and hands each gesture to the capture session.

mod detector;
mod keys;
mod service;
mod source;

pub use detector::DEFAULT_THRESHOLD_MS;
pub use keys::{codes, key_code_from_name};
pub use service::{HotKeyService, HotkeyEvent};
pub use source::EventTapSource;

#[cfg(test)]
pub use keys::KeyEvent;
#[cfg(test)]
pub use source::{HotkeyError, KeyEventCallback, KeyEventSource};
