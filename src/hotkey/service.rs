//! Hotkey service: key event source + double-press detection
//!
//! Bridges the global key stream to the detector. The detector runs on
//! the source's callback thread; only a detected gesture crosses over to
//! the async side, as a message on an mpsc channel.

use std::sync::Mutex;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::detector::DoublePressDetector;
use super::keys::KeyEvent;
use super::source::{HotkeyError, KeyEventCallback, KeyEventSource};
use crate::config::HotkeyConfig;

/// Events sent from the hotkey thread to the capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyEvent {
    /// The trigger key was double-pressed
    DoublePress,
}

/// Global double-press hotkey
pub struct HotKeyService<S: KeyEventSource> {
    source: S,
    config: HotkeyConfig,
    event_tx: mpsc::Sender<HotkeyEvent>,
    handle: Option<S::Handle>,
}

impl<S: KeyEventSource> HotKeyService<S> {
    pub fn new(source: S, config: HotkeyConfig, event_tx: mpsc::Sender<HotkeyEvent>) -> Self {
        Self {
            source,
            config,
            event_tx,
            handle: None,
        }
    }

    /// Register with the key event source.
    ///
    /// A failed registration leaves the service stopped; the caller
    /// decides whether to carry on without the hotkey. No automatic
    /// retry is attempted.
    pub fn start(&mut self) -> Result<(), HotkeyError> {
        if self.handle.is_some() {
            return Err(HotkeyError::AlreadyRunning);
        }

        let on_event = gesture_callback(
            DoublePressDetector::new(self.config.trigger_key_code, self.config.threshold),
            self.event_tx.clone(),
        );

        self.handle = Some(self.source.start(on_event)?);
        info!(
            trigger_key_code = self.config.trigger_key_code,
            threshold_ms = self.config.threshold.as_millis() as u64,
            "hotkey service started"
        );
        Ok(())
    }

    /// Unregister from the key event source. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.source.stop(handle);
            info!("hotkey service stopped");
        }
    }

    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }
}

impl<S: KeyEventSource> Drop for HotKeyService<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Build the per-event callback run on the source thread
fn gesture_callback(
    detector: DoublePressDetector,
    event_tx: mpsc::Sender<HotkeyEvent>,
) -> KeyEventCallback {
    // Only ever locked from the source thread
    let detector = Mutex::new(detector);

    Box::new(move |event: KeyEvent| {
        let fired = match detector.lock() {
            Ok(mut detector) => detector.register(event.code, event.is_repeat),
            Err(_) => false,
        };

        if fired {
            debug!(code = event.code, "double press detected");
            // Never block the OS callback thread
            if let Err(e) = event_tx.try_send(HotkeyEvent::DoublePress) {
                warn!(%e, "dropping hotkey gesture");
            }
        }
    })
}
