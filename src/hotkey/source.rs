//! Global key event sources
//!
//! A source subscribes to the OS-wide keyboard stream and forwards every
//! key-down as a [`KeyEvent`]. On macOS this is a listen-only CGEventTap
//! running on a dedicated thread with its own CFRunLoop; the tap never
//! consumes events, so other applications keep seeing every key.

use super::keys::KeyEvent;

/// Callback invoked on the source's thread for every key-down
pub type KeyEventCallback = Box<dyn Fn(KeyEvent) + Send + 'static>;

/// Errors that can occur while registering for global key events
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HotkeyError {
    #[error("hotkey listener is already running")]
    AlreadyRunning,

    #[error("failed to create event tap - check Accessibility/Input Monitoring permissions")]
    PermissionDenied,

    #[error("failed to spawn listener thread: {0}")]
    ThreadSpawn(String),

    #[error("global key monitoring is not supported on this platform")]
    Unsupported,
}

/// A platform adapter delivering the global key-down stream
pub trait KeyEventSource {
    /// Native subscription kept alive while the source is running
    type Handle: Send;

    /// Subscribe to the key stream. `on_event` runs on the source's thread.
    fn start(&self, on_event: KeyEventCallback) -> Result<Self::Handle, HotkeyError>;

    /// Tear down the subscription and release native resources
    fn stop(&self, handle: Self::Handle);
}

#[cfg(target_os = "macos")]
pub use self::event_tap::{EventTapSource, TapHandle};

#[cfg(not(target_os = "macos"))]
pub use self::unsupported::EventTapSource;

#[cfg(target_os = "macos")]
mod event_tap {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{mpsc, Arc};
    use std::thread::{self, JoinHandle};
    use std::time::Duration;

    use core_foundation::runloop::{kCFRunLoopCommonModes, kCFRunLoopDefaultMode, CFRunLoop};
    use core_graphics::event::{
        CGEvent, CGEventTap, CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement,
        CGEventTapProxy, CGEventType, EventField,
    };
    use tracing::{error, info, warn};

    use super::{HotkeyError, KeyEventCallback, KeyEventSource};
    use crate::hotkey::keys::KeyEvent;

    /// How long the run loop blocks before re-checking the running flag
    const RUN_LOOP_SLICE: Duration = Duration::from_millis(100);

    /// Listen-only CGEventTap on key-down events
    #[derive(Debug, Default)]
    pub struct EventTapSource;

    /// Running tap thread
    pub struct TapHandle {
        running: Arc<AtomicBool>,
        thread: Option<JoinHandle<()>>,
    }

    impl Drop for TapHandle {
        fn drop(&mut self) {
            self.running.store(false, Ordering::SeqCst);
        }
    }

    impl KeyEventSource for EventTapSource {
        type Handle = TapHandle;

        fn start(&self, on_event: KeyEventCallback) -> Result<TapHandle, HotkeyError> {
            let running = Arc::new(AtomicBool::new(true));
            let (ready_tx, ready_rx) = mpsc::channel::<Result<(), HotkeyError>>();
            let thread_running = Arc::clone(&running);

            let thread = thread::Builder::new()
                .name("hotkey-listener".to_string())
                .spawn(move || {
                    info!("hotkey listener thread started");
                    run_event_loop(on_event, thread_running, ready_tx);
                    info!("hotkey listener thread stopped");
                })
                .map_err(|e| HotkeyError::ThreadSpawn(e.to_string()))?;

            // Tap creation happens on the listener thread; wait for its verdict
            match ready_rx.recv() {
                Ok(Ok(())) => Ok(TapHandle {
                    running,
                    thread: Some(thread),
                }),
                Ok(Err(e)) => {
                    let _ = thread.join();
                    Err(e)
                }
                Err(_) => {
                    let _ = thread.join();
                    Err(HotkeyError::ThreadSpawn(
                        "listener thread exited during setup".to_string(),
                    ))
                }
            }
        }

        fn stop(&self, mut handle: TapHandle) {
            handle.running.store(false, Ordering::SeqCst);
            if let Some(thread) = handle.thread.take() {
                if thread.join().is_err() {
                    warn!("hotkey listener thread panicked");
                }
            }
        }
    }

    /// Run the CFRunLoop with the event tap until `running` is cleared
    fn run_event_loop(
        on_event: KeyEventCallback,
        running: Arc<AtomicBool>,
        ready_tx: mpsc::Sender<Result<(), HotkeyError>>,
    ) {
        // CGEventTap callback - must be fast and non-blocking
        let callback = move |_proxy: CGEventTapProxy,
                             event_type: CGEventType,
                             event: &CGEvent|
              -> Option<CGEvent> {
            match event_type {
                CGEventType::KeyDown => {
                    let code = event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE);
                    let repeat =
                        event.get_integer_value_field(EventField::KEYBOARD_EVENT_AUTOREPEAT);
                    on_event(KeyEvent {
                        code: code as u16,
                        is_repeat: repeat != 0,
                    });
                }
                CGEventType::TapDisabledByTimeout | CGEventType::TapDisabledByUserInput => {
                    warn!("event tap disabled by the system");
                }
                _ => {}
            }
            Some(event.clone())
        };

        let tap = match CGEventTap::new(
            CGEventTapLocation::Session,
            CGEventTapPlacement::HeadInsertEventTap,
            CGEventTapOptions::ListenOnly,
            vec![CGEventType::KeyDown],
            callback,
        ) {
            Ok(tap) => tap,
            Err(()) => {
                error!("failed to create event tap - is Input Monitoring permission granted?");
                let _ = ready_tx.send(Err(HotkeyError::PermissionDenied));
                return;
            }
        };

        let run_loop_source = match tap.mach_port.create_runloop_source(0) {
            Ok(source) => source,
            Err(()) => {
                error!("failed to create run loop source for event tap");
                let _ = ready_tx.send(Err(HotkeyError::PermissionDenied));
                return;
            }
        };

        let run_loop = CFRunLoop::get_current();
        unsafe {
            run_loop.add_source(&run_loop_source, kCFRunLoopCommonModes);
        }
        tap.enable();

        info!("event tap created and enabled");
        let _ = ready_tx.send(Ok(()));

        while running.load(Ordering::SeqCst) {
            CFRunLoop::run_in_mode(unsafe { kCFRunLoopDefaultMode }, RUN_LOOP_SLICE, true);
        }

        // Tap and run loop source are released when they go out of scope
    }
}

#[cfg(not(target_os = "macos"))]
mod unsupported {
    use super::{HotkeyError, KeyEventCallback, KeyEventSource};

    /// Placeholder source for platforms without a global event tap
    #[derive(Debug, Default)]
    pub struct EventTapSource;

    impl KeyEventSource for EventTapSource {
        type Handle = ();

        fn start(&self, _on_event: KeyEventCallback) -> Result<(), HotkeyError> {
            Err(HotkeyError::Unsupported)
        }

        fn stop(&self, _handle: ()) {}
    }

}
