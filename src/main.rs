//! quickcap-daemon: Background daemon for quick reminder capture
//!
//! This daemon runs as a LaunchAgent and provides:
//! - A global double-press hotkey via CGEventTap
//! - The capture session owning text and submission state
//! - Reminder creation against an HTTP backend, with local notifications
//! - IPC server for the capture surface
//!
//! The capture surface itself is a separate process talking to the
//! daemon over the Unix socket.

mod app;
mod capabilities;
mod config;
mod events;
mod hotkey;
mod ipc;
mod lifecycle;
mod session;
mod submission;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app::AppContext;
use crate::config::Config;
use crate::hotkey::{EventTapSource, HotKeyService};
use crate::ipc::Server;
use crate::lifecycle::ShutdownSignal;
use crate::session::{CaptureSession, SessionHandle};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "quickcap-daemon starting");

    // Load configuration
    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(
        ?config.socket_path,
        trigger_key_code = config.trigger_key_code,
        "configuration loaded"
    );

    let context = AppContext::new(config)?;
    let shutdown = ShutdownSignal::new();

    // Hotkey service -> capture session
    let (hotkey_tx, hotkey_rx) = mpsc::channel(32);
    let mut hotkey_service = HotKeyService::new(EventTapSource, context.config.hotkey(), hotkey_tx);

    // Runs on its own thread; a refusal leaves the rest of the daemon usable
    if let Err(e) = hotkey_service.start() {
        error!(%e, "failed to register global hotkey");
        warn!("continuing without hotkey support - check Accessibility/Input Monitoring permissions");
    }

    // IPC clients -> capture session
    let (session, requests) = SessionHandle::channel(32);
    let capture = CaptureSession::new(context.submission_controller(), context.events.clone());
    let session_task = tokio::spawn(capture.run(requests, hotkey_rx));

    let server = Server::new(
        &context.config.socket_path,
        session,
        context.events.clone(),
        context.config.sync_enabled,
    )?;
    server.set_hotkey_registered(hotkey_service.is_active()).await;

    info!("daemon initialized, entering main loop");

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        result = shutdown.wait() => match result {
            Ok(()) => info!("shutdown signal received"),
            Err(e) => error!(?e, "failed to install signal handlers"),
        },
    }

    // Cleanup
    info!("shutting down...");

    hotkey_service.stop();
    server.shutdown().await;
    session_task.abort();

    info!("quickcap-daemon stopped");

    Ok(())
}
