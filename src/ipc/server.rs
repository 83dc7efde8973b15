//! Unix domain socket server for IPC
//!
//! Provides request-response communication with the capture session and
//! push delivery of session events to subscribed clients.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info, warn};

use crate::events::SessionEvent;
use crate::session::{SessionCommand, SessionHandle};

use super::protocol::{DaemonStatus, Request, Response, MAX_MESSAGE_LEN};

/// IPC Server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
    shared: Arc<Shared>,
    shutdown_tx: broadcast::Sender<()>,
}

/// State visible to every client handler
struct Shared {
    session: SessionHandle,
    events: broadcast::Sender<SessionEvent>,
    state: RwLock<ServerState>,
}

struct ServerState {
    hotkey_registered: bool,
    sync_enabled: bool,
    start_time: Instant,
}

impl Server {
    /// Create a new IPC server bound to `socket_path`
    pub fn new(
        socket_path: &Path,
        session: SessionHandle,
        events: broadcast::Sender<SessionEvent>,
        sync_enabled: bool,
    ) -> Result<Self> {
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create socket directory")?;
        }

        // Left behind by a daemon that did not shut down cleanly
        if socket_path.exists() {
            std::fs::remove_file(socket_path).context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path).context("failed to bind Unix socket")?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        let shared = Arc::new(Shared {
            session,
            events,
            state: RwLock::new(ServerState {
                hotkey_registered: false,
                sync_enabled,
                start_time: Instant::now(),
            }),
        });

        info!(?socket_path, "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener: Some(listener),
            shared,
            shutdown_tx,
        })
    }

    /// Record whether the global hotkey is active
    pub async fn set_hotkey_registered(&self, registered: bool) {
        let mut state = self.shared.state.write().await;
        if state.hotkey_registered != registered {
            info!(registered, "IPC server: hotkey registration updated");
        }
        state.hotkey_registered = registered;
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        let listener = self.listener.as_ref().context("server not initialized")?;

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let shared = Arc::clone(&self.shared);
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = Self::handle_client(stream, shared) => {
                                if let Err(e) = result {
                                    warn!(?e, "client handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("client handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Handle a single client connection
    async fn handle_client(mut stream: UnixStream, shared: Arc<Shared>) -> Result<()> {
        loop {
            let Some(body) = Self::read_message(&mut stream).await? else {
                debug!("client disconnected");
                return Ok(());
            };

            let request: Request = match serde_json::from_slice(&body) {
                Ok(request) => request,
                Err(e) => {
                    warn!(%e, "malformed request");
                    Self::send_message(&mut stream, &Response::error("bad_request", e)).await?;
                    continue;
                }
            };

            debug!(?request, "received request");

            if request == Request::Subscribe {
                // Subscribe before confirming so no event slips in between
                let events = shared.events.subscribe();
                Self::send_message(&mut stream, &Response::Subscribed).await?;
                debug!("client subscribed to session events");
                return Self::stream_events(stream, events).await;
            }

            let response = Self::process_request(request, &shared).await;
            Self::send_message(&mut stream, &response).await?;
        }
    }

    /// Push session events until the client goes away
    async fn stream_events(
        mut stream: UnixStream,
        mut events: broadcast::Receiver<SessionEvent>,
    ) -> Result<()> {
        let mut scratch = [0u8; 64];

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(event) => Self::send_message(&mut stream, &event).await?,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "subscriber lagged behind session events");
                    }
                    Err(broadcast::error::RecvError::Closed) => return Ok(()),
                },

                // Subscribers only listen; any read result ends the stream
                read = stream.read(&mut scratch) => {
                    match read {
                        Ok(0) => debug!("subscriber disconnected"),
                        Ok(_) => warn!("subscriber sent data, closing stream"),
                        Err(e) => return Err(e.into()),
                    }
                    return Ok(());
                }
            }
        }
    }

    /// Read one length-prefixed message, `None` on clean disconnect
    async fn read_message(stream: &mut UnixStream) -> Result<Option<Vec<u8>>> {
        let mut len_buf = [0u8; 4];
        match stream.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let len = u32::from_le_bytes(len_buf) as usize;
        if len > MAX_MESSAGE_LEN {
            warn!(len, "message too large, disconnecting");
            return Ok(None);
        }

        let mut msg_buf = vec![0u8; len];
        stream.read_exact(&mut msg_buf).await?;
        Ok(Some(msg_buf))
    }

    /// Send a length-prefixed JSON message
    async fn send_message<T: serde::Serialize>(stream: &mut UnixStream, msg: &T) -> Result<()> {
        let msg_bytes = serde_json::to_vec(msg)?;
        let msg_len = (msg_bytes.len() as u32).to_le_bytes();

        stream.write_all(&msg_len).await?;
        stream.write_all(&msg_bytes).await?;

        Ok(())
    }

    /// Process a request and return a response
    async fn process_request(request: Request, shared: &Shared) -> Response {
        let command = match request {
            Request::Ping => return Response::Pong,
            Request::Subscribe => return Response::Subscribed,
            Request::GetStatus => return Self::status(shared).await,
            Request::Toggle => SessionCommand::Toggle,
            Request::Show => SessionCommand::Show,
            Request::Hide => SessionCommand::Hide,
            Request::SetText { text } => SessionCommand::SetText(text),
            Request::Submit { text } => SessionCommand::Submit(text),
        };

        match shared.session.request(command).await {
            Ok(snapshot) => Response::Session(snapshot),
            Err(e) => Response::error("session_unavailable", e),
        }
    }

    async fn status(shared: &Shared) -> Response {
        let session = match shared.session.request(SessionCommand::Snapshot).await {
            Ok(snapshot) => snapshot,
            Err(e) => return Response::error("session_unavailable", e),
        };

        let state = shared.state.read().await;
        Response::Status(DaemonStatus {
            version: env!("CARGO_PKG_VERSION").to_string(),
            hotkey_registered: state.hotkey_registered,
            sync_enabled: state.sync_enabled,
            session,
            uptime_secs: state.start_time.elapsed().as_secs(),
        })
    }

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("IPC server shutdown complete");
    }
}
