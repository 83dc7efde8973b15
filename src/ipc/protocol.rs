//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use serde::{Deserialize, Serialize};

use crate::session::SessionSnapshot;

/// Largest accepted message body
pub const MAX_MESSAGE_LEN: usize = 1024 * 1024;

/// Requests from the presentation layer to the daemon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Ping to check connectivity
    Ping,

    /// Request current daemon status
    GetStatus,

    /// Show the capture surface if hidden, hide it otherwise
    Toggle,

    Show,

    Hide,

    /// The user edited the capture text
    SetText { text: String },

    /// Submit the given text, or whatever the session holds
    Submit {
        #[serde(default)]
        text: Option<String>,
    },

    /// Turn this connection into a stream of session events
    Subscribe,
}

/// Responses from daemon to the presentation layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Pong response to ping
    Pong,

    /// Current daemon status
    Status(DaemonStatus),

    /// Session state after a command ran
    Session(SessionSnapshot),

    /// Subscription confirmed, events follow
    Subscribed,

    /// Error response
    Error { code: String, message: String },
}

impl Response {
    pub fn error(code: &str, message: impl std::fmt::Display) -> Self {
        Self::Error {
            code: code.to_string(),
            message: message.to_string(),
        }
    }
}

/// Full daemon status snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonStatus {
    /// Daemon version
    pub version: String,

    /// Whether the global hotkey is registered
    pub hotkey_registered: bool,

    /// Whether created reminders get local notifications
    pub sync_enabled: bool,

    /// Surface visibility and submission state
    pub session: SessionSnapshot,

    /// Uptime in seconds
    pub uptime_secs: u64,
}
