//! Events module for capture session changes
//!
//! Structured events published by the capture session for the
//! presentation layer: surface visibility, submission state changes,
//! created reminders and due notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::submission::SubmissionState;

/// Events emitted by the capture session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// The capture surface should be shown (new session, empty text)
    SurfaceShown,

    /// The capture surface should be hidden
    SurfaceHidden,

    /// Submission state or text changed
    SubmissionChanged {
        state: SubmissionState,
        text: String,
    },

    /// The backend accepted a reminder
    ReminderCreated {
        text: String,
        due_date: Option<DateTime<Utc>>,
    },

    /// A scheduled reminder is due
    NotificationDue {
        text: String,
        due_date: Option<DateTime<Utc>>,
    },
}

impl std::fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionEvent::SurfaceShown => write!(f, "SURFACE_SHOWN"),
            SessionEvent::SurfaceHidden => write!(f, "SURFACE_HIDDEN"),
            SessionEvent::SubmissionChanged { state, .. } => {
                write!(f, "SUBMISSION_CHANGED ({})", state)
            }
            SessionEvent::ReminderCreated { .. } => write!(f, "REMINDER_CREATED"),
            SessionEvent::NotificationDue { .. } => write!(f, "NOTIFICATION_DUE"),
        }
    }
}
