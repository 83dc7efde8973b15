//! External capabilities consumed by the submission pipeline
//!
//! Each capability is a narrow trait with a real adapter here and a
//! recording double in `testing` for unit tests.

mod date;
mod notify;
mod reminders;

#[cfg(test)]
pub mod testing;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use date::{DateParser, NaturalDateParser};
pub use notify::{LocalNotificationScheduler, NotificationScheduler};
pub use reminders::{HttpRemindersClient, RemindersClient, RemindersError};

/// A reminder ready to be created and scheduled
///
/// Only built by the submission pipeline once the date parser has had
/// its say, so `due_date` is either a parsed timestamp or deliberately
/// absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    text: String,
    due_date: Option<DateTime<Utc>>,
}

impl Reminder {
    pub(crate) fn new(text: impl Into<String>, due_date: Option<DateTime<Utc>>) -> Self {
        Self {
            text: text.into(),
            due_date,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn due_date(&self) -> Option<DateTime<Utc>> {
        self.due_date
    }
}
