//! Submission state machine
//!
//! Drives one capture session's text through parse → remote create →
//! notification scheduling:
//!
//! ```text
//! Idle ──submit──▶ Submitting ──created──▶ Idle (text cleared)
//!   ▲                  │
//!   │                  ├──no date / network error──▶ Failed(message)
//!   └──edit or reset───┴──────────────────────────────────┘
//! ```
//!
//! Validation and parsing run synchronously. The remote call is split
//! out as a [`PendingCreate`] so the caller can run it off its own loop
//! and hand the [`CreateCompletion`] back through [`finish_submit`].
//!
//! [`finish_submit`]: SubmissionController::finish_submit

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::validate::{require_due_date, validate_endpoint, validate_text, ValidationError};
use crate::capabilities::{DateParser, NotificationScheduler, Reminder, RemindersClient, RemindersError};
use crate::config::SubmissionConfig;

/// Message shown when the remote create fails
pub const NETWORK_ERROR_MESSAGE: &str = "Network error";

/// Observable state of the capture surface's submission
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum SubmissionState {
    /// Waiting for input
    #[default]
    Idle,
    /// A reminder is being created
    Submitting,
    /// The last submission failed; carries the message to show
    Failed(String),
}

impl std::fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmissionState::Idle => write!(f, "Idle"),
            SubmissionState::Submitting => write!(f, "Submitting"),
            SubmissionState::Failed(message) => write!(f, "Failed({})", message),
        }
    }
}

/// Why `submit` did not start a remote call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("a submission is already in flight")]
    AlreadySubmitting,
}

/// Result of applying a finished remote call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Created and scheduled; the surface should be hidden
    Created(Reminder),
    /// The remote call failed; text is kept for a retry
    Failed(RemindersError),
    /// The session was reset while the call was in flight
    Stale,
}

/// A remote create that has passed validation
pub struct PendingCreate<C> {
    client: Arc<C>,
    reminder: Reminder,
    timeout: Duration,
    epoch: u64,
}

/// A finished remote create, ready to be applied to the controller
#[derive(Debug)]
pub struct CreateCompletion {
    epoch: u64,
    reminder: Reminder,
    result: Result<(), RemindersError>,
}

impl<C: RemindersClient> PendingCreate<C> {
    pub fn reminder(&self) -> &Reminder {
        &self.reminder
    }

    /// Run the remote call, bounded by the request timeout
    pub async fn run(self) -> CreateCompletion {
        let request = self
            .client
            .create(self.reminder.text(), self.reminder.due_date());

        let result = match tokio::time::timeout(self.timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(RemindersError::Timeout(self.timeout)),
        };

        CreateCompletion {
            epoch: self.epoch,
            reminder: self.reminder,
            result,
        }
    }
}

/// Per-session submission state machine
pub struct SubmissionController<C> {
    config: SubmissionConfig,
    parser: Arc<dyn DateParser>,
    client: Arc<C>,
    scheduler: Arc<dyn NotificationScheduler>,
    text: String,
    state: SubmissionState,
    /// Bumped on every reset so late results can be recognized
    epoch: u64,
}

impl<C: RemindersClient> SubmissionController<C> {
    pub fn new(
        config: SubmissionConfig,
        parser: Arc<dyn DateParser>,
        client: Arc<C>,
        scheduler: Arc<dyn NotificationScheduler>,
    ) -> Self {
        Self {
            config,
            parser,
            client,
            scheduler,
            text: String::new(),
            state: SubmissionState::Idle,
            epoch: 0,
        }
    }

    pub fn state(&self) -> &SubmissionState {
        &self.state
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replace the typed text. Editing dismisses a failure.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        if matches!(self.state, SubmissionState::Failed(_)) {
            self.transition_to(SubmissionState::Idle);
        }
    }

    /// Start a new session: empty text, Idle, in-flight results orphaned
    pub fn reset(&mut self) {
        self.text.clear();
        self.epoch = self.epoch.wrapping_add(1);
        if self.state != SubmissionState::Idle {
            self.transition_to(SubmissionState::Idle);
        }
    }

    /// Validate and parse `text`, moving to Submitting.
    ///
    /// Returns the remote call to run. Rejected while another submission
    /// is in flight.
    pub fn begin_submit(&mut self, text: &str) -> Result<PendingCreate<C>, SubmitError> {
        if self.state == SubmissionState::Submitting {
            debug!("submission already in flight, ignoring submit");
            return Err(SubmitError::AlreadySubmitting);
        }

        self.text = text.to_string();

        if let Err(e) = validate_text(text).and_then(|_| validate_endpoint(&self.config.base_url)) {
            return Err(self.reject(e));
        }

        self.transition_to(SubmissionState::Submitting);

        let due_date = match require_due_date(self.parser.parse(text)) {
            Ok(due_date) => due_date,
            Err(e) => return Err(self.reject(e)),
        };

        Ok(PendingCreate {
            client: Arc::clone(&self.client),
            reminder: Reminder::new(text, Some(due_date)),
            timeout: self.config.request_timeout,
            epoch: self.epoch,
        })
    }

    /// Apply the result of a remote create started by `begin_submit`
    pub fn finish_submit(&mut self, completion: CreateCompletion) -> SubmitOutcome {
        let CreateCompletion {
            epoch,
            reminder,
            result,
        } = completion;

        if epoch != self.epoch {
            debug!(epoch, current = self.epoch, "discarding result of a reset session");
            // The backend has the reminder either way
            if result.is_ok() {
                self.scheduler.schedule(reminder);
            }
            return SubmitOutcome::Stale;
        }

        match result {
            Ok(()) => {
                self.scheduler.schedule(reminder.clone());
                self.text.clear();
                self.transition_to(SubmissionState::Idle);
                SubmitOutcome::Created(reminder)
            }
            Err(e) => {
                warn!(%e, "reminder creation failed");
                self.transition_to(SubmissionState::Failed(NETWORK_ERROR_MESSAGE.to_string()));
                SubmitOutcome::Failed(e)
            }
        }
    }

    /// Run the whole pipeline inline
    #[cfg(test)]
    pub async fn submit(&mut self, text: &str) -> Result<SubmitOutcome, SubmitError> {
        let pending = self.begin_submit(text)?;
        let completion = pending.run().await;
        Ok(self.finish_submit(completion))
    }

    fn reject(&mut self, error: ValidationError) -> SubmitError {
        info!(%error, "submission rejected");
        self.transition_to(SubmissionState::Failed(error.user_message().to_string()));
        error.into()
    }

    fn transition_to(&mut self, new_state: SubmissionState) {
        info!(from = %self.state, to = %new_state, "submission state transition");
        self.state = new_state;
    }
}
