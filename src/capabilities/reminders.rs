//! Remote reminder creation
//!
//! The backend receives `POST {base_url}/reminders` with a JSON body of
//! `{"text": ..., "due_date": RFC 3339 | null}` and answers 2xx on success.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

/// Errors from the reminder backend
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemindersError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("backend rejected reminder with status {status}")]
    Rejected { status: u16 },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

/// Creates reminders on a remote backend
pub trait RemindersClient: Send + Sync + 'static {
    fn create(
        &self,
        text: &str,
        due_date: Option<DateTime<Utc>>,
    ) -> impl Future<Output = Result<(), RemindersError>> + Send;
}

#[derive(Debug, Serialize)]
struct CreateReminderBody<'a> {
    text: &'a str,
    due_date: Option<DateTime<Utc>>,
}

/// JSON-over-HTTP reminder backend
#[derive(Debug, Clone)]
pub struct HttpRemindersClient {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpRemindersClient {
    pub fn new(base_url: &str, timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/reminders", base_url.trim_end_matches('/')),
            timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl RemindersClient for HttpRemindersClient {
    async fn create(
        &self,
        text: &str,
        due_date: Option<DateTime<Utc>>,
    ) -> Result<(), RemindersError> {
        debug!(endpoint = %self.endpoint, ?due_date, "creating reminder");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&CreateReminderBody { text, due_date })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RemindersError::Timeout(self.timeout)
                } else {
                    RemindersError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemindersError::Rejected {
                status: status.as_u16(),
            });
        }

        info!(status = status.as_u16(), "reminder created");
        Ok(())
    }
}
