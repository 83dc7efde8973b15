//! Application context
//!
//! Built once at startup and passed by reference to whatever needs
//! configuration or one of the capabilities.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tracing::info;

use crate::capabilities::{
    DateParser, HttpRemindersClient, LocalNotificationScheduler, NaturalDateParser,
    NotificationScheduler,
};
use crate::config::Config;
use crate::events::SessionEvent;
use crate::submission::SubmissionController;

const EVENT_CAPACITY: usize = 64;

pub struct AppContext {
    pub config: Config,
    /// Session events for IPC subscribers
    pub events: broadcast::Sender<SessionEvent>,
    pub parser: Arc<dyn DateParser>,
    pub client: Arc<HttpRemindersClient>,
    pub scheduler: Arc<dyn NotificationScheduler>,
}

impl AppContext {
    pub fn new(config: Config) -> Result<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let parser = NaturalDateParser::new().context("failed to build date parser")?;
        let client = HttpRemindersClient::new(&config.base_url, config.request_timeout)
            .context("failed to build HTTP client")?;
        let scheduler = LocalNotificationScheduler::new(config.sync_enabled, events.clone());

        info!(
            endpoint = client.endpoint(),
            sync_enabled = config.sync_enabled,
            "capabilities ready"
        );

        Ok(Self {
            config,
            events,
            parser: Arc::new(parser),
            client: Arc::new(client),
            scheduler: Arc::new(scheduler),
        })
    }

    /// A fresh controller sharing this context's capabilities
    pub fn submission_controller(&self) -> SubmissionController<HttpRemindersClient> {
        SubmissionController::new(
            self.config.submission(),
            Arc::clone(&self.parser),
            Arc::clone(&self.client),
            Arc::clone(&self.scheduler),
        )
    }
}
