//! Recording test doubles for the pipeline capabilities

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::Notify;

use super::{DateParser, NotificationScheduler, Reminder, RemindersClient, RemindersError};
use crate::config::SubmissionConfig;
use crate::hotkey::{HotkeyError, KeyEvent, KeyEventCallback, KeyEventSource};
use crate::submission::SubmissionController;

/// 2024-01-01 12:00:00 UTC
pub fn fixed_due() -> DateTime<Utc> {
    Utc.timestamp_opt(1_704_110_400, 0).unwrap()
}

/// Parser that ignores its input and returns a fixed answer
#[derive(Debug)]
pub struct FixedDateParser {
    date: Option<DateTime<Utc>>,
    calls: AtomicUsize,
}

impl FixedDateParser {
    pub fn new(date: Option<DateTime<Utc>>) -> Self {
        Self {
            date,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DateParser for FixedDateParser {
    fn parse(&self, _text: &str) -> Option<DateTime<Utc>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.date
    }
}

/// How the recording client answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientBehavior {
    Succeed,
    Fail,
    /// Never answers
    Hang,
    /// Succeeds once `release` is called
    Gated,
}

/// Reminders client recording every create call
#[derive(Debug)]
pub struct RecordingRemindersClient {
    calls: Mutex<Vec<(String, Option<DateTime<Utc>>)>>,
    behavior: Mutex<ClientBehavior>,
    gate: Notify,
}

impl RecordingRemindersClient {
    pub fn new(behavior: ClientBehavior) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            behavior: Mutex::new(behavior),
            gate: Notify::new(),
        }
    }

    pub fn set_behavior(&self, behavior: ClientBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn calls(&self) -> Vec<(String, Option<DateTime<Utc>>)> {
        self.calls.lock().unwrap().clone()
    }

    /// Let one gated call complete
    pub fn release(&self) {
        self.gate.notify_one();
    }
}

impl RemindersClient for RecordingRemindersClient {
    async fn create(
        &self,
        text: &str,
        due_date: Option<DateTime<Utc>>,
    ) -> Result<(), RemindersError> {
        self.calls.lock().unwrap().push((text.to_string(), due_date));
        let behavior = *self.behavior.lock().unwrap();

        match behavior {
            ClientBehavior::Succeed => Ok(()),
            ClientBehavior::Fail => Err(RemindersError::Transport("connection refused".to_string())),
            ClientBehavior::Hang => std::future::pending().await,
            ClientBehavior::Gated => {
                self.gate.notified().await;
                Ok(())
            }
        }
    }
}

/// Scheduler recording every reminder it is handed
#[derive(Debug, Default)]
pub struct RecordingScheduler {
    scheduled: Mutex<Vec<Reminder>>,
}

impl RecordingScheduler {
    pub fn scheduled(&self) -> Vec<Reminder> {
        self.scheduled.lock().unwrap().clone()
    }
}

impl NotificationScheduler for RecordingScheduler {
    fn schedule(&self, reminder: Reminder) {
        self.scheduled.lock().unwrap().push(reminder);
    }
}

/// Capabilities wired into controllers under test
pub struct Harness {
    pub parser: Arc<FixedDateParser>,
    pub client: Arc<RecordingRemindersClient>,
    pub scheduler: Arc<RecordingScheduler>,
}

impl Harness {
    pub fn new(date: Option<DateTime<Utc>>, behavior: ClientBehavior) -> Self {
        Self {
            parser: Arc::new(FixedDateParser::new(date)),
            client: Arc::new(RecordingRemindersClient::new(behavior)),
            scheduler: Arc::new(RecordingScheduler::default()),
        }
    }

    pub fn controller(&self) -> SubmissionController<RecordingRemindersClient> {
        self.controller_with(SubmissionConfig {
            base_url: "https://example.com".to_string(),
            request_timeout: Duration::from_secs(1),
        })
    }

    pub fn controller_with(
        &self,
        config: SubmissionConfig,
    ) -> SubmissionController<RecordingRemindersClient> {
        SubmissionController::new(
            config,
            self.parser.clone(),
            Arc::clone(&self.client),
            self.scheduler.clone(),
        )
    }
}

/// Key source driven by the test through `emit`
#[derive(Clone, Default)]
pub struct ScriptedKeySource {
    inner: Arc<ScriptedInner>,
}

#[derive(Default)]
struct ScriptedInner {
    deny: bool,
    callback: Mutex<Option<KeyEventCallback>>,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl ScriptedKeySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// A source whose registration is refused
    pub fn denied() -> Self {
        Self {
            inner: Arc::new(ScriptedInner {
                deny: true,
                ..ScriptedInner::default()
            }),
        }
    }

    /// Deliver an event to the subscribed callback, if any
    pub fn emit(&self, event: KeyEvent) {
        if let Some(callback) = self.inner.callback.lock().unwrap().as_ref() {
            callback(event);
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.inner.callback.lock().unwrap().is_some()
    }

    pub fn start_count(&self) -> usize {
        self.inner.starts.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> usize {
        self.inner.stops.load(Ordering::SeqCst)
    }
}

impl KeyEventSource for ScriptedKeySource {
    type Handle = ();

    fn start(&self, on_event: KeyEventCallback) -> Result<(), HotkeyError> {
        self.inner.starts.fetch_add(1, Ordering::SeqCst);
        if self.inner.deny {
            return Err(HotkeyError::PermissionDenied);
        }
        *self.inner.callback.lock().unwrap() = Some(on_event);
        Ok(())
    }

    fn stop(&self, _handle: ()) {
        self.inner.stops.fetch_add(1, Ordering::SeqCst);
        self.inner.callback.lock().unwrap().take();
    }
}
