//! Capture session task
//!
//! Owns the submission controller and the capture surface's visibility.
//! Every state mutation happens on this one task: hotkey gestures,
//! client commands and finished remote calls all arrive as messages.

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info};

use crate::capabilities::RemindersClient;
use crate::events::SessionEvent;
use crate::hotkey::HotkeyEvent;
use crate::submission::{
    CreateCompletion, SubmissionController, SubmissionState, SubmitError, SubmitOutcome,
};

/// Commands accepted by the capture session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// Show the surface when hidden, hide it when shown
    Toggle,
    Show,
    Hide,
    /// The user edited the text
    SetText(String),
    /// Submit the given text, or the current text when `None`
    Submit(Option<String>),
    /// Report the current state without changing it
    Snapshot,
}

/// Point-in-time view of the session for the presentation layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub surface_visible: bool,
    pub state: SubmissionState,
    pub text: String,
}

/// A command plus the channel receiving the resulting snapshot
#[derive(Debug)]
pub struct SessionRequest {
    pub command: SessionCommand,
    pub reply: oneshot::Sender<SessionSnapshot>,
}

#[derive(Debug, thiserror::Error)]
#[error("capture session is not running")]
pub struct SessionClosed;

/// Cloneable sender side of the capture session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionRequest>,
}

impl SessionHandle {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<SessionRequest>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Send a command and wait for the session's snapshot after it ran
    pub async fn request(&self, command: SessionCommand) -> Result<SessionSnapshot, SessionClosed> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(SessionRequest {
                command,
                reply: reply_tx,
            })
            .await
            .map_err(|_| SessionClosed)?;
        reply_rx.await.map_err(|_| SessionClosed)
    }
}

/// The capture session itself
pub struct CaptureSession<C: RemindersClient> {
    controller: SubmissionController<C>,
    surface_visible: bool,
    events: broadcast::Sender<SessionEvent>,
    completion_tx: mpsc::Sender<CreateCompletion>,
    completion_rx: mpsc::Receiver<CreateCompletion>,
}

impl<C: RemindersClient> CaptureSession<C> {
    pub fn new(controller: SubmissionController<C>, events: broadcast::Sender<SessionEvent>) -> Self {
        let (completion_tx, completion_rx) = mpsc::channel(8);
        Self {
            controller,
            surface_visible: false,
            events,
            completion_tx,
            completion_rx,
        }
    }

    /// Process commands, gestures and completions until all request
    /// senders are dropped
    pub async fn run(
        mut self,
        mut requests: mpsc::Receiver<SessionRequest>,
        mut hotkeys: mpsc::Receiver<HotkeyEvent>,
    ) {
        info!("capture session started");
        let mut hotkeys_open = true;

        loop {
            tokio::select! {
                request = requests.recv() => match request {
                    Some(SessionRequest { command, reply }) => {
                        // The requester may have given up waiting
                        let _ = reply.send(self.handle(command));
                    }
                    None => break,
                },

                event = hotkeys.recv(), if hotkeys_open => match event {
                    Some(HotkeyEvent::DoublePress) => {
                        self.handle(SessionCommand::Toggle);
                    }
                    None => {
                        debug!("hotkey channel closed");
                        hotkeys_open = false;
                    }
                },

                Some(completion) = self.completion_rx.recv() => {
                    self.apply_completion(completion);
                }
            }
        }

        info!("capture session stopped");
    }

    /// Apply one command and return the resulting snapshot
    pub fn handle(&mut self, command: SessionCommand) -> SessionSnapshot {
        match command {
            SessionCommand::Toggle => {
                if self.surface_visible {
                    self.hide();
                } else {
                    self.show();
                }
            }
            SessionCommand::Show => self.show(),
            SessionCommand::Hide => self.hide(),
            SessionCommand::SetText(text) => {
                self.controller.set_text(text);
                self.publish_submission();
            }
            SessionCommand::Submit(text) => self.submit(text),
            SessionCommand::Snapshot => {}
        }

        self.snapshot()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            surface_visible: self.surface_visible,
            state: self.controller.state().clone(),
            text: self.controller.text().to_string(),
        }
    }

    fn show(&mut self) {
        if self.surface_visible {
            return;
        }
        // Every opening is a fresh session
        self.controller.reset();
        self.surface_visible = true;
        info!("capture surface shown");
        self.publish(SessionEvent::SurfaceShown);
        self.publish_submission();
    }

    fn hide(&mut self) {
        if !self.surface_visible {
            return;
        }
        self.surface_visible = false;
        self.controller.reset();
        info!("capture surface hidden");
        self.publish(SessionEvent::SurfaceHidden);
        self.publish_submission();
    }

    fn submit(&mut self, text: Option<String>) {
        let text = text.unwrap_or_else(|| self.controller.text().to_string());

        match self.controller.begin_submit(&text) {
            Ok(pending) => {
                debug!(due_date = ?pending.reminder().due_date(), "creating reminder");
                let completion_tx = self.completion_tx.clone();
                tokio::spawn(async move {
                    let completion = pending.run().await;
                    // Nobody to tell once the session has shut down
                    let _ = completion_tx.send(completion).await;
                });
            }
            Err(SubmitError::AlreadySubmitting) => return,
            Err(e) => debug!(%e, "submission not started"),
        }

        self.publish_submission();
    }

    fn apply_completion(&mut self, completion: CreateCompletion) {
        match self.controller.finish_submit(completion) {
            SubmitOutcome::Created(reminder) => {
                self.publish(SessionEvent::ReminderCreated {
                    text: reminder.text().to_string(),
                    due_date: reminder.due_date(),
                });
                if self.surface_visible {
                    self.hide();
                } else {
                    self.publish_submission();
                }
            }
            SubmitOutcome::Failed(_) => self.publish_submission(),
            SubmitOutcome::Stale => {}
        }
    }

    fn publish_submission(&self) {
        self.publish(SessionEvent::SubmissionChanged {
            state: self.controller.state().clone(),
            text: self.controller.text().to_string(),
        });
    }

    fn publish(&self, event: SessionEvent) {
        debug!(%event, "publishing session event");
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::{sleep, timeout};

    use super::*;
    use crate::capabilities::testing::{fixed_due, ClientBehavior, Harness, RecordingRemindersClient};
    use crate::submission::{MISSING_DATE_MESSAGE, NETWORK_ERROR_MESSAGE};

    fn session(harness: &Harness) -> (CaptureSession<RecordingRemindersClient>, broadcast::Receiver<SessionEvent>) {
        let (events, rx) = broadcast::channel(64);
        (CaptureSession::new(harness.controller(), events), rx)
    }

    fn start(
        harness: &Harness,
    ) -> (
        SessionHandle,
        mpsc::Sender<HotkeyEvent>,
        broadcast::Receiver<SessionEvent>,
    ) {
        let (session, rx) = session(harness);
        let (handle, requests) = SessionHandle::channel(16);
        let (hotkey_tx, hotkey_rx) = mpsc::channel(4);
        tokio::spawn(session.run(requests, hotkey_rx));
        (handle, hotkey_tx, rx)
    }

    async fn wait_for(
        rx: &mut broadcast::Receiver<SessionEvent>,
        matches: impl Fn(&SessionEvent) -> bool,
    ) -> SessionEvent {
        timeout(Duration::from_secs(2), async {
            loop {
                let event = rx.recv().await.unwrap();
                if matches(&event) {
                    return event;
                }
            }
        })
        .await
        .expect("expected session event was not published")
    }

    #[tokio::test]
    async fn test_toggle_shows_and_hides() {
        let harness = Harness::new(Some(fixed_due()), ClientBehavior::Succeed);
        let (mut session, mut rx) = session(&harness);

        assert!(session.handle(SessionCommand::Toggle).surface_visible);
        assert_eq!(rx.recv().await.unwrap(), SessionEvent::SurfaceShown);

        assert!(!session.handle(SessionCommand::Toggle).surface_visible);
        wait_for(&mut rx, |e| *e == SessionEvent::SurfaceHidden).await;
    }

    #[tokio::test]
    async fn test_show_keeps_text_of_open_surface() {
        let harness = Harness::new(Some(fixed_due()), ClientBehavior::Succeed);
        let (mut session, _rx) = session(&harness);

        session.handle(SessionCommand::Show);
        session.handle(SessionCommand::SetText("half typed".to_string()));
        let snapshot = session.handle(SessionCommand::Show);

        assert_eq!(snapshot.text, "half typed");
    }

    #[tokio::test]
    async fn test_hide_resets_failure() {
        let harness = Harness::new(None, ClientBehavior::Succeed);
        let (mut session, _rx) = session(&harness);

        session.handle(SessionCommand::Show);
        let snapshot = session.handle(SessionCommand::Submit(Some("Buy milk".to_string())));
        assert_eq!(snapshot.state, SubmissionState::Failed(MISSING_DATE_MESSAGE.to_string()));
        assert_eq!(snapshot.text, "Buy milk");

        let snapshot = session.handle(SessionCommand::Hide);
        assert_eq!(snapshot, SessionSnapshot::default());
    }

    #[tokio::test]
    async fn test_successful_submit_hides_surface() {
        let harness = Harness::new(Some(fixed_due()), ClientBehavior::Succeed);
        let (handle, _hotkeys, mut rx) = start(&harness);

        handle.request(SessionCommand::Show).await.unwrap();
        handle
            .request(SessionCommand::SetText("Buy milk tomorrow".to_string()))
            .await
            .unwrap();
        let snapshot = handle.request(SessionCommand::Submit(None)).await.unwrap();
        assert_eq!(snapshot.state, SubmissionState::Submitting);

        let created = wait_for(&mut rx, |e| matches!(e, SessionEvent::ReminderCreated { .. })).await;
        assert_eq!(
            created,
            SessionEvent::ReminderCreated {
                text: "Buy milk tomorrow".to_string(),
                due_date: Some(fixed_due()),
            }
        );
        wait_for(&mut rx, |e| *e == SessionEvent::SurfaceHidden).await;

        let snapshot = handle.request(SessionCommand::Snapshot).await.unwrap();
        assert_eq!(snapshot, SessionSnapshot::default());
        assert_eq!(harness.client.calls().len(), 1);
        assert_eq!(harness.scheduler.scheduled().len(), 1);
    }

    #[tokio::test]
    async fn test_network_failure_keeps_surface_and_text() {
        let harness = Harness::new(Some(fixed_due()), ClientBehavior::Fail);
        let (handle, _hotkeys, mut rx) = start(&harness);

        handle.request(SessionCommand::Show).await.unwrap();
        handle
            .request(SessionCommand::Submit(Some("Buy milk tomorrow".to_string())))
            .await
            .unwrap();

        wait_for(&mut rx, |e| {
            matches!(e, SessionEvent::SubmissionChanged { state: SubmissionState::Failed(_), .. })
        })
        .await;

        let snapshot = handle.request(SessionCommand::Snapshot).await.unwrap();
        assert!(snapshot.surface_visible);
        assert_eq!(snapshot.state, SubmissionState::Failed(NETWORK_ERROR_MESSAGE.to_string()));
        assert_eq!(snapshot.text, "Buy milk tomorrow");
    }

    #[tokio::test]
    async fn test_submit_while_submitting_is_ignored() {
        let harness = Harness::new(Some(fixed_due()), ClientBehavior::Gated);
        let (handle, _hotkeys, _rx) = start(&harness);

        handle.request(SessionCommand::Show).await.unwrap();
        let first = handle
            .request(SessionCommand::Submit(Some("Buy milk tomorrow".to_string())))
            .await
            .unwrap();
        let second = handle
            .request(SessionCommand::Submit(Some("Walk dog tomorrow".to_string())))
            .await
            .unwrap();

        assert_eq!(first.state, SubmissionState::Submitting);
        assert_eq!(second.state, SubmissionState::Submitting);
        assert_eq!(second.text, "Buy milk tomorrow");
        assert_eq!(harness.parser.calls(), 1);

        harness.client.release();
    }

    #[tokio::test]
    async fn test_result_after_dismiss_is_not_applied() {
        let harness = Harness::new(Some(fixed_due()), ClientBehavior::Gated);
        let (handle, _hotkeys, _rx) = start(&harness);

        handle.request(SessionCommand::Show).await.unwrap();
        handle
            .request(SessionCommand::Submit(Some("Buy milk tomorrow".to_string())))
            .await
            .unwrap();
        handle.request(SessionCommand::Hide).await.unwrap();
        handle.request(SessionCommand::Show).await.unwrap();
        handle
            .request(SessionCommand::SetText("new thought".to_string()))
            .await
            .unwrap();

        harness.client.release();
        timeout(Duration::from_secs(2), async {
            while harness.scheduler.scheduled().is_empty() {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("stale success was not scheduled");

        let snapshot = handle.request(SessionCommand::Snapshot).await.unwrap();
        assert!(snapshot.surface_visible);
        assert_eq!(snapshot.state, SubmissionState::Idle);
        assert_eq!(snapshot.text, "new thought");
    }

    #[tokio::test]
    async fn test_double_press_toggles_surface() {
        let harness = Harness::new(Some(fixed_due()), ClientBehavior::Succeed);
        let (handle, hotkeys, mut rx) = start(&harness);

        hotkeys.send(HotkeyEvent::DoublePress).await.unwrap();
        wait_for(&mut rx, |e| *e == SessionEvent::SurfaceShown).await;
        assert!(handle.request(SessionCommand::Snapshot).await.unwrap().surface_visible);

        hotkeys.send(HotkeyEvent::DoublePress).await.unwrap();
        wait_for(&mut rx, |e| *e == SessionEvent::SurfaceHidden).await;
    }

    #[tokio::test]
    async fn test_abandoned_reply_still_applies_command() {
        let harness = Harness::new(Some(fixed_due()), ClientBehavior::Succeed);
        let (handle, _hotkeys, _rx) = start(&harness);

        let (reply, abandoned) = oneshot::channel();
        drop(abandoned);
        handle
            .tx
            .send(SessionRequest {
                command: SessionCommand::Show,
                reply,
            })
            .await
            .unwrap();

        let snapshot = handle.request(SessionCommand::Snapshot).await.unwrap();
        assert!(snapshot.surface_visible);
    }

    #[test]
    fn test_request_after_shutdown_fails() {
        let (handle, requests) = SessionHandle::channel(1);
        drop(requests);
        let result = tokio_test::block_on(handle.request(SessionCommand::Snapshot));
        assert!(result.is_err());
    }
}
