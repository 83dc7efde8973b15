//! Local notification scheduling
//!
//! Scheduling is fire-and-forget: callers never learn whether delivery
//! worked. A timer task sleeps until the due time, then the notification
//! is logged, broadcast to subscribers and (on macOS) shown as a banner.

use std::time::Duration;

use chrono::Utc;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::Reminder;
use crate::events::SessionEvent;

/// Schedules a local notification for a created reminder
pub trait NotificationScheduler: Send + Sync {
    fn schedule(&self, reminder: Reminder);
}

/// Timer-based scheduler running on the tokio runtime
#[derive(Debug, Clone)]
pub struct LocalNotificationScheduler {
    enabled: bool,
    events: broadcast::Sender<SessionEvent>,
}

impl LocalNotificationScheduler {
    pub fn new(enabled: bool, events: broadcast::Sender<SessionEvent>) -> Self {
        Self { enabled, events }
    }
}

impl NotificationScheduler for LocalNotificationScheduler {
    fn schedule(&self, reminder: Reminder) {
        if !self.enabled {
            debug!("notifications disabled, not scheduling");
            return;
        }

        let Some(due) = reminder.due_date() else {
            debug!("reminder has no due date, nothing to schedule");
            return;
        };

        let Ok(runtime) = Handle::try_current() else {
            warn!("no async runtime available, notification dropped");
            return;
        };

        // Past due dates fire right away
        let delay = (due - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        info!(%due, delay_secs = delay.as_secs(), "notification scheduled");

        let events = self.events.clone();
        runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            deliver(reminder, &events).await;
        });
    }
}

async fn deliver(reminder: Reminder, events: &broadcast::Sender<SessionEvent>) {
    info!("reminder due");
    debug!(text = reminder.text(), "delivering notification");

    #[cfg(target_os = "macos")]
    show_banner(reminder.text()).await;

    // No subscribers is fine
    let _ = events.send(SessionEvent::NotificationDue {
        text: reminder.text().to_string(),
        due_date: reminder.due_date(),
    });
}

#[cfg(target_os = "macos")]
async fn show_banner(text: &str) {
    let script = format!(
        "display notification \"{}\" with title \"Reminder\"",
        escape_applescript(text)
    );

    match tokio::process::Command::new("osascript")
        .arg("-e")
        .arg(script)
        .status()
        .await
    {
        Ok(status) if status.success() => {}
        Ok(status) => warn!(?status, "osascript exited with failure"),
        Err(e) => warn!(%e, "failed to run osascript"),
    }
}

#[cfg(any(target_os = "macos", test))]
fn escape_applescript(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use chrono::Duration as ChronoDuration;
    use tokio::time::timeout;

    use super::*;

    fn reminder_due_in(offset: ChronoDuration) -> Reminder {
        Reminder::new("stretch", Some(Utc::now() + offset))
    }

    #[tokio::test]
    async fn test_past_due_fires_immediately() {
        let (tx, mut rx) = broadcast::channel(8);
        let scheduler = LocalNotificationScheduler::new(true, tx);

        scheduler.schedule(reminder_due_in(ChronoDuration::seconds(-5)));

        let event = timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(event, SessionEvent::NotificationDue { ref text, .. } if text == "stretch"));
    }

    #[tokio::test]
    async fn test_future_due_waits() {
        let (tx, mut rx) = broadcast::channel(8);
        let scheduler = LocalNotificationScheduler::new(true, tx);

        scheduler.schedule(reminder_due_in(ChronoDuration::milliseconds(150)));

        assert!(timeout(Duration::from_millis(20), rx.recv()).await.is_err());
        assert!(timeout(Duration::from_secs(2), rx.recv()).await.is_ok());
    }

    #[tokio::test]
    async fn test_disabled_scheduler_drops() {
        let (tx, mut rx) = broadcast::channel(8);
        let scheduler = LocalNotificationScheduler::new(false, tx);

        scheduler.schedule(reminder_due_in(ChronoDuration::seconds(-5)));

        assert!(timeout(Duration::from_millis(100), rx.recv()).await.is_err());
    }

    #[tokio::test]
    async fn test_undated_reminder_is_not_scheduled() {
        let (tx, mut rx) = broadcast::channel(8);
        let scheduler = LocalNotificationScheduler::new(true, tx);

        scheduler.schedule(Reminder::new("someday", None));

        assert!(timeout(Duration::from_millis(100), rx.recv()).await.is_err());
    }

    #[test]
    fn test_schedule_outside_runtime_is_silent() {
        let (tx, _rx) = broadcast::channel(8);
        let scheduler = LocalNotificationScheduler::new(true, tx);
        scheduler.schedule(reminder_due_in(ChronoDuration::seconds(1)));
    }

    #[test]
    fn test_escape_applescript() {
        assert_eq!(escape_applescript(r#"say "hi" \o/"#), r#"say \"hi\" \\o/"#);
    }
}
